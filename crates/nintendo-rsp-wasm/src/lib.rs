//! Browser/host shim over the RSP interpreter.
//!
//! Exposes the embedding contract to a wasm host: reset, stepping, the
//! halted bit, the cycle counter, and raw base pointers into the
//! memory-exposed regions so the host can inspect IMEM, DMEM, the register
//! files, and RDRAM zero-copy. Pointers stay valid for the lifetime of the
//! context and may only be dereferenced between `step` calls.
//!
//! Memory layout behind the pointers: IMEM/DMEM are bus byte order (big
//! endian), GPRs are host-endian 32-bit words, and byte `b` of a vector
//! register's lane-order view sits at pointer byte `b ^ 15`.

use nintendo_rsp::Rsp;
use wasm_bindgen::prelude::wasm_bindgen;

/// An owned RSP instance and its host-visible memories.
#[wasm_bindgen]
pub struct RspContext {
    rsp: Rsp,
}

impl Default for RspContext {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl RspContext {
    /// Allocate the memories, build the divide tables, and power on
    /// (halted).
    #[wasm_bindgen(constructor)]
    #[must_use]
    pub fn new() -> Self {
        Self { rsp: Rsp::new() }
    }

    /// Reset all architectural state; RDRAM contents are preserved.
    pub fn reset(&mut self) {
        self.rsp.power();
    }

    /// Run `steps` dispatch iterations (each executes one instruction or
    /// dual-issued pair, or a 128-clock halted slice).
    pub fn step(&mut self, steps: u32) {
        self.rsp.step(steps);
    }

    /// Set or clear the halted bit.
    pub fn set_halted(&mut self, halted: bool) {
        self.rsp.set_halted(halted);
    }

    /// Monotonic clock since the last reset.
    #[must_use]
    pub fn cycles(&self) -> u32 {
        self.rsp.cycles() as u32
    }

    /// Base of the 4 KiB data memory.
    #[must_use]
    pub fn dmem_ptr(&self) -> *const u8 {
        self.rsp.dmem.as_bytes().as_ptr()
    }

    /// Base of the 4 KiB instruction memory.
    #[must_use]
    pub fn imem_ptr(&self) -> *const u8 {
        self.rsp.imem.as_bytes().as_ptr()
    }

    /// Base of the 32-entry scalar register file.
    #[must_use]
    pub fn gpr_ptr(&self) -> *const u8 {
        self.rsp.ipu.r.as_ptr().cast()
    }

    /// Base of the 32-entry vector register file.
    #[must_use]
    pub fn vpr_ptr(&self) -> *const u8 {
        self.rsp.vpu.r.as_ptr().cast()
    }

    /// Base of the RDRAM buffer the DMA engine transfers against.
    #[must_use]
    pub fn rdram_ptr(&self) -> *const u8 {
        self.rsp.rdram.as_ptr()
    }
}

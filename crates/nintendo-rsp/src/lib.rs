//! Cycle-aware interpreter for the N64 Reality Signal Processor.
//!
//! The RSP is the RCP's auxiliary coprocessor: a MIPS-like scalar unit
//! (the IPU) coupled to an eight-lane 16-bit vector unit (the VPU) with a
//! 48-bit-per-lane accumulator, executing microcode from a private 4 KiB
//! IMEM against a 4 KiB DMEM. This crate models the parts software can
//! observe: the instruction set of both units, the vector flag and divide
//! registers, the shallow pipeline's stall behavior and dual-issue rules,
//! the branch delay slot, the SP I/O registers, and a DMA engine advanced
//! in lockstep with the instruction stream.
//!
//! # Usage
//!
//! ```
//! use nintendo_rsp::Rsp;
//!
//! let mut rsp = Rsp::new();
//! rsp.imem.write_word(0, 0x2408_0005); // ADDIU $t0, $zero, 5
//! rsp.set_halted(false);
//! rsp.step(1);
//! assert_eq!(rsp.ipu.r[8], 5);
//! ```
//!
//! The interpreter is embedded: no files, no sockets, no threads. The host
//! may inspect (and for the memories, mutate) state between `step` calls;
//! nothing may touch the context while a call is in flight.

#![warn(missing_docs)]

mod branch;
mod cpu;
mod decode;
mod dma;
mod ipu;
mod loadstore;
mod memory;
mod pipeline;
mod registers;
mod scc;
#[cfg(all(target_arch = "x86_64", target_feature = "sse4.1"))]
mod simd;
mod vector;
mod vpu;

pub use branch::{Branch, BranchState};
pub use cpu::{RDRAM_SIZE, Rsp};
pub use decode::{OpInfo, can_dual_issue, decode};
pub use dma::{Dma, DmaFlags, DmaRegs};
pub use memory::{BANK_SIZE, Bank};
pub use pipeline::Pipeline;
pub use registers::Ipu;
pub use scc::Status;
pub use vector::Vpr;
pub use vpu::Vpu;

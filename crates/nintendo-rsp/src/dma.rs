//! DMA engine between RDRAM and the IMEM/DMEM banks.
//!
//! One transfer can be in flight while a second descriptor waits in the
//! pending slot; further queue attempts while full are dropped. The main
//! loop advances the engine in lockstep with the clocks each instruction
//! consumed, so transfers land at a deterministic point in the instruction
//! stream. The duration model is monotonic in transfer size, not
//! cycle-exact — the architectural contract is the memory contents and the
//! busy/full flags.

use crate::cpu::Rsp;

/// One transfer descriptor.
#[derive(Clone, Copy, Debug, Default)]
pub struct DmaRegs {
    /// Bank select: false = DMEM, true = IMEM.
    pub bank: bool,
    /// 12-bit address within the bank, 8-byte aligned.
    pub bank_address: u16,
    /// 24-bit RDRAM address, 8-byte aligned.
    pub dram_address: u32,
    /// Bytes per row, minus eight.
    pub length: u16,
    /// Extra RDRAM bytes skipped between rows.
    pub skip: u16,
    /// Rows, minus one.
    pub count: u8,
}

/// Per-direction busy/full flags.
#[derive(Clone, Copy, Debug, Default)]
pub struct DmaFlags {
    /// RDRAM to bank.
    pub read: bool,
    /// Bank to RDRAM.
    pub write: bool,
}

impl DmaFlags {
    /// Either direction active.
    #[must_use]
    pub fn any(self) -> bool {
        self.read || self.write
    }
}

/// DMA engine state.
#[derive(Clone, Debug, Default)]
pub struct Dma {
    /// Descriptor latched for the next transfer.
    pub pending: DmaRegs,
    /// Descriptor of the transfer in flight.
    pub current: DmaRegs,
    /// Transfer in flight.
    pub busy: DmaFlags,
    /// Pending descriptor latched.
    pub full: DmaFlags,
    clock: i64,
}

impl Dma {
    /// Reset the engine.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn duration(regs: &DmaRegs) -> i64 {
        let row = i64::from(regs.length / 8) + 1;
        let rows = i64::from(regs.count) + 1;
        14 + row * rows * 3
    }
}

impl Rsp {
    /// Queue the pending descriptor in the given direction (false = read,
    /// RDRAM into the bank).
    pub(crate) fn dma_queue(&mut self, write: bool) {
        if !self.dma.busy.any() {
            self.dma.current = self.dma.pending;
            self.dma.busy.read = !write;
            self.dma.busy.write = write;
            self.dma.clock = Dma::duration(&self.dma.current);
        } else if !self.dma.full.any() {
            self.dma.full.read = !write;
            self.dma.full.write = write;
        }
    }

    /// Advance the engine by the clocks the last instruction consumed.
    pub(crate) fn dma_step(&mut self, clocks: i64) {
        if !self.dma.busy.any() {
            return;
        }
        self.dma.clock -= clocks;
        if self.dma.clock > 0 {
            return;
        }
        let write = self.dma.busy.write;
        self.dma_transfer(write);
        self.dma.busy = DmaFlags::default();
        if self.dma.full.any() {
            let write = self.dma.full.write;
            self.dma.current = self.dma.pending;
            self.dma.full = DmaFlags::default();
            self.dma.busy.read = !write;
            self.dma.busy.write = write;
            self.dma.clock = Dma::duration(&self.dma.current);
        }
    }

    fn dma_transfer(&mut self, write: bool) {
        let regs = self.dma.current;
        let bytes = usize::from(regs.length) + 8;
        let rows = usize::from(regs.count) + 1;
        let mut dram = regs.dram_address as usize;
        let mut bank_address = u32::from(regs.bank_address);
        for _ in 0..rows {
            for offset in 0..bytes {
                let dram_index = (dram + offset) & (self.rdram.len() - 1);
                let bank = if regs.bank { &mut self.imem } else { &mut self.dmem };
                if write {
                    self.rdram[dram_index] = bank.read_byte(bank_address);
                } else {
                    bank.write_byte(bank_address, self.rdram[dram_index]);
                }
                bank_address = bank_address.wrapping_add(1) & 0xFFF;
            }
            dram += bytes + usize::from(regs.skip);
        }
        self.dma.current.dram_address = (dram & 0xFF_FFF8) as u32;
        self.dma.current.bank_address = (bank_address & 0xFF8) as u16;
    }
}

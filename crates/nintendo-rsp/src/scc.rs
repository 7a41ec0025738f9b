//! System control coprocessor: the SP status word and I/O register bank.
//!
//! MFC0/MTC0 with register index bit 3 clear reach the RSP's own eight I/O
//! registers; bit 3 set selects the RDP register bank, which is stubbed
//! here (reads return 0, writes are dropped).

use crate::cpu::Rsp;

/// SP status block.
///
/// The host may toggle `halted` between steps; everything else is driven by
/// the interpreter and the status-write protocol.
#[derive(Clone, Debug)]
pub struct Status {
    /// Processor is halted; the main loop idles at 128 clocks per slice.
    pub halted: bool,
    /// Set by BREAK, cleared through the status write protocol.
    pub broken: bool,
    /// Interrupt line to the host, raised by BREAK when
    /// `interrupt_on_break` is set or forced through a status write.
    pub interrupt: bool,
    /// Raise the interrupt line on BREAK.
    pub interrupt_on_break: bool,
    /// Single-step mode bit; tracked, not otherwise interpreted here.
    pub single_step: bool,
    /// I/O full bit.
    pub full: bool,
    /// Semaphore; reads test-and-set it, writes clear it.
    pub semaphore: bool,
    /// Eight software signal bits.
    pub signal: [bool; 8],
}

impl Default for Status {
    fn default() -> Self {
        Self {
            halted: true,
            broken: false,
            interrupt: false,
            interrupt_on_break: false,
            single_step: false,
            full: false,
            semaphore: false,
            signal: [false; 8],
        }
    }
}

impl Status {
    /// Reset to power-on state (halted).
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Rsp {
    pub(crate) fn mfc0(&mut self, rt: usize, rd: usize) {
        if rd & 8 == 0 {
            self.ipu.r[rt] = self.io_read(rd & 7);
        } else {
            // RDP register bank is stubbed
            self.ipu.r[rt] = 0;
        }
    }

    pub(crate) fn mtc0(&mut self, rt: usize, rd: usize) {
        if rd & 8 == 0 {
            let value = self.ipu.r[rt];
            self.io_write(rd & 7, value);
        }
    }

    /// Read one of the eight SP I/O registers.
    pub fn io_read(&mut self, index: usize) -> u32 {
        match index & 7 {
            // MEM_ADDR
            0 => u32::from(self.dma.pending.bank) << 12 | u32::from(self.dma.pending.bank_address),
            // DRAM_ADDR
            1 => self.dma.pending.dram_address,
            // RD_LEN / WR_LEN read back the current descriptor
            2 | 3 => {
                u32::from(self.dma.current.skip) << 20
                    | u32::from(self.dma.current.count) << 12
                    | u32::from(self.dma.current.length)
            }
            4 => self.status_word(),
            // DMA_FULL
            5 => u32::from(self.dma.full.any()),
            // DMA_BUSY
            6 => u32::from(self.dma.busy.any()),
            // SEMAPHORE: test-and-set
            _ => {
                let previous = self.status.semaphore;
                self.status.semaphore = true;
                u32::from(previous)
            }
        }
    }

    /// Write one of the eight SP I/O registers.
    pub fn io_write(&mut self, index: usize, value: u32) {
        match index & 7 {
            0 => {
                self.dma.pending.bank = value & 1 << 12 != 0;
                self.dma.pending.bank_address = (value & 0xFF8) as u16;
            }
            1 => {
                self.dma.pending.dram_address = value & 0xFF_FFF8;
            }
            2 => {
                self.dma.pending.length = (value & 0xFF8) as u16;
                self.dma.pending.count = (value >> 12) as u8;
                self.dma.pending.skip = (value >> 20 & 0xFF8) as u16;
                self.dma_queue(false);
            }
            3 => {
                self.dma.pending.length = (value & 0xFF8) as u16;
                self.dma.pending.count = (value >> 12) as u8;
                self.dma.pending.skip = (value >> 20 & 0xFF8) as u16;
                self.dma_queue(true);
            }
            4 => self.status_write(value),
            // DMA_FULL and DMA_BUSY are read-only
            5 | 6 => {}
            _ => self.status.semaphore = false,
        }
    }

    fn status_word(&self) -> u32 {
        let mut word = 0;
        word |= u32::from(self.status.halted);
        word |= u32::from(self.status.broken) << 1;
        word |= u32::from(self.dma.busy.any()) << 2;
        word |= u32::from(self.dma.full.any()) << 3;
        word |= u32::from(self.status.full) << 4;
        word |= u32::from(self.status.single_step) << 5;
        word |= u32::from(self.status.interrupt_on_break) << 6;
        for n in 0..8 {
            word |= u32::from(self.status.signal[n]) << (7 + n);
        }
        word
    }

    /// The clear/set bit-pair protocol of the status register.
    fn status_write(&mut self, value: u32) {
        if value & 1 != 0 {
            self.status.halted = false;
        }
        if value & 1 << 1 != 0 {
            self.status.halted = true;
        }
        if value & 1 << 2 != 0 {
            self.status.broken = false;
        }
        if value & 1 << 3 != 0 {
            self.status.interrupt = false;
        }
        if value & 1 << 4 != 0 {
            self.status.interrupt = true;
        }
        if value & 1 << 5 != 0 {
            self.status.single_step = false;
        }
        if value & 1 << 6 != 0 {
            self.status.single_step = true;
        }
        if value & 1 << 7 != 0 {
            self.status.interrupt_on_break = false;
        }
        if value & 1 << 8 != 0 {
            self.status.interrupt_on_break = true;
        }
        for n in 0..8 {
            if value & 1 << (9 + n * 2) != 0 {
                self.status.signal[n] = false;
            }
            if value & 1 << (10 + n * 2) != 0 {
                self.status.signal[n] = true;
            }
        }
    }
}

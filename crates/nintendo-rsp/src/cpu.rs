//! The RSP context: fetch/decode/dispatch loop and power-on state.
//!
//! The interpreter owns every component and runs in a single execution
//! context. The host tops the clock up with owed work (negative values)
//! and [`Rsp::exec`] drains it; a monotonic cycle counter advances in
//! lockstep for observability. All externally visible side effects of a
//! call happen before it returns.
//!
//! Each loop iteration fetches at PC, issues through the pipeline model,
//! executes, then tries to pair the following word into the same slot when
//! the dual-issue rules allow (one scalar op, one vector op, no
//! cross-dependencies, no branch involvement). The branch FSM is applied
//! in the epilogue, which also re-zeroes the hardwired zero register.

use crate::branch::{Branch, BranchState};
use crate::decode::{can_dual_issue, decode};
use crate::dma::Dma;
use crate::memory::Bank;
use crate::pipeline::Pipeline;
use crate::registers::Ipu;
use crate::scc::Status;
use crate::vpu::Vpu;

/// Bytes of host RAM visible to the DMA engine. Power of two so row
/// addresses can wrap by masking.
pub const RDRAM_SIZE: usize = 8 * 1024 * 1024;

/// The Reality Signal Processor.
pub struct Rsp {
    /// Data memory.
    pub dmem: Bank,
    /// Instruction memory.
    pub imem: Bank,
    /// System RAM reached by the DMA engine.
    pub rdram: Vec<u8>,
    /// Scalar unit state.
    pub ipu: Ipu,
    /// Vector unit state.
    pub vpu: Vpu,
    /// Branch FSM.
    pub branch: Branch,
    /// Hazard/stall model.
    pub pipeline: Pipeline,
    /// SP status block.
    pub status: Status,
    /// DMA engine.
    pub dma: Dma,
    clock: i64,
    cycles: u64,
}

impl Default for Rsp {
    fn default() -> Self {
        Self::new()
    }
}

impl Rsp {
    /// Create a powered-on, halted RSP with zeroed memories and the divide
    /// tables built.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dmem: Bank::new(),
            imem: Bank::new(),
            rdram: vec![0; RDRAM_SIZE],
            ipu: Ipu::default(),
            vpu: Vpu::new(),
            branch: Branch::default(),
            pipeline: Pipeline::default(),
            status: Status::default(),
            dma: Dma::default(),
            clock: 0,
            cycles: 0,
        }
    }

    /// Reset all architectural state to power-on values. RDRAM is left to
    /// the host; the divide tables are reset-invariant.
    pub fn power(&mut self) {
        self.dmem.fill(0);
        self.imem.fill(0);
        self.ipu.reset();
        self.vpu.reset();
        self.branch = Branch::default();
        self.pipeline.reset();
        self.status.reset();
        self.dma.reset();
        self.clock = 0;
        self.cycles = 0;
    }

    /// Set or clear the halted bit. The one piece of state the host may
    /// drive while the interpreter is stopped.
    pub fn set_halted(&mut self, halted: bool) {
        self.status.halted = halted;
    }

    /// Monotonic clock since the last reset.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Owe the interpreter `clocks` of work and drain it.
    pub fn run(&mut self, clocks: u32) {
        self.clock -= i64::from(clocks);
        self.exec();
    }

    /// Run exactly `iterations` dispatch iterations: each executes one
    /// instruction (or dual-issued pair), or burns a 128-clock halted
    /// slice, and advances the DMA engine in lockstep.
    pub fn step(&mut self, iterations: u32) {
        for _ in 0..iterations {
            let before = self.clock;
            if self.status.halted {
                self.step_clocks(128);
            } else {
                self.instruction();
            }
            let consumed = self.clock - before;
            self.dma_step(consumed);
        }
    }

    /// Run while owed work remains. A halted processor consumes 128 clocks
    /// per iteration; otherwise one instruction (or dual-issued pair)
    /// executes and the DMA engine advances by exactly the clocks it cost.
    pub fn exec(&mut self) {
        while self.clock < 0 {
            let before = self.clock;
            if self.status.halted {
                self.step_clocks(128);
            } else {
                self.instruction();
            }
            let consumed = self.clock - before;
            self.dma_step(consumed);
        }
    }

    fn step_clocks(&mut self, clocks: u32) {
        self.clock += i64::from(clocks);
        self.cycles += u64::from(clocks);
    }

    fn instruction(&mut self) {
        let word = self.imem.read_word(u32::from(self.ipu.pc));
        self.pipeline.begin();
        let op0 = decode(word);
        self.pipeline.issue(&op0);
        self.execute(word);

        if !self.pipeline.single_issue && !op0.branch() {
            let next = self.imem.read_word(u32::from(self.ipu.pc).wrapping_add(4));
            let op1 = decode(next);
            if can_dual_issue(&op0, &op1) {
                self.epilogue();
                self.pipeline.issue(&op1);
                self.execute(next);
            }
        }

        self.pipeline.end();
        self.epilogue();
        self.step_clocks(self.pipeline.clocks);
    }

    fn epilogue(&mut self) {
        self.ipu.r[0] = 0;
        match self.branch.state {
            BranchState::Step => self.ipu.pc = self.ipu.pc.wrapping_add(4),
            BranchState::Take => {
                self.ipu.pc = self.ipu.pc.wrapping_add(4);
                self.branch.delay_slot();
            }
            BranchState::DelaySlot => {
                self.ipu.pc = self.branch.pc;
                self.branch.reset();
                self.pipeline.stall();
                // landing on an odd word forces the next slot to issue alone
                if self.branch.pc & 4 != 0 {
                    self.pipeline.single_issue = true;
                }
            }
        }
    }

    fn execute(&mut self, word: u32) {
        let rs = (word >> 21 & 31) as usize;
        let rt = (word >> 16 & 31) as usize;
        let imm = word as u16 as i16;
        let uimm = word as u16;

        match word >> 26 {
            0x00 => self.execute_special(word),
            0x01 => self.execute_regimm(word),
            0x02 => self.j(word & 0x03FF_FFFF),
            0x03 => self.jal(word & 0x03FF_FFFF),
            0x04 => self.beq(rs, rt, imm),
            0x05 => self.bne(rs, rt, imm),
            0x06 => self.blez(rs, imm),
            0x07 => self.bgtz(rs, imm),
            0x08 | 0x09 => self.addiu(rt, rs, imm),
            0x0A => self.slti(rt, rs, imm),
            0x0B => self.sltiu(rt, rs, imm),
            0x0C => self.andi(rt, rs, uimm),
            0x0D => self.ori(rt, rs, uimm),
            0x0E => self.xori(rt, rs, uimm),
            0x0F => self.lui(rt, uimm),
            0x10 => self.execute_scc(word),
            0x12 => self.execute_cop2(word),
            0x20 => self.lb(rt, rs, imm),
            0x21 => self.lh(rt, rs, imm),
            0x23 | 0x27 => self.lw(rt, rs, imm),
            0x24 => self.lbu(rt, rs, imm),
            0x25 => self.lhu(rt, rs, imm),
            0x28 => self.sb(rt, rs, imm),
            0x29 => self.sh(rt, rs, imm),
            0x2B => self.sw(rt, rs, imm),
            0x32 => self.execute_lwc2(word),
            0x3A => self.execute_swc2(word),
            _ => self.invalid(),
        }
    }

    fn execute_special(&mut self, word: u32) {
        let rs = (word >> 21 & 31) as usize;
        let rt = (word >> 16 & 31) as usize;
        let rd = (word >> 11 & 31) as usize;
        let sa = word >> 6 & 31;

        match word & 0x3F {
            0x00 => self.sll(rd, rt, sa),
            0x02 => self.srl(rd, rt, sa),
            0x03 => self.sra(rd, rt, sa),
            0x04 => self.sllv(rd, rt, rs),
            0x06 => self.srlv(rd, rt, rs),
            0x07 => self.srav(rd, rt, rs),
            0x08 => self.jr(rs),
            0x09 => self.jalr(rd, rs),
            0x0D => self.break_(),
            0x20 | 0x21 => self.addu(rd, rs, rt),
            0x22 | 0x23 => self.subu(rd, rs, rt),
            0x24 => self.and(rd, rs, rt),
            0x25 => self.or(rd, rs, rt),
            0x26 => self.xor(rd, rs, rt),
            0x27 => self.nor(rd, rs, rt),
            0x2A => self.slt(rd, rs, rt),
            0x2B => self.sltu(rd, rs, rt),
            _ => self.invalid(),
        }
    }

    fn execute_regimm(&mut self, word: u32) {
        let rs = (word >> 21 & 31) as usize;
        let imm = word as u16 as i16;

        match word >> 16 & 31 {
            0x00 => self.bltz(rs, imm),
            0x01 => self.bgez(rs, imm),
            0x10 => self.bltzal(rs, imm),
            0x11 => self.bgezal(rs, imm),
            _ => self.invalid(),
        }
    }

    fn execute_scc(&mut self, word: u32) {
        let rt = (word >> 16 & 31) as usize;
        let rd = (word >> 11 & 31) as usize;

        match word >> 21 & 31 {
            0x00 => self.mfc0(rt, rd),
            0x04 => self.mtc0(rt, rd),
            _ => self.invalid(),
        }
    }

    fn execute_cop2(&mut self, word: u32) {
        let rt = (word >> 16 & 31) as usize;
        let rd = (word >> 11 & 31) as usize;
        let e = (word >> 7 & 15) as usize;

        match word >> 21 & 31 {
            0x00 => self.mfc2(rt, rd, e),
            0x02 => self.cfc2(rt, rd),
            0x04 => self.mtc2(rt, rd, e),
            0x06 => self.ctc2(rt, rd),
            0x10..=0x1F => self.execute_vu(word),
            _ => self.invalid(),
        }
    }

    fn execute_vu(&mut self, word: u32) {
        let e = (word >> 21 & 15) as usize;
        let vt = (word >> 16 & 31) as usize;
        let vs = (word >> 11 & 31) as usize;
        let vd = (word >> 6 & 31) as usize;
        // single-lane ops reuse the vs field as the destination element
        let de = vs & 7;

        match word & 0x3F {
            0x00 => self.vpu.vmulf(false, vd, vs, vt, e),
            0x01 => self.vpu.vmulf(true, vd, vs, vt, e),
            0x02 => self.vpu.vrnd(true, vd, vs, vt, e),
            0x03 => self.vpu.vmulq(vd, vs, vt, e),
            0x04 => self.vpu.vmudl(vd, vs, vt, e),
            0x05 => self.vpu.vmudm(vd, vs, vt, e),
            0x06 => self.vpu.vmudn(vd, vs, vt, e),
            0x07 => self.vpu.vmudh(vd, vs, vt, e),
            0x08 => self.vpu.vmacf(false, vd, vs, vt, e),
            0x09 => self.vpu.vmacf(true, vd, vs, vt, e),
            0x0A => self.vpu.vrnd(false, vd, vs, vt, e),
            0x0B => self.vpu.vmacq(vd),
            0x0C => self.vpu.vmadl(vd, vs, vt, e),
            0x0D => self.vpu.vmadm(vd, vs, vt, e),
            0x0E => self.vpu.vmadn(vd, vs, vt, e),
            0x0F => self.vpu.vmadh(vd, vs, vt, e),
            0x10 => self.vpu.vadd(vd, vs, vt, e),
            0x11 => self.vpu.vsub(vd, vs, vt, e),
            0x13 => self.vpu.vabs(vd, vs, vt, e),
            0x14 => self.vpu.vaddc(vd, vs, vt, e),
            0x15 => self.vpu.vsubc(vd, vs, vt, e),
            0x1D => self.vpu.vsar(vd, e),
            0x20 => self.vpu.vlt(vd, vs, vt, e),
            0x21 => self.vpu.veq(vd, vs, vt, e),
            0x22 => self.vpu.vne(vd, vs, vt, e),
            0x23 => self.vpu.vge(vd, vs, vt, e),
            0x24 => self.vpu.vcl(vd, vs, vt, e),
            0x25 => self.vpu.vch(vd, vs, vt, e),
            0x26 => self.vpu.vcr(vd, vs, vt, e),
            0x27 => self.vpu.vmrg(vd, vs, vt, e),
            0x28 => self.vpu.vand(vd, vs, vt, e),
            0x29 => self.vpu.vnand(vd, vs, vt, e),
            0x2A => self.vpu.vor(vd, vs, vt, e),
            0x2B => self.vpu.vnor(vd, vs, vt, e),
            0x2C => self.vpu.vxor(vd, vs, vt, e),
            0x2D => self.vpu.vnxor(vd, vs, vt, e),
            0x30 => self.vpu.vrcp(false, vd, de, vt, e),
            0x31 => self.vpu.vrcp(true, vd, de, vt, e),
            0x32 => self.vpu.vrcph(vd, de, vt, e),
            0x33 => self.vpu.vmov(vd, de, vt, e),
            0x34 => self.vpu.vrsq(false, vd, de, vt, e),
            0x35 => self.vpu.vrsq(true, vd, de, vt, e),
            0x36 => self.vpu.vrsqh(vd, de, vt, e),
            0x37 | 0x3F => self.vpu.vnop(),
            _ => self.vpu.vzero(vd, vs, vt, e),
        }
    }

    fn lsc_fields(word: u32) -> (usize, usize, usize, i8) {
        let rs = (word >> 21 & 31) as usize;
        let vt = (word >> 16 & 31) as usize;
        let e = (word >> 7 & 15) as usize;
        // 7-bit signed displacement
        let imm = (((word & 0x7F) << 1) as u8 as i8) >> 1;
        (vt, e, rs, imm)
    }

    fn execute_lwc2(&mut self, word: u32) {
        let (vt, e, rs, imm) = Self::lsc_fields(word);
        match word >> 11 & 31 {
            0x00 => self.lbv(vt, e, rs, imm),
            0x01 => self.lsv(vt, e, rs, imm),
            0x02 => self.llv(vt, e, rs, imm),
            0x03 => self.ldv(vt, e, rs, imm),
            0x04 => self.lqv(vt, e, rs, imm),
            0x05 => self.lrv(vt, e, rs, imm),
            0x06 => self.lpv(vt, e, rs, imm),
            0x07 => self.luv(vt, e, rs, imm),
            0x08 => self.lhv(vt, e, rs, imm),
            0x09 => self.lfv(vt, e, rs, imm),
            0x0A => self.lwv(vt, e, rs, imm),
            0x0B => self.ltv(vt, e, rs, imm),
            _ => self.invalid(),
        }
    }

    fn execute_swc2(&mut self, word: u32) {
        let (vt, e, rs, imm) = Self::lsc_fields(word);
        match word >> 11 & 31 {
            0x00 => self.sbv(vt, e, rs, imm),
            0x01 => self.ssv(vt, e, rs, imm),
            0x02 => self.slv(vt, e, rs, imm),
            0x03 => self.sdv(vt, e, rs, imm),
            0x04 => self.sqv(vt, e, rs, imm),
            0x05 => self.srv(vt, e, rs, imm),
            0x06 => self.spv(vt, e, rs, imm),
            0x07 => self.suv(vt, e, rs, imm),
            0x08 => self.shv(vt, e, rs, imm),
            0x09 => self.sfv(vt, e, rs, imm),
            0x0A => self.swv(vt, e, rs, imm),
            0x0B => self.stv(vt, e, rs, imm),
            _ => self.invalid(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn powers_on_halted() {
        let rsp = Rsp::new();
        assert!(rsp.status.halted);
        assert_eq!(rsp.cycles(), 0);
    }

    #[test]
    fn halted_processor_burns_128_clocks_per_slice() {
        let mut rsp = Rsp::new();
        rsp.step(1);
        assert_eq!(rsp.cycles(), 128);
        assert_eq!(rsp.ipu.pc, 0);
    }

    #[test]
    fn addiu_single_step() {
        let mut rsp = Rsp::new();
        rsp.imem.write_word(0, 0x2408_0005); // ADDIU $t0, $zero, 5
        rsp.set_halted(false);
        rsp.step(1);
        assert_eq!(rsp.ipu.r[8], 5);
        assert_eq!(rsp.ipu.pc, 4);
        assert_eq!(rsp.cycles(), 3);
    }

    #[test]
    fn zero_register_stays_zero() {
        let mut rsp = Rsp::new();
        rsp.imem.write_word(0, 0x2400_0005); // ADDIU $zero, $zero, 5
        rsp.set_halted(false);
        rsp.step(1);
        assert_eq!(rsp.ipu.r[0], 0);
    }

    #[test]
    fn break_halts_without_delay_slot() {
        let mut rsp = Rsp::new();
        rsp.imem.write_word(0, 0x0000_000D); // BREAK
        rsp.set_halted(false);
        rsp.step(1);
        assert!(rsp.status.halted);
        assert!(rsp.status.broken);
        assert_eq!(rsp.ipu.pc, 4);
        assert!(!rsp.status.interrupt);
    }

    #[test]
    fn break_raises_interrupt_when_armed() {
        let mut rsp = Rsp::new();
        rsp.status.interrupt_on_break = true;
        rsp.imem.write_word(0, 0x0000_000D);
        rsp.set_halted(false);
        rsp.step(1);
        assert!(rsp.status.interrupt);
    }
}

//! Branch state machine.
//!
//! A taken branch does not redirect the program counter immediately: the
//! instruction after it (the delay slot) executes first. The epilogue walks
//! this three-state machine once per retired instruction:
//!
//! ```text
//! Step ──take()──▶ Take ──epilogue──▶ DelaySlot ──epilogue──▶ Step
//! ```
//!
//! A branch taken inside a delay slot is undefined on the hardware; the
//! interpreter simply lets the staged target be replaced, which keeps state
//! consistent without modeling the undefined case.

/// Where the fetch stream is relative to a taken branch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BranchState {
    /// Sequential execution.
    #[default]
    Step,
    /// A branch was taken this instruction; the next one is its delay slot.
    Take,
    /// Currently executing the delay slot; the staged target applies next.
    DelaySlot,
}

/// Branch FSM state plus the staged target.
#[derive(Clone, Copy, Debug, Default)]
pub struct Branch {
    /// Current state.
    pub state: BranchState,
    /// Staged target, masked to the 12-bit IMEM space.
    pub pc: u16,
}

impl Branch {
    /// Back to sequential execution.
    pub fn reset(&mut self) {
        self.state = BranchState::Step;
    }

    /// Stage a taken branch to `address`.
    pub fn take(&mut self, address: u32) {
        self.state = BranchState::Take;
        self.pc = (address & 0xFFF) as u16;
    }

    /// Enter the delay slot.
    pub fn delay_slot(&mut self) {
        self.state = BranchState::DelaySlot;
    }

    /// True while the delay slot is executing.
    #[must_use]
    pub fn in_delay_slot(&self) -> bool {
        self.state == BranchState::DelaySlot
    }
}

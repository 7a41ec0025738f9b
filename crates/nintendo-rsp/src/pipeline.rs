//! Pipeline cost model.
//!
//! The RSP has a shallow pipeline with separate hazard windows for the two
//! register files: a scalar result is visible to readers two retire slots
//! after its producer, a vector result three. A store additionally waits
//! behind a load still in flight. The model keeps a rolling history of the
//! last three retired slots and charges three clocks per slot, with each
//! stall inserting an empty slot.
//!
//! This is the timing model the RSP's shipped software was tuned against,
//! not a gate-level reproduction; the contract is the observable stall
//! count, so the windows here must not be "improved".

use crate::decode::OpInfo;

/// One retired slot of history.
#[derive(Clone, Copy, Debug, Default)]
struct Stage {
    load: bool,
    r_write: u32,
    v_write: u32,
}

/// The slot currently being assembled (one op, or a dual-issued pair).
#[derive(Clone, Copy, Debug, Default)]
struct Current {
    load: bool,
    store: bool,
    branch: bool,
    r_read: u32,
    r_write: u32,
    v_read: u32,
    v_write: u32,
}

/// Rolling hazard state.
#[derive(Clone, Debug, Default)]
pub struct Pipeline {
    /// Clocks accumulated for the current instruction (pair).
    pub clocks: u32,
    /// Set after a branch retires: its delay slot must issue alone. Also
    /// set when a taken branch lands on an odd word.
    pub single_issue: bool,
    previous: [Stage; 3],
    current: Current,
}

impl Pipeline {
    /// Reset all history.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Start costing a new instruction.
    pub fn begin(&mut self) {
        self.clocks = 0;
    }

    /// Merge one op's reads/writes into the in-flight slot.
    pub fn issue(&mut self, op: &OpInfo) {
        self.current.r_read |= op.r_use;
        if !op.bypass() {
            // the zero register can't be written
            self.current.r_write |= op.r_def & !1;
        }
        self.current.v_read |= op.v_use;
        self.current.v_write |= op.v_def;
        self.current.load |= op.load();
        self.current.store |= op.store();
        self.current.branch |= op.branch();
    }

    /// Resolve hazards for the in-flight slot, retire it into history, and
    /// charge its clocks.
    pub fn end(&mut self) {
        self.read_gpr(self.current.r_read);
        self.read_vr(self.current.v_read);
        if self.current.store {
            self.wait_store();
        }
        self.single_issue = self.current.branch;

        self.previous[2] = self.previous[1];
        self.previous[1] = self.previous[0];
        self.previous[0] = Stage {
            load: self.current.load,
            r_write: self.current.r_write,
            v_write: self.current.v_write,
        };
        self.current = Current::default();
        self.clocks += 3;
    }

    /// Insert one empty slot (three clocks).
    pub fn stall(&mut self) {
        self.previous[2] = self.previous[1];
        self.previous[1] = self.previous[0];
        self.previous[0] = Stage::default();
        self.clocks += 3;
    }

    fn read_gpr(&mut self, mask: u32) {
        if mask & self.previous[0].r_write != 0 {
            self.stall();
            self.stall();
        } else if mask & self.previous[1].r_write != 0 {
            self.stall();
        }
    }

    fn read_vr(&mut self, mask: u32) {
        if mask & self.previous[0].v_write != 0 {
            self.stall();
            self.stall();
            self.stall();
        } else if mask & self.previous[1].v_write != 0 {
            self.stall();
            self.stall();
        } else if mask & self.previous[2].v_write != 0 {
            self.stall();
        }
    }

    fn wait_store(&mut self) {
        while self.previous[1].load {
            self.stall();
        }
    }
}

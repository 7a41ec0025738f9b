//! Instruction descriptors for pipeline scheduling.
//!
//! The decoder never executes anything: it maps a 32-bit instruction word
//! to the register masks and flags the pipeline model and the dual-issue
//! check need. The interpreter performs its own field extraction when it
//! dispatches, so this mapping must stay pure.
//!
//! Masks are bit-per-register over the scalar file (`r_*`), the vector
//! file (`v_*`), and the three vector control registers (`vc_*`, see
//! [`VCO`]/[`VCC`]/[`VCE`]). `vfake` records register fields the hardware
//! decodes but never reads; it only participates in the dual-issue check.

/// VCO slot in the `vc_use`/`vc_def` masks.
pub const VCO: u32 = 1 << 0;
/// VCC slot in the `vc_use`/`vc_def` masks.
pub const VCC: u32 = 1 << 1;
/// VCE slot in the `vc_use`/`vc_def` masks.
pub const VCE: u32 = 1 << 2;

/// Decoded scheduling descriptor for one instruction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpInfo {
    /// Bitmask over the `OpInfo::*` flag constants.
    pub flags: u32,
    /// Fake vector reads; dual-issue gating only.
    pub vfake: u32,
    /// Scalar registers read.
    pub r_use: u32,
    /// Scalar registers written.
    pub r_def: u32,
    /// Vector registers read.
    pub v_use: u32,
    /// Vector registers written.
    pub v_def: u32,
    /// Vector control registers read.
    pub vc_use: u32,
    /// Vector control registers written.
    pub vc_def: u32,
}

impl OpInfo {
    /// Reads DMEM.
    pub const LOAD: u32 = 1 << 0;
    /// Writes DMEM.
    pub const STORE: u32 = 1 << 1;
    /// Redirects the fetch stream.
    pub const BRANCH: u32 = 1 << 2;
    /// Executes on the vector unit.
    pub const VECTOR: u32 = 1 << 3;
    /// Participates in the VNOP dual-issue quirk (MTC2, LTV, VNOP/VNULL).
    pub const VNOP_GROUP: u32 = 1 << 4;
    /// Scalar write is forwarded and never stalls a reader (link/moves).
    pub const BYPASS: u32 = 1 << 5;

    /// Descriptor for an unrecognized instruction: executes as a no-op that
    /// still occupies one pipeline slot.
    pub const INVALID: Self = Self::new(0);

    const fn new(flags: u32) -> Self {
        Self {
            flags,
            vfake: 0,
            r_use: 0,
            r_def: 0,
            v_use: 0,
            v_def: 0,
            vc_use: 0,
            vc_def: 0,
        }
    }

    const fn reads(mut self, mask: u32) -> Self {
        self.r_use |= mask;
        self
    }

    const fn writes(mut self, mask: u32) -> Self {
        self.r_def |= mask;
        self
    }

    const fn vreads(mut self, mask: u32) -> Self {
        self.v_use |= mask;
        self
    }

    const fn vwrites(mut self, mask: u32) -> Self {
        self.v_def |= mask;
        self
    }

    const fn creads(mut self, mask: u32) -> Self {
        self.vc_use |= mask;
        self
    }

    const fn cwrites(mut self, mask: u32) -> Self {
        self.vc_def |= mask;
        self
    }

    const fn fakes(mut self, mask: u32) -> Self {
        self.vfake |= mask;
        self
    }

    /// True when the instruction reads DMEM.
    #[must_use]
    pub const fn load(&self) -> bool {
        self.flags & Self::LOAD != 0
    }

    /// True when the instruction writes DMEM.
    #[must_use]
    pub const fn store(&self) -> bool {
        self.flags & Self::STORE != 0
    }

    /// True when the instruction redirects the fetch stream.
    #[must_use]
    pub const fn branch(&self) -> bool {
        self.flags & Self::BRANCH != 0
    }

    /// True when the instruction executes on the vector unit.
    #[must_use]
    pub const fn vector(&self) -> bool {
        self.flags & Self::VECTOR != 0
    }

    /// True when the scalar write never stalls a reader.
    #[must_use]
    pub const fn bypass(&self) -> bool {
        self.flags & Self::BYPASS != 0
    }
}

/// Whether `op1` may retire in the same fetch cycle as `op0`.
///
/// One op must be scalar and the other vector; the first may not write any
/// vector or control register the second touches. The last clause is the
/// hardware's VNOP quirk: MTC2 and LTV conflict with the register fields a
/// following VNOP decodes but never reads.
#[must_use]
pub fn can_dual_issue(op0: &OpInfo, op1: &OpInfo) -> bool {
    op0.vector() != op1.vector()
        && op0.v_def & (op1.v_use | op1.v_def) == 0
        && op0.vc_def & (op1.vc_use | op1.vc_def) == 0
        && ((op0.flags | !op1.flags) & OpInfo::VNOP_GROUP == 0 || op0.v_def & op1.vfake == 0)
}

const fn gpr(index: u32) -> u32 {
    1 << (index & 31)
}

const fn vpr(index: u32) -> u32 {
    1 << (index & 31)
}

/// Vector registers touched by the LTV/STV transpose ops: the whole bank of
/// eight the named register belongs to.
const fn vpr_group(index: u32) -> u32 {
    0xFF << (index & 24)
}

const fn control(index: u32) -> u32 {
    match index & 3 {
        0 => VCO,
        1 => VCC,
        _ => VCE,
    }
}

/// Decode one instruction word.
#[must_use]
pub fn decode(instruction: u32) -> OpInfo {
    let rs = instruction >> 21 & 31;
    let rt = instruction >> 16 & 31;

    match instruction >> 26 {
        0x00 => decode_special(instruction),
        0x01 => decode_regimm(instruction),
        // J
        0x02 => OpInfo::new(OpInfo::BRANCH),
        // JAL
        0x03 => OpInfo::new(OpInfo::BRANCH | OpInfo::BYPASS).writes(gpr(31)),
        // BEQ, BNE
        0x04 | 0x05 => OpInfo::new(OpInfo::BRANCH).reads(gpr(rs) | gpr(rt)),
        // BLEZ, BGTZ
        0x06 | 0x07 => OpInfo::new(OpInfo::BRANCH).reads(gpr(rs)),
        // ADDI, ADDIU, SLTI, SLTIU, ANDI, ORI, XORI
        0x08..=0x0E => OpInfo::new(0).reads(gpr(rs)).writes(gpr(rt)),
        // LUI
        0x0F => OpInfo::new(0).writes(gpr(rt)),
        0x10 => decode_scc(instruction),
        0x12 => decode_cop2(instruction),
        // LB, LH, LW, LBU, LHU, LWU
        0x20 | 0x21 | 0x23..=0x25 | 0x27 => {
            OpInfo::new(OpInfo::LOAD).reads(gpr(rs)).writes(gpr(rt))
        }
        // SB, SH, SW
        0x28 | 0x29 | 0x2B => OpInfo::new(OpInfo::STORE).reads(gpr(rs) | gpr(rt)),
        0x32 => decode_lwc2(instruction),
        0x3A => decode_swc2(instruction),
        _ => OpInfo::INVALID,
    }
}

fn decode_special(instruction: u32) -> OpInfo {
    let rs = instruction >> 21 & 31;
    let rt = instruction >> 16 & 31;
    let rd = instruction >> 11 & 31;

    match instruction & 0x3F {
        // SLL, SRL, SRA
        0x00 | 0x02 | 0x03 => OpInfo::new(0).reads(gpr(rt)).writes(gpr(rd)),
        // SLLV, SRLV, SRAV
        0x04 | 0x06 | 0x07 => OpInfo::new(0).reads(gpr(rt) | gpr(rs)).writes(gpr(rd)),
        // JR
        0x08 => OpInfo::new(OpInfo::BRANCH).reads(gpr(rs)),
        // JALR
        0x09 => OpInfo::new(OpInfo::BRANCH | OpInfo::BYPASS)
            .reads(gpr(rs))
            .writes(gpr(rd)),
        // BREAK
        0x0D => OpInfo::new(0),
        // ADD, ADDU, SUB, SUBU, AND, OR, XOR, NOR, SLT, SLTU
        0x20..=0x27 | 0x2A | 0x2B => OpInfo::new(0).reads(gpr(rs) | gpr(rt)).writes(gpr(rd)),
        _ => OpInfo::INVALID,
    }
}

fn decode_regimm(instruction: u32) -> OpInfo {
    let rs = instruction >> 21 & 31;

    match instruction >> 16 & 31 {
        // BLTZ, BGEZ
        0x00 | 0x01 => OpInfo::new(OpInfo::BRANCH).reads(gpr(rs)),
        // BLTZAL, BGEZAL
        0x10 | 0x11 => OpInfo::new(OpInfo::BRANCH | OpInfo::BYPASS)
            .reads(gpr(rs))
            .writes(gpr(31)),
        _ => OpInfo::INVALID,
    }
}

fn decode_scc(instruction: u32) -> OpInfo {
    let rt = instruction >> 16 & 31;

    match instruction >> 21 & 31 {
        // MFC0
        0x00 => OpInfo::new(OpInfo::BYPASS).writes(gpr(rt)),
        // MTC0
        0x04 => OpInfo::new(0).reads(gpr(rt)),
        _ => OpInfo::INVALID,
    }
}

fn decode_cop2(instruction: u32) -> OpInfo {
    let rt = instruction >> 16 & 31;
    let rd = instruction >> 11 & 31;

    match instruction >> 21 & 31 {
        // MFC2
        0x00 => OpInfo::new(OpInfo::BYPASS).writes(gpr(rt)).vreads(vpr(rd)),
        // CFC2
        0x02 => OpInfo::new(OpInfo::BYPASS).writes(gpr(rt)).creads(control(rd)),
        // MTC2: merges two bytes into the target register
        0x04 => OpInfo::new(OpInfo::VNOP_GROUP)
            .reads(gpr(rt))
            .vreads(vpr(rd))
            .vwrites(vpr(rd)),
        // CTC2
        0x06 => OpInfo::new(0).reads(gpr(rt)).cwrites(control(rd)),
        0x10..=0x1F => decode_vu(instruction),
        _ => OpInfo::INVALID,
    }
}

fn decode_vu(instruction: u32) -> OpInfo {
    let vt = instruction >> 16 & 31;
    let vs = instruction >> 11 & 31;
    let vd = instruction >> 6 & 31;

    let op = OpInfo::new(OpInfo::VECTOR).vwrites(vpr(vd));
    match instruction & 0x3F {
        // VMULF, VMULU, VMUDL, VMUDM, VMUDN, VMUDH, VMACF, VMACU,
        // VMADL, VMADM, VMADN, VMADH, VMULQ
        0x00 | 0x01 | 0x03..=0x09 | 0x0C..=0x0F => op.vreads(vpr(vs) | vpr(vt)),
        // VRNDP, VRNDN: the vs field is a mode number, not a register
        0x02 | 0x0A => op.vreads(vpr(vt)),
        // VMACQ rounds the accumulator and ignores both operands
        0x0B => op,
        // VADD, VSUB
        0x10 | 0x11 => op.vreads(vpr(vs) | vpr(vt)).creads(VCO).cwrites(VCO),
        // VABS
        0x13 => op.vreads(vpr(vs) | vpr(vt)),
        // VADDC, VSUBC
        0x14 | 0x15 => op.vreads(vpr(vs) | vpr(vt)).cwrites(VCO),
        // VSAR
        0x1D => op.vreads(vpr(vs)),
        // VLT, VEQ, VNE, VGE
        0x20..=0x23 => op
            .vreads(vpr(vs) | vpr(vt))
            .creads(VCO)
            .cwrites(VCO | VCC),
        // VCL
        0x24 => op
            .vreads(vpr(vs) | vpr(vt))
            .creads(VCO | VCC | VCE)
            .cwrites(VCO | VCC | VCE),
        // VCH, VCR
        0x25 | 0x26 => op.vreads(vpr(vs) | vpr(vt)).cwrites(VCO | VCC | VCE),
        // VMRG
        0x27 => op.vreads(vpr(vs) | vpr(vt)).creads(VCC).cwrites(VCO),
        // VAND, VNAND, VOR, VNOR, VXOR, VNXOR
        0x28..=0x2D => op.vreads(vpr(vs) | vpr(vt)),
        // VRCP, VRCPL, VRCPH, VMOV, VRSQ, VRSQL, VRSQH: single-lane writes
        // merge into the destination
        0x30..=0x36 => op.vreads(vpr(vt) | vpr(vd)),
        // VNOP, VNULL: no writes, but the vt field still reaches the issue
        // logic as a fake read
        0x37 | 0x3F => OpInfo::new(OpInfo::VECTOR | OpInfo::VNOP_GROUP).fakes(vpr(vt)),
        // reserved opcodes execute the algebraic-zero behavior
        _ => op.vreads(vpr(vs) | vpr(vt)),
    }
}

fn decode_lwc2(instruction: u32) -> OpInfo {
    let rs = instruction >> 21 & 31;
    let vt = instruction >> 16 & 31;

    let op = OpInfo::new(OpInfo::LOAD).reads(gpr(rs));
    match instruction >> 11 & 31 {
        // LBV, LSV, LLV, LDV, LQV, LRV: partial loads merge into the target
        0x00..=0x05 => op.vreads(vpr(vt)).vwrites(vpr(vt)),
        // LPV, LUV, LHV: packed loads overwrite every lane
        0x06..=0x08 => op.vwrites(vpr(vt)),
        // LFV, LWV
        0x09 | 0x0A => op.vreads(vpr(vt)).vwrites(vpr(vt)),
        // LTV touches the whole register bank of eight
        0x0B => OpInfo::new(OpInfo::LOAD | OpInfo::VNOP_GROUP)
            .reads(gpr(rs))
            .vreads(vpr_group(vt))
            .vwrites(vpr_group(vt)),
        _ => OpInfo::INVALID,
    }
}

fn decode_swc2(instruction: u32) -> OpInfo {
    let rs = instruction >> 21 & 31;
    let vt = instruction >> 16 & 31;

    let op = OpInfo::new(OpInfo::STORE).reads(gpr(rs));
    match instruction >> 11 & 31 {
        // SBV, SSV, SLV, SDV, SQV, SRV, SPV, SUV, SHV, SFV, SWV
        0x00..=0x0A => op.vreads(vpr(vt)),
        // STV reads the whole register bank of eight
        0x0B => op.vreads(vpr_group(vt)),
        _ => OpInfo::INVALID,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addiu_masks() {
        // ADDIU $t0, $zero, 5
        let op = decode(0x2408_0005);
        assert_eq!(op.r_use, 1);
        assert_eq!(op.r_def, 1 << 8);
        assert!(!op.load() && !op.store() && !op.branch() && !op.vector());
    }

    #[test]
    fn load_and_store_flags() {
        // LW $t1, 0($t0)
        let op = decode(0x8D09_0000);
        assert!(op.load());
        assert_eq!(op.r_use, 1 << 8);
        assert_eq!(op.r_def, 1 << 9);

        // SW $t1, 0($t0)
        let op = decode(0xAD09_0000);
        assert!(op.store());
        assert_eq!(op.r_use, (1 << 8) | (1 << 9));
        assert_eq!(op.r_def, 0);
    }

    #[test]
    fn branches_are_flagged() {
        // BEQ $t0, $t1, +4
        let op = decode(0x1109_0001);
        assert!(op.branch());
        assert_eq!(op.r_use, (1 << 8) | (1 << 9));

        // JAL writes the link register through the bypass path
        let op = decode(0x0C00_0000);
        assert!(op.branch() && op.bypass());
        assert_eq!(op.r_def, 1 << 31);
    }

    #[test]
    fn vector_compute_masks() {
        // VADD $v3, $v1, $v2 (e=0)
        let op = decode(0x4A02_08D0);
        assert!(op.vector());
        assert_eq!(op.v_use, (1 << 1) | (1 << 2));
        assert_eq!(op.v_def, 1 << 3);
        assert_eq!(op.vc_use, VCO);
        assert_eq!(op.vc_def, VCO);
    }

    #[test]
    fn dual_issue_needs_one_of_each_unit() {
        let addu = decode(0x0109_2021); // ADDU $a0, $t0, $t1
        let vadd = decode(0x4A02_08D0); // VADD $v3, $v1, $v2
        assert!(can_dual_issue(&addu, &vadd));
        assert!(can_dual_issue(&vadd, &addu));
        assert!(!can_dual_issue(&addu, &addu));
        assert!(!can_dual_issue(&vadd, &vadd));
    }

    #[test]
    fn dual_issue_blocks_vector_dependency() {
        // LQV $v3 then VADD reading $v3
        let lqv = decode(0xC803_2000);
        assert!(lqv.load());
        assert_eq!(lqv.v_def, 1 << 3);
        let vadd = decode(0x4A03_08D0); // VADD $v3, $v1, $v3
        assert!(!can_dual_issue(&lqv, &vadd));
    }

    #[test]
    fn vnop_quirk_blocks_mtc2_pair() {
        // MTC2 $t0 -> $v5
        let mtc2 = decode(0x4888_2800);
        assert!(mtc2.flags & OpInfo::VNOP_GROUP != 0);
        // VNOP whose vt field happens to name $v5
        let vnop = decode(0x4A05_0037);
        assert_eq!(vnop.vfake, 1 << 5);
        assert!(!can_dual_issue(&mtc2, &vnop));
        // A scalar op outside the group may pair with VNOP even if it were
        // to write the faked register: the quirk only fires for MTC2/LTV.
        let mut scalar = decode(0x0109_2021); // ADDU $a0, $t0, $t1
        scalar.v_def = 1 << 5;
        assert!(can_dual_issue(&scalar, &vnop));
    }
}

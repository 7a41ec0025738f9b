//! SSE4.1 fast paths for the vector compute ops.
//!
//! This module only compiles when the build statically enables `sse4.1`
//! (e.g. `-C target-cpu=x86-64-v2` or `-C target-feature=+sse4.1`); the
//! dispatchers in [`crate::vpu`] then route through it instead of the
//! scalar reference. Both paths are bit-identical — the tests at the bottom
//! diff full vector-unit state between them.
//!
//! Flag registers hold all-ones/all-zero lanes, so they are used directly
//! as blend masks here. Carry-in subtracts the flag lane (-1) instead of
//! adding one.

#![allow(unsafe_code)]
// On toolchains where the intrinsics are safe-in-feature-context, the
// blocks below become redundant but stay for older compilers.
#![allow(unused_unsafe)]

use core::arch::x86_64::{
    __m128i, _mm_add_epi16, _mm_adds_epi16, _mm_adds_epu16, _mm_and_si128, _mm_andnot_si128,
    _mm_blendv_epi8, _mm_cmpeq_epi16, _mm_cmpgt_epi16, _mm_cmplt_epi16, _mm_loadu_si128,
    _mm_max_epi16, _mm_min_epi16, _mm_mulhi_epi16, _mm_mulhi_epu16, _mm_mullo_epi16,
    _mm_or_si128, _mm_packs_epi32, _mm_set1_epi16, _mm_setzero_si128, _mm_slli_epi16,
    _mm_srai_epi16, _mm_srli_epi16, _mm_storeu_si128, _mm_sub_epi16, _mm_subs_epi16,
    _mm_subs_epu16, _mm_unpackhi_epi16, _mm_unpacklo_epi16, _mm_xor_si128,
};

use crate::vector::Vpr;
use crate::vpu::Vpu;

#[inline]
fn vec(v: Vpr) -> __m128i {
    let bytes = v.to_u128().to_le_bytes();
    unsafe { _mm_loadu_si128(bytes.as_ptr().cast()) }
}

#[inline]
fn reg(v: __m128i) -> Vpr {
    let mut bytes = [0_u8; 16];
    unsafe { _mm_storeu_si128(bytes.as_mut_ptr().cast(), v) };
    Vpr::from_u128(u128::from_le_bytes(bytes))
}

impl Vpu {
    pub(crate) fn vabs_simd(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let zero = _mm_setzero_si128();
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            let vs0 = _mm_cmpeq_epi16(vs, zero);
            let slt = _mm_srai_epi16::<15>(vs);
            let mut d = _mm_andnot_si128(vs0, vte);
            d = _mm_xor_si128(d, slt);
            self.accl = reg(_mm_sub_epi16(d, slt));
            self.r[vd] = reg(_mm_subs_epi16(d, slt));
        }
    }

    pub(crate) fn vadd_simd(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            let vcol = vec(self.vcol);
            let sum = _mm_add_epi16(vs, vte);
            self.accl = reg(_mm_sub_epi16(sum, vcol));
            let mut min = _mm_min_epi16(vs, vte);
            let max = _mm_max_epi16(vs, vte);
            min = _mm_subs_epi16(min, vcol);
            self.r[vd] = reg(_mm_adds_epi16(min, max));
            self.vcol = Vpr::ZERO;
            self.vcoh = Vpr::ZERO;
        }
    }

    pub(crate) fn vsub_simd(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            let vcol = vec(self.vcol);
            let udiff = _mm_sub_epi16(vte, vcol);
            let sdiff = _mm_subs_epi16(vte, vcol);
            self.accl = reg(_mm_sub_epi16(vs, udiff));
            let ov = _mm_cmpgt_epi16(sdiff, udiff);
            let d = _mm_subs_epi16(vs, sdiff);
            self.r[vd] = reg(_mm_adds_epi16(d, ov));
            self.vcol = Vpr::ZERO;
            self.vcoh = Vpr::ZERO;
        }
    }

    pub(crate) fn vaddc_simd(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let zero = _mm_setzero_si128();
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            let sum = _mm_adds_epu16(vs, vte);
            let accl = _mm_add_epi16(vs, vte);
            let mut vcol = _mm_cmpeq_epi16(sum, accl);
            vcol = _mm_cmpeq_epi16(vcol, zero);
            self.accl = reg(accl);
            self.vcol = reg(vcol);
            self.vcoh = Vpr::ZERO;
            self.r[vd] = self.accl;
        }
    }

    pub(crate) fn vsubc_simd(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let zero = _mm_setzero_si128();
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            let udiff = _mm_subs_epu16(vs, vte);
            let equal = _mm_cmpeq_epi16(vs, vte);
            let diff0 = _mm_cmpeq_epi16(udiff, zero);
            self.vcoh = reg(_mm_cmpeq_epi16(equal, zero));
            self.vcol = reg(_mm_andnot_si128(equal, diff0));
            self.accl = reg(_mm_sub_epi16(vs, vte));
            self.r[vd] = self.accl;
        }
    }

    pub(crate) fn vand_simd(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            self.accl = reg(_mm_and_si128(vs, vte));
            self.r[vd] = self.accl;
        }
    }

    pub(crate) fn vnand_simd(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let invert = _mm_set1_epi16(-1);
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            self.accl = reg(_mm_xor_si128(_mm_and_si128(vs, vte), invert));
            self.r[vd] = self.accl;
        }
    }

    pub(crate) fn vor_simd(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            self.accl = reg(_mm_or_si128(vs, vte));
            self.r[vd] = self.accl;
        }
    }

    pub(crate) fn vnor_simd(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let invert = _mm_set1_epi16(-1);
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            self.accl = reg(_mm_xor_si128(_mm_or_si128(vs, vte), invert));
            self.r[vd] = self.accl;
        }
    }

    pub(crate) fn vxor_simd(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            self.accl = reg(_mm_xor_si128(vs, vte));
            self.r[vd] = self.accl;
        }
    }

    pub(crate) fn vnxor_simd(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let invert = _mm_set1_epi16(-1);
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            self.accl = reg(_mm_xor_si128(_mm_xor_si128(vs, vte), invert));
            self.r[vd] = self.accl;
        }
    }

    pub(crate) fn vch_simd(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let zero = _mm_setzero_si128();
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            let mut vcol = _mm_xor_si128(vs, vte);
            vcol = _mm_cmplt_epi16(vcol, zero);
            let mut nvt = _mm_xor_si128(vte, vcol);
            nvt = _mm_sub_epi16(nvt, vcol);
            let diff = _mm_sub_epi16(vs, nvt);
            let diff0 = _mm_cmpeq_epi16(diff, zero);
            let vtn = _mm_cmplt_epi16(vte, zero);
            let mut dlez = _mm_cmpgt_epi16(diff, zero);
            let dgez = _mm_or_si128(dlez, diff0);
            dlez = _mm_cmpeq_epi16(zero, dlez);
            let vcch = _mm_blendv_epi8(dgez, vtn, vcol);
            let vccl = _mm_blendv_epi8(vtn, dlez, vcol);
            let mut vce = _mm_cmpeq_epi16(diff, vcol);
            vce = _mm_and_si128(vce, vcol);
            let mut vcoh = _mm_or_si128(diff0, vce);
            vcoh = _mm_cmpeq_epi16(vcoh, zero);
            let mask = _mm_blendv_epi8(vcch, vccl, vcol);
            let accl = _mm_blendv_epi8(vs, nvt, mask);
            self.vcol = reg(vcol);
            self.vcoh = reg(vcoh);
            self.vcch = reg(vcch);
            self.vccl = reg(vccl);
            self.vce = reg(vce);
            self.accl = reg(accl);
            self.r[vd] = self.accl;
        }
    }

    pub(crate) fn vcl_simd(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let zero = _mm_setzero_si128();
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            let vcol = vec(self.vcol);
            let vcoh = vec(self.vcoh);
            let vcch = vec(self.vcch);
            let vccl = vec(self.vccl);
            let vce = vec(self.vce);
            let mut nvt = _mm_xor_si128(vte, vcol);
            nvt = _mm_sub_epi16(nvt, vcol);
            let diff = _mm_sub_epi16(vs, nvt);
            let mut ncarry = _mm_adds_epu16(vs, vte);
            ncarry = _mm_cmpeq_epi16(diff, ncarry);
            let nvce = _mm_cmpeq_epi16(vce, zero);
            let diff0 = _mm_cmpeq_epi16(diff, zero);
            let mut lec1 = _mm_and_si128(diff0, ncarry);
            lec1 = _mm_and_si128(nvce, lec1);
            let mut lec2 = _mm_or_si128(diff0, ncarry);
            lec2 = _mm_and_si128(vce, lec2);
            let leeq = _mm_or_si128(lec1, lec2);
            let mut geeq = _mm_subs_epu16(vte, vs);
            geeq = _mm_cmpeq_epi16(geeq, zero);
            let mut le = _mm_andnot_si128(vcoh, vcol);
            le = _mm_blendv_epi8(vccl, leeq, le);
            let mut ge = _mm_or_si128(vcol, vcoh);
            ge = _mm_blendv_epi8(geeq, vcch, ge);
            let mask = _mm_blendv_epi8(ge, le, vcol);
            let accl = _mm_blendv_epi8(vs, nvt, mask);
            self.vcch = reg(ge);
            self.vccl = reg(le);
            self.vcoh = Vpr::ZERO;
            self.vcol = Vpr::ZERO;
            self.vce = Vpr::ZERO;
            self.accl = reg(accl);
            self.r[vd] = self.accl;
        }
    }

    pub(crate) fn vcr_simd(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            let mut sign = _mm_xor_si128(vs, vte);
            sign = _mm_srai_epi16::<15>(sign);
            let mut dlez = _mm_and_si128(vs, sign);
            dlez = _mm_add_epi16(dlez, vte);
            let vccl = _mm_srai_epi16::<15>(dlez);
            let mut dgez = _mm_or_si128(vs, sign);
            dgez = _mm_min_epi16(dgez, vte);
            let vcch = _mm_cmpeq_epi16(dgez, vte);
            let nvt = _mm_xor_si128(vte, sign);
            let mask = _mm_blendv_epi8(vcch, vccl, sign);
            let accl = _mm_blendv_epi8(vs, nvt, mask);
            self.vccl = reg(vccl);
            self.vcch = reg(vcch);
            self.accl = reg(accl);
            self.r[vd] = self.accl;
            self.vcol = Vpr::ZERO;
            self.vcoh = Vpr::ZERO;
            self.vce = Vpr::ZERO;
        }
    }

    pub(crate) fn veq_simd(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            let vcoh = vec(self.vcoh);
            let eq = _mm_cmpeq_epi16(vs, vte);
            let vccl = _mm_andnot_si128(vcoh, eq);
            self.accl = reg(_mm_blendv_epi8(vte, vs, vccl));
            self.vccl = reg(vccl);
            self.vcch = Vpr::ZERO;
            self.vcoh = Vpr::ZERO;
            self.vcol = Vpr::ZERO;
            self.r[vd] = self.accl;
        }
    }

    pub(crate) fn vne_simd(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let zero = _mm_setzero_si128();
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            let vcoh = vec(self.vcoh);
            let eq = _mm_cmpeq_epi16(vs, vte);
            let ne = _mm_cmpeq_epi16(eq, zero);
            let mut vccl = _mm_and_si128(vcoh, eq);
            vccl = _mm_or_si128(vccl, ne);
            self.accl = reg(_mm_blendv_epi8(vte, vs, vccl));
            self.vccl = reg(vccl);
            self.vcch = Vpr::ZERO;
            self.vcoh = Vpr::ZERO;
            self.vcol = Vpr::ZERO;
            self.r[vd] = self.accl;
        }
    }

    pub(crate) fn vlt_simd(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            let vcoh = vec(self.vcoh);
            let vcol = vec(self.vcol);
            let mut eq = _mm_cmpeq_epi16(vs, vte);
            let lt = _mm_cmplt_epi16(vs, vte);
            eq = _mm_and_si128(vcoh, eq);
            eq = _mm_and_si128(vcol, eq);
            let vccl = _mm_or_si128(lt, eq);
            self.accl = reg(_mm_blendv_epi8(vte, vs, vccl));
            self.vccl = reg(vccl);
            self.vcch = Vpr::ZERO;
            self.vcoh = Vpr::ZERO;
            self.vcol = Vpr::ZERO;
            self.r[vd] = self.accl;
        }
    }

    pub(crate) fn vge_simd(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            let vcoh = vec(self.vcoh);
            let vcol = vec(self.vcol);
            let mut eq = _mm_cmpeq_epi16(vs, vte);
            let gt = _mm_cmpgt_epi16(vs, vte);
            let es = _mm_and_si128(vcoh, vcol);
            eq = _mm_andnot_si128(es, eq);
            let vccl = _mm_or_si128(gt, eq);
            self.accl = reg(_mm_blendv_epi8(vte, vs, vccl));
            self.vccl = reg(vccl);
            self.vcch = Vpr::ZERO;
            self.vcoh = Vpr::ZERO;
            self.vcol = Vpr::ZERO;
            self.r[vd] = self.accl;
        }
    }

    pub(crate) fn vmrg_simd(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            let vccl = vec(self.vccl);
            self.accl = reg(_mm_blendv_epi8(vte, vs, vccl));
            self.vcoh = Vpr::ZERO;
            self.vcol = Vpr::ZERO;
            self.r[vd] = self.accl;
        }
    }

    pub(crate) fn vmudh_simd(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            let accm = _mm_mullo_epi16(vs, vte);
            let acch = _mm_mulhi_epi16(vs, vte);
            self.accl = Vpr::ZERO;
            self.accm = reg(accm);
            self.acch = reg(acch);
            let lo = _mm_unpacklo_epi16(accm, acch);
            let hi = _mm_unpackhi_epi16(accm, acch);
            self.r[vd] = reg(_mm_packs_epi32(lo, hi));
        }
    }

    pub(crate) fn vmudl_simd(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            self.accl = reg(_mm_mulhi_epu16(vs, vte));
            self.accm = Vpr::ZERO;
            self.acch = Vpr::ZERO;
            self.r[vd] = self.accl;
        }
    }

    pub(crate) fn vmudm_simd(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            let accl = _mm_mullo_epi16(vs, vte);
            let mut accm = _mm_mulhi_epu16(vs, vte);
            let sign = _mm_srai_epi16::<15>(vs);
            let vta = _mm_and_si128(vte, sign);
            accm = _mm_sub_epi16(accm, vta);
            let acch = _mm_srai_epi16::<15>(accm);
            self.accl = reg(accl);
            self.accm = reg(accm);
            self.acch = reg(acch);
            self.r[vd] = self.accm;
        }
    }

    pub(crate) fn vmudn_simd(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            let accl = _mm_mullo_epi16(vs, vte);
            let mut accm = _mm_mulhi_epu16(vs, vte);
            let sign = _mm_srai_epi16::<15>(vte);
            let vsa = _mm_and_si128(vs, sign);
            accm = _mm_sub_epi16(accm, vsa);
            let acch = _mm_srai_epi16::<15>(accm);
            self.accl = reg(accl);
            self.accm = reg(accm);
            self.acch = reg(acch);
            self.r[vd] = self.accl;
        }
    }

    pub(crate) fn vmadh_simd(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let zero = _mm_setzero_si128();
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            let mut accm = vec(self.accm);
            let mut acch = vec(self.acch);
            let lo = _mm_mullo_epi16(vs, vte);
            let mut hi = _mm_mulhi_epi16(vs, vte);
            let mut omask = _mm_adds_epu16(accm, lo);
            accm = _mm_add_epi16(accm, lo);
            omask = _mm_cmpeq_epi16(accm, omask);
            omask = _mm_cmpeq_epi16(omask, zero);
            hi = _mm_sub_epi16(hi, omask);
            acch = _mm_add_epi16(acch, hi);
            let lo2 = _mm_unpacklo_epi16(accm, acch);
            let hi2 = _mm_unpackhi_epi16(accm, acch);
            self.accm = reg(accm);
            self.acch = reg(acch);
            self.r[vd] = reg(_mm_packs_epi32(lo2, hi2));
        }
    }

    pub(crate) fn vmadl_simd(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let zero = _mm_setzero_si128();
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            let mut accl = vec(self.accl);
            let mut accm = vec(self.accm);
            let mut acch = vec(self.acch);
            let mut hi = _mm_mulhi_epu16(vs, vte);
            let mut omask = _mm_adds_epu16(accl, hi);
            accl = _mm_add_epi16(accl, hi);
            omask = _mm_cmpeq_epi16(accl, omask);
            omask = _mm_cmpeq_epi16(omask, zero);
            hi = _mm_sub_epi16(zero, omask);
            omask = _mm_adds_epu16(accm, hi);
            accm = _mm_add_epi16(accm, hi);
            omask = _mm_cmpeq_epi16(accm, omask);
            omask = _mm_cmpeq_epi16(omask, zero);
            acch = _mm_sub_epi16(acch, omask);
            let nhi = _mm_srai_epi16::<15>(acch);
            let nmd = _mm_srai_epi16::<15>(accm);
            let shi = _mm_cmpeq_epi16(nhi, acch);
            let smd = _mm_cmpeq_epi16(nhi, nmd);
            let cmask = _mm_and_si128(smd, shi);
            let cval = _mm_cmpeq_epi16(nhi, zero);
            self.accl = reg(accl);
            self.accm = reg(accm);
            self.acch = reg(acch);
            self.r[vd] = reg(_mm_blendv_epi8(cval, accl, cmask));
        }
    }

    pub(crate) fn vmadm_simd(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let zero = _mm_setzero_si128();
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            let mut accl = vec(self.accl);
            let mut accm = vec(self.accm);
            let mut acch = vec(self.acch);
            let lo = _mm_mullo_epi16(vs, vte);
            let mut hi = _mm_mulhi_epu16(vs, vte);
            let sign = _mm_srai_epi16::<15>(vs);
            let vta = _mm_and_si128(vte, sign);
            hi = _mm_sub_epi16(hi, vta);
            let mut omask = _mm_adds_epu16(accl, lo);
            accl = _mm_add_epi16(accl, lo);
            omask = _mm_cmpeq_epi16(accl, omask);
            omask = _mm_cmpeq_epi16(omask, zero);
            hi = _mm_sub_epi16(hi, omask);
            omask = _mm_adds_epu16(accm, hi);
            accm = _mm_add_epi16(accm, hi);
            omask = _mm_cmpeq_epi16(accm, omask);
            omask = _mm_cmpeq_epi16(omask, zero);
            hi = _mm_srai_epi16::<15>(hi);
            acch = _mm_add_epi16(acch, hi);
            acch = _mm_sub_epi16(acch, omask);
            let lo2 = _mm_unpacklo_epi16(accm, acch);
            let hi2 = _mm_unpackhi_epi16(accm, acch);
            self.accl = reg(accl);
            self.accm = reg(accm);
            self.acch = reg(acch);
            self.r[vd] = reg(_mm_packs_epi32(lo2, hi2));
        }
    }

    pub(crate) fn vmadn_simd(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let zero = _mm_setzero_si128();
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            let mut accl = vec(self.accl);
            let mut accm = vec(self.accm);
            let mut acch = vec(self.acch);
            let lo = _mm_mullo_epi16(vs, vte);
            let mut hi = _mm_mulhi_epu16(vs, vte);
            let sign = _mm_srai_epi16::<15>(vte);
            let vsa = _mm_and_si128(vs, sign);
            hi = _mm_sub_epi16(hi, vsa);
            let mut omask = _mm_adds_epu16(accl, lo);
            accl = _mm_add_epi16(accl, lo);
            omask = _mm_cmpeq_epi16(accl, omask);
            omask = _mm_cmpeq_epi16(omask, zero);
            hi = _mm_sub_epi16(hi, omask);
            omask = _mm_adds_epu16(accm, hi);
            accm = _mm_add_epi16(accm, hi);
            omask = _mm_cmpeq_epi16(accm, omask);
            omask = _mm_cmpeq_epi16(omask, zero);
            hi = _mm_srai_epi16::<15>(hi);
            acch = _mm_add_epi16(acch, hi);
            acch = _mm_sub_epi16(acch, omask);
            let nhi = _mm_srai_epi16::<15>(acch);
            let nmd = _mm_srai_epi16::<15>(accm);
            let shi = _mm_cmpeq_epi16(nhi, acch);
            let smd = _mm_cmpeq_epi16(nhi, nmd);
            let cmask = _mm_and_si128(smd, shi);
            let cval = _mm_cmpeq_epi16(nhi, zero);
            self.accl = reg(accl);
            self.accm = reg(accm);
            self.acch = reg(acch);
            self.r[vd] = reg(_mm_blendv_epi8(cval, accl, cmask));
        }
    }

    pub(crate) fn vmulf_simd(&mut self, unsigned: bool, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let zero = _mm_setzero_si128();
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            let mut lo = _mm_mullo_epi16(vs, vte);
            let mut round = _mm_cmpeq_epi16(zero, zero);
            let mut sign1 = _mm_srli_epi16::<15>(lo);
            lo = _mm_add_epi16(lo, lo);
            round = _mm_slli_epi16::<15>(round);
            let mut hi = _mm_mulhi_epi16(vs, vte);
            let sign2 = _mm_srli_epi16::<15>(lo);
            let accl = _mm_add_epi16(round, lo);
            sign1 = _mm_add_epi16(sign1, sign2);
            hi = _mm_slli_epi16::<1>(hi);
            let neq = _mm_cmpeq_epi16(vs, vte);
            let accm = _mm_add_epi16(hi, sign1);
            let neg = _mm_srai_epi16::<15>(accm);
            let acch;
            let d;
            if unsigned {
                acch = _mm_andnot_si128(neq, neg);
                let hi2 = _mm_or_si128(accm, neg);
                d = _mm_andnot_si128(acch, hi2);
            } else {
                let eq = _mm_and_si128(neq, neg);
                acch = _mm_andnot_si128(neq, neg);
                d = _mm_add_epi16(accm, eq);
            }
            self.accl = reg(accl);
            self.accm = reg(accm);
            self.acch = reg(acch);
            self.r[vd] = reg(d);
        }
    }

    pub(crate) fn vmacf_simd(&mut self, unsigned: bool, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let zero = _mm_setzero_si128();
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            let mut accl = vec(self.accl);
            let mut accm = vec(self.accm);
            let mut acch = vec(self.acch);
            let mut lo = _mm_mullo_epi16(vs, vte);
            let mut hi = _mm_mulhi_epi16(vs, vte);
            let mut md = _mm_slli_epi16::<1>(hi);
            let mut carry = _mm_srli_epi16::<15>(lo);
            hi = _mm_srai_epi16::<15>(hi);
            md = _mm_or_si128(md, carry);
            lo = _mm_slli_epi16::<1>(lo);
            let mut omask = _mm_adds_epu16(accl, lo);
            accl = _mm_add_epi16(accl, lo);
            omask = _mm_cmpeq_epi16(accl, omask);
            omask = _mm_cmpeq_epi16(omask, zero);
            md = _mm_sub_epi16(md, omask);
            carry = _mm_cmpeq_epi16(md, zero);
            carry = _mm_and_si128(carry, omask);
            hi = _mm_sub_epi16(hi, carry);
            omask = _mm_adds_epu16(accm, md);
            accm = _mm_add_epi16(accm, md);
            omask = _mm_cmpeq_epi16(accm, omask);
            omask = _mm_cmpeq_epi16(omask, zero);
            acch = _mm_add_epi16(acch, hi);
            acch = _mm_sub_epi16(acch, omask);
            let d;
            if unsigned {
                let mmask = _mm_srai_epi16::<15>(accm);
                let hmask = _mm_srai_epi16::<15>(acch);
                let mut md2 = _mm_or_si128(mmask, accm);
                let omask2 = _mm_cmpgt_epi16(acch, zero);
                md2 = _mm_andnot_si128(hmask, md2);
                d = _mm_or_si128(omask2, md2);
            } else {
                let lo2 = _mm_unpacklo_epi16(accm, acch);
                let hi2 = _mm_unpackhi_epi16(accm, acch);
                d = _mm_packs_epi32(lo2, hi2);
            }
            self.accl = reg(accl);
            self.accm = reg(accm);
            self.acch = reg(acch);
            self.r[vd] = reg(d);
        }
    }

    pub(crate) fn vzero_simd(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        unsafe {
            let vs = vec(self.r[vs]);
            let vte = vec(self.r[vt].select(e));
            self.accl = reg(_mm_add_epi16(vs, vte));
            self.r[vd] = Vpr::ZERO;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Vpu {
        let mut vpu = Vpu::new();
        vpu.r[1] = Vpr::from_lanes([0x0001, 0x7FFF, 0x8000, 0xFFFF, 0x4000, 0xC000, 0x1234, 0x0000]);
        vpu.r[2] = Vpr::from_lanes([0xFFFF, 0x7FFF, 0x8000, 0x0001, 0xBFFF, 0x4001, 0xEDCC, 0x0000]);
        vpu.r[3] = Vpr::from_lanes([0x8000, 0x0001, 0xFFFE, 0x5555, 0xAAAA, 0x0100, 0x00FF, 0x7000]);
        vpu.vcol = Vpr::from_lanes([0xFFFF, 0, 0xFFFF, 0, 0xFFFF, 0, 0, 0xFFFF]);
        vpu.vcoh = Vpr::from_lanes([0, 0xFFFF, 0xFFFF, 0, 0, 0xFFFF, 0, 0]);
        vpu.vccl = Vpr::from_lanes([0xFFFF, 0xFFFF, 0, 0, 0xFFFF, 0, 0xFFFF, 0]);
        vpu.vcch = Vpr::from_lanes([0, 0, 0xFFFF, 0xFFFF, 0, 0, 0xFFFF, 0]);
        vpu.vce = Vpr::from_lanes([0xFFFF, 0, 0, 0xFFFF, 0, 0, 0, 0]);
        for n in 0..8 {
            vpu.accumulator_set(n, 0x7FFF_8000_4321_u64.wrapping_mul(n as u64 + 1) & 0xFFFF_FFFF_FFFF);
        }
        vpu
    }

    fn assert_state_eq(a: &Vpu, b: &Vpu, op: &str) {
        for n in 0..32 {
            assert_eq!(a.r[n], b.r[n], "{op}: register {n}");
        }
        assert_eq!(a.acch, b.acch, "{op}: acch");
        assert_eq!(a.accm, b.accm, "{op}: accm");
        assert_eq!(a.accl, b.accl, "{op}: accl");
        assert_eq!(a.vcoh, b.vcoh, "{op}: vcoh");
        assert_eq!(a.vcol, b.vcol, "{op}: vcol");
        assert_eq!(a.vcch, b.vcch, "{op}: vcch");
        assert_eq!(a.vccl, b.vccl, "{op}: vccl");
        assert_eq!(a.vce, b.vce, "{op}: vce");
    }

    macro_rules! parity {
        ($($test:ident: $sisd:ident / $simd:ident;)*) => {
            $(
                #[test]
                fn $test() {
                    for e in 0..16 {
                        let mut a = seeded();
                        let mut b = seeded();
                        a.$sisd(4, 1, 2, e);
                        b.$simd(4, 1, 2, e);
                        assert_state_eq(&a, &b, stringify!($sisd));

                        let mut a = seeded();
                        let mut b = seeded();
                        a.$sisd(5, 3, 3, e);
                        b.$simd(5, 3, 3, e);
                        assert_state_eq(&a, &b, stringify!($sisd));
                    }
                }
            )*
        };
    }

    parity! {
        parity_vabs: vabs_sisd / vabs_simd;
        parity_vadd: vadd_sisd / vadd_simd;
        parity_vsub: vsub_sisd / vsub_simd;
        parity_vaddc: vaddc_sisd / vaddc_simd;
        parity_vsubc: vsubc_sisd / vsubc_simd;
        parity_vand: vand_sisd / vand_simd;
        parity_vnand: vnand_sisd / vnand_simd;
        parity_vor: vor_sisd / vor_simd;
        parity_vnor: vnor_sisd / vnor_simd;
        parity_vxor: vxor_sisd / vxor_simd;
        parity_vnxor: vnxor_sisd / vnxor_simd;
        parity_vch: vch_sisd / vch_simd;
        parity_vcl: vcl_sisd / vcl_simd;
        parity_vcr: vcr_sisd / vcr_simd;
        parity_veq: veq_sisd / veq_simd;
        parity_vne: vne_sisd / vne_simd;
        parity_vlt: vlt_sisd / vlt_simd;
        parity_vge: vge_sisd / vge_simd;
        parity_vmrg: vmrg_sisd / vmrg_simd;
        parity_vmudh: vmudh_sisd / vmudh_simd;
        parity_vmudl: vmudl_sisd / vmudl_simd;
        parity_vmudm: vmudm_sisd / vmudm_simd;
        parity_vmudn: vmudn_sisd / vmudn_simd;
        parity_vmadh: vmadh_sisd / vmadh_simd;
        parity_vmadl: vmadl_sisd / vmadl_simd;
        parity_vmadm: vmadm_sisd / vmadm_simd;
        parity_vmadn: vmadn_sisd / vmadn_simd;
        parity_vzero: vzero_sisd / vzero_simd;
    }

    #[test]
    fn parity_vmulf_vmacf() {
        for unsigned in [false, true] {
            for e in 0..16 {
                let mut a = seeded();
                let mut b = seeded();
                a.vmulf_sisd(unsigned, 4, 1, 2, e);
                b.vmulf_simd(unsigned, 4, 1, 2, e);
                assert_state_eq(&a, &b, "vmulf");

                let mut a = seeded();
                let mut b = seeded();
                a.vmacf_sisd(unsigned, 4, 1, 2, e);
                b.vmacf_simd(unsigned, 4, 1, 2, e);
                assert_state_eq(&a, &b, "vmacf");
            }
        }
    }
}

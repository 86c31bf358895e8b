//! Complex dot product: `sum(input[i] * taps[i])`.
//!
//! | name | requires | block | alignment |
//! |---|---|---|---|
//! | `generic` | | 2 | none |
//! | `a_sse3` / `u_sse3` | sse3 | 2 | 16 / none |
//! | `a_avx` / `u_avx` | avx | 4 | 32 / none |
//! | `a_avx_fma` / `u_avx_fma` | avx, fma | 4 | 32 / none |
//! | `neon` | neon | 4 | none |
//! | `neon_opttests` | neon | 4 | none |
//! | `neon_optfma` | neon | 4 | none |
//! | `neon_optfmaunroll` | neon | 8 | none |

use super::scalar::dot_tail;
use super::{address_bits, checked_implementation, random_complex, KernelFn};
use crate::dispatch::{Alignment, Dispatcher, ImplInfo, Implementation, Kernel};
use crate::error::{Result, VkernError};
use crate::memory::AlignedVec;
#[allow(unused_imports)]
use crate::system::ArchTag;
use num_complex::Complex32;

/// Entry point signature shared by every implementation.
///
/// Both slices have the same length.
pub type DotProdFn = unsafe fn(&[Complex32], &[Complex32]) -> Complex32;

/// Kernel name
pub const NAME: &str = "dot_prod_32fc";

unsafe fn dot_prod_generic(input: &[Complex32], taps: &[Complex32]) -> Complex32 {
    let n = input.len().min(taps.len());
    let mut sum0 = Complex32::new(0.0, 0.0);
    let mut sum1 = Complex32::new(0.0, 0.0);
    for (x, y) in input[..n].chunks_exact(2).zip(taps[..n].chunks_exact(2)) {
        sum0 += x[0] * y[0];
        sum1 += x[1] * y[1];
    }
    let res = sum0 + sum1;
    if n & 1 == 1 {
        dot_tail(input, taps, n - 1, res)
    } else {
        res
    }
}

#[cfg(all(target_arch = "x86_64", not(vkern_generic_only)))]
mod x86 {
    use super::dot_tail;
    use num_complex::Complex32;
    use std::arch::x86_64::*;

    #[target_feature(enable = "sse3")]
    pub(super) unsafe fn dot_prod_sse3<const ALIGNED: bool>(
        input: &[Complex32],
        taps: &[Complex32],
    ) -> Complex32 {
        let n = input.len().min(taps.len());
        let ip = input.as_ptr() as *const f32;
        let tp = taps.as_ptr() as *const f32;
        let mut lanes = [0f32; 4];

        unsafe {
            let mut acc = _mm_setzero_ps();
            for i in 0..n / 2 {
                let (x, y) = if ALIGNED {
                    (_mm_load_ps(ip.add(4 * i)), _mm_load_ps(tp.add(4 * i)))
                } else {
                    (_mm_loadu_ps(ip.add(4 * i)), _mm_loadu_ps(tp.add(4 * i)))
                };
                let yl = _mm_moveldup_ps(y);
                let yh = _mm_movehdup_ps(y);
                let tmp1 = _mm_mul_ps(x, yl);
                let xs = _mm_shuffle_ps::<0xB1>(x, x);
                let tmp2 = _mm_mul_ps(xs, yh);
                acc = _mm_add_ps(acc, _mm_addsub_ps(tmp1, tmp2));
            }
            _mm_storeu_ps(lanes.as_mut_ptr(), acc);
        }

        let res = Complex32::new(lanes[0] + lanes[2], lanes[1] + lanes[3]);
        if n & 1 == 1 {
            dot_tail(input, taps, n - 1, res)
        } else {
            res
        }
    }

    #[target_feature(enable = "avx")]
    pub(super) unsafe fn dot_prod_avx<const ALIGNED: bool>(
        input: &[Complex32],
        taps: &[Complex32],
    ) -> Complex32 {
        let n = input.len().min(taps.len());
        let ip = input.as_ptr() as *const f32;
        let tp = taps.as_ptr() as *const f32;
        let mut lanes = [0f32; 8];

        unsafe {
            let mut acc = _mm256_setzero_ps();
            for i in 0..n / 4 {
                let (x, y) = if ALIGNED {
                    (_mm256_load_ps(ip.add(8 * i)), _mm256_load_ps(tp.add(8 * i)))
                } else {
                    (_mm256_loadu_ps(ip.add(8 * i)), _mm256_loadu_ps(tp.add(8 * i)))
                };
                let yl = _mm256_moveldup_ps(y);
                let yh = _mm256_movehdup_ps(y);
                let tmp1 = _mm256_mul_ps(x, yl);
                let xs = _mm256_shuffle_ps::<0xB1>(x, x);
                let tmp2 = _mm256_mul_ps(xs, yh);
                acc = _mm256_add_ps(acc, _mm256_addsub_ps(tmp1, tmp2));
            }
            _mm256_storeu_ps(lanes.as_mut_ptr(), acc);
        }

        let res = Complex32::new(
            lanes[0] + lanes[2] + lanes[4] + lanes[6],
            lanes[1] + lanes[3] + lanes[5] + lanes[7],
        );
        dot_tail(input, taps, n - n % 4, res)
    }

    #[target_feature(enable = "avx,fma")]
    pub(super) unsafe fn dot_prod_avx_fma<const ALIGNED: bool>(
        input: &[Complex32],
        taps: &[Complex32],
    ) -> Complex32 {
        let n = input.len().min(taps.len());
        let ip = input.as_ptr() as *const f32;
        let tp = taps.as_ptr() as *const f32;
        let mut lanes = [0f32; 8];

        unsafe {
            let mut acc = _mm256_setzero_ps();
            for i in 0..n / 4 {
                let (x, y) = if ALIGNED {
                    (_mm256_load_ps(ip.add(8 * i)), _mm256_load_ps(tp.add(8 * i)))
                } else {
                    (_mm256_loadu_ps(ip.add(8 * i)), _mm256_loadu_ps(tp.add(8 * i)))
                };
                let yl = _mm256_moveldup_ps(y);
                let yh = _mm256_movehdup_ps(y);
                let xs = _mm256_shuffle_ps::<0xB1>(x, x);
                let tmp2 = _mm256_mul_ps(xs, yh);
                // even lanes x*yl - tmp2, odd lanes x*yl + tmp2
                acc = _mm256_add_ps(acc, _mm256_fmaddsub_ps(x, yl, tmp2));
            }
            _mm256_storeu_ps(lanes.as_mut_ptr(), acc);
        }

        let res = Complex32::new(
            lanes[0] + lanes[2] + lanes[4] + lanes[6],
            lanes[1] + lanes[3] + lanes[5] + lanes[7],
        );
        dot_tail(input, taps, n - n % 4, res)
    }
}

#[cfg(all(target_arch = "aarch64", not(vkern_generic_only)))]
mod arm {
    use super::dot_tail;
    use num_complex::Complex32;
    use std::arch::aarch64::*;

    #[target_feature(enable = "neon")]
    pub(super) unsafe fn dot_prod_neon(input: &[Complex32], taps: &[Complex32]) -> Complex32 {
        let n = input.len().min(taps.len());
        let ip = input.as_ptr() as *const f32;
        let tp = taps.as_ptr() as *const f32;
        let mut re = [0f32; 4];
        let mut im = [0f32; 4];

        unsafe {
            let mut acc_re = vdupq_n_f32(0.0);
            let mut acc_im = vdupq_n_f32(0.0);
            for i in 0..n / 4 {
                let a = vld2q_f32(tp.add(8 * i));
                let b = vld2q_f32(ip.add(8 * i));
                let prod_re = vmlsq_f32(vmulq_f32(a.0, b.0), a.1, b.1);
                let prod_im = vmlaq_f32(vmulq_f32(a.0, b.1), a.1, b.0);
                acc_re = vaddq_f32(acc_re, prod_re);
                acc_im = vaddq_f32(acc_im, prod_im);
            }
            vst1q_f32(re.as_mut_ptr(), acc_re);
            vst1q_f32(im.as_mut_ptr(), acc_im);
        }

        let res = Complex32::new(re[0] + re[1] + re[2] + re[3], im[0] + im[1] + im[2] + im[3]);
        dot_tail(input, taps, n - n % 4, res)
    }

    #[target_feature(enable = "neon")]
    pub(super) unsafe fn dot_prod_neon_opttests(
        input: &[Complex32],
        taps: &[Complex32],
    ) -> Complex32 {
        let n = input.len().min(taps.len());
        let ip = input.as_ptr() as *const f32;
        let tp = taps.as_ptr() as *const f32;
        let mut re = [0f32; 4];
        let mut im = [0f32; 4];

        unsafe {
            let mut acc_re = vdupq_n_f32(0.0);
            let mut acc_im = vdupq_n_f32(0.0);
            for i in 0..n / 4 {
                let a = vld2q_f32(tp.add(8 * i));
                let b = vld2q_f32(ip.add(8 * i));
                // both products seeded from b.re, then the b.im terms folded in
                let prod_re = vmlsq_f32(vmulq_f32(a.0, b.0), a.1, b.1);
                let prod_im = vmlaq_f32(vmulq_f32(a.1, b.0), a.0, b.1);
                acc_re = vaddq_f32(acc_re, prod_re);
                acc_im = vaddq_f32(acc_im, prod_im);
            }
            vst1q_f32(re.as_mut_ptr(), acc_re);
            vst1q_f32(im.as_mut_ptr(), acc_im);
        }

        let res = Complex32::new(re[0] + re[1] + re[2] + re[3], im[0] + im[1] + im[2] + im[3]);
        dot_tail(input, taps, n - n % 4, res)
    }

    #[target_feature(enable = "neon")]
    pub(super) unsafe fn dot_prod_neon_optfma(input: &[Complex32], taps: &[Complex32]) -> Complex32 {
        let n = input.len().min(taps.len());
        let ip = input.as_ptr() as *const f32;
        let tp = taps.as_ptr() as *const f32;
        let mut re = [0f32; 4];
        let mut im = [0f32; 4];

        unsafe {
            let mut acc1_re = vdupq_n_f32(0.0);
            let mut acc1_im = vdupq_n_f32(0.0);
            let mut acc2_re = vdupq_n_f32(0.0);
            let mut acc2_im = vdupq_n_f32(0.0);
            for i in 0..n / 4 {
                let a = vld2q_f32(tp.add(8 * i));
                let b = vld2q_f32(ip.add(8 * i));
                acc1_re = vfmaq_f32(acc1_re, a.0, b.0);
                acc1_im = vfmaq_f32(acc1_im, a.0, b.1);
                acc2_re = vfmsq_f32(acc2_re, a.1, b.1);
                acc2_im = vfmaq_f32(acc2_im, a.1, b.0);
            }
            vst1q_f32(re.as_mut_ptr(), vaddq_f32(acc1_re, acc2_re));
            vst1q_f32(im.as_mut_ptr(), vaddq_f32(acc1_im, acc2_im));
        }

        let res = Complex32::new(re[0] + re[1] + re[2] + re[3], im[0] + im[1] + im[2] + im[3]);
        dot_tail(input, taps, n - n % 4, res)
    }

    /// Eight points per iteration. `vld4q` splits even and odd points into
    /// separate register pairs.
    #[target_feature(enable = "neon")]
    pub(super) unsafe fn dot_prod_neon_optfmaunroll(
        input: &[Complex32],
        taps: &[Complex32],
    ) -> Complex32 {
        let n = input.len().min(taps.len());
        let ip = input.as_ptr() as *const f32;
        let tp = taps.as_ptr() as *const f32;
        let mut re = [0f32; 4];
        let mut im = [0f32; 4];

        unsafe {
            let mut acc1_re = vdupq_n_f32(0.0);
            let mut acc1_im = vdupq_n_f32(0.0);
            let mut acc2_re = vdupq_n_f32(0.0);
            let mut acc2_im = vdupq_n_f32(0.0);
            for i in 0..n / 8 {
                // .0/.1 even points, .2/.3 odd points
                let a = vld4q_f32(tp.add(16 * i));
                let b = vld4q_f32(ip.add(16 * i));
                acc1_re = vfmaq_f32(acc1_re, a.0, b.0);
                acc1_im = vfmaq_f32(acc1_im, a.0, b.1);
                acc1_re = vfmaq_f32(acc1_re, a.2, b.2);
                acc1_im = vfmaq_f32(acc1_im, a.2, b.3);
                acc2_re = vfmsq_f32(acc2_re, a.1, b.1);
                acc2_im = vfmaq_f32(acc2_im, a.1, b.0);
                acc2_re = vfmsq_f32(acc2_re, a.3, b.3);
                acc2_im = vfmaq_f32(acc2_im, a.3, b.2);
            }
            vst1q_f32(re.as_mut_ptr(), vaddq_f32(acc1_re, acc2_re));
            vst1q_f32(im.as_mut_ptr(), vaddq_f32(acc1_im, acc2_im));
        }

        let res = Complex32::new(re[0] + re[1] + re[2] + re[3], im[0] + im[1] + im[2] + im[3]);
        dot_tail(input, taps, n - n % 8, res)
    }
}

const GENERIC: Implementation<DotProdFn> = Implementation::new(
    ImplInfo::new("generic", &[], Alignment::None, 0),
    dot_prod_generic as DotProdFn,
);

#[cfg(all(target_arch = "x86_64", not(vkern_generic_only)))]
const IMPLEMENTATIONS: &[Implementation<DotProdFn>] = &[
    GENERIC,
    Implementation::new(
        ImplInfo::new("a_sse3", &[ArchTag::SSE3], Alignment::Aligned(16), 10),
        x86::dot_prod_sse3::<true> as DotProdFn,
    ),
    Implementation::new(
        ImplInfo::new("u_sse3", &[ArchTag::SSE3], Alignment::None, 10),
        x86::dot_prod_sse3::<false> as DotProdFn,
    ),
    Implementation::new(
        ImplInfo::new("a_avx", &[ArchTag::AVX], Alignment::Aligned(32), 20),
        x86::dot_prod_avx::<true> as DotProdFn,
    ),
    Implementation::new(
        ImplInfo::new("u_avx", &[ArchTag::AVX], Alignment::None, 20),
        x86::dot_prod_avx::<false> as DotProdFn,
    ),
    Implementation::new(
        ImplInfo::new("a_avx_fma", &[ArchTag::AVX, ArchTag::FMA], Alignment::Aligned(32), 30),
        x86::dot_prod_avx_fma::<true> as DotProdFn,
    ),
    Implementation::new(
        ImplInfo::new("u_avx_fma", &[ArchTag::AVX, ArchTag::FMA], Alignment::None, 30),
        x86::dot_prod_avx_fma::<false> as DotProdFn,
    ),
];

#[cfg(all(target_arch = "aarch64", not(vkern_generic_only)))]
const IMPLEMENTATIONS: &[Implementation<DotProdFn>] = &[
    GENERIC,
    Implementation::new(
        ImplInfo::new("neon", &[ArchTag::NEON], Alignment::None, 10),
        arm::dot_prod_neon as DotProdFn,
    ),
    Implementation::new(
        ImplInfo::new("neon_opttests", &[ArchTag::NEON], Alignment::None, 12),
        arm::dot_prod_neon_opttests as DotProdFn,
    ),
    Implementation::new(
        ImplInfo::new("neon_optfma", &[ArchTag::NEON], Alignment::None, 20),
        arm::dot_prod_neon_optfma as DotProdFn,
    ),
    Implementation::new(
        ImplInfo::new("neon_optfmaunroll", &[ArchTag::NEON], Alignment::None, 25),
        arm::dot_prod_neon_optfmaunroll as DotProdFn,
    ),
];

#[cfg(not(any(
    all(target_arch = "x86_64", not(vkern_generic_only)),
    all(target_arch = "aarch64", not(vkern_generic_only))
)))]
const IMPLEMENTATIONS: &[Implementation<DotProdFn>] = &[GENERIC];

/// Implementation table
pub static KERNEL: Kernel<DotProdFn> = Kernel::new(NAME, IMPLEMENTATIONS);

/// Process-wide dispatcher
pub static DISPATCHER: Dispatcher<DotProdFn> = Dispatcher::new(&KERNEL);

/// Complex dot product of `input` and `taps`.
///
/// Both slices must have the same length; only the common prefix is read
/// if they differ (debug builds assert).
pub fn dot_prod_32fc(input: &[Complex32], taps: &[Complex32]) -> Complex32 {
    debug_assert_eq!(input.len(), taps.len(), "input and taps lengths differ");
    let n = input.len().min(taps.len());
    let (input, taps) = (&input[..n], &taps[..n]);
    let func = DISPATCHER
        .binding()
        .route(input.as_ptr() as usize | taps.as_ptr() as usize);
    // bound implementations only use host-supported tags, and route() falls
    // back to the unaligned entry when either pointer misses the boundary
    unsafe { func(input, taps) }
}

/// Run a named implementation after checking it can run on these buffers.
pub fn dot_prod_32fc_manual(
    input: &[Complex32],
    taps: &[Complex32],
    implementation: &str,
) -> Result<Complex32> {
    if input.len() != taps.len() {
        return Err(VkernError::invalid_data(format!(
            "input has {} points but taps has {}",
            input.len(),
            taps.len()
        )));
    }
    let func = checked_implementation(
        &KERNEL,
        implementation,
        address_bits(&[input.as_ptr().cast(), taps.as_ptr().cast()], input.len()),
    )?;
    // checked_implementation verified tags and alignment
    Ok(unsafe { func(input, taps) })
}

/// Profiler workload for the dot product
pub struct DotProdWorkload {
    input: AlignedVec<Complex32>,
    taps: AlignedVec<Complex32>,
    result: Complex32,
}

impl KernelFn for DotProdFn {
    type Workload = DotProdWorkload;
    type Output = Complex32;

    fn workload(num_points: usize) -> DotProdWorkload {
        let mut input = AlignedVec::new(num_points);
        let mut taps = AlignedVec::new(num_points);
        input.copy_from_slice(&random_complex(num_points, 0x5eed_0001));
        taps.copy_from_slice(&random_complex(num_points, 0x5eed_0002));
        DotProdWorkload {
            input,
            taps,
            result: Complex32::new(0.0, 0.0),
        }
    }

    unsafe fn execute(self, workload: &mut DotProdWorkload) {
        workload.result = unsafe { self(&workload.input, &workload.taps) };
    }

    fn output(workload: &DotProdWorkload) -> Complex32 {
        workload.result
    }

    fn agrees(reference: &Complex32, candidate: &Complex32, num_points: usize, tolerance: f32) -> bool {
        (reference - candidate).norm() <= tolerance * num_points.max(1) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::host_capabilities;

    fn example() -> Vec<Complex32> {
        vec![
            Complex32::new(1.0, 0.0),
            Complex32::new(0.0, 1.0),
            Complex32::new(1.0, 1.0),
            Complex32::new(2.0, 0.0),
            Complex32::new(0.0, 2.0),
        ]
    }

    fn runnable() -> Vec<&'static str> {
        KERNEL
            .implementations()
            .iter()
            .filter(|imp| host_capabilities().satisfies(imp.info.requires))
            .map(|imp| imp.name())
            .collect()
    }

    #[test]
    fn test_generic_example() {
        // 1 + (-1) + 2i + 4 + (-4) = 0 + 2i
        let data = example();
        let result = dot_prod_32fc_manual(&data, &data, "generic").unwrap();
        assert_eq!(result, Complex32::new(0.0, 2.0));
    }

    #[test]
    fn test_dispatch_matches_generic() {
        let data = AlignedVec::from_slice(&example(), 64).unwrap();
        let result = dot_prod_32fc(&data, &data);
        assert!((result - Complex32::new(0.0, 2.0)).norm() <= 1e-5);
    }

    #[test]
    fn test_every_runnable_implementation() {
        for n in 0..=17 {
            let input = AlignedVec::from_slice(&random_complex(n, 11), 64).unwrap();
            let taps = AlignedVec::from_slice(&random_complex(n, 12), 64).unwrap();
            let reference = dot_prod_32fc_manual(&input, &taps, "generic").unwrap();
            for name in runnable() {
                let result = dot_prod_32fc_manual(&input, &taps, name).unwrap();
                assert!(
                    (result - reference).norm() <= 1e-5 * n.max(1) as f32,
                    "{} n={} got {} expected {}",
                    name,
                    n,
                    result,
                    reference
                );
            }
        }
    }

    #[test]
    fn test_unrolled_block_lengths() {
        for n in [8usize, 15, 16, 31, 33, 64] {
            let input = AlignedVec::from_slice(&random_complex(n, 21), 64).unwrap();
            let taps = AlignedVec::from_slice(&random_complex(n, 22), 64).unwrap();
            let reference = dot_prod_32fc_manual(&input, &taps, "generic").unwrap();
            for name in runnable() {
                let result = dot_prod_32fc_manual(&input, &taps, name).unwrap();
                assert!((result - reference).norm() <= 1e-5 * n as f32, "{} n={}", name, n);
            }
        }
    }

    #[test]
    fn test_neon_variants_need_only_neon() {
        for imp in KERNEL.implementations() {
            if imp.name().starts_with("neon") {
                assert_eq!(imp.info.requires, &[ArchTag::NEON], "{}", imp.name());
            }
        }
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(dot_prod_32fc(&[], &[]), Complex32::new(0.0, 0.0));
    }

    #[test]
    fn test_manual_errors() {
        let data = example();
        let err = dot_prod_32fc_manual(&data, &data, "a_avx512").unwrap_err();
        assert_eq!(err.category(), "implementation");

        let err = dot_prod_32fc_manual(&data, &data[..4], "generic").unwrap_err();
        assert_eq!(err.category(), "data");
    }

    #[test]
    fn test_manual_rejects_misaligned_buffers() {
        let aligned_impl = KERNEL
            .implementations()
            .iter()
            .find(|imp| {
                imp.info.alignment != Alignment::None
                    && host_capabilities().satisfies(imp.info.requires)
            });
        if let Some(imp) = aligned_impl {
            let input = AlignedVec::<Complex32>::misaligned(8, 64, 8).unwrap();
            let taps = AlignedVec::<Complex32>::new(8);
            let err = dot_prod_32fc_manual(&input, &taps, imp.name()).unwrap_err();
            assert_eq!(err.category(), "alignment");
        }
    }

    #[test]
    fn test_workload_self_agreement() {
        let generic = KERNEL.generic().func;
        let mut a = DotProdFn::workload(257);
        let mut b = DotProdFn::workload(257);
        unsafe {
            generic.execute(&mut a);
            generic.execute(&mut b);
        }
        let (ra, rb) = (DotProdFn::output(&a), DotProdFn::output(&b));
        assert_eq!(ra, rb);
        assert!(DotProdFn::agrees(&ra, &rb, 257, 0.0));
    }
}

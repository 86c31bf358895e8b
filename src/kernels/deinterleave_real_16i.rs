//! Deinterleave real parts and scale to `i16`:
//! `out[i] = round_half_even(input[i].re * scalar)`, saturated.
//!
//! | name | requires | block | alignment |
//! |---|---|---|---|
//! | `generic` | | 1 | none |
//! | `a_sse` | sse | 4 | 16 |
//! | `a_avx2` / `u_avx2` | avx2 | 8 | 32 / none |

use super::scalar::scale_to_i16;
use super::{address_bits, checked_implementation, random_complex, KernelFn};
use crate::dispatch::{Alignment, Dispatcher, ImplInfo, Implementation, Kernel};
use crate::error::{Result, VkernError};
use crate::memory::AlignedVec;
#[allow(unused_imports)]
use crate::system::ArchTag;
use num_complex::Complex32;

/// Entry point signature shared by every implementation.
///
/// `out` and `input` have the same length.
pub type DeinterleaveFn = unsafe fn(&mut [i16], &[Complex32], f32);

/// Kernel name
pub const NAME: &str = "deinterleave_real_16i";

unsafe fn deinterleave_generic(out: &mut [i16], input: &[Complex32], scalar: f32) {
    for (o, c) in out.iter_mut().zip(input) {
        *o = scale_to_i16(c.re, scalar);
    }
}

#[cfg(all(target_arch = "x86_64", not(vkern_generic_only)))]
mod x86 {
    use crate::kernels::scalar::{deinterleave_tail, scale_to_i16};
    use num_complex::Complex32;
    use std::arch::x86_64::*;

    #[target_feature(enable = "sse")]
    pub(super) unsafe fn deinterleave_a_sse(out: &mut [i16], input: &[Complex32], scalar: f32) {
        let n = out.len().min(input.len());
        let ip = input.as_ptr() as *const f32;
        let mut scaled = [0f32; 4];

        for i in 0..n / 4 {
            unsafe {
                let vs = _mm_set1_ps(scalar);
                let c1 = _mm_load_ps(ip.add(8 * i));
                let c2 = _mm_load_ps(ip.add(8 * i + 4));
                // r0 r1 r2 r3
                let re = _mm_shuffle_ps::<0x88>(c1, c2);
                _mm_storeu_ps(scaled.as_mut_ptr(), _mm_mul_ps(re, vs));
            }
            for (k, value) in scaled.iter().enumerate() {
                out[4 * i + k] = scale_to_i16(*value, 1.0);
            }
        }
        deinterleave_tail(out, input, n - n % 4, scalar);
    }

    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn deinterleave_avx2<const ALIGNED: bool>(
        out: &mut [i16],
        input: &[Complex32],
        scalar: f32,
    ) {
        let n = out.len().min(input.len());
        let ip = input.as_ptr() as *const f32;
        let op = out.as_mut_ptr();

        unsafe {
            let vs = _mm256_set1_ps(scalar);
            let lo = _mm256_set1_ps(i16::MIN as f32);
            let hi = _mm256_set1_ps(i16::MAX as f32);
            let idx = _mm256_set_epi32(3, 3, 3, 3, 5, 1, 4, 0);
            for i in 0..n / 8 {
                let (c1, c2) = if ALIGNED {
                    (_mm256_load_ps(ip.add(16 * i)), _mm256_load_ps(ip.add(16 * i + 8)))
                } else {
                    (_mm256_loadu_ps(ip.add(16 * i)), _mm256_loadu_ps(ip.add(16 * i + 8)))
                };
                // r0 r1 r4 r5 | r2 r3 r6 r7
                let re = _mm256_shuffle_ps::<0x88>(c1, c2);
                let scaled = _mm256_mul_ps(re, vs);
                // cvtps turns NaN and anything beyond i32 into i32::MIN, so
                // zero NaN lanes and clamp to the i16 range first
                let ordered_mask = _mm256_cmp_ps::<_CMP_ORD_Q>(scaled, scaled);
                let scaled = _mm256_and_ps(scaled, ordered_mask);
                let clamped = _mm256_min_ps(_mm256_max_ps(scaled, lo), hi);
                let ints = _mm256_cvtps_epi32(clamped);
                let packed = _mm256_packs_epi32(ints, ints);
                let ordered = _mm256_permutevar8x32_epi32(packed, idx);
                let low = _mm256_extracti128_si256::<0>(ordered);
                let dst = op.add(8 * i) as *mut __m128i;
                if ALIGNED {
                    _mm_store_si128(dst, low);
                } else {
                    _mm_storeu_si128(dst, low);
                }
            }
        }
        deinterleave_tail(out, input, n - n % 8, scalar);
    }
}

const GENERIC: Implementation<DeinterleaveFn> = Implementation::new(
    ImplInfo::new("generic", &[], Alignment::None, 0),
    deinterleave_generic as DeinterleaveFn,
);

#[cfg(all(target_arch = "x86_64", not(vkern_generic_only)))]
const IMPLEMENTATIONS: &[Implementation<DeinterleaveFn>] = &[
    GENERIC,
    Implementation::new(
        ImplInfo::new("a_sse", &[ArchTag::SSE], Alignment::Aligned(16), 10),
        x86::deinterleave_a_sse as DeinterleaveFn,
    ),
    Implementation::new(
        ImplInfo::new("a_avx2", &[ArchTag::AVX2], Alignment::Aligned(32), 20),
        x86::deinterleave_avx2::<true> as DeinterleaveFn,
    ),
    Implementation::new(
        ImplInfo::new("u_avx2", &[ArchTag::AVX2], Alignment::None, 20),
        x86::deinterleave_avx2::<false> as DeinterleaveFn,
    ),
];

#[cfg(not(all(target_arch = "x86_64", not(vkern_generic_only))))]
const IMPLEMENTATIONS: &[Implementation<DeinterleaveFn>] = &[GENERIC];

/// Implementation table
pub static KERNEL: Kernel<DeinterleaveFn> = Kernel::new(NAME, IMPLEMENTATIONS);

/// Process-wide dispatcher
pub static DISPATCHER: Dispatcher<DeinterleaveFn> = Dispatcher::new(&KERNEL);

/// Write `round_half_even(input[i].re * scalar)` to `out[i]`.
///
/// Both slices must have the same length; only the common prefix is
/// processed if they differ (debug builds assert). Values outside the `i16`
/// range saturate and NaN becomes 0, identically in every implementation.
pub fn deinterleave_real_16i(out: &mut [i16], input: &[Complex32], scalar: f32) {
    debug_assert_eq!(out.len(), input.len(), "output and input lengths differ");
    let n = out.len().min(input.len());
    let (out, input) = (&mut out[..n], &input[..n]);
    let func = DISPATCHER
        .binding()
        .route(out.as_ptr() as usize | input.as_ptr() as usize);
    // bound implementations only use host-supported tags, and route() falls
    // back to the unaligned entry when either pointer misses the boundary
    unsafe { func(out, input, scalar) }
}

/// Run a named implementation after checking it can run on these buffers.
pub fn deinterleave_real_16i_manual(
    out: &mut [i16],
    input: &[Complex32],
    scalar: f32,
    implementation: &str,
) -> Result<()> {
    if out.len() != input.len() {
        return Err(VkernError::invalid_data(format!(
            "output has {} points but input has {}",
            out.len(),
            input.len()
        )));
    }
    let func = checked_implementation(
        &KERNEL,
        implementation,
        address_bits(&[out.as_ptr().cast(), input.as_ptr().cast()], input.len()),
    )?;
    // checked_implementation verified tags and alignment
    unsafe { func(out, input, scalar) };
    Ok(())
}

/// Scale applied by the profiler workload
const WORKLOAD_SCALE: f32 = 30_000.0;

/// Profiler workload for deinterleaving
pub struct DeinterleaveWorkload {
    input: AlignedVec<Complex32>,
    output: AlignedVec<i16>,
}

impl KernelFn for DeinterleaveFn {
    type Workload = DeinterleaveWorkload;
    type Output = Vec<i16>;

    fn workload(num_points: usize) -> DeinterleaveWorkload {
        let mut input = AlignedVec::new(num_points);
        input.copy_from_slice(&random_complex(num_points, 0x5eed_0003));
        DeinterleaveWorkload {
            input,
            output: AlignedVec::new(num_points),
        }
    }

    unsafe fn execute(self, workload: &mut DeinterleaveWorkload) {
        unsafe { self(&mut workload.output, &workload.input, WORKLOAD_SCALE) }
    }

    fn output(workload: &DeinterleaveWorkload) -> Vec<i16> {
        workload.output.to_vec()
    }

    /// Integer outputs agree when every sample is within one step
    fn agrees(reference: &Vec<i16>, candidate: &Vec<i16>, _num_points: usize, _tolerance: f32) -> bool {
        reference.len() == candidate.len()
            && reference
                .iter()
                .zip(candidate)
                .all(|(a, b)| (i32::from(*a) - i32::from(*b)).abs() <= 1)
    }
}

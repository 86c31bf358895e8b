//! Scalar formulas shared by generic implementations and vector tails.
//!
//! Vector implementations finish the remainder of a block loop with these
//! helpers so every implementation of a kernel evaluates leftover samples
//! with the exact operand order of the generic implementation.

use num_complex::Complex32;

/// Add `input[i] * taps[i]` to `acc` for every `i >= start`, in index order
#[inline(always)]
pub(crate) fn dot_tail(
    input: &[Complex32],
    taps: &[Complex32],
    start: usize,
    mut acc: Complex32,
) -> Complex32 {
    for (x, y) in input[start..].iter().zip(&taps[start..]) {
        acc += x * y;
    }
    acc
}

/// Scale, round half to even and saturate to the `i16` range; NaN maps to 0
#[inline(always)]
pub(crate) fn scale_to_i16(value: f32, scalar: f32) -> i16 {
    (value * scalar).round_ties_even() as i16
}

/// Scalar deinterleave of `input[start..]` into `out[start..]`
#[inline(always)]
pub(crate) fn deinterleave_tail(out: &mut [i16], input: &[Complex32], start: usize, scalar: f32) {
    for (o, c) in out[start..].iter_mut().zip(&input[start..]) {
        *o = scale_to_i16(c.re, scalar);
    }
}

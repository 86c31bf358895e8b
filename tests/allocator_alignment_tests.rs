//! Buffer alignment under an allocator that never over-aligns
//!
//! The system allocator usually hands out 16-byte aligned blocks even when
//! less is requested, which hides code that relies on it. This binary
//! installs an allocator that places every small-alignment block exactly
//! 8 bytes past a 16-byte boundary, then checks that aligned buffers and the
//! profiler's verification runs still hold their boundaries.

use num_complex::Complex32;
use std::alloc::{GlobalAlloc, Layout, System};
use vkern::{capabilities, registered, AlignedVec};

const SHIFT: usize = 8;

struct ShiftingAllocator;

impl ShiftingAllocator {
    fn shifted(layout: Layout) -> Option<Layout> {
        if layout.align() > SHIFT {
            return None;
        }
        Layout::from_size_align(layout.size() + SHIFT, 2 * SHIFT).ok()
    }
}

unsafe impl GlobalAlloc for ShiftingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        match Self::shifted(layout) {
            Some(outer) => {
                let base = unsafe { System.alloc(outer) };
                if base.is_null() {
                    base
                } else {
                    unsafe { base.add(SHIFT) }
                }
            }
            None => unsafe { System.alloc(layout) },
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        match Self::shifted(layout) {
            Some(outer) => unsafe { System.dealloc(ptr.sub(SHIFT), outer) },
            None => unsafe { System.dealloc(ptr, layout) },
        }
    }
}

#[global_allocator]
static ALLOCATOR: ShiftingAllocator = ShiftingAllocator;

#[test]
fn test_allocator_misaligns_plain_vectors() {
    let plain: Vec<Complex32> = vec![Complex32::new(0.0, 0.0); 64];
    assert_eq!(plain.as_ptr() as usize % 16, SHIFT);
}

#[test]
fn test_aligned_vec_holds_boundary() {
    for len in [0usize, 1, 7, 64, 1000] {
        let complex: AlignedVec<Complex32> = AlignedVec::new(len);
        let shorts: AlignedVec<i16> = AlignedVec::new(len);
        assert_eq!(complex.as_ptr() as usize % 64, 0, "len={}", len);
        assert_eq!(shorts.as_ptr() as usize % 64, 0, "len={}", len);

        let copied = AlignedVec::from_slice(&vec![Complex32::new(1.0, -1.0); len], 32).unwrap();
        assert_eq!(copied.as_ptr() as usize % 32, 0, "len={}", len);
        assert!(copied.iter().all(|&c| c == Complex32::new(1.0, -1.0)));
    }
}

#[test]
fn test_misaligned_offset_is_exact() {
    let buffer = AlignedVec::<Complex32>::misaligned(33, 64, 24).unwrap();
    assert_eq!(buffer.as_ptr() as usize % 64, 24);
}

#[test]
fn test_every_implementation_verifies() {
    for kernel in registered() {
        for info in kernel.implementations() {
            if !capabilities().satisfies(info.requires) {
                continue;
            }
            for n in [1usize, 64, 1023] {
                let agrees = kernel.verify(info.name, n, 1e-3).unwrap();
                assert!(agrees, "{}/{} n={}", kernel.name(), info.name, n);
            }
        }
    }
}

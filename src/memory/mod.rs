//! # Aligned Buffers
//!
//! Kernels never allocate; callers own every buffer. [`AlignedVec`] is the
//! helper the profiler, tests and benchmarks use to obtain buffers whose
//! start address sits at a chosen offset from an alignment boundary, so both
//! the aligned and the unaligned dispatch paths can be exercised on demand.

use crate::error::{Result, VkernError};
use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::slice;

/// Alignment covering every vector width the shipped kernels use
pub const DEFAULT_ALIGNMENT: usize = 64;

/// Fixed-length buffer whose first element starts at a controlled address.
///
/// The block is allocated with an explicit [`Layout`] of the requested
/// alignment, so the boundary holds for any global allocator; the visible
/// elements begin `byte_offset` bytes into it.
pub struct AlignedVec<T> {
    base: NonNull<u8>,
    layout: Layout,
    data: NonNull<T>,
    len: usize,
    alignment: usize,
    byte_offset: usize,
}

// AlignedVec owns its elements like Vec<T>
unsafe impl<T: Send> Send for AlignedVec<T> {}
unsafe impl<T: Sync> Sync for AlignedVec<T> {}

impl<T: Copy + Default> AlignedVec<T> {
    /// Zero-initialized buffer aligned to [`DEFAULT_ALIGNMENT`]
    ///
    /// # Panics
    ///
    /// Panics if the total size overflows `isize`, as `Vec::with_capacity`
    /// does.
    pub fn new(len: usize) -> Self {
        match Self::build(len, DEFAULT_ALIGNMENT, 0) {
            Ok(buffer) => buffer,
            Err(e) => panic!("AlignedVec of {} elements: {}", len, e),
        }
    }

    /// Zero-initialized buffer aligned to `alignment` bytes
    pub fn with_alignment(len: usize, alignment: usize) -> Result<Self> {
        Self::build(len, alignment, 0)
    }

    /// Buffer whose start address is `byte_offset` bytes past an
    /// `alignment` boundary.
    ///
    /// `byte_offset` must be a multiple of `size_of::<T>()` and smaller than
    /// `alignment`.
    pub fn misaligned(len: usize, alignment: usize, byte_offset: usize) -> Result<Self> {
        if byte_offset >= alignment {
            return Err(VkernError::invalid_data(format!(
                "offset {} must be smaller than alignment {}",
                byte_offset, alignment
            )));
        }
        Self::build(len, alignment, byte_offset)
    }

    /// Copy `data` into a buffer aligned to `alignment` bytes
    pub fn from_slice(data: &[T], alignment: usize) -> Result<Self> {
        let mut buffer = Self::build(data.len(), alignment, 0)?;
        buffer.as_mut_slice().copy_from_slice(data);
        Ok(buffer)
    }

    fn build(len: usize, alignment: usize, byte_offset: usize) -> Result<Self> {
        let size = mem::size_of::<T>();
        if size == 0 {
            return Err(VkernError::not_supported("aligned buffers of zero-sized types"));
        }
        if !alignment.is_power_of_two() || alignment < mem::align_of::<T>() {
            return Err(VkernError::invalid_data(format!(
                "alignment {} must be a power of two of at least {}",
                alignment,
                mem::align_of::<T>()
            )));
        }
        if byte_offset % size != 0 {
            return Err(VkernError::invalid_data(format!(
                "offset {} is not a multiple of the element size {}",
                byte_offset, size
            )));
        }

        let bytes = len
            .checked_mul(size)
            .and_then(|b| b.checked_add(byte_offset))
            .ok_or_else(|| VkernError::invalid_data(format!("{} elements overflow", len)))?;
        // zero-sized layouts cannot be allocated
        let layout = Layout::from_size_align(bytes.max(alignment), alignment).map_err(|e| {
            VkernError::invalid_data(format!("invalid buffer layout: {}", e))
        })?;

        let base = NonNull::new(unsafe { alloc(layout) })
            .unwrap_or_else(|| handle_alloc_error(layout));
        // byte_offset is a multiple of size_of::<T>(), itself a multiple of
        // align_of::<T>(), and the block holds byte_offset + len * size bytes
        let data = unsafe { base.as_ptr().add(byte_offset) }.cast::<T>();
        for i in 0..len {
            unsafe { data.add(i).write(T::default()) };
        }

        Ok(Self {
            base,
            layout,
            // derived from a non-null block pointer
            data: unsafe { NonNull::new_unchecked(data) },
            len,
            alignment,
            byte_offset,
        })
    }
}

impl<T> AlignedVec<T> {
    /// Visible elements
    pub fn as_slice(&self) -> &[T] {
        // data points at len initialized elements owned by self
        unsafe { slice::from_raw_parts(self.data.as_ptr(), self.len) }
    }

    /// Visible elements, mutable
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        unsafe { slice::from_raw_parts_mut(self.data.as_ptr(), self.len) }
    }

    /// Number of visible elements
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the buffer holds no elements
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Requested alignment boundary in bytes
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Requested distance from the boundary in bytes
    pub fn byte_offset(&self) -> usize {
        self.byte_offset
    }
}

impl<T> Drop for AlignedVec<T> {
    fn drop(&mut self) {
        // elements are Copy; only the block needs releasing
        unsafe { dealloc(self.base.as_ptr(), self.layout) }
    }
}

impl<T> Deref for AlignedVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> DerefMut for AlignedVec<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: fmt::Debug> fmt::Debug for AlignedVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignedVec")
            .field("len", &self.len)
            .field("alignment", &self.alignment)
            .field("byte_offset", &self.byte_offset)
            .field("data", &self.as_slice())
            .finish()
    }
}

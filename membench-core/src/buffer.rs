//! Cache-line aligned benchmark buffers
//!
//! Each worker owns exactly one [`AlignedBuffer`]. The allocation is released
//! when the buffer is dropped, so every exit path of a worker frees it.

use std::alloc::{self, Layout};
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

/// Buffer start alignment and read-probe stride, in bytes
pub const CACHE_LINE: usize = 64;

/// One cache line viewed as eight native-endian words
pub type Line = [u64; CACHE_LINE / 8];

#[repr(C, align(64))]
struct AlignedLine([u8; CACHE_LINE]);

/// Errors from obtaining a worker buffer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    #[error("cannot describe a {size}-byte buffer aligned to {} bytes", CACHE_LINE)]
    InvalidLayout { size: usize },

    #[error("out of memory allocating {size} bytes")]
    OutOfMemory { size: usize },
}

/// Zero-initialised heap buffer whose first byte sits on a cache-line boundary
pub struct AlignedBuffer {
    ptr: NonNull<u8>,
    len: usize,
}

// The buffer uniquely owns its allocation, like a Box<[u8]>.
unsafe impl Send for AlignedBuffer {}
unsafe impl Sync for AlignedBuffer {}

impl AlignedBuffer {
    /// Allocate `len` zeroed bytes. A zero-length buffer owns no memory.
    pub fn zeroed(len: usize) -> Result<Self, AllocationError> {
        if len == 0 {
            return Ok(Self {
                ptr: NonNull::<AlignedLine>::dangling().cast(),
                len: 0,
            });
        }

        let layout = Layout::from_size_align(len, CACHE_LINE)
            .map_err(|_| AllocationError::InvalidLayout { size: len })?;

        // SAFETY: layout has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(AllocationError::OutOfMemory { size: len })?;

        Ok(Self { ptr, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Split into whole cache lines and the trailing bytes that do not fill one
    pub fn lines(&self) -> (&[Line], &[u8]) {
        let count = self.len / CACHE_LINE;
        // SAFETY: the pointer is 64-byte aligned (stricter than u64), the first
        // `count * 64` bytes are initialised and owned by self, and the shared
        // borrow of self prevents concurrent mutation.
        let lines = unsafe { std::slice::from_raw_parts(self.ptr.as_ptr().cast::<Line>(), count) };
        (lines, &self[count * CACHE_LINE..])
    }
}

impl Deref for AlignedBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: ptr is valid for len initialised bytes (or dangling with len 0).
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for AlignedBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: as in deref, and &mut self guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        if self.len == 0 {
            return;
        }
        // SAFETY: the same layout was validated in `zeroed` and ptr came from
        // alloc_zeroed with it.
        unsafe {
            let layout = Layout::from_size_align_unchecked(self.len, CACHE_LINE);
            alloc::dealloc(self.ptr.as_ptr(), layout);
        }
    }
}

impl std::fmt::Debug for AlignedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

/// Source of worker buffers
pub trait BufferAllocator: Send + Sync {
    fn allocate(&self, thread_id: usize, size: usize) -> Result<AlignedBuffer, AllocationError>;
}

/// Allocates from the global allocator
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAllocator;

impl BufferAllocator for SystemAllocator {
    fn allocate(&self, _thread_id: usize, size: usize) -> Result<AlignedBuffer, AllocationError> {
        AlignedBuffer::zeroed(size)
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use crate::{
    pal::arch,
    runtime::{
        fail::Fail,
        limits,
    },
};
use ::std::{
    alloc::{
        alloc_zeroed,
        dealloc,
        Layout,
    },
    fmt,
    ptr::NonNull,
    slice,
};

//==============================================================================
// Structures
//==============================================================================

/// Release callback for externally supplied memory. Receives the start and length the memory was wrapped with.
pub type BufferDestructor = Box<dyn FnOnce(NonNull<u8>, usize) + Send + Sync>;

/// Where the bytes of a [DataBuffer] came from, which determines how they are given back.
enum Backing {
    /// Allocated by us off the heap, aligned to a cache line.
    Heap,
    /// Supplied by the caller, who gets it back through the destructor.
    External(Option<BufferDestructor>),
}

/// Data Buffer
///
/// A fixed-size region of bytes. The region is never resized: growing a packet means moving its contents into a new
/// `DataBuffer`. Sharing is handled by whoever holds the buffer (packets hold it behind an `Arc`).
pub struct DataBuffer {
    /// Start of the region.
    ptr: NonNull<u8>,
    /// Length of the region.
    capacity: usize,
    /// Owner of the region.
    backing: Backing,
}

// Safety: a DataBuffer uniquely owns its region (or, for external memory, has been handed ownership of it by the
// caller), and it hands out mutable access only through `as_mut_ptr`, whose callers must prove exclusivity. The
// destructor is required to be Send + Sync.
unsafe impl Send for DataBuffer {}
unsafe impl Sync for DataBuffer {}

//==============================================================================
// Associated Functions
//==============================================================================

/// Associated Functions for Data Buffers
impl DataBuffer {
    /// Allocates a zero-filled, cache-line aligned buffer of `capacity` bytes.
    pub fn allocate(capacity: usize) -> Result<Self, Fail> {
        let layout: Layout = Self::layout(capacity)?;

        // Safety: The layout has a non-zero size, and we check for a null return value before using the allocation.
        let allocation: *mut u8 = unsafe { alloc_zeroed(layout) };
        match NonNull::new(allocation) {
            Some(ptr) => Ok(Self {
                ptr,
                capacity,
                backing: Backing::Heap,
            }),
            None => {
                let cause: String = format!("failed to allocate data buffer (capacity={:?})", capacity);
                error!("allocate(): {}", &cause);
                Err(Fail::out_of_memory(&cause))
            },
        }
    }

    /// Wraps `len` bytes of externally supplied memory starting at `ptr`. `destructor` runs exactly once, when the
    /// buffer is dropped.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `len` initialized bytes until `destructor` is invoked, and nothing
    /// else may access that memory in the meantime.
    pub unsafe fn from_external(ptr: NonNull<u8>, len: usize, destructor: BufferDestructor) -> Self {
        Self {
            ptr,
            capacity: len,
            backing: Backing::External(Some(destructor)),
        }
    }

    /// Returns the length of the region.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` if this buffer wraps memory supplied by someone else.
    pub fn is_external(&self) -> bool {
        matches!(self.backing, Backing::External(_))
    }

    /// Returns `true` if this buffer may be handed back to the packet pool for reuse.
    pub fn is_recyclable(&self, pool_buffer_size: usize) -> bool {
        matches!(self.backing, Backing::Heap) && self.capacity == pool_buffer_size
    }

    /// Provides a raw pointer to the start of the region.
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Provides a raw mutable pointer to the start of the region.
    ///
    /// Dereferencing the pointer for writes requires that no other reference to this buffer is being used to read.
    pub(crate) fn as_mut_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Views the whole region.
    pub fn as_slice(&self) -> &[u8] {
        // Safety: the region is `capacity` initialized bytes (heap buffers are zero-filled on allocation, external
        // memory is initialized by contract) that remain valid for as long as `self` does.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.capacity) }
    }

    /// Views the whole region for writing. Holding `&mut self` proves nobody else is looking at the bytes.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // Safety: same as `as_slice`, and the exclusive borrow of `self` rules out any other live view.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.capacity) }
    }

    /// Computes the allocation layout for a heap buffer.
    fn layout(capacity: usize) -> Result<Layout, Fail> {
        if capacity == 0 || capacity > limits::BUFFER_LENGTH_MAX {
            let cause: String = format!("invalid data buffer capacity (capacity={:?})", capacity);
            error!("layout(): {}", &cause);
            return Err(Fail::new(libc::EINVAL, &cause));
        }
        Layout::from_size_align(capacity, arch::CPU_DATA_CACHE_LINE_SIZE)
            .map_err(|_| Fail::new(libc::EINVAL, "data buffer layout overflows"))
    }
}

//==============================================================================
// Standard-Library Trait Implementations
//==============================================================================

/// Debug Trait Implementation for Data Buffers
impl fmt::Debug for DataBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataBuffer")
            .field("ptr", &self.ptr)
            .field("capacity", &self.capacity)
            .field("external", &self.is_external())
            .finish()
    }
}

/// Drop Trait Implementation for Data Buffers
impl Drop for DataBuffer {
    fn drop(&mut self) {
        match &mut self.backing {
            Backing::Heap => match Self::layout(self.capacity) {
                // Safety: this is safe because we're using the same (de)allocator and Layout used for allocation.
                Ok(layout) => unsafe { dealloc(self.ptr.as_ptr(), layout) },
                Err(e) => error!("drop(): leaking data buffer ({:?})", e),
            },
            Backing::External(destructor) => {
                if let Some(destructor) = destructor.take() {
                    destructor(self.ptr, self.capacity);
                }
            },
        }
    }
}

//==============================================================================
// Unit Tests
//==============================================================================

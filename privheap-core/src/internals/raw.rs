//! Blocks served straight from the heap whenever its natural alignment suffices, and carved otherwise.

use core::ptr::NonNull;

use crate::{AllocationError, Platform, PowerOf2, PrivateHeap};

use super::stash;

/// Allocates `size` bytes, aligned on `alignment`.
///
/// The returned pointer must be deallocated by `deallocate`, with the same `alignment`.
pub(crate) fn allocate<P>(heap: &PrivateHeap<P>, size: usize, alignment: PowerOf2) -> Result<NonNull<u8>, AllocationError>
    where
        P: Platform,
{
    debug_assert!(size > 0);

    if alignment <= P::NATURAL_ALIGNMENT {
        heap.allocate(size).ok_or_else(|| out_of_memory(size))
    } else {
        stash::allocate(heap, size, alignment)
    }
}

/// Deallocates a block obtained from `allocate`.
///
/// #   Safety
///
/// -   Assumes `pointer` was returned by `allocate` on `heap`, with the same `alignment`.
/// -   Assumes `pointer` has not been deallocated since its allocation.
pub(crate) unsafe fn deallocate<P>(heap: &PrivateHeap<P>, pointer: NonNull<u8>, alignment: PowerOf2)
    where
        P: Platform,
{
    if alignment <= P::NATURAL_ALIGNMENT {
        heap.deallocate(pointer);
    } else {
        stash::deallocate(heap, pointer);
    }
}

/// Returns a non-null pointer, aligned on `alignment`, suitable for zero-sized blocks.
pub(crate) fn dangling(alignment: PowerOf2) -> NonNull<u8> {
    //  Safety:
    //  -   A power of 2 is non-zero.
    unsafe { NonNull::new_unchecked(alignment.value() as *mut u8) }
}

/// Reports that the heap could not provide `size` bytes.
#[cold]
pub(crate) fn out_of_memory(size: usize) -> AllocationError {
    log::trace!("private heap out of memory, {} bytes requested", size);

    AllocationError::OutOfMemory { size }
}

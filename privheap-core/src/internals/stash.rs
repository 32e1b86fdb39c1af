//! Over-aligned blocks.
//!
//! A heap only guarantees its natural alignment. To serve a stricter alignment `M`, a block is over-allocated by
//! `M - 1 + STASH_SIZE` bytes, an aligned pointer is carved out of it, and the address of the raw block is stashed in
//! the slot immediately preceding the aligned pointer:
//!
//! ```text
//!   raw                    aligned - STASH_SIZE   aligned
//!   │                      │                      │
//!   ▼                      ▼                      ▼
//!   ┌──────────────────────┬──────────────────────┬──────────────────────────┬─────────┐
//!   │       padding        │      stash: raw      │    `size` usable bytes   │  slack  │
//!   └──────────────────────┴──────────────────────┴──────────────────────────┴─────────┘
//! ```
//!
//! The stash is the only record of the raw block: deallocation reads it back, and frees the raw block.
//!
//! The stash slot is accessed unaligned, as `M` may be lower than the alignment of a pointer.

use core::{
    mem,
    ptr::{self, NonNull},
};

use crate::{AllocationError, Platform, PowerOf2, PrivateHeap};
use crate::utils::is_sufficiently_aligned_for;

use super::raw;

/// Size of the stash slot.
pub(crate) const STASH_SIZE: usize = mem::size_of::<*mut u8>();

/// Returns the number of bytes needed on top of the payload, to align it on `alignment`.
pub(crate) const fn overhead(alignment: PowerOf2) -> usize { alignment.value() - 1 + STASH_SIZE }

/// Allocates `size` bytes, aligned on `alignment`.
///
/// The returned pointer must be deallocated by `deallocate`, and only by `deallocate`.
pub(crate) fn allocate<P>(heap: &PrivateHeap<P>, size: usize, alignment: PowerOf2) -> Result<NonNull<u8>, AllocationError>
    where
        P: Platform,
{
    let overhead = overhead(alignment);

    let raw_size = size.checked_add(overhead)
        .ok_or(AllocationError::LengthTooLong { count: size, max: usize::MAX - overhead })?;

    let raw = heap.allocate(raw_size).ok_or_else(|| raw::out_of_memory(raw_size))?;

    //  Safety:
    //  -   `raw` points to a live block of `raw_size` bytes.
    if let Some(aligned) = unsafe { carve(raw, alignment) } {
        return Ok(aligned);
    }

    //  Safety:
    //  -   `raw` was allocated by `heap`, and is not referenced.
    unsafe { heap.deallocate(raw) };

    Err(raw::out_of_memory(raw_size))
}

/// Deallocates the block carved around `aligned`.
///
/// #   Safety
///
/// -   Assumes `aligned` was returned by `allocate` on `heap`.
/// -   Assumes `aligned` has not been deallocated since its allocation.
/// -   Assumes the stash slot was not overwritten since.
pub(crate) unsafe fn deallocate<P>(heap: &PrivateHeap<P>, aligned: NonNull<u8>)
    where
        P: Platform,
{
    heap.deallocate(base_of(aligned));
}

/// Returns the raw block stashed before `aligned`.
///
/// #   Safety
///
/// -   Assumes `aligned` was returned by `allocate`, and the stash slot was not overwritten since.
pub(crate) unsafe fn base_of(aligned: NonNull<u8>) -> NonNull<u8> {
    let slot = aligned.as_ptr().sub(STASH_SIZE).cast::<*mut u8>();

    //  Safety:
    //  -   The stash holds the non-null pointer returned by the heap.
    NonNull::new_unchecked(ptr::read_unaligned(slot))
}

//  Carves an `alignment`-aligned pointer out of `raw`, and stashes `raw` just before it.
//
//  Returns None if the address computation overflows.
//
//  #   Safety
//
//  -   Assumes `raw` points to a live block of at least `overhead(alignment)` bytes.
unsafe fn carve(raw: NonNull<u8>, alignment: PowerOf2) -> Option<NonNull<u8>> {
    let base = raw.as_ptr() as usize;

    let offset = alignment.round_down(base.checked_add(overhead(alignment))?) - base;

    debug_assert!(offset >= STASH_SIZE, "{} < {}", offset, STASH_SIZE);
    debug_assert!(offset <= overhead(alignment), "{} > {}", offset, overhead(alignment));

    let aligned = raw.as_ptr().add(offset);

    debug_assert!(is_sufficiently_aligned_for(aligned as usize, alignment));

    ptr::write_unaligned(aligned.sub(STASH_SIZE).cast::<*mut u8>(), raw.as_ptr());

    Some(NonNull::new_unchecked(aligned))
}

#[cfg(test)]
mod tests {

use crate::test::TestPlatform;
use crate::utils::is_sufficiently_aligned_for;

use super::*;

fn power_of_2(value: usize) -> PowerOf2 { PowerOf2::new(value).expect("Power of 2") }

#[test]
fn stash_overhead() {
    assert_eq!(STASH_SIZE, overhead(PowerOf2::ONE));
    assert_eq!(63 + STASH_SIZE, overhead(power_of_2(64)));
}

#[test]
fn stash_carve_every_misalignment() {
    //  Whatever the misalignment of the raw block, the aligned pointer and its stash fit within the block.
    #[repr(align(64))]
    struct Store([u8; 256]);

    let mut store = Store([0; 256]);
    let start = store.0.as_mut_ptr();

    for alignment in [1, 2, 8, 16, 32, 64].iter().copied().map(power_of_2) {
        for shift in 0..64 {
            let raw = NonNull::new(unsafe { start.add(shift) }).unwrap();
            let aligned = unsafe { carve(raw, alignment) }.expect("No overflow");

            let offset = aligned.as_ptr() as usize - raw.as_ptr() as usize;

            assert!(is_sufficiently_aligned_for(aligned.as_ptr() as usize, alignment));
            assert!(offset >= STASH_SIZE, "{} < {}", offset, STASH_SIZE);
            assert!(offset <= overhead(alignment), "{} > {}", offset, overhead(alignment));
            assert_eq!(raw, unsafe { base_of(aligned) });
        }
    }
}

#[test]
fn stash_allocate_deallocate() {
    let heap = PrivateHeap::new(TestPlatform::new());
    let alignment = power_of_2(256);

    let aligned = allocate(&heap, 100, alignment).expect("Allocated");

    assert!(is_sufficiently_aligned_for(aligned.as_ptr() as usize, alignment));

    let raw = heap.platform().live_addresses()[0];
    assert_eq!(Some(100 + overhead(alignment)), heap.platform().live_size(NonNull::new(raw as *mut u8).unwrap()));
    assert_eq!(raw, unsafe { base_of(aligned) }.as_ptr() as usize);

    unsafe { deallocate(&heap, aligned) };

    assert_eq!(vec![raw], heap.platform().freed_addresses());
}

#[test]
fn stash_allocate_overflow() {
    let heap = PrivateHeap::new(TestPlatform::new());
    let alignment = power_of_2(16);

    let error = allocate(&heap, usize::MAX - 8, alignment).unwrap_err();

    assert_eq!(AllocationError::LengthTooLong { count: usize::MAX - 8, max: usize::MAX - overhead(alignment) }, error);
    assert_eq!(0, heap.platform().allocations());
}

#[test]
fn stash_allocate_out_of_memory() {
    let heap = PrivateHeap::new(TestPlatform::new());
    heap.platform().refuse_allocations();

    let error = allocate(&heap, 100, power_of_2(32)).unwrap_err();

    assert_eq!(AllocationError::OutOfMemory { size: 100 + overhead(power_of_2(32)) }, error);
}

}

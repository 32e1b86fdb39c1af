//! Platform
//!
//! The Platform trait is used to create a private heap, and to request memory from it. By abstracting the underlying
//! platform, it becomes possible to easily port the code to a different OS, or to substitute an instrumented heap in
//! tests.

use core::ptr::NonNull;

use crate::PowerOf2;

/// Abstraction of platform specific private heap management.
pub trait Platform {
    /// Opaque handle to a private heap.
    type Handle;

    /// Alignment guaranteed for every block returned by `allocate`.
    const NATURAL_ALIGNMENT: PowerOf2;

    /// Creates a fresh private heap.
    ///
    /// Returns None if the platform cannot create one.
    fn create(&self) -> Option<Self::Handle>;

    /// Allocates a fresh block of `size` bytes from the heap.
    ///
    /// May return None if the allocation request cannot be satisfied.
    ///
    /// #   Safety
    ///
    /// The caller may assume that if the returned pointer is not None then:
    /// -   The number of usable bytes is _greater than or equal_ to `size`.
    /// -   The pointer is _at least_ aligned to `NATURAL_ALIGNMENT`.
    ///
    /// `allocate` assumes that:
    /// -   `handle` was created by this instance of `Platform`, and not destroyed since.
    /// -   `size` is non-zero.
    unsafe fn allocate(&self, handle: &Self::Handle, size: usize) -> Option<NonNull<u8>>;

    /// Deallocates the supplied block of memory.
    ///
    /// #   Safety
    ///
    /// The caller should no longer reference the memory after calling this function.
    ///
    /// `deallocate` assumes that:
    /// -   `pointer` was allocated from `handle`, by this instance of `Platform`.
    /// -   `pointer` is the value returned by `allocate`, and not an interior pointer.
    unsafe fn deallocate(&self, handle: &Self::Handle, pointer: NonNull<u8>);

    /// Destroys the heap, releasing all its blocks at once.
    ///
    /// #   Safety
    ///
    /// -   Assumes that no block allocated from `handle` is still referenced.
    unsafe fn destroy(&self, handle: Self::Handle);
}

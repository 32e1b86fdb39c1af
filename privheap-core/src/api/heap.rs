//! Private Heap.
//!
//! A `PrivateHeap` owns a single platform heap handle:
//!
//! -   The handle is created lazily, by the first call needing it, and exactly once even if several threads race to
//!     be first.
//! -   The handle is retained for the lifetime of the `PrivateHeap`; when the `PrivateHeap` is a `static`, this means
//!     for the lifetime of the process, and the handle is reclaimed by the OS at exit.
//!
//! Allocators do not refer to a `PrivateHeap` directly; instead they are parameterized by a `HeapSource`, a type
//! naming the `PrivateHeap` to draw from. This keeps allocators zero-sized, while allowing tests to substitute their
//! own heap.

use core::{fmt, mem::ManuallyDrop, ptr::NonNull};

use spin::Once;

use crate::Platform;

/// Private Heap.
///
/// #   Failure
///
/// If the platform fails to create the heap, the call requiring the handle panics, as do any concurrent or later
/// calls: a private heap is either usable, or fatally broken.
pub struct PrivateHeap<P: Platform> {
    handle: Once<ManuallyDrop<P::Handle>>,
    platform: P,
}

impl<P: Platform> PrivateHeap<P> {
    /// Creates a PrivateHeap, without creating the underlying platform heap.
    pub const fn new(platform: P) -> Self { Self { handle: Once::new(), platform } }

    /// Returns a reference to the platform.
    pub fn platform(&self) -> &P { &self.platform }

    /// Returns whether the underlying platform heap was created.
    pub fn is_created(&self) -> bool { self.handle.is_completed() }

    /// Returns the handle to the underlying platform heap, creating it if necessary.
    ///
    /// #   Panics
    ///
    /// If the platform cannot create the heap.
    pub fn handle(&self) -> &P::Handle {
        let handle = self.handle.call_once(|| self.create());

        &**handle
    }

    /// Allocates `size` bytes from the heap, aligned on at least `P::NATURAL_ALIGNMENT`.
    ///
    /// Returns None if `size` is 0, without calling into the platform, or if the platform cannot satisfy the request.
    pub fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        if size == 0 {
            return None;
        }

        //  Safety:
        //  -   `handle` was created by `self.platform`, and is only destroyed on drop.
        //  -   `size` is non-zero.
        unsafe { self.platform.allocate(self.handle(), size) }
    }

    /// Deallocates the memory located at `pointer`.
    ///
    /// #   Safety
    ///
    /// -   Assumes `pointer` has been returned by a prior call to `allocate` on `self`.
    /// -   Assumes `pointer` has not been deallocated since its allocation.
    /// -   Assumes the memory pointed by `pointer` is no longer in use.
    pub unsafe fn deallocate(&self, pointer: NonNull<u8>) {
        self.platform.deallocate(self.handle(), pointer);
    }

    #[cold]
    #[inline(never)]
    fn create(&self) -> ManuallyDrop<P::Handle> {
        match self.platform.create() {
            Some(handle) => {
                log::debug!("private heap created, natural alignment {}", P::NATURAL_ALIGNMENT.value());
                ManuallyDrop::new(handle)
            }
            None => {
                log::error!("private heap creation failed");
                panic!("failed to create private heap");
            }
        }
    }
}

impl<P: Platform> Drop for PrivateHeap<P> {
    fn drop(&mut self) {
        let Some(handle) = self.handle.get_mut() else { return };

        //  Safety:
        //  -   `handle` is never accessed again, the surrounding `ManuallyDrop` is left behind.
        let handle = unsafe { ManuallyDrop::take(handle) };

        //  Safety:
        //  -   `&mut self` guarantees no allocator is borrowing `self` any longer.
        unsafe { self.platform.destroy(handle) };

        log::debug!("private heap destroyed");
    }
}

impl<P: Platform> fmt::Debug for PrivateHeap<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateHeap").field("created", &self.is_created()).finish()
    }
}

/// Source of a `PrivateHeap`.
///
/// A zero-sized type naming the heap an allocator draws from. The `privheap` crate provides the process-wide source,
/// tests provide sources over instrumented platforms.
pub trait HeapSource {
    /// The platform of the heap.
    type Platform: Platform + 'static;

    /// Returns the heap.
    fn heap() -> &'static PrivateHeap<Self::Platform>;
}

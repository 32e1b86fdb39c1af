//! Implementation of Unix specific calls.
//!
//! The C library offers no private heap, hence the "private" heap is the C heap, reached through `malloc` and `free`.

use core::{fmt, marker::PhantomData, mem, ptr::NonNull};

use privheap_core::{Configuration, PHConfiguration, Platform, PowerOf2};

/// Implementation of the Platform trait, for Unix.
///
/// The configuration is ignored, as `malloc` has no sizing knobs.
pub struct PHPlatform<C = PHConfiguration>(PhantomData<fn() -> C>);

impl<C> PHPlatform<C> {
    /// Creates an instance.
    pub const fn new() -> Self { Self(PhantomData) }
}

impl<C> Default for PHPlatform<C> {
    fn default() -> Self { Self::new() }
}

impl<C> fmt::Debug for PHPlatform<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("PHPlatform(malloc)") }
}

/// Handle to the C heap.
#[derive(Debug)]
pub struct UnixHeap;

impl<C: Configuration> Platform for PHPlatform<C> {
    type Handle = UnixHeap;

    //  Safety:
    //  -   Twice the size of a pointer is a power of 2.
    const NATURAL_ALIGNMENT: PowerOf2 = unsafe { PowerOf2::new_unchecked(2 * mem::size_of::<usize>()) };

    fn create(&self) -> Option<UnixHeap> { Some(UnixHeap) }

    unsafe fn allocate(&self, _: &UnixHeap, size: usize) -> Option<NonNull<u8>> {
        NonNull::new(libc::malloc(size).cast())
    }

    unsafe fn deallocate(&self, _: &UnixHeap, pointer: NonNull<u8>) {
        libc::free(pointer.as_ptr().cast());
    }

    unsafe fn destroy(&self, _: UnixHeap) {}
}

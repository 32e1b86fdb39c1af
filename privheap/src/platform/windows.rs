//! Implementation of Windows specific calls.

use core::{fmt, marker::PhantomData, mem, ptr::NonNull};

use windows_sys::Win32::{
    Foundation::{GetLastError, HANDLE},
    System::Memory::{HeapAlloc, HeapCreate, HeapDestroy, HeapFree},
};

use privheap_core::{Configuration, PHConfiguration, Platform, PowerOf2};

/// Implementation of the Platform trait, for Windows.
///
/// Each instance creates its own heap, sized by `C`.
pub struct PHPlatform<C = PHConfiguration>(PhantomData<fn() -> C>);

impl<C> PHPlatform<C> {
    /// Creates an instance.
    pub const fn new() -> Self { Self(PhantomData) }
}

impl<C> Default for PHPlatform<C> {
    fn default() -> Self { Self::new() }
}

impl<C> fmt::Debug for PHPlatform<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("PHPlatform(HeapCreate)") }
}

/// Handle to a heap created by `HeapCreate`.
#[derive(Debug)]
pub struct WindowsHeap(HANDLE);

//  Safety:
//  -   The heap is created serialized, hence may be used from any thread.
unsafe impl Send for WindowsHeap {}

//  Safety:
//  -   The heap is created serialized, hence may be used from any thread.
unsafe impl Sync for WindowsHeap {}

impl<C: Configuration> Platform for PHPlatform<C> {
    type Handle = WindowsHeap;

    //  Safety:
    //  -   Twice the size of a pointer is a power of 2, and matches `MEMORY_ALLOCATION_ALIGNMENT`.
    const NATURAL_ALIGNMENT: PowerOf2 = unsafe { PowerOf2::new_unchecked(2 * mem::size_of::<usize>()) };

    fn create(&self) -> Option<WindowsHeap> {
        //  Safety:
        //  -   No flag, in particular not `HEAP_NO_SERIALIZE`.
        let handle = unsafe { HeapCreate(0, C::INITIAL_SIZE, C::MAXIMUM_SIZE) };

        if handle.is_null() {
            //  Safety:
            //  -   Always safe to call.
            let error = unsafe { GetLastError() };

            log::error!("HeapCreate({}, {}) failed: error {}", C::INITIAL_SIZE, C::MAXIMUM_SIZE, error);

            return None;
        }

        Some(WindowsHeap(handle))
    }

    unsafe fn allocate(&self, handle: &WindowsHeap, size: usize) -> Option<NonNull<u8>> {
        NonNull::new(HeapAlloc(handle.0, 0, size).cast())
    }

    unsafe fn deallocate(&self, handle: &WindowsHeap, pointer: NonNull<u8>) {
        let result = HeapFree(handle.0, 0, pointer.as_ptr().cast_const().cast());

        debug_assert!(result != 0, "HeapFree failed: error {}", GetLastError());
    }

    unsafe fn destroy(&self, handle: WindowsHeap) {
        if HeapDestroy(handle.0) == 0 {
            log::error!("HeapDestroy failed: error {}", GetLastError());
        }
    }
}

//! Deleters, and the owning pointer using them.
//!
//! A deleter knows how to release a block it did not allocate, by re-creating the allocator which did. As allocators
//! are stateless, so are deleters, and a `Unique` is no larger than a raw pointer.

use core::{
    fmt,
    marker::PhantomData,
    mem::ManuallyDrop,
    ops::{Deref, DerefMut},
    ptr::{self, NonNull},
};

use crate::{AlignedAllocator, DefaultAllocator, HeapSource};

/// Releases the storage of a value, once it has been destroyed.
pub trait Deleter<T: ?Sized> {
    /// Releases the storage at `pointer`.
    ///
    /// #   Safety
    ///
    /// -   Assumes `pointer` was allocated by the allocator matching this deleter.
    /// -   Assumes the value at `pointer` was already destroyed, and the storage is no longer in use.
    unsafe fn delete(&self, pointer: NonNull<T>);
}

/// Releases storage obtained from a `DefaultAllocator` over the heap named by `H`.
pub struct HeapDeleter<H> {
    _marker: PhantomData<fn() -> H>,
}

impl<H> HeapDeleter<H> {
    /// Creates an instance.
    pub const fn new() -> Self { Self { _marker: PhantomData } }
}

impl<T, H: HeapSource> Deleter<T> for HeapDeleter<H> {
    unsafe fn delete(&self, pointer: NonNull<T>) {
        DefaultAllocator::<T, H>::new().deallocate(pointer, 1);
    }
}

impl<T, H: HeapSource> Deleter<[T]> for HeapDeleter<H> {
    unsafe fn delete(&self, pointer: NonNull<[T]>) {
        let len = pointer.len();

        if len == 0 {
            return;
        }

        DefaultAllocator::<T, H>::new().deallocate(pointer.cast(), len);
    }
}

impl<H> Clone for HeapDeleter<H> {
    fn clone(&self) -> Self { *self }
}

impl<H> Copy for HeapDeleter<H> {}

impl<H> Default for HeapDeleter<H> {
    fn default() -> Self { Self::new() }
}

impl<H> fmt::Debug for HeapDeleter<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("HeapDeleter") }
}

/// Releases storage obtained from an `AlignedAllocator` with minimum alignment `A`, over the heap named by `H`.
pub struct AlignedDeleter<const A: usize, H> {
    _marker: PhantomData<fn() -> H>,
}

impl<const A: usize, H> AlignedDeleter<A, H> {
    /// Creates an instance.
    pub const fn new() -> Self { Self { _marker: PhantomData } }
}

impl<T, const A: usize, H: HeapSource> Deleter<T> for AlignedDeleter<A, H> {
    unsafe fn delete(&self, pointer: NonNull<T>) {
        AlignedAllocator::<T, A, H>::new().deallocate(pointer, 1);
    }
}

impl<T, const A: usize, H: HeapSource> Deleter<[T]> for AlignedDeleter<A, H> {
    unsafe fn delete(&self, pointer: NonNull<[T]>) {
        let len = pointer.len();

        if len == 0 {
            return;
        }

        AlignedAllocator::<T, A, H>::new().deallocate(pointer.cast(), len);
    }
}

impl<const A: usize, H> Clone for AlignedDeleter<A, H> {
    fn clone(&self) -> Self { *self }
}

impl<const A: usize, H> Copy for AlignedDeleter<A, H> {}

impl<const A: usize, H> Default for AlignedDeleter<A, H> {
    fn default() -> Self { Self::new() }
}

impl<const A: usize, H> fmt::Debug for AlignedDeleter<A, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "AlignedDeleter<{}>", A) }
}

/// Unique
///
/// Owns a value, and its storage: on drop, the value is destroyed, then its storage is handed to the deleter.
pub struct Unique<T: ?Sized, D: Deleter<T>> {
    pointer: NonNull<T>,
    deleter: D,
    _owned: PhantomData<T>,
}

impl<T: ?Sized, D: Deleter<T>> Unique<T, D> {
    /// Takes ownership of the value at `pointer`.
    ///
    /// #   Safety
    ///
    /// -   Assumes `pointer` points to a live value, whose storage can be released by `deleter`.
    /// -   Assumes nothing else owns the value, or its storage.
    pub unsafe fn from_raw(pointer: NonNull<T>, deleter: D) -> Self {
        Self { pointer, deleter, _owned: PhantomData }
    }

    /// Releases ownership of the value, and its storage, to the caller.
    pub fn into_raw(self) -> (NonNull<T>, D) {
        let this = ManuallyDrop::new(self);

        //  Safety:
        //  -   `this` is never dropped, hence `deleter` is moved out exactly once.
        let deleter = unsafe { ptr::read(&this.deleter) };

        (this.pointer, deleter)
    }

    /// Returns a pointer to the value.
    pub fn as_ptr(&self) -> *mut T { self.pointer.as_ptr() }

    /// Returns the deleter.
    pub fn deleter(&self) -> &D { &self.deleter }
}

impl<T: ?Sized, D: Deleter<T>> Deref for Unique<T, D> {
    type Target = T;

    fn deref(&self) -> &T {
        //  Safety:
        //  -   The value is live, and owned by `self`.
        unsafe { self.pointer.as_ref() }
    }
}

impl<T: ?Sized, D: Deleter<T>> DerefMut for Unique<T, D> {
    fn deref_mut(&mut self) -> &mut T {
        //  Safety:
        //  -   The value is live, and exclusively owned by `self`.
        unsafe { self.pointer.as_mut() }
    }
}

impl<T: ?Sized, D: Deleter<T>> Drop for Unique<T, D> {
    fn drop(&mut self) {
        //  Safety:
        //  -   The value is live, and owned by `self`, hence may be destroyed.
        //  -   The storage was allocated by the allocator matching `deleter`, as per `from_raw`.
        unsafe {
            ptr::drop_in_place(self.pointer.as_ptr());
            self.deleter.delete(self.pointer);
        }
    }
}

impl<T: ?Sized + fmt::Debug, D: Deleter<T>> fmt::Debug for Unique<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Debug::fmt(&**self, f) }
}

//  Safety:
//  -   `Unique` owns its value, as a `Box` does.
unsafe impl<T: ?Sized + Send, D: Deleter<T> + Send> Send for Unique<T, D> {}

//  Safety:
//  -   `Unique` only hands out shared references to its value from a shared reference to itself.
unsafe impl<T: ?Sized + Sync, D: Deleter<T> + Sync> Sync for Unique<T, D> {}

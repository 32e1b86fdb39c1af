//! Default Allocator.
//!
//! The Default Allocator hands out blocks of its heap source, relying on the natural alignment of the heap. It has
//! no state of its own: all instances sharing a heap source are interchangeable, whatever their element type.
//!
//! Element types requiring more than the natural alignment of the heap are rejected by the typed interface; they are
//! served by `AlignedAllocator`, or by containers going through the `Allocator` implementation, which know the layout
//! of the block on deallocation.

use core::{fmt, marker::PhantomData, mem, ptr::{self, NonNull}};

use allocator_api2::alloc::{AllocError, Allocator, Layout};
use bytemuck::Zeroable;

use crate::{AllocationError, HeapDeleter, HeapSource, Platform, PowerOf2, Unique};
use crate::internals::raw;

/// Default Allocator.
///
/// Allocates arrays of `T` from the heap named by `H`.
///
/// #   Compile-time check
///
/// The typed interface (`allocate`, `deallocate`, `new_unique`, `new_zeroed_slice`) requires `T` to be satisfied by
/// the natural alignment of the heap; use an `AlignedAllocator` for over-aligned elements. The `Allocator`
/// implementation accepts any layout.
pub struct DefaultAllocator<T, H> {
    _marker: PhantomData<fn() -> (T, H)>,
}

impl<T, H> DefaultAllocator<T, H> {
    /// Creates an instance.
    pub const fn new() -> Self { Self { _marker: PhantomData } }

    /// Returns the equivalent allocator, for elements of type `U`.
    pub fn rebind<U>(self) -> DefaultAllocator<U, H> { DefaultAllocator::new() }

    /// Returns the maximum number of elements which may be requested from `allocate`.
    pub const fn max_size(&self) -> usize {
        match mem::size_of::<T>() {
            0 => usize::MAX,
            size => usize::MAX / size,
        }
    }
}

impl<T, H> DefaultAllocator<T, H>
    where
        H: HeapSource,
{
    //  A block of over-aligned elements would need a stash, which an allocator of another element type cannot find.
    const NATURALLY_ALIGNED: () = assert!(
        mem::align_of::<T>() <= <H::Platform as Platform>::NATURAL_ALIGNMENT.value(),
        "element type is over-aligned for the heap, use an AlignedAllocator"
    );

    /// Allocates storage for `count` elements of type `T`, left uninitialized.
    ///
    /// Returns None if `count` is 0, without calling into the heap.
    ///
    /// #   Errors
    ///
    /// -   `LengthTooLong` if `count` exceeds `max_size()`; the heap is not called.
    /// -   `OutOfMemory` if the heap cannot satisfy the request.
    pub fn allocate(&self, count: usize) -> Result<Option<NonNull<T>>, AllocationError> {
        let () = Self::NATURALLY_ALIGNED;

        if count == 0 {
            return Ok(None);
        }

        let max = self.max_size();

        if count > max {
            return Err(AllocationError::LengthTooLong { count, max });
        }

        if mem::size_of::<T>() == 0 {
            return Ok(Some(NonNull::dangling()));
        }

        let size = count * mem::size_of::<T>();

        let pointer = H::heap().allocate(size).ok_or_else(|| raw::out_of_memory(size))?;

        Ok(Some(pointer.cast()))
    }

    /// Allocates storage for `count` elements of type `T`, as `allocate`.
    ///
    /// The locality `hint` is ignored.
    pub fn allocate_with_hint(&self, count: usize, hint: *const T) -> Result<Option<NonNull<T>>, AllocationError> {
        let _ = hint;

        self.allocate(count)
    }

    /// Deallocates the storage located at `pointer`.
    ///
    /// The heap tracks the size of its blocks, hence `count` is ignored.
    ///
    /// #   Safety
    ///
    /// -   Assumes `pointer` has been returned by a prior call to `allocate` on an allocator equal to `self`.
    /// -   Assumes `pointer` has not been deallocated since its allocation.
    /// -   Assumes the memory pointed by `pointer` is no longer in use.
    pub unsafe fn deallocate(&self, pointer: NonNull<T>, count: usize) {
        let () = Self::NATURALLY_ALIGNED;
        let _ = count;

        if mem::size_of::<T>() == 0 {
            return;
        }

        H::heap().deallocate(pointer.cast());
    }

    /// Moves `value` into the uninitialized storage at `pointer`.
    ///
    /// #   Safety
    ///
    /// -   Assumes `pointer` is valid for writes, and suitably aligned.
    /// -   Assumes any previous value at `pointer` was destroyed, or never existed.
    pub unsafe fn construct(&self, pointer: NonNull<T>, value: T) { pointer.as_ptr().write(value) }

    /// Writes the default value of `T` into the uninitialized storage at `pointer`.
    ///
    /// #   Safety
    ///
    /// -   Same as `construct`.
    pub unsafe fn construct_default(&self, pointer: NonNull<T>)
        where
            T: Default,
    {
        self.construct(pointer, T::default())
    }

    /// Runs the destructor of the value at `pointer`, without deallocating its storage.
    ///
    /// #   Safety
    ///
    /// -   Assumes `pointer` points to a live value, which is not used afterwards.
    pub unsafe fn destroy(&self, pointer: NonNull<T>) { ptr::drop_in_place(pointer.as_ptr()) }

    /// Moves `value` into a single-element block, owned by the returned pointer.
    pub fn new_unique(&self, value: T) -> Result<Unique<T, HeapDeleter<H>>, AllocationError> {
        let pointer = self.allocate(1)?.unwrap_or(NonNull::dangling());

        //  Safety:
        //  -   `pointer` points to storage for one `T`, freshly allocated.
        //  -   The value is initialized, and the storage was allocated by a `DefaultAllocator<T, H>`.
        unsafe {
            self.construct(pointer, value);
            Ok(Unique::from_raw(pointer, HeapDeleter::new()))
        }
    }

    /// Allocates a block of `len` zeroed elements, owned by the returned pointer.
    ///
    /// An empty slice is not backed by any block.
    pub fn new_zeroed_slice(&self, len: usize) -> Result<Unique<[T], HeapDeleter<H>>, AllocationError>
        where
            T: Zeroable,
    {
        let pointer = self.allocate(len)?.unwrap_or(NonNull::dangling());

        //  Safety:
        //  -   `pointer` points to storage for `len` elements, or is dangling if `len` is 0.
        //  -   All-zeroes is a valid `T`, as per `Zeroable`.
        unsafe {
            ptr::write_bytes(pointer.as_ptr(), 0, len);

            Ok(Unique::from_raw(NonNull::slice_from_raw_parts(pointer, len), HeapDeleter::new()))
        }
    }
}

impl<T, H> Clone for DefaultAllocator<T, H> {
    fn clone(&self) -> Self { *self }
}

impl<T, H> Copy for DefaultAllocator<T, H> {}

impl<T, H> Default for DefaultAllocator<T, H> {
    fn default() -> Self { Self::new() }
}

impl<T, H> fmt::Debug for DefaultAllocator<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DefaultAllocator<{}>", core::any::type_name::<T>())
    }
}

//  All instances share the one heap named by `H`.
impl<T, U, H> PartialEq<DefaultAllocator<U, H>> for DefaultAllocator<T, H> {
    fn eq(&self, _: &DefaultAllocator<U, H>) -> bool { true }
}

impl<T, H> Eq for DefaultAllocator<T, H> {}

//  Safety:
//  -   Blocks are owned by the heap named by `H`, not by the instance, hence remain valid across copies and moves.
//  -   Any copy may deallocate the blocks of another, as they all deallocate to the same heap, and the stash of an
//      over-aligned block is found again from the layout.
unsafe impl<T, H> Allocator for DefaultAllocator<T, H>
    where
        H: HeapSource,
{
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        //  Safety:
        //  -   The alignment of a layout is always a power of 2.
        let alignment = unsafe { PowerOf2::new_unchecked(layout.align()) };

        if layout.size() == 0 {
            return Ok(NonNull::slice_from_raw_parts(raw::dangling(alignment), 0));
        }

        let pointer = raw::allocate(H::heap(), layout.size(), alignment).map_err(|_| AllocError)?;

        Ok(NonNull::slice_from_raw_parts(pointer, layout.size()))
    }

    unsafe fn deallocate(&self, pointer: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }

        raw::deallocate(H::heap(), pointer, PowerOf2::new_unchecked(layout.align()));
    }
}

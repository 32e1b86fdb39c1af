//! Aligned Allocator.
//!
//! The Aligned Allocator aligns its blocks on the maximum of a minimum alignment `A` and the alignment of `T`, the
//! effective alignment, whatever the natural alignment of the heap.
//!
//! Every block is over-allocated, and the address of the underlying heap block is stashed just before the pointer
//! handed out, to be recovered on deallocation.

use core::{fmt, marker::PhantomData, mem, ptr::{self, NonNull}};

use allocator_api2::alloc::{AllocError, Allocator, Layout};
use bytemuck::Zeroable;

use crate::{AlignedDeleter, AllocationError, HeapSource, PowerOf2, Unique};
use crate::internals::{raw, stash};

/// Aligned Allocator.
///
/// Allocates arrays of `T` from the heap named by `H`, aligned on `max(align_of::<T>(), A)`.
///
/// An `A` of 0 requests the alignment of `T`.
///
/// #   Compile-time check
///
/// The effective alignment must be a power of 2, or the allocator cannot be created:
///
/// ```compile_fail,E0080
/// use privheap_core::AlignedAllocator;
///
/// //  error[E0080]: the maximum of `A` and the alignment of `T` must be a power of 2
/// let allocator = AlignedAllocator::<u8, 24, ()>::new();
/// ```
///
/// The check holds whatever the element type, as soon as the effective alignment is evaluated:
///
/// ```compile_fail,E0080
/// use privheap_core::{AlignedAllocator, PowerOf2};
///
/// const ALIGNMENT: PowerOf2 = AlignedAllocator::<u64, 12, ()>::ALIGNMENT;
/// ```
///
/// ```
/// use privheap_core::{AlignedAllocator, PowerOf2};
///
/// const ALIGNMENT: PowerOf2 = AlignedAllocator::<u64, 4, ()>::ALIGNMENT;
///
/// assert_eq!(8, ALIGNMENT.value());
/// ```
///
/// ```
/// use privheap_core::AlignedAllocator;
///
/// let allocator = AlignedAllocator::<u8, 32, ()>::new();
///
/// assert_eq!(32, allocator.alignment());
/// ```
pub struct AlignedAllocator<T, const A: usize, H> {
    _marker: PhantomData<fn() -> (T, H)>,
}

impl<T, const A: usize, H> AlignedAllocator<T, A, H> {
    /// The effective alignment, `max(align_of::<T>(), A)`.
    pub const ALIGNMENT: PowerOf2 = effective_alignment(mem::align_of::<T>(), A);

    /// Creates an instance.
    pub const fn new() -> Self {
        let _alignment = Self::ALIGNMENT;

        Self { _marker: PhantomData }
    }

    /// Returns the equivalent allocator, for elements of type `U`.
    ///
    /// The effective alignment of the result accounts for the alignment of `U`.
    pub fn rebind<U>(self) -> AlignedAllocator<U, A, H> { AlignedAllocator::new() }

    /// Returns the effective alignment.
    pub const fn alignment(&self) -> usize { Self::ALIGNMENT.value() }

    /// Returns the maximum number of elements which may be requested from `allocate`.
    ///
    /// Accounts for the space needed to align the block, and stash its address.
    pub const fn max_size(&self) -> usize {
        let available = usize::MAX - stash::overhead(Self::ALIGNMENT);

        match mem::size_of::<T>() {
            0 => usize::MAX,
            size => available / size,
        }
    }
}

impl<T, const A: usize, H> AlignedAllocator<T, A, H>
    where
        H: HeapSource,
{
    /// Allocates storage for `count` elements of type `T`, left uninitialized, aligned on `ALIGNMENT`.
    ///
    /// Returns None if `count` is 0, without calling into the heap.
    ///
    /// #   Errors
    ///
    /// -   `LengthTooLong` if `count` exceeds `max_size()`; the heap is not called.
    /// -   `OutOfMemory` if the heap cannot satisfy the request.
    pub fn allocate(&self, count: usize) -> Result<Option<NonNull<T>>, AllocationError> {
        if count == 0 {
            return Ok(None);
        }

        let max = self.max_size();

        if count > max {
            return Err(AllocationError::LengthTooLong { count, max });
        }

        let size = count * mem::size_of::<T>();

        stash::allocate(H::heap(), size, Self::ALIGNMENT).map(|pointer| Some(pointer.cast()))
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
    /// The heap block is recovered from the stash preceding `pointer`, hence `count` is ignored.
    ///
    /// #   Safety
    ///
    /// -   Assumes `pointer` has been returned by a prior call to `allocate` on an allocator equal to `self`.
    /// -   Assumes `pointer` has not been deallocated since its allocation.
    /// -   Assumes the memory pointed by `pointer` is no longer in use.
    pub unsafe fn deallocate(&self, pointer: NonNull<T>, count: usize) {
        let _ = count;

        stash::deallocate(H::heap(), pointer.cast());
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

    /// Moves `value` into a single-element aligned block, owned by the returned pointer.
    pub fn new_unique(&self, value: T) -> Result<Unique<T, AlignedDeleter<A, H>>, AllocationError> {
        let pointer = self.allocate_non_empty(1)?;

        //  Safety:
        //  -   `pointer` points to storage for one `T`, freshly allocated.
        //  -   The value is initialized, and the storage was allocated by an `AlignedAllocator<T, A, H>`.
        unsafe {
            self.construct(pointer, value);
            Ok(Unique::from_raw(pointer, AlignedDeleter::new()))
        }
    }

    /// Allocates an aligned block of `len` zeroed elements, owned by the returned pointer.
    ///
    /// An empty slice is not backed by any block.
    pub fn new_zeroed_slice(&self, len: usize) -> Result<Unique<[T], AlignedDeleter<A, H>>, AllocationError>
        where
            T: Zeroable,
    {
        let pointer = if len == 0 { raw::dangling(Self::ALIGNMENT).cast() } else { self.allocate_non_empty(len)? };

        //  Safety:
        //  -   `pointer` points to storage for `len` elements, or is dangling if `len` is 0.
        //  -   All-zeroes is a valid `T`, as per `Zeroable`.
        unsafe {
            ptr::write_bytes(pointer.as_ptr(), 0, len);

            Ok(Unique::from_raw(NonNull::slice_from_raw_parts(pointer, len), AlignedDeleter::new()))
        }
    }

    fn allocate_non_empty(&self, count: usize) -> Result<NonNull<T>, AllocationError> {
        debug_assert!(count > 0);

        self.allocate(count).map(|pointer| pointer.unwrap_or(NonNull::dangling()))
    }
}

impl<T, const A: usize, H> Clone for AlignedAllocator<T, A, H> {
    fn clone(&self) -> Self { *self }
}

impl<T, const A: usize, H> Copy for AlignedAllocator<T, A, H> {}

impl<T, const A: usize, H> Default for AlignedAllocator<T, A, H> {
    fn default() -> Self { Self::new() }
}

impl<T, const A: usize, H> fmt::Debug for AlignedAllocator<T, A, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AlignedAllocator<{}, {}>", core::any::type_name::<T>(), self.alignment())
    }
}

//  The effective alignment already folds in the alignment of the element type.
impl<T, U, const A: usize, const B: usize, H> PartialEq<AlignedAllocator<U, B, H>> for AlignedAllocator<T, A, H> {
    fn eq(&self, _: &AlignedAllocator<U, B, H>) -> bool {
        Self::ALIGNMENT == AlignedAllocator::<U, B, H>::ALIGNMENT
    }
}

impl<T, const A: usize, H> Eq for AlignedAllocator<T, A, H> {}

//  Safety:
//  -   Blocks are owned by the heap named by `H`, not by the instance, hence remain valid across copies and moves.
//  -   Any copy may deallocate the blocks of another, as the underlying block is recovered from the stash.
unsafe impl<T, const A: usize, H> Allocator for AlignedAllocator<T, A, H>
    where
        H: HeapSource,
{
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        //  Safety:
        //  -   The alignment of a layout is always a power of 2.
        let alignment = unsafe { PowerOf2::new_unchecked(layout.align()) }.max(Self::ALIGNMENT);

        if layout.size() == 0 {
            return Ok(NonNull::slice_from_raw_parts(raw::dangling(alignment), 0));
        }

        let pointer = stash::allocate(H::heap(), layout.size(), alignment).map_err(|_| AllocError)?;

        Ok(NonNull::slice_from_raw_parts(pointer, layout.size()))
    }

    unsafe fn deallocate(&self, pointer: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }

        stash::deallocate(H::heap(), pointer);
    }
}

//  Computes the effective alignment, failing compilation if it is not a power of 2.
const fn effective_alignment(natural: usize, minimum: usize) -> PowerOf2 {
    let alignment = if natural >= minimum { natural } else { minimum };

    match PowerOf2::new(alignment) {
        Some(alignment) => alignment,
        None => panic!("the maximum of `A` and the alignment of `T` must be a power of 2"),
    }
}

#[cfg(test)]
mod tests {

use allocator_api2::vec::Vec as HeapVec;

use crate::test::test_heap_source;
use crate::utils::is_sufficiently_aligned_for;

use super::*;

#[test]
fn aligned_allocator_effective_alignment() {
    assert_eq!(8, AlignedAllocator::<u8, 8, ()>::ALIGNMENT.value());
    assert_eq!(mem::align_of::<u64>(), AlignedAllocator::<u64, 1, ()>::ALIGNMENT.value());
    assert_eq!(mem::align_of::<u32>(), AlignedAllocator::<u32, 0, ()>::ALIGNMENT.value());
    assert_eq!(4096, AlignedAllocator::<u32, 4096, ()>::ALIGNMENT.value());
}

#[test]
fn aligned_allocator_max_size() {
    let overhead = 64 - 1 + mem::size_of::<usize>();

    assert_eq!(usize::MAX - overhead, AlignedAllocator::<u8, 64, ()>::new().max_size());
    assert_eq!((usize::MAX - overhead) / 16, AlignedAllocator::<[u8; 16], 64, ()>::new().max_size());
    assert_eq!(usize::MAX, AlignedAllocator::<(), 64, ()>::new().max_size());
}

#[test]
fn aligned_allocator_allocate_zero() {
    test_heap_source!(Source);

    let allocator = AlignedAllocator::<u64, 64, Source>::new();

    assert_eq!(Ok(None), allocator.allocate(0));

    assert!(!Source::heap().is_created());
    assert_eq!(0, Source::heap().platform().allocations());
}

#[test]
fn aligned_allocator_allocate_too_long() {
    test_heap_source!(Source);

    let allocator = AlignedAllocator::<u16, 32, Source>::new();
    let max = allocator.max_size();

    assert_eq!(Err(AllocationError::LengthTooLong { count: usize::MAX, max }), allocator.allocate(usize::MAX));

    //  Would fit without the overhead.
    assert_eq!(Err(AllocationError::LengthTooLong { count: usize::MAX / 2, max }), allocator.allocate(usize::MAX / 2));

    assert_eq!(0, Source::heap().platform().allocations());
}

#[test]
fn aligned_allocator_out_of_memory() {
    test_heap_source!(Source);

    Source::heap().platform().refuse_allocations();

    let allocator = AlignedAllocator::<u32, 64, Source>::new();

    assert_eq!(
        Err(AllocationError::OutOfMemory { size: 40 + stash::overhead(AlignedAllocator::<u32, 64, Source>::ALIGNMENT) }),
        allocator.allocate(10)
    );
}

#[test]
fn aligned_allocator_alignment_fuzzing() {
    //  Every pointer is aligned, whatever the alignment requested and the size of the allocation.
    fn check<T, const A: usize>() {
        test_heap_source!(Source);

        let allocator = AlignedAllocator::<T, A, Source>::new();
        let alignment = AlignedAllocator::<T, A, Source>::ALIGNMENT;

        let pointers: Vec<_> = (1..=33)
            .map(|count| (allocator.allocate(count).unwrap().expect("Non-null"), count))
            .collect();

        for (pointer, _) in &pointers {
            assert!(is_sufficiently_aligned_for(pointer.as_ptr() as usize, alignment),
                "{:x} not {}-aligned", pointer.as_ptr() as usize, alignment.value());
        }

        for (pointer, count) in pointers {
            unsafe { allocator.deallocate(pointer, count) };
        }

        assert!(Source::heap().platform().live_addresses().is_empty());
    }

    check::<u8, 1>();
    check::<u8, 2>();
    check::<u8, 64>();
    check::<u16, 8>();
    check::<u32, 0>();
    check::<u64, 32>();
    check::<u64, 4096>();
    check::<[u8; 3], 16>();
    check::<(), 128>();
}

#[test]
fn aligned_allocator_frees_raw_block() {
    test_heap_source!(Source);

    let platform = Source::heap().platform();
    let allocator = AlignedAllocator::<u8, 256, Source>::new();

    let first = allocator.allocate(100).unwrap().expect("Non-null");
    let second = allocator.allocate(7).unwrap().expect("Non-null");

    let raws = platform.live_addresses();
    assert_eq!(2, raws.len());
    assert!(!raws.contains(&(first.as_ptr() as usize)));
    assert!(!raws.contains(&(second.as_ptr() as usize)));

    unsafe {
        allocator.deallocate(second, 7);
        allocator.deallocate(first, 100);
    }

    assert_eq!(vec![raws[1], raws[0]], platform.freed_addresses());
}

#[test]
fn aligned_allocator_does_not_corrupt_neighbours() {
    test_heap_source!(Source);

    let allocator = AlignedAllocator::<u64, 64, Source>::new();

    let blocks: Vec<_> = (1..=8).map(|i| (allocator.allocate(i).unwrap().expect("Non-null"), i)).collect();

    for (pointer, count) in &blocks {
        for j in 0..*count {
            unsafe { pointer.as_ptr().add(j).write(u64::MAX) };
        }
    }

    //  Releasing every other block leaves the others, and their stash, untouched.
    for (pointer, count) in blocks.iter().step_by(2) {
        unsafe { allocator.deallocate(*pointer, *count) };
    }

    for (pointer, count) in blocks.iter().skip(1).step_by(2) {
        for j in 0..*count {
            assert_eq!(u64::MAX, unsafe { pointer.as_ptr().add(j).read() });
        }

        unsafe { allocator.deallocate(*pointer, *count) };
    }

    assert!(Source::heap().platform().live_addresses().is_empty());
}

#[test]
fn aligned_allocator_equality() {
    test_heap_source!(Source);

    let bytes_16 = AlignedAllocator::<u8, 16, Source>::new();
    let words_16 = AlignedAllocator::<u64, 16, Source>::new();
    let words_8 = AlignedAllocator::<u64, 8, Source>::new();
    let words_1 = AlignedAllocator::<u64, 1, Source>::new();
    let bytes_64 = AlignedAllocator::<u8, 64, Source>::new();

    assert!(bytes_16 == words_16);
    assert!(words_8 == words_1);
    assert!(bytes_16 != bytes_64);
    assert!(words_16 != words_8);

    //  Rebinding may change the effective alignment.
    let bytes_1 = AlignedAllocator::<u8, 1, Source>::new();

    assert_eq!(1, bytes_1.alignment());
    assert!(bytes_1.rebind::<u64>() == words_1);
    assert!(bytes_1 != words_1);
}

#[test]
fn aligned_allocator_new_unique() {
    test_heap_source!(Source);

    let allocator = AlignedAllocator::<String, 128, Source>::new();

    let unique = allocator.new_unique(String::from("Aligned")).expect("Allocated");

    assert_eq!("Aligned", unique.as_str());
    assert_eq!(0, unique.as_ptr() as *const u8 as usize % 128);

    drop(unique);

    assert!(Source::heap().platform().live_addresses().is_empty());
}

#[test]
fn aligned_allocator_new_zeroed_slice() {
    test_heap_source!(Source);

    let allocator = AlignedAllocator::<u32, 64, Source>::new();

    let buffer = allocator.new_zeroed_slice(17).expect("Allocated");

    assert_eq!(17, buffer.len());
    assert!(buffer.iter().all(|x| *x == 0));
    assert_eq!(0, buffer.as_ptr() as *const u32 as usize % 64);

    drop(buffer);

    let empty = allocator.new_zeroed_slice(0).expect("Allocated");

    assert!(empty.is_empty());
    assert_eq!(0, empty.as_ptr() as *const u32 as usize % 64);

    drop(empty);

    assert_eq!(1, Source::heap().platform().allocations());
    assert_eq!(1, Source::heap().platform().deallocations());
}

#[test]
fn aligned_allocator_in_container() {
    test_heap_source!(Source);

    let mut vec = HeapVec::new_in(AlignedAllocator::<u8, 512, Source>::new());

    for i in 0..=255u8 {
        vec.push(i);
        assert_eq!(0, vec.as_ptr() as usize % 512);
    }

    vec.shrink_to_fit();

    assert_eq!(0, vec.as_ptr() as usize % 512);
    assert_eq!(255, vec[255]);

    drop(vec);

    assert!(Source::heap().platform().live_addresses().is_empty());
}

#[test]
fn aligned_allocator_layout_over_aligned() {
    test_heap_source!(Source);

    let allocator = AlignedAllocator::<u8, 16, Source>::new();
    let layout = Layout::from_size_align(24, 1024).unwrap();

    let block = Allocator::allocate(&allocator, layout).expect("Allocated");

    assert_eq!(24, block.len());
    assert_eq!(0, block.cast::<u8>().as_ptr() as usize % 1024);

    unsafe { Allocator::deallocate(&allocator, block.cast(), layout) };

    assert!(Source::heap().platform().live_addresses().is_empty());
}

}

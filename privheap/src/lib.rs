#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

//! A process-wide private heap, with plain and aligned allocators on top.
//!
//! All allocators of this crate draw from a single heap, `ProcessHeap`, distinct from the default heap of the process
//! on platforms which support it. The heap is created on first use, and lives until the process exits.
//!
//! ```
//! use privheap::{AlignedAllocator, DefaultAllocator, HeapVec};
//!
//! let mut vec = HeapVec::new_in(DefaultAllocator::new());
//! vec.extend_from_slice(b"Hello");
//!
//! let aligned = AlignedAllocator::<u8, 64>::new();
//! let block = aligned.allocate(100).expect("Allocated").expect("Non-empty");
//!
//! assert_eq!(0, block.as_ptr() as usize % 64);
//!
//! unsafe { aligned.deallocate(block, 100) };
//! ```

mod platform;

pub use privheap_core::{
    AllocationError, ByPointee, Configuration, Deleter, Discipline, Exclusive, ExclusiveGuard, HeapSource, LockGuard,
    PHConfiguration, Platform, Pointer, PointeeEq, PointeeHash, PowerOf2, PrivateHeap, RawSharedLock, Shared,
    SharedGuard, SpinRwLock, Unique,
};

pub use platform::PHPlatform;

static PROCESS_HEAP: PrivateHeap<PHPlatform> = PrivateHeap::new(PHPlatform::new());

/// The process-wide private heap.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessHeap;

impl ProcessHeap {
    /// Returns whether the heap was created, that is whether any allocation was requested from it yet.
    pub fn is_created() -> bool { PROCESS_HEAP.is_created() }
}

impl HeapSource for ProcessHeap {
    type Platform = PHPlatform;

    fn heap() -> &'static PrivateHeap<PHPlatform> { &PROCESS_HEAP }
}

/// Allocator of arrays of `T`, from the process heap.
///
/// Elements requiring more than the natural alignment of the heap cannot be allocated through the typed interface:
///
/// ```compile_fail,E0080
/// #[repr(align(4096))]
/// struct Page([u8; 4096]);
///
/// let allocator = privheap::DefaultAllocator::<Page>::new();
///
/// let _ = allocator.allocate(1);
/// ```
///
/// They can be through an `AlignedAllocator`, or in a container:
///
/// ```
/// #[repr(align(4096))]
/// struct Page([u8; 4096]);
///
/// let mut pages = privheap::HeapVec::new_in(privheap::DefaultAllocator::new());
/// pages.push(Page([1; 4096]));
///
/// assert_eq!(0, pages.as_ptr() as usize % 4096);
/// assert_eq!(1, pages[0].0[4095]);
/// ```
pub type DefaultAllocator<T> = privheap_core::DefaultAllocator<T, ProcessHeap>;

/// Allocator of arrays of `T`, from the process heap, aligned on `max(align_of::<T>(), A)`.
pub type AlignedAllocator<T, const A: usize> = privheap_core::AlignedAllocator<T, A, ProcessHeap>;

/// Deleter of storage obtained from a `DefaultAllocator`.
pub type HeapDeleter = privheap_core::HeapDeleter<ProcessHeap>;

/// Deleter of storage obtained from an `AlignedAllocator` with minimum alignment `A`.
pub type AlignedDeleter<const A: usize> = privheap_core::AlignedDeleter<A, ProcessHeap>;

/// A growable array, from the process heap.
pub type HeapVec<T> = allocator_api2::vec::Vec<T, DefaultAllocator<T>>;

/// A fixed-size byte buffer, from the process heap.
pub type ByteBuffer = Unique<[u8], HeapDeleter>;

/// Allocates a zeroed buffer of `len` bytes.
///
/// #   Errors
///
/// -   `LengthTooLong` if `len` exceeds the maximum size of a block.
/// -   `OutOfMemory` if the heap cannot satisfy the request.
pub fn byte_buffer(len: usize) -> Result<ByteBuffer, AllocationError> {
    DefaultAllocator::<u8>::new().new_zeroed_slice(len)
}

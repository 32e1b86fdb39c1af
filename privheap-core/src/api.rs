//! The API of privheap-core.

mod aligned_allocator;
mod configuration;
mod default_allocator;
mod deleter;
mod error;
mod heap;
mod lock;
mod platform;
mod pointee;

pub use aligned_allocator::AlignedAllocator;
pub use configuration::{Configuration, PHConfiguration};
pub use default_allocator::DefaultAllocator;
pub use deleter::{AlignedDeleter, Deleter, HeapDeleter, Unique};
pub use error::AllocationError;
pub use heap::{HeapSource, PrivateHeap};
pub use lock::{Discipline, Exclusive, ExclusiveGuard, LockGuard, RawSharedLock, Shared, SharedGuard, SpinRwLock};
pub use platform::Platform;
pub use pointee::{ByPointee, Pointer, PointeeEq, PointeeHash};

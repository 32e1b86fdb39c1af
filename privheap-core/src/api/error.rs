//! Allocation errors.

use thiserror::Error;

/// Failure to allocate a block of memory.
///
/// Both variants are reported synchronously, there is no retry.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum AllocationError {
    /// The requested number of elements cannot be represented in bytes, overheads included.
    ///
    /// Raised before any request reaches the platform.
    #[error("length too long: {count} elements requested, at most {max} allowed")]
    LengthTooLong {
        /// Number of elements requested.
        count: usize,
        /// Maximum number of elements the allocator supports.
        max: usize,
    },

    /// The platform could not satisfy the request.
    #[error("out of memory: could not allocate {size} bytes")]
    OutOfMemory {
        /// Number of bytes requested from the platform.
        size: usize,
    },
}

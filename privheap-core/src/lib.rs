#![cfg_attr(not(test), no_std)]

#![deny(missing_docs)]

//! Building blocks for private-heap allocation.
//!
//! privheap-core is the platform-independent half of privheap. It contains:
//! -   A platform trait, used to create a private heap and carve blocks out of it.
//! -   A lazily created heap, and the `HeapSource` seam through which allocators reach it.
//! -   Two allocators, one relying on the natural alignment of the heap, and one guaranteeing an arbitrary
//!     power-of-2 alignment.
//! -   Deleters and an owning pointer, for buffers obtained from those allocators.
//! -   Pointee-based hashing and equality, for nullable owning pointers used as keys.
//! -   Scoped exclusive and shared lock guards over a reader-writer lock.

mod api;
mod internals;
mod utils;


pub use api::*;
pub use utils::PowerOf2;

//! The internals of privheap-core.

pub(crate) mod raw;
pub(crate) mod stash;

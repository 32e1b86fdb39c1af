//! Test support for the privheap crates.
//!
//! The lock-step runner starts a set of threads, and runs a series of steps on each, such that a given step starts on
//! all threads as simultaneously as possible. It is meant to flush out race conditions, such as racing to create a
//! heap, or to acquire a lock.

#![deny(missing_docs)]

mod lockstep;

pub use lockstep::{Lockstep, LockstepBuilder};

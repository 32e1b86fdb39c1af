//! Configuration of the private heap.

/// Sizing of a private heap, fixed at compile time.
///
/// Platforms without sizing knobs are free to ignore the configuration.
pub trait Configuration {
    /// Number of bytes committed when the heap is created.
    const INITIAL_SIZE: usize;

    /// Maximum number of bytes the heap may reserve, 0 for a growable heap.
    const MAXIMUM_SIZE: usize;
}

/// Default configuration: an initially empty, growable, heap.
#[derive(Clone, Copy, Debug, Default)]
pub struct PHConfiguration;

impl Configuration for PHConfiguration {
    const INITIAL_SIZE: usize = 0;

    const MAXIMUM_SIZE: usize = 0;
}

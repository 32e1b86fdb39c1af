//! Abstraction over OS differences.

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub use unix::PHPlatform;

#[cfg(windows)]
mod windows;

#[cfg(windows)]
pub use windows::PHPlatform;

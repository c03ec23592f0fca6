//! # Store Backends
//!
//! Implementations of the `Registry` trait:
//! - `InMemoryRegistry`: snapshot-seeded trees (tests, fixtures)
//! - `WindowsRegistry`: the OS registry (Windows only)

pub mod memory;
#[cfg(windows)]
pub mod windows_registry;

pub use memory::{InMemoryKey, InMemoryRegistry};
#[cfg(windows)]
pub use windows_registry::{WindowsKey, WindowsRegistry};

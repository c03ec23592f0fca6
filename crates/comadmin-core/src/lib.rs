//! # comadmin-core
//!
//! Classification engine for COM registrations.
//!
//! This crate answers two questions:
//! - What kind of module is this file? (`examine_file`)
//! - How is this CLSID registered? (`examine_server`)
//!
//! ## Layout
//!
//! - `registry`: the hierarchical store traits the classifiers read through
//! - `storage`: store backends (in-memory, Windows registry)
//! - `snapshot`: the indented text format that seeds in-memory stores
//! - `metadata`: the assembly metadata capability used by the file classifier,
//!   and its PE reader
//! - `types`: identifiers, hives, views and the error type
//!
//! ## Constraints
//!
//! - Read-only: nothing here writes to a store
//! - Deterministic: the same store and inputs give the same result
//! - No async, no network
//! - No `unsafe`

#![forbid(unsafe_code)]

// =============================================================================
// MODULES
// =============================================================================

pub mod examine_file;
pub mod examine_server;
pub mod metadata;
pub mod primitives;
pub mod registry;
pub mod snapshot;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{Clsid, ComAdminError, RegistryHive, RegistryView};

// =============================================================================
// RE-EXPORTS: Store
// =============================================================================

pub use registry::{Registry, RegistryKey, ValueName};
pub use snapshot::{KeyNode, parse_snapshot, print_snapshot};
pub use storage::{InMemoryKey, InMemoryRegistry};
#[cfg(windows)]
pub use storage::{WindowsKey, WindowsRegistry};

// =============================================================================
// RE-EXPORTS: Classifiers
// =============================================================================

pub use examine_file::{AssemblyDetails, FileClassification, FileType, examine_file};
pub use examine_server::{
    AssemblyInfo, AssemblyVersionMap, ServerInfo, ServerRegistration, ServerType, examine_server,
};
pub use metadata::{
    AssemblyProbe, AssemblyVersion, InMemoryMetadata, ModuleMetadata, PeMetadata,
    ProcessorArchitecture, UnavailableMetadata,
};

//! # Registry Primitives
//!
//! Fixed key names, value names and sentinels read by the classifiers.
//!
//! These literals describe the shape COM servers are registered with under
//! `HKEY_CLASSES_ROOT\CLSID`. They are compiled in and never configurable.

// =============================================================================
// KEY NAMES
// =============================================================================

/// Key under the classes root holding one subkey per registered class.
pub const KEY_NAME_CLASSES: &str = "CLSID";

/// Subkey of a class key naming the in-process server module.
pub const KEY_NAME_INPROC_SERVER32: &str = "InprocServer32";

/// Subkey of `InprocServer32` holding a .NET Core server's ProgId.
pub const KEY_NAME_PROG_ID: &str = "ProgId";

// =============================================================================
// VALUE NAMES
// =============================================================================

pub const VALUE_NAME_THREADING_MODEL: &str = "ThreadingModel";
pub const VALUE_NAME_ASSEMBLY: &str = "Assembly";
pub const VALUE_NAME_CLASS: &str = "Class";
pub const VALUE_NAME_RUNTIME_VERSION: &str = "RuntimeVersion";
pub const VALUE_NAME_CODE_BASE: &str = "CodeBase";

// =============================================================================
// SENTINELS
// =============================================================================

/// Display name written by the .NET Core COM host for every class it registers.
///
/// This is the only evidence a registration carries that it is hosted by
/// a `.comhost.dll` proxy.
pub const CORECLR_COMHOST_SERVER: &str = "CoreCLR COMHost Server";

/// Module suffix of the .NET Framework shim. Matched case-insensitively.
pub const NET_FRAMEWORK_SHIM: &str = "mscoree.dll";

/// Prefix of target framework names for .NET Core and later. Case-sensitive.
pub const NET_CORE_FRAMEWORK_PREFIX: &str = ".NETCore";

// =============================================================================
// SNAPSHOT FORMAT
// =============================================================================

/// Name used in snapshot text for a key's unnamed default value.
pub const DEFAULT_VALUE_NAME: &str = "(Default)";

/// Indentation emitted per depth level when printing a snapshot.
pub const SNAPSHOT_INDENT: &str = "   ";

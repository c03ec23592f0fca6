//! # Core Type Definitions
//!
//! Types shared by every part of the engine:
//! - Class identifiers (`Clsid`)
//! - Store coordinates (`RegistryHive`, `RegistryView`)
//! - Error types (`ComAdminError`)

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// CLASS IDENTIFIER
// =============================================================================

/// The Class ID of a COM server.
///
/// Rendered in the braced, hyphenated, upper-case form the registry uses for
/// key names, e.g. `{93CB110F-9189-4349-BD9F-392D9A4D0096}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Clsid(pub Uuid);

impl Clsid {
    /// Wrap a UUID.
    #[must_use]
    pub const fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The name of this class's key under `HKEY_CLASSES_ROOT\CLSID`.
    #[must_use]
    pub fn to_registry_string(&self) -> String {
        self.to_string()
    }

    /// The wrapped UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for Clsid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0.braced())
    }
}

impl FromStr for Clsid {
    type Err = ComAdminError;

    /// Accepts braced, hyphenated, simple and URN forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| ComAdminError::InvalidClsid(s.to_string()))
    }
}

impl From<Uuid> for Clsid {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Serialize for Clsid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// =============================================================================
// HIVES & VIEWS
// =============================================================================

/// A predefined root of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RegistryHive {
    ClassesRoot,
    CurrentUser,
    LocalMachine,
    Users,
    CurrentConfig,
}

impl RegistryHive {
    pub const ALL: [Self; 5] = [
        Self::ClassesRoot,
        Self::CurrentUser,
        Self::LocalMachine,
        Self::Users,
        Self::CurrentConfig,
    ];

    /// The hive's top-level key name, as written in snapshots.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ClassesRoot => "HKEY_CLASSES_ROOT",
            Self::CurrentUser => "HKEY_CURRENT_USER",
            Self::LocalMachine => "HKEY_LOCAL_MACHINE",
            Self::Users => "HKEY_USERS",
            Self::CurrentConfig => "HKEY_CURRENT_CONFIG",
        }
    }

    /// Look up a hive by its top-level key name (case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|hive| hive.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for RegistryHive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A partition of the registry. Contents are independent per view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Default)]
pub enum RegistryView {
    Registry32,
    #[default]
    Registry64,
}

impl fmt::Display for RegistryView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry32 => f.write_str("Registry32"),
            Self::Registry64 => f.write_str("Registry64"),
        }
    }
}

impl FromStr for RegistryView {
    type Err = ComAdminError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "32" | "Registry32" => Ok(Self::Registry32),
            "64" | "Registry64" => Ok(Self::Registry64),
            other => Err(ComAdminError::Config(format!(
                "Unknown registry view '{}' (expected 32 or 64)",
                other
            ))),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in ComAdmin.
///
/// Classification outcomes (not registered, unknown, native, managed) are
/// never errors. These variants cover environment failures, malformed
/// input and I/O only.
#[derive(Debug, Error)]
pub enum ComAdminError {
    /// The root of a hive could not be opened for the requested view.
    #[error("Unable to open {hive} for registry view '{view}'")]
    StoreUnavailable {
        hive: RegistryHive,
        view: RegistryView,
    },

    /// The host cannot provide the requested capability.
    #[error("Platform not supported: {0}")]
    UnsupportedPlatform(String),

    /// Module metadata could not be read for a reason other than the module
    /// not being a managed image.
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// The OS registry reported a failure other than a missing key.
    #[error("Registry error: {0}")]
    Registry(String),

    /// Snapshot text could not be parsed.
    #[error("Snapshot error at line {line}: {message}")]
    Snapshot { line: usize, message: String },

    /// A key tree was given a name or value the snapshot format cannot hold.
    #[error("Invalid registry entry: {0}")]
    InvalidEntry(String),

    /// A string could not be parsed as a Class ID.
    #[error("Unable to convert '{0}' into a valid CLSID")]
    InvalidClsid(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A report could not be rendered.
    #[error("Render error: {0}")]
    Render(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

// =============================================================================
// TESTS
// =============================================================================

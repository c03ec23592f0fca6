//! # Module Metadata
//!
//! The capability the file classifier reads assemblies through.
//!
//! `ModuleMetadata` is the seam: given a path it either reports the
//! assembly's version and processor architecture or says the module is not
//! a managed image, and it reports the `TargetFrameworkAttribute` string
//! when there is one.
//!
//! Implementations:
//! - `PeMetadata`: reads PE files on disk (`pe`, `tables`)
//! - `InMemoryMetadata`: a fixed table keyed by path
//! - `UnavailableMetadata`: fails every probe with `UnsupportedPlatform`

mod pe;
mod tables;

pub use pe::PeMetadata;

use crate::ComAdminError;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

// =============================================================================
// ASSEMBLY VERSION
// =============================================================================

/// A four-part assembly version: `major.minor.build.revision`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AssemblyVersion {
    pub major: u16,
    pub minor: u16,
    pub build: u16,
    pub revision: u16,
}

impl AssemblyVersion {
    #[must_use]
    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }
}

impl fmt::Display for AssemblyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl FromStr for AssemblyVersion {
    type Err = ComAdminError;

    /// Parses two to four dot-separated parts; missing parts are zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ComAdminError::Metadata(format!("Invalid assembly version '{}'", s));

        let parts = s
            .split('.')
            .map(|part| part.trim().parse::<u16>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;
        if !(2..=4).contains(&parts.len()) {
            return Err(invalid());
        }

        let part = |i: usize| parts.get(i).copied().unwrap_or(0);
        Ok(Self::new(part(0), part(1), part(2), part(3)))
    }
}

impl Serialize for AssemblyVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// =============================================================================
// PROCESSOR ARCHITECTURE
// =============================================================================

/// The processor an assembly targets. `None` for native modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum ProcessorArchitecture {
    #[default]
    None,
    /// Architecture neutral.
    Msil,
    X86,
    Ia64,
    Amd64,
    Arm,
}

impl fmt::Display for ProcessorArchitecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "None",
            Self::Msil => "MSIL",
            Self::X86 => "X86",
            Self::Ia64 => "IA64",
            Self::Amd64 => "Amd64",
            Self::Arm => "Arm",
        };
        f.write_str(name)
    }
}

// =============================================================================
// CAPABILITY
// =============================================================================

/// Result of asking whether a module is a managed assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyProbe {
    /// The module is a managed assembly.
    Managed {
        version: AssemblyVersion,
        architecture: ProcessorArchitecture,
    },
    /// The module is not a managed image (a native DLL).
    NotManaged,
}

/// Reads assembly metadata from a module on disk.
pub trait ModuleMetadata {
    /// Identify the module. `NotManaged` is an answer, not an error; any
    /// other failure is returned as an error.
    fn probe(&self, path: &Path) -> Result<AssemblyProbe, ComAdminError>;

    /// The assembly's `TargetFrameworkAttribute` value, e.g.
    /// `.NETCoreApp,Version=v3.1`, if it declares one.
    fn target_framework(&self, path: &Path) -> Result<Option<String>, ComAdminError>;
}

// =============================================================================
// IN-MEMORY METADATA
// =============================================================================

#[derive(Debug, Clone)]
enum ModuleEntry {
    Native,
    Managed {
        version: AssemblyVersion,
        architecture: ProcessorArchitecture,
        framework: Option<String>,
    },
}

/// Module metadata from a fixed table, keyed by path.
///
/// Paths that were never added fail with `ComAdminError::Io`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetadata {
    modules: BTreeMap<PathBuf, ModuleEntry>,
}

impl InMemoryMetadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a native (non-managed) module.
    pub fn add_native(&mut self, path: impl Into<PathBuf>) {
        self.modules.insert(path.into(), ModuleEntry::Native);
    }

    /// Register a managed assembly.
    pub fn add_assembly(
        &mut self,
        path: impl Into<PathBuf>,
        version: AssemblyVersion,
        architecture: ProcessorArchitecture,
        framework: Option<&str>,
    ) {
        self.modules.insert(
            path.into(),
            ModuleEntry::Managed {
                version,
                architecture,
                framework: framework.map(str::to_string),
            },
        );
    }

    fn entry(&self, path: &Path) -> Result<&ModuleEntry, ComAdminError> {
        self.modules
            .get(path)
            .ok_or_else(|| ComAdminError::Io(format!("No module at '{}'", path.display())))
    }
}

impl ModuleMetadata for InMemoryMetadata {
    fn probe(&self, path: &Path) -> Result<AssemblyProbe, ComAdminError> {
        Ok(match self.entry(path)? {
            ModuleEntry::Native => AssemblyProbe::NotManaged,
            ModuleEntry::Managed {
                version,
                architecture,
                ..
            } => AssemblyProbe::Managed {
                version: *version,
                architecture: *architecture,
            },
        })
    }

    fn target_framework(&self, path: &Path) -> Result<Option<String>, ComAdminError> {
        Ok(match self.entry(path)? {
            ModuleEntry::Native => None,
            ModuleEntry::Managed { framework, .. } => framework.clone(),
        })
    }
}

// =============================================================================
// UNAVAILABLE METADATA
// =============================================================================

/// Fallback binding for hosts that cannot read assembly metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableMetadata;

impl UnavailableMetadata {
    fn unsupported() -> ComAdminError {
        ComAdminError::UnsupportedPlatform(
            "reading .NET assembly metadata is not available on this host".to_string(),
        )
    }
}

impl ModuleMetadata for UnavailableMetadata {
    fn probe(&self, _path: &Path) -> Result<AssemblyProbe, ComAdminError> {
        Err(Self::unsupported())
    }

    fn target_framework(&self, _path: &Path) -> Result<Option<String>, ComAdminError> {
        Err(Self::unsupported())
    }
}

// =============================================================================
// TESTS
// =============================================================================

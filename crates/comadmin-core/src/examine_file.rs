//! # Examine File
//!
//! Classifies a module on disk as a native DLL, a .NET Framework assembly or
//! a .NET Core assembly.
//!
//! The decision has two steps:
//! 1. Probe the module. A module that is not a managed image is native;
//!    every other probe failure is propagated.
//! 2. For managed modules, read the target framework. A name starting with
//!    `.NETCore` means .NET Core; anything else, including no attribute at
//!    all, means .NET Framework.

use crate::ComAdminError;
use crate::metadata::{AssemblyProbe, AssemblyVersion, ModuleMetadata, ProcessorArchitecture};
use crate::primitives::NET_CORE_FRAMEWORK_PREFIX;
use serde::Serialize;
use std::fmt;
use std::path::Path;

// =============================================================================
// RESULT TYPES
// =============================================================================

/// The kind of module identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileType {
    NativeDll,
    DotNetFrameworkAssembly,
    DotNetCoreAssembly,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NativeDll => "NativeDll",
            Self::DotNetFrameworkAssembly => "DotNetFrameworkAssembly",
            Self::DotNetCoreAssembly => "DotNetCoreAssembly",
        };
        f.write_str(name)
    }
}

/// Metadata of a managed assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssemblyDetails {
    pub version: AssemblyVersion,
    pub architecture: ProcessorArchitecture,
    /// The `TargetFrameworkAttribute` value, if declared.
    pub framework_name: Option<String>,
}

/// The classification of a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "file_type")]
pub enum FileClassification {
    /// A native Windows DLL.
    NativeModule,
    /// An assembly targeting the .NET Framework, hosted by `mscoree.dll`.
    LegacyManagedAssembly(AssemblyDetails),
    /// An assembly targeting .NET Core, hosted by a `.comhost.dll` proxy.
    ModernManagedAssembly(AssemblyDetails),
}

impl FileClassification {
    #[must_use]
    pub const fn file_type(&self) -> FileType {
        match self {
            Self::NativeModule => FileType::NativeDll,
            Self::LegacyManagedAssembly(_) => FileType::DotNetFrameworkAssembly,
            Self::ModernManagedAssembly(_) => FileType::DotNetCoreAssembly,
        }
    }

    /// Assembly metadata; `None` for native modules.
    #[must_use]
    pub const fn details(&self) -> Option<&AssemblyDetails> {
        match self {
            Self::NativeModule => None,
            Self::LegacyManagedAssembly(details) | Self::ModernManagedAssembly(details) => {
                Some(details)
            }
        }
    }

    #[must_use]
    pub fn version(&self) -> Option<AssemblyVersion> {
        self.details().map(|details| details.version)
    }

    /// `ProcessorArchitecture::None` for native modules.
    #[must_use]
    pub fn architecture(&self) -> ProcessorArchitecture {
        self.details()
            .map(|details| details.architecture)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn framework_name(&self) -> Option<&str> {
        self.details()
            .and_then(|details| details.framework_name.as_deref())
    }
}

// =============================================================================
// CLASSIFIER
// =============================================================================

/// Whether a target framework name denotes .NET Core (case-sensitive).
#[must_use]
pub fn is_net_core_framework(framework_name: Option<&str>) -> bool {
    framework_name.is_some_and(|name| name.starts_with(NET_CORE_FRAMEWORK_PREFIX))
}

/// Examine the module at `path`.
pub fn examine_file<M: ModuleMetadata + ?Sized>(
    metadata: &M,
    path: &Path,
) -> Result<FileClassification, ComAdminError> {
    let (version, architecture) = match metadata.probe(path)? {
        AssemblyProbe::NotManaged => {
            tracing::debug!(path = %path.display(), "not a managed image; native module");
            return Ok(FileClassification::NativeModule);
        }
        AssemblyProbe::Managed {
            version,
            architecture,
        } => (version, architecture),
    };

    let framework_name = metadata.target_framework(path)?;
    let modern = is_net_core_framework(framework_name.as_deref());
    tracing::debug!(
        path = %path.display(),
        %version,
        framework = framework_name.as_deref().unwrap_or("<none>"),
        modern,
        "managed assembly"
    );

    let details = AssemblyDetails {
        version,
        architecture,
        framework_name,
    };
    Ok(if modern {
        FileClassification::ModernManagedAssembly(details)
    } else {
        FileClassification::LegacyManagedAssembly(details)
    })
}

// =============================================================================
// TESTS
// =============================================================================

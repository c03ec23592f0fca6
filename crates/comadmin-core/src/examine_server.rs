//! # Examine Server
//!
//! Classifies how a COM class is registered in one view of a store.
//!
//! ## Lookup sequence
//!
//! ```text
//! HKEY_CLASSES_ROOT\CLSID\{clsid}          missing      -> NotRegistered
//!    (Default)                              class display name
//!    InprocServer32                        missing      -> Unknown
//!       (Default)                           empty        -> Unknown
//!       ThreadingModel
//! ```
//!
//! Then, in precedence order:
//! 1. display name is `CoreCLR COMHost Server` -> `ModernManaged`, with the
//!    ProgId read from `InprocServer32\ProgId`
//! 2. module path ends with `mscoree.dll` (any case) -> `LegacyManaged`, with
//!    assembly values read from `InprocServer32` and from each of its
//!    version subkeys
//! 3. otherwise -> `Native`
//!
//! Missing values leave fields empty; only the two `Unknown` gates stop the
//! walk early.

use crate::primitives::{
    CORECLR_COMHOST_SERVER, KEY_NAME_CLASSES, KEY_NAME_INPROC_SERVER32, KEY_NAME_PROG_ID,
    NET_FRAMEWORK_SHIM, VALUE_NAME_ASSEMBLY, VALUE_NAME_CLASS, VALUE_NAME_CODE_BASE,
    VALUE_NAME_RUNTIME_VERSION, VALUE_NAME_THREADING_MODEL,
};
use crate::registry::{Registry, RegistryKey, ValueName};
use crate::{Clsid, ComAdminError, RegistryHive, RegistryView};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// RESULT TYPES
// =============================================================================

/// .NET Framework activation values for one assembly version.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AssemblyInfo {
    /// The `Assembly` value: the assembly's full display name.
    pub assembly_identity: Option<String>,
    /// The `Class` value: the managed type to activate.
    pub class_name: Option<String>,
    pub runtime_version: Option<String>,
    pub code_base: Option<String>,
}

/// Version string -> activation values for that version.
pub type AssemblyVersionMap = BTreeMap<String, AssemblyInfo>;

/// Fields common to every activatable registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    pub clsid: Clsid,
    /// The class key's default value.
    pub display_name: Option<String>,
    /// The `InprocServer32` default value: the server DLL, `mscoree.dll`, or
    /// a `.comhost.dll` proxy.
    pub module_path: String,
    pub threading_model: Option<String>,
}

/// The kind of registration found, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServerType {
    NotRegistered,
    Unknown,
    NativeDll,
    DotNetFrameworkAssembly,
    DotNetCoreAssembly,
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotRegistered => "NotRegistered",
            Self::Unknown => "Unknown",
            Self::NativeDll => "NativeDll",
            Self::DotNetFrameworkAssembly => "DotNetFrameworkAssembly",
            Self::DotNetCoreAssembly => "DotNetCoreAssembly",
        };
        f.write_str(name)
    }
}

/// How a class is registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "server_type")]
pub enum ServerRegistration {
    /// There is no key for the class.
    NotRegistered,
    /// A key exists but cannot be activated: no `InprocServer32` key, or no
    /// module path in it. Possibly corrupted or partially installed.
    Unknown {
        clsid: Clsid,
        display_name: Option<String>,
    },
    /// A native in-process server.
    Native(ServerInfo),
    /// A .NET Framework server hosted by `mscoree.dll`.
    LegacyManaged {
        #[serde(flatten)]
        server: ServerInfo,
        /// Activated when no specific version is requested.
        root_assembly: AssemblyInfo,
        /// One entry per `InprocServer32` subkey. May be empty.
        assembly_versions: AssemblyVersionMap,
    },
    /// A .NET Core server hosted by a `.comhost.dll` proxy.
    ModernManaged {
        #[serde(flatten)]
        server: ServerInfo,
        prog_id: Option<String>,
    },
}

impl ServerRegistration {
    #[must_use]
    pub const fn server_type(&self) -> ServerType {
        match self {
            Self::NotRegistered => ServerType::NotRegistered,
            Self::Unknown { .. } => ServerType::Unknown,
            Self::Native(_) => ServerType::NativeDll,
            Self::LegacyManaged { .. } => ServerType::DotNetFrameworkAssembly,
            Self::ModernManaged { .. } => ServerType::DotNetCoreAssembly,
        }
    }

    /// Common server fields; `None` for `NotRegistered` and `Unknown`.
    #[must_use]
    pub const fn server(&self) -> Option<&ServerInfo> {
        match self {
            Self::NotRegistered | Self::Unknown { .. } => None,
            Self::Native(server)
            | Self::LegacyManaged { server, .. }
            | Self::ModernManaged { server, .. } => Some(server),
        }
    }
}

// =============================================================================
// CLASSIFIER
// =============================================================================

fn read_assembly_info<K: RegistryKey>(key: &K) -> Result<AssemblyInfo, ComAdminError> {
    Ok(AssemblyInfo {
        assembly_identity: key.get_value(ValueName::Named(VALUE_NAME_ASSEMBLY))?,
        class_name: key.get_value(ValueName::Named(VALUE_NAME_CLASS))?,
        runtime_version: key.get_value(ValueName::Named(VALUE_NAME_RUNTIME_VERSION))?,
        code_base: key.get_value(ValueName::Named(VALUE_NAME_CODE_BASE))?,
    })
}

/// Whether a module path names the .NET Framework shim (case-insensitive).
#[must_use]
pub fn is_net_framework_shim(module_path: &str) -> bool {
    module_path
        .to_ascii_lowercase()
        .ends_with(NET_FRAMEWORK_SHIM)
}

/// Open `HKEY_CLASSES_ROOT\CLSID` for a view.
///
/// A store without a `CLSID` key is treated as unavailable.
pub fn open_classes_key<R: Registry>(
    registry: &R,
    view: RegistryView,
) -> Result<R::Key, ComAdminError> {
    let hive = RegistryHive::ClassesRoot;
    registry
        .open_base_key(hive, view)?
        .open_sub_key(KEY_NAME_CLASSES)?
        .ok_or(ComAdminError::StoreUnavailable { hive, view })
}

/// Classify the registration of `clsid` in `view`.
pub fn examine_server<R: Registry>(
    registry: &R,
    view: RegistryView,
    clsid: Clsid,
) -> Result<ServerRegistration, ComAdminError> {
    let classes = open_classes_key(registry, view)?;
    let Some(class_key) = classes.open_sub_key(&clsid.to_registry_string())? else {
        tracing::debug!(%clsid, %view, "no class key; not registered");
        return Ok(ServerRegistration::NotRegistered);
    };

    let display_name = class_key.get_value(ValueName::Default)?;

    let Some(inproc) = class_key.open_sub_key(KEY_NAME_INPROC_SERVER32)? else {
        tracing::debug!(%clsid, "no InprocServer32 key; unknown");
        return Ok(ServerRegistration::Unknown {
            clsid,
            display_name,
        });
    };

    let module_path = match inproc.get_value(ValueName::Default)? {
        Some(path) if !path.is_empty() => path,
        _ => {
            tracing::debug!(%clsid, "InprocServer32 has no module path; unknown");
            return Ok(ServerRegistration::Unknown {
                clsid,
                display_name,
            });
        }
    };

    let threading_model = inproc.get_value(ValueName::Named(VALUE_NAME_THREADING_MODEL))?;

    let modern = display_name.as_deref() == Some(CORECLR_COMHOST_SERVER);
    let legacy = !modern && is_net_framework_shim(&module_path);

    let server = ServerInfo {
        clsid,
        display_name,
        module_path,
        threading_model,
    };

    if modern {
        let prog_id = match inproc.open_sub_key(KEY_NAME_PROG_ID)? {
            Some(prog_id_key) => prog_id_key.get_value(ValueName::Default)?,
            None => None,
        };
        tracing::debug!(%clsid, prog_id = prog_id.as_deref().unwrap_or("<none>"), ".NET Core server");
        return Ok(ServerRegistration::ModernManaged { server, prog_id });
    }

    if legacy {
        let root_assembly = read_assembly_info(&inproc)?;
        let mut assembly_versions = AssemblyVersionMap::new();
        for version in inproc.sub_key_names()? {
            // A subkey can vanish between enumeration and open on a live registry.
            let Some(version_key) = inproc.open_sub_key(&version)? else {
                continue;
            };
            let info = read_assembly_info(&version_key)?;
            assembly_versions.insert(version, info);
        }
        tracing::debug!(
            %clsid,
            versions = assembly_versions.len(),
            ".NET Framework server"
        );
        return Ok(ServerRegistration::LegacyManaged {
            server,
            root_assembly,
            assembly_versions,
        });
    }

    tracing::debug!(%clsid, "native server");
    Ok(ServerRegistration::Native(server))
}

// =============================================================================
// TESTS
// =============================================================================

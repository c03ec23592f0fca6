//! # CLI Command Implementations
//!
//! Each command returns its report as a string; `main` prints it.

use crate::config::Settings;
use comadmin_core::{
    AssemblyInfo, Clsid, ComAdminError, FileClassification, InMemoryRegistry, ModuleMetadata,
    Registry, RegistryView, ServerRegistration, examine_file, examine_server,
};
use serde::Serialize;
use std::path::Path;

fn to_json<T: Serialize>(value: &T) -> Result<String, ComAdminError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ComAdminError::Render(format!("Failed to render JSON: {}", e)))
}

fn or_empty(value: Option<&str>) -> &str {
    value.unwrap_or("")
}

// =============================================================================
// EXAMINE COMMAND
// =============================================================================

#[derive(Serialize)]
struct FileReport<'a> {
    source_file: String,
    #[serde(flatten)]
    classification: &'a FileClassification,
}

/// Classify the module at `path`.
pub fn cmd_examine<M: ModuleMetadata + ?Sized>(
    metadata: &M,
    path: &Path,
    json_mode: bool,
) -> Result<String, ComAdminError> {
    let classification = examine_file(metadata, path)?;
    render_file_report(path, &classification, json_mode)
}

/// Render a file classification as text or JSON.
pub fn render_file_report(
    path: &Path,
    classification: &FileClassification,
    json_mode: bool,
) -> Result<String, ComAdminError> {
    if json_mode {
        return to_json(&FileReport {
            source_file: path.display().to_string(),
            classification,
        });
    }

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let version = classification
        .version()
        .map(|v| v.to_string())
        .unwrap_or_default();

    let mut out = String::new();
    out.push_str(&format!("  Examining '{}'...\n", file_name));
    out.push_str(&format!("    Source File            : {}\n", path.display()));
    out.push_str(&format!(
        "    File Type              : {}\n",
        classification.file_type()
    ));
    out.push_str(&format!("    Version                : {}\n", version));
    out.push_str(&format!(
        "    Processor Architecture : {}\n",
        classification.architecture()
    ));
    out.push_str(&format!(
        "    Framework              : {}\n",
        or_empty(classification.framework_name())
    ));
    Ok(out)
}

// =============================================================================
// GET-SERVER-INFO COMMAND
// =============================================================================

#[derive(Serialize)]
struct ServerReport<'a> {
    clsid: Clsid,
    view: RegistryView,
    registration: &'a ServerRegistration,
}

/// Seed an in-memory store for `view` from a snapshot file.
pub fn load_snapshot_registry(
    path: &Path,
    view: RegistryView,
) -> Result<InMemoryRegistry, ComAdminError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        ComAdminError::Io(format!(
            "Cannot read snapshot '{}': {}",
            path.display(),
            e
        ))
    })?;
    let mut registry = InMemoryRegistry::new();
    registry.add_structure(view, &text)?;
    tracing::debug!(path = %path.display(), %view, "loaded registry snapshot");
    Ok(registry)
}

#[cfg(windows)]
fn examine_system_registry(
    view: RegistryView,
    clsid: Clsid,
) -> Result<ServerRegistration, ComAdminError> {
    examine_server(&comadmin_core::WindowsRegistry::new(), view, clsid)
}

#[cfg(not(windows))]
fn examine_system_registry(
    _view: RegistryView,
    _clsid: Clsid,
) -> Result<ServerRegistration, ComAdminError> {
    Err(ComAdminError::UnsupportedPlatform(
        "the system registry is only available on Windows; pass --snapshot to read a snapshot file"
            .to_string(),
    ))
}

/// Look up a CLSID in the configured store and report how it is registered.
pub fn cmd_get_server_info(settings: &Settings, clsid: &str) -> Result<String, ComAdminError> {
    let clsid: Clsid = clsid.parse()?;
    match &settings.snapshot {
        Some(path) => {
            let registry = load_snapshot_registry(path, settings.view)?;
            server_info_from(&registry, settings.view, clsid, settings.json_mode)
        }
        None => {
            let registration = examine_system_registry(settings.view, clsid)?;
            render_server_report(clsid, settings.view, &registration, settings.json_mode)
        }
    }
}

/// Classify `clsid` against any store and render the report.
pub fn server_info_from<R: Registry>(
    registry: &R,
    view: RegistryView,
    clsid: Clsid,
    json_mode: bool,
) -> Result<String, ComAdminError> {
    let registration = examine_server(registry, view, clsid)?;
    render_server_report(clsid, view, &registration, json_mode)
}

fn push_assembly_info(out: &mut String, info: &AssemblyInfo, indent: &str) {
    out.push_str(&format!(
        "{}Assembly         : {}\n",
        indent,
        or_empty(info.assembly_identity.as_deref())
    ));
    out.push_str(&format!(
        "{}Class            : {}\n",
        indent,
        or_empty(info.class_name.as_deref())
    ));
    out.push_str(&format!(
        "{}Runtime Version  : {}\n",
        indent,
        or_empty(info.runtime_version.as_deref())
    ));
    out.push_str(&format!(
        "{}Code Base        : {}\n",
        indent,
        or_empty(info.code_base.as_deref())
    ));
}

/// Render a registration as text or JSON.
pub fn render_server_report(
    clsid: Clsid,
    view: RegistryView,
    registration: &ServerRegistration,
    json_mode: bool,
) -> Result<String, ComAdminError> {
    if json_mode {
        return to_json(&ServerReport {
            clsid,
            view,
            registration,
        });
    }

    let mut out = format!("  Getting info for server with class '{}'...\n", clsid);
    let server = match registration {
        ServerRegistration::NotRegistered => {
            out.push_str(&format!(
                "No COM server with CLSID {} is registered.\n",
                clsid
            ));
            return Ok(out);
        }
        ServerRegistration::Unknown { .. } => {
            out.push_str(&format!(
                "COM server with CLSID {} has an entry but appears to be incomplete - it may be corrupted.\n",
                clsid
            ));
            return Ok(out);
        }
        ServerRegistration::Native(server)
        | ServerRegistration::LegacyManaged { server, .. }
        | ServerRegistration::ModernManaged { server, .. } => server,
    };

    out.push_str(&format!(
        "    Server Type      : {}\n",
        registration.server_type()
    ));
    out.push_str(&format!("    Class ID         : {}\n", server.clsid));
    out.push_str(&format!(
        "    Class Name       : {}\n",
        or_empty(server.display_name.as_deref())
    ));
    out.push_str(&format!("    Module Path      : {}\n", server.module_path));
    out.push_str(&format!(
        "    Threading Model  : {}\n",
        or_empty(server.threading_model.as_deref())
    ));

    match registration {
        ServerRegistration::LegacyManaged {
            root_assembly,
            assembly_versions,
            ..
        } => {
            push_assembly_info(&mut out, root_assembly, "    ");
            for (version, info) in assembly_versions {
                out.push_str(&format!("    Version {}\n", version));
                push_assembly_info(&mut out, info, "      ");
            }
        }
        ServerRegistration::ModernManaged { prog_id, .. } => {
            out.push_str(&format!(
                "    Prog Id          : {}\n",
                or_empty(prog_id.as_deref())
            ));
        }
        _ => {}
    }
    Ok(out)
}

// =============================================================================
// TESTS
// =============================================================================

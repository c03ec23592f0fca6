//! # PE Metadata
//!
//! `ModuleMetadata` over modules on disk. `goblin` parses the PE container
//! and the CLI header; the metadata root is then read by `tables`.
//!
//! A file that is not a PE image, a PE image without a CLI header, and a
//! CLI image without an `Assembly` row are all `NotManaged`. A CLI header
//! whose metadata cannot be read is an error.

use crate::ComAdminError;
use crate::metadata::tables::CliMetadata;
use crate::metadata::{AssemblyProbe, AssemblyVersion, ModuleMetadata, ProcessorArchitecture};
use goblin::pe::PE;
use goblin::pe::clr::Cor20Header;
use goblin::pe::header::{
    COFF_MACHINE_ARM, COFF_MACHINE_ARMNT, COFF_MACHINE_IA64, COFF_MACHINE_X86,
    COFF_MACHINE_X86_64,
};
use goblin::pe::options::ParseOptions;
use goblin::pe::utils::find_offset;
use std::path::Path;

/// Reads assembly metadata from PE files.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeMetadata;

impl PeMetadata {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn inspect(&self, path: &Path) -> Result<Option<ManagedImage>, ComAdminError> {
        let bytes = std::fs::read(path).map_err(|e| {
            ComAdminError::Io(format!("Unable to read '{}': {}", path.display(), e))
        })?;
        inspect_image(&bytes)
    }
}

impl ModuleMetadata for PeMetadata {
    fn probe(&self, path: &Path) -> Result<AssemblyProbe, ComAdminError> {
        Ok(match self.inspect(path)? {
            Some(image) => AssemblyProbe::Managed {
                version: image.version,
                architecture: image.architecture,
            },
            None => AssemblyProbe::NotManaged,
        })
    }

    fn target_framework(&self, path: &Path) -> Result<Option<String>, ComAdminError> {
        Ok(self.inspect(path)?.and_then(|image| image.framework))
    }
}

// =============================================================================
// IMAGE INSPECTION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct ManagedImage {
    version: AssemblyVersion,
    architecture: ProcessorArchitecture,
    framework: Option<String>,
}

fn inspect_image(bytes: &[u8]) -> Result<Option<ManagedImage>, ComAdminError> {
    let pe = match PE::parse(bytes) {
        Ok(pe) => pe,
        Err(error) => {
            tracing::debug!(%error, "not a PE image");
            return Ok(None);
        }
    };
    let Some(clr) = pe.clr_data.as_ref() else {
        tracing::debug!("PE image has no CLI header");
        return Ok(None);
    };
    let cor20 = &clr.cor20_header;

    let file_alignment = pe
        .header
        .optional_header
        .as_ref()
        .map(|header| header.windows_fields.file_alignment)
        .unwrap_or(0);
    let directory = cor20.metadata;
    let root = find_offset(
        directory.virtual_address as usize,
        &pe.sections,
        file_alignment,
        &ParseOptions::default(),
    )
    .and_then(|start| {
        let end = start.checked_add(directory.size as usize)?;
        bytes.get(start..end)
    })
    .ok_or_else(|| {
        ComAdminError::Metadata(format!(
            "CLI metadata at RVA {:#x} is outside the image",
            directory.virtual_address
        ))
    })?;

    let metadata = CliMetadata::parse(root)?;
    let Some(version) = metadata.assembly_version()? else {
        tracing::debug!("CLI image has no assembly manifest");
        return Ok(None);
    };
    let architecture = processor_architecture(pe.header.coff_header.machine, pe.is_64, cor20);
    let framework = metadata.target_framework()?;

    tracing::debug!(%version, %architecture, ?framework, "read assembly metadata");
    Ok(Some(ManagedImage {
        version,
        architecture,
        framework,
    }))
}

/// The architecture .NET reports for an assembly, from the machine type and
/// the CLI header flags. AnyCPU images that prefer 32-bit are still MSIL.
fn processor_architecture(machine: u16, is_64: bool, cor20: &Cor20Header) -> ProcessorArchitecture {
    let requires_32bit = cor20.is_32bit_required() && !cor20.is_32bit_preferred();
    match machine {
        COFF_MACHINE_X86 if cor20.is_il_only() && !requires_32bit => ProcessorArchitecture::Msil,
        COFF_MACHINE_X86 if !is_64 => ProcessorArchitecture::X86,
        COFF_MACHINE_X86_64 if is_64 => ProcessorArchitecture::Amd64,
        COFF_MACHINE_IA64 if is_64 => ProcessorArchitecture::Ia64,
        COFF_MACHINE_ARM | COFF_MACHINE_ARMNT if !is_64 => ProcessorArchitecture::Arm,
        _ => ProcessorArchitecture::None,
    }
}

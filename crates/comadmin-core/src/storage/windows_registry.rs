//! # Windows Registry
//!
//! The OS-backed `Registry`, reading through `winreg`.
//!
//! Keys are opened read-only. The view is applied to every open with
//! `KEY_WOW64_32KEY` / `KEY_WOW64_64KEY`, so a 64-bit process can inspect
//! 32-bit registrations and the other way round. String values are returned
//! as stored; `REG_EXPAND_SZ` values are not expanded.

use crate::registry::{Registry, RegistryKey, ValueName};
use crate::{ComAdminError, RegistryHive, RegistryView};
use std::io;
use winreg::RegKey;
use winreg::enums::{
    HKEY_CLASSES_ROOT, HKEY_CURRENT_CONFIG, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, HKEY_USERS,
    KEY_READ, KEY_WOW64_32KEY, KEY_WOW64_64KEY, REG_EXPAND_SZ, REG_SZ,
};
use winreg::types::FromRegValue;

/// The registry of the running machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsRegistry;

impl WindowsRegistry {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn predefined_key(hive: RegistryHive) -> RegKey {
    RegKey::predef(match hive {
        RegistryHive::ClassesRoot => HKEY_CLASSES_ROOT,
        RegistryHive::CurrentUser => HKEY_CURRENT_USER,
        RegistryHive::LocalMachine => HKEY_LOCAL_MACHINE,
        RegistryHive::Users => HKEY_USERS,
        RegistryHive::CurrentConfig => HKEY_CURRENT_CONFIG,
    })
}

const fn view_flag(view: RegistryView) -> u32 {
    match view {
        RegistryView::Registry32 => KEY_WOW64_32KEY,
        RegistryView::Registry64 => KEY_WOW64_64KEY,
    }
}

fn registry_error(call: &str, key: &str, error: &io::Error) -> ComAdminError {
    ComAdminError::Registry(format!("{} failed for '{}': {}", call, key, error))
}

impl Registry for WindowsRegistry {
    type Key = WindowsKey;

    fn open_base_key(
        &self,
        hive: RegistryHive,
        view: RegistryView,
    ) -> Result<Self::Key, ComAdminError> {
        Ok(WindowsKey {
            key: predefined_key(hive),
            sam: view_flag(view),
            name: hive.name().to_string(),
        })
    }
}

/// An open registry key. The handle is released when the key drops.
#[derive(Debug)]
pub struct WindowsKey {
    key: RegKey,
    sam: u32,
    name: String,
}

impl RegistryKey for WindowsKey {
    fn name(&self) -> &str {
        &self.name
    }

    fn open_sub_key(&self, name: &str) -> Result<Option<Self>, ComAdminError> {
        match self.key.open_subkey_with_flags(name, KEY_READ | self.sam) {
            Ok(key) => Ok(Some(WindowsKey {
                key,
                sam: self.sam,
                name: name.to_string(),
            })),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(registry_error("open", name, &error)),
        }
    }

    fn get_value(&self, name: ValueName<'_>) -> Result<Option<String>, ComAdminError> {
        // winreg reads the default value under the empty name.
        let value_name = match name {
            ValueName::Default => "",
            ValueName::Named(name) => name,
        };

        let raw = match self.key.get_raw_value(value_name) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(registry_error("read", &self.name, &error)),
        };
        if raw.vtype != REG_SZ && raw.vtype != REG_EXPAND_SZ {
            tracing::debug!(key = %self.name, kind = ?raw.vtype, "ignoring non-string registry value");
            return Ok(None);
        }

        String::from_reg_value(&raw)
            .map(Some)
            .map_err(|error| registry_error("read", &self.name, &error))
    }

    fn sub_key_names(&self) -> Result<Vec<String>, ComAdminError> {
        self.key
            .enum_keys()
            .collect::<io::Result<Vec<_>>>()
            .map_err(|error| registry_error("enumerate", &self.name, &error))
    }
}

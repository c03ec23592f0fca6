//! # Hierarchical Store
//!
//! The `Registry` and `RegistryKey` traits abstract over the Windows registry
//! so the classifiers can run against either the OS store or an in-memory
//! fixture.
//!
//! Key handles are scoped resources: a handle is released when it is
//! dropped, on every exit path. Dropping a parent never invalidates a child
//! handle that is still held.
//!
//! All operations return `Result<T, ComAdminError>` so the in-memory and OS
//! stores can be used uniformly; a key or value that does not exist is
//! `Ok(None)`, never an error.

use crate::{ComAdminError, RegistryHive, RegistryView};

// =============================================================================
// VALUE NAMES
// =============================================================================

/// Addresses one value slot on a key.
///
/// The unnamed default value and the named values are independent slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueName<'a> {
    /// The key's unnamed "(Default)" value.
    Default,
    /// A named value.
    Named(&'a str),
}

impl<'a> From<&'a str> for ValueName<'a> {
    fn from(name: &'a str) -> Self {
        Self::Named(name)
    }
}

// =============================================================================
// STORE TRAITS
// =============================================================================

/// A store with one tree of keys per (hive, view).
pub trait Registry {
    /// The handle type for keys opened from this store.
    type Key: RegistryKey;

    /// Open the root key of a hive in the given view.
    ///
    /// Fails with `ComAdminError::StoreUnavailable` when the combination
    /// cannot be opened. That is an environment problem, not a
    /// classification outcome.
    fn open_base_key(
        &self,
        hive: RegistryHive,
        view: RegistryView,
    ) -> Result<Self::Key, ComAdminError>;
}

/// An open key. Released on drop.
pub trait RegistryKey: Sized {
    /// The key's own name.
    fn name(&self) -> &str;

    /// Open a direct child. `Ok(None)` if there is no such child.
    fn open_sub_key(&self, name: &str) -> Result<Option<Self>, ComAdminError>;

    /// Read a value as a string. `Ok(None)` if the slot is empty.
    fn get_value(&self, name: ValueName<'_>) -> Result<Option<String>, ComAdminError>;

    /// Names of the direct children, in the store's natural order.
    fn sub_key_names(&self) -> Result<Vec<String>, ComAdminError>;

    /// Read a value, falling back to `fallback` if the slot is empty.
    fn get_value_or(&self, name: ValueName<'_>, fallback: &str) -> Result<String, ComAdminError> {
        Ok(self
            .get_value(name)?
            .unwrap_or_else(|| fallback.to_string()))
    }
}

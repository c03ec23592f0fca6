//! # In-Memory Registry
//!
//! A deterministic `Registry` backed by snapshot trees, one per view.
//!
//! Used to drive the classifiers in tests and from snapshot files without
//! touching the OS registry. Handles share the tree through `Arc`, so a
//! handle stays valid after its parent is dropped, and seeding the store
//! again does not disturb handles that are already open.

use crate::registry::{Registry, RegistryKey, ValueName};
use crate::snapshot::{KeyNode, parse_snapshot};
use crate::{ComAdminError, RegistryHive, RegistryView};
use std::collections::BTreeMap;
use std::sync::Arc;

/// An in-memory registry with an independent tree per view.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    /// View -> unnamed root whose children are hive keys.
    views: BTreeMap<RegistryView, KeyNode>,
}

impl InMemoryRegistry {
    /// Create an empty registry. No view is seeded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse snapshot text and merge it into the given view.
    ///
    /// Repeated calls accumulate; later values overwrite earlier ones.
    pub fn add_structure(&mut self, view: RegistryView, text: &str) -> Result<(), ComAdminError> {
        let tree = parse_snapshot(text)?;
        self.add_tree(view, tree);
        Ok(())
    }

    /// Merge an already-parsed tree into the given view.
    pub fn add_tree(&mut self, view: RegistryView, tree: KeyNode) {
        tracing::trace!(%view, "seeding in-memory registry view");
        self.views.entry(view).or_default().merge(tree);
    }

    /// The tree for a view, if it has been seeded.
    #[must_use]
    pub fn root(&self, view: RegistryView) -> Option<&KeyNode> {
        self.views.get(&view)
    }
}

impl Registry for InMemoryRegistry {
    type Key = InMemoryKey;

    fn open_base_key(
        &self,
        hive: RegistryHive,
        view: RegistryView,
    ) -> Result<Self::Key, ComAdminError> {
        self.views
            .get(&view)
            .and_then(|root| root.child(hive.name()))
            .map(|node| InMemoryKey {
                node: Arc::clone(node),
            })
            .ok_or(ComAdminError::StoreUnavailable { hive, view })
    }
}

/// A handle to a key in an `InMemoryRegistry`.
#[derive(Debug, Clone)]
pub struct InMemoryKey {
    node: Arc<KeyNode>,
}

impl InMemoryKey {
    /// The tree under this key.
    #[must_use]
    pub fn node(&self) -> &KeyNode {
        &self.node
    }
}

impl RegistryKey for InMemoryKey {
    fn name(&self) -> &str {
        self.node.name()
    }

    fn open_sub_key(&self, name: &str) -> Result<Option<Self>, ComAdminError> {
        let child = self.node.child(name).map(|node| InMemoryKey {
            node: Arc::clone(node),
        });
        tracing::trace!(
            parent = self.node.name(),
            name,
            found = child.is_some(),
            "open_sub_key"
        );
        Ok(child)
    }

    fn get_value(&self, name: ValueName<'_>) -> Result<Option<String>, ComAdminError> {
        let value = match name {
            ValueName::Default => self.node.default_value(),
            ValueName::Named(name) => self.node.value(name),
        };
        Ok(value.map(str::to_string))
    }

    fn sub_key_names(&self) -> Result<Vec<String>, ComAdminError> {
        Ok(self
            .node
            .children()
            .map(|child| child.name().to_string())
            .collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================

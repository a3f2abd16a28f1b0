//! Definition registry collaborator.
//!
//! The container consumes definitions through the [`DefinitionRegistry`]
//! trait; [`DefinitionMap`] is the in-memory implementation used by
//! default. External configuration layers (file parsers, scanners) are
//! expected to populate a registry and hand it to the container.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::definition::Definition;

/// Source of instance definitions.
pub trait DefinitionRegistry: Send + Sync {
    /// Looks up a definition by name.
    fn definition(&self, name: &str) -> Option<Definition>;

    /// All registered names, in registration order.
    fn names(&self) -> Vec<String>;

    /// Whether a definition exists under this name.
    fn contains(&self, name: &str) -> bool;

    /// Adds or replaces a definition.
    fn register(&self, name: String, definition: Definition);

    /// Stamps an attribute on an existing definition. Returns `false` when
    /// the name is unknown or the registry does not support stamping.
    fn stamp_attribute(&self, name: &str, key: &str, value: &str) -> bool;
}

#[derive(Default)]
struct MapInner {
    definitions: HashMap<String, Definition>,
    order: Vec<String>,
}

/// In-memory, insertion-ordered definition registry.
#[derive(Default)]
pub struct DefinitionMap {
    inner: RwLock<MapInner>,
}

impl DefinitionMap {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DefinitionRegistry for DefinitionMap {
    fn definition(&self, name: &str) -> Option<Definition> {
        self.inner.read().definitions.get(name).cloned()
    }

    fn names(&self) -> Vec<String> {
        self.inner.read().order.clone()
    }

    fn contains(&self, name: &str) -> bool {
        self.inner.read().definitions.contains_key(name)
    }

    fn register(&self, name: String, definition: Definition) {
        let mut inner = self.inner.write();
        if !inner.definitions.contains_key(&name) {
            inner.order.push(name.clone());
        }
        inner.definitions.insert(name, definition);
    }

    fn stamp_attribute(&self, name: &str, key: &str, value: &str) -> bool {
        let mut inner = self.inner.write();
        match inner.definitions.get_mut(name) {
            Some(def) => {
                def.set_attribute(key, value);
                true
            }
            None => false,
        }
    }
}

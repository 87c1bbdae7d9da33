//! Module-local element key redirection.
//!
//! A module addresses elements by local names (`Root`, `ctrl`). While the
//! module runs, the hierarchy resolves those names through the module's
//! redirector: connectors map to the elements they were connected to, and
//! other local names map to the module-prefixed element when one exists.

use crate::hierarchy::RigHierarchy;
use indexmap::IndexMap;
use modrig_core::{ElementKey, ModulePath, NameHash, RigName};

/// Maps module-local keys to elements of the shared hierarchy
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementKeyRedirector {
    module: RigName,
    prefix: String,
    prefix_hash: NameHash,
    map: IndexMap<ElementKey, Vec<ElementKey>>,
}

impl ElementKeyRedirector {
    /// Build a redirector from a module's connector map
    #[must_use]
    pub fn new(module: impl Into<RigName>, connections: &IndexMap<RigName, Vec<ElementKey>>) -> Self {
        let module = module.into();
        let prefix = format!("{}{}", module, ModulePath::MODULE_SEPARATOR);
        let map = connections
            .iter()
            .filter(|(_, targets)| !targets.is_empty())
            .map(|(connector, targets)| (ElementKey::connector(connector.clone()), targets.clone()))
            .collect();
        Self {
            prefix_hash: NameHash::of(&prefix),
            prefix,
            module,
            map,
        }
    }

    /// Module this redirector belongs to
    #[must_use]
    pub fn module(&self) -> &RigName {
        &self.module
    }

    /// Namespace prefix, `Module/`
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Hash of the namespace prefix
    #[must_use]
    pub fn prefix_hash(&self) -> NameHash {
        self.prefix_hash
    }

    /// Explicit targets for a local key
    #[must_use]
    pub fn targets(&self, key: &ElementKey) -> Option<&[ElementKey]> {
        self.map.get(key).map(Vec::as_slice)
    }

    /// Number of explicit redirections
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if there are no explicit redirections
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Resolve a local key against `hierarchy`.
    ///
    /// Explicit connections win, then the module-prefixed element if it
    /// exists, otherwise the key is returned unchanged.
    #[must_use]
    pub fn resolve(&self, key: &ElementKey, hierarchy: &RigHierarchy) -> ElementKey {
        if let Some(target) = self.targets(key).and_then(<[ElementKey]>::first) {
            return target.clone();
        }
        if !key.module_path().is_valid() {
            let namespaced = key.in_module(self.module.as_str());
            if hierarchy.contains(&namespaced) {
                return namespaced;
            }
        }
        key.clone()
    }
}

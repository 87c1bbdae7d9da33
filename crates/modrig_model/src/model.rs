//! The declarative modular rig model.

use crate::catalog::ClassName;
use crate::error::ModelResult;
use crate::overrides::ConfigOverrides;
use indexmap::IndexMap;
use modrig_core::{ElementKey, ModulePath, RigName};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One module in the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleReference {
    /// Module name
    pub name: RigName,
    /// Behavior class
    pub class: ClassName,
    /// Parent module, `None` for roots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<RigName>,
    /// Deprecated parent path (`Spine:Arm`), used when `parent` is unset
    /// or cannot be found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_path: Option<String>,
    /// Connector local name to connected elements
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub connections: IndexMap<RigName, Vec<ElementKey>>,
    /// Config overrides applied over class defaults
    #[serde(default, skip_serializing_if = "ConfigOverrides::is_empty")]
    pub config_overrides: ConfigOverrides,
    /// Target variable to `[module.]variable` source expression
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub bindings: IndexMap<RigName, String>,
}

impl ModuleReference {
    /// Create a root module reference
    #[must_use]
    pub fn new(name: impl Into<RigName>, class: impl Into<ClassName>) -> Self {
        Self {
            name: name.into(),
            class: class.into(),
            parent: None,
            parent_path: None,
            connections: IndexMap::new(),
            config_overrides: ConfigOverrides::new(),
            bindings: IndexMap::new(),
        }
    }

    /// Set the parent module
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<RigName>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Set the deprecated parent path
    #[must_use]
    pub fn with_parent_path(mut self, path: impl Into<String>) -> Self {
        self.parent_path = Some(path.into());
        self
    }

    /// Connect a connector
    #[must_use]
    pub fn with_connection(mut self, connector: impl Into<RigName>, targets: Vec<ElementKey>) -> Self {
        self.connections.insert(connector.into(), targets);
        self
    }

    /// Add a config override
    #[must_use]
    pub fn with_override(mut self, path: impl Into<String>, value: modrig_core::Value) -> Self {
        self.config_overrides.set(path, value);
        self
    }

    /// Add a variable binding
    #[must_use]
    pub fn with_binding(mut self, variable: impl Into<RigName>, source: impl Into<String>) -> Self {
        self.bindings.insert(variable.into(), source.into());
        self
    }

    /// Check if this is a root module
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.is_none() && self.parent_path.is_none()
    }

    /// Deprecated path of this module: parent path and name joined by `:`
    #[must_use]
    pub fn legacy_path(&self) -> String {
        match &self.parent_path {
            Some(parent) => format!("{}{}{}", parent, ModulePath::NAMESPACE_SEPARATOR_DEPRECATED, self.name),
            None => self.name.to_string(),
        }
    }

    /// Check if any connection targets an element of `module`
    #[must_use]
    pub fn connects_to_module(&self, module: &str) -> bool {
        self.connections
            .values()
            .flatten()
            .any(|target| target.module_path().has_module_name(module))
    }
}

/// Declarative description of a modular rig
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModularRigModel {
    /// Modules in declaration order
    #[serde(default)]
    pub modules: Vec<ModuleReference>,
}

impl ModularRigModel {
    /// Create an empty model
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module (builder form)
    #[must_use]
    pub fn with_module(mut self, module: ModuleReference) -> Self {
        self.modules.push(module);
        self
    }

    /// Load a model from JSON
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed
    pub fn from_json(json: &str) -> ModelResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Save the model as JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> ModelResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Find a module by name
    #[must_use]
    pub fn find_module(&self, name: &str) -> Option<&ModuleReference> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Find a module by name, mutably
    pub fn find_module_mut(&mut self, name: &str) -> Option<&mut ModuleReference> {
        self.modules.iter_mut().find(|m| m.name == name)
    }

    /// Find a module by its deprecated path
    #[must_use]
    pub fn find_module_by_path(&self, path: &str) -> Option<&ModuleReference> {
        self.modules.iter().find(|m| m.legacy_path() == path)
    }

    /// Check if a module exists
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.find_module(name).is_some()
    }

    /// Effective parent of a module: by name, falling back to the
    /// deprecated path
    #[must_use]
    pub fn parent_of(&self, module: &ModuleReference) -> Option<&ModuleReference> {
        module
            .parent
            .as_ref()
            .and_then(|parent| self.find_module(parent.as_str()))
            .or_else(|| {
                module
                    .parent_path
                    .as_deref()
                    .and_then(|path| self.find_module_by_path(path))
            })
    }

    /// Modules without a declared parent
    #[must_use]
    pub fn root_modules(&self) -> Vec<&ModuleReference> {
        self.modules.iter().filter(|m| m.is_root()).collect()
    }

    /// Direct children of a module, in declaration order
    #[must_use]
    pub fn children_of(&self, name: &str) -> Vec<&ModuleReference> {
        self.modules
            .iter()
            .filter(|m| self.parent_of(m).is_some_and(|p| p.name == name))
            .collect()
    }

    /// Modules whose declared parent cannot be found
    #[must_use]
    pub fn orphans(&self) -> Vec<&ModuleReference> {
        self.modules
            .iter()
            .filter(|m| !m.is_root() && self.parent_of(m).is_none())
            .collect()
    }

    /// Breadth-first order: roots first, then their children, recursively.
    /// Orphans and modules caught in parent cycles are not visited.
    #[must_use]
    pub fn breadth_first(&self) -> Vec<&ModuleReference> {
        let mut children: IndexMap<&str, Vec<&ModuleReference>> = IndexMap::new();
        for module in &self.modules {
            if let Some(parent) = self.parent_of(module) {
                children.entry(parent.name.as_str()).or_default().push(module);
            }
        }

        let mut order = Vec::with_capacity(self.modules.len());
        let mut queue: VecDeque<&ModuleReference> = self.root_modules().into_iter().collect();
        while let Some(module) = queue.pop_front() {
            order.push(module);
            if let Some(kids) = children.get(module.name.as_str()) {
                queue.extend(kids.iter().copied());
            }
        }
        order
    }

    /// Check if `child` is below `parent`, at any depth
    #[must_use]
    pub fn is_module_parented_to(&self, child: &str, parent: &str) -> bool {
        let mut current = self.find_module(child);
        let mut steps = 0;
        while let Some(module) = current {
            let Some(up) = self.parent_of(module) else {
                return false;
            };
            if up.name == parent {
                return true;
            }
            steps += 1;
            if steps > self.modules.len() {
                return false;
            }
            current = Some(up);
        }
        false
    }

    /// Names of all modules below `name`, breadth first
    #[must_use]
    pub fn descendants_of(&self, name: &str) -> Vec<RigName> {
        let mut found: Vec<RigName> = Vec::new();
        let mut queue = VecDeque::from([RigName::from(name)]);
        while let Some(current) = queue.pop_front() {
            for child in self.children_of(current.as_str()) {
                if child.name != name && !found.contains(&child.name) {
                    found.push(child.name.clone());
                    queue.push_back(child.name.clone());
                }
            }
        }
        found
    }

    /// Module names in declaration order
    #[must_use]
    pub fn module_names(&self) -> Vec<RigName> {
        self.modules.iter().map(|m| m.name.clone()).collect()
    }

    /// Number of modules
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leg_foot() -> ModularRigModel {
        ModularRigModel::new()
            .with_module(ModuleReference::new("Leg", "Leg"))
            .with_module(ModuleReference::new("Foot", "Foot").with_parent("Leg"))
    }

    #[test]
    fn test_roots_and_children() {
        let model = leg_foot();
        let roots: Vec<_> = model.root_modules().iter().map(|m| m.name.clone()).collect();
        assert_eq!(roots, vec![RigName::from("Leg")]);
        let children: Vec<_> = model.children_of("Leg").iter().map(|m| m.name.clone()).collect();
        assert_eq!(children, vec![RigName::from("Foot")]);
        assert!(model.is_module_parented_to("Foot", "Leg"));
        assert!(!model.is_module_parented_to("Leg", "Foot"));
    }

    #[test]
    fn test_breadth_first_order() {
        let model = ModularRigModel::new()
            .with_module(ModuleReference::new("Toe", "Foot").with_parent("Foot"))
            .with_module(ModuleReference::new("Spine", "Leg"))
            .with_module(ModuleReference::new("Foot", "Foot").with_parent("Leg"))
            .with_module(ModuleReference::new("Leg", "Leg"))
            .with_module(ModuleReference::new("Arm", "Arm").with_parent("Spine"));
        let order: Vec<_> = model.breadth_first().iter().map(|m| m.name.to_string()).collect();
        assert_eq!(order, vec!["Spine", "Leg", "Arm", "Foot", "Toe"]);
    }

    #[test]
    fn test_orphans_are_not_visited() {
        let model = leg_foot().with_module(ModuleReference::new("Hand", "Arm").with_parent("Arm"));
        assert_eq!(model.orphans().len(), 1);
        assert_eq!(model.breadth_first().len(), 2);
    }

    #[test]
    fn test_legacy_parent_path() {
        let model = ModularRigModel::new()
            .with_module(ModuleReference::new("Spine", "Leg"))
            .with_module(ModuleReference::new("Arm", "Arm").with_parent_path("Spine"))
            .with_module(ModuleReference::new("Hand", "Arm").with_parent_path("Spine:Arm"));
        assert_eq!(model.find_module("Hand").map(ModuleReference::legacy_path).as_deref(), Some("Spine:Arm:Hand"));
        assert!(model.is_module_parented_to("Hand", "Spine"));
        let order: Vec<_> = model.breadth_first().iter().map(|m| m.name.to_string()).collect();
        assert_eq!(order, vec!["Spine", "Arm", "Hand"]);
    }

    #[test]
    fn test_cycle_does_not_hang() {
        let model = ModularRigModel::new()
            .with_module(ModuleReference::new("A", "Leg").with_parent("B"))
            .with_module(ModuleReference::new("B", "Leg").with_parent("A"));
        assert!(model.breadth_first().is_empty());
        assert!(model.is_module_parented_to("A", "B"));
        assert!(!model.is_module_parented_to("A", "C"));
        assert_eq!(model.descendants_of("A"), vec![RigName::from("B")]);
    }

    #[test]
    fn test_json_round_trip() {
        let model = leg_foot();
        let json = model.to_json().unwrap();
        assert!(!json.contains("parent_path"));
        let back = ModularRigModel::from_json(&json).unwrap();
        assert_eq!(back, model);
    }

    #[test]
    fn test_connects_to_module() {
        let module = ModuleReference::new("Foot", "Foot")
            .with_connection("Root", vec![ElementKey::bone("Leg/ankle")]);
        assert!(module.connects_to_module("Leg"));
        assert!(!module.connects_to_module("Arm"));
    }
}

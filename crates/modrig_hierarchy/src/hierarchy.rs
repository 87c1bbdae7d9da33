//! The shared element store.

use crate::element::{ConnectorDeclaration, RigElement};
use crate::error::{HierarchyError, HierarchyResult};
use crate::redirector::ElementKeyRedirector;
use indexmap::IndexMap;
use modrig_core::{ElementKey, ElementType, RigName, Transform};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Serialized form of a hierarchy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct HierarchySnapshot {
    elements: Vec<RigElement>,
}

/// Ordered element store shared by all modules of a rig
///
/// Adding or removing elements bumps the topology version, which consumers
/// use to invalidate caches derived from the element set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "HierarchySnapshot", into = "HierarchySnapshot")]
pub struct RigHierarchy {
    elements: IndexMap<ElementKey, RigElement>,
    topology_version: u64,
    active_redirector: Option<Arc<ElementKeyRedirector>>,
    active_module: Option<RigName>,
}

impl TryFrom<HierarchySnapshot> for RigHierarchy {
    type Error = HierarchyError;

    fn try_from(snapshot: HierarchySnapshot) -> HierarchyResult<Self> {
        let mut hierarchy = Self::new();
        for element in snapshot.elements {
            hierarchy.add_element(element)?;
        }
        Ok(hierarchy)
    }
}

impl From<RigHierarchy> for HierarchySnapshot {
    fn from(hierarchy: RigHierarchy) -> Self {
        Self {
            elements: hierarchy.elements.into_values().collect(),
        }
    }
}

impl RigHierarchy {
    /// Create an empty hierarchy
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a hierarchy from JSON
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed or describes an invalid hierarchy
    pub fn from_json(json: &str) -> HierarchyResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Save the hierarchy as JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> HierarchyResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Add an element. Parents must be added before their children.
    ///
    /// # Errors
    ///
    /// Returns error if the key is invalid, already present, or the parent
    /// is missing
    pub fn add_element(&mut self, element: RigElement) -> HierarchyResult<()> {
        if !element.key.is_valid() {
            return Err(HierarchyError::InvalidKey(element.key));
        }
        if self.elements.contains_key(&element.key) {
            return Err(HierarchyError::DuplicateElement(element.key));
        }
        if let Some(parent) = &element.parent {
            if !self.elements.contains_key(parent) {
                return Err(HierarchyError::ParentNotFound {
                    key: element.key.clone(),
                    parent: parent.clone(),
                });
            }
        }
        debug!(element = %element.key, "Adding hierarchy element");
        self.elements.insert(element.key.clone(), element);
        self.topology_version += 1;
        Ok(())
    }

    /// Remove an element. Its children are reparented to its parent.
    ///
    /// # Errors
    ///
    /// Returns error if the element does not exist
    pub fn remove_element(&mut self, key: &ElementKey) -> HierarchyResult<RigElement> {
        let removed = self
            .elements
            .shift_remove(key)
            .ok_or_else(|| HierarchyError::ElementNotFound(key.clone()))?;
        for element in self.elements.values_mut() {
            if element.parent.as_ref() == Some(key) {
                element.parent.clone_from(&removed.parent);
            }
        }
        self.topology_version += 1;
        Ok(removed)
    }

    /// Remove every element owned by `module`
    pub fn remove_module_elements(&mut self, module: &str) -> usize {
        let keys: Vec<ElementKey> = self
            .elements
            .values()
            .filter(|e| e.module.as_ref().is_some_and(|m| m == module))
            .map(|e| e.key.clone())
            .collect();
        keys.iter()
            .filter(|key| self.remove_element(key).is_ok())
            .count()
    }

    /// Remove the connectors owned by `module` that are not in `keep`.
    /// Returns how many were removed.
    pub fn retain_module_connectors(&mut self, module: &str, keep: &[ElementKey]) -> usize {
        let stale: Vec<ElementKey> = self
            .connectors_of_module(module)
            .into_iter()
            .filter(|key| !keep.contains(key))
            .collect();
        stale
            .iter()
            .filter(|key| self.remove_element(key).is_ok())
            .count()
    }

    /// Check if an element exists
    #[must_use]
    pub fn contains(&self, key: &ElementKey) -> bool {
        self.elements.contains_key(key)
    }

    /// Find an element
    #[must_use]
    pub fn find(&self, key: &ElementKey) -> Option<&RigElement> {
        self.elements.get(key)
    }

    /// Find an element mutably
    pub fn find_mut(&mut self, key: &ElementKey) -> Option<&mut RigElement> {
        self.elements.get_mut(key)
    }

    /// Keys of all elements of a type, in insertion order
    #[must_use]
    pub fn find_elements_by_type(&self, element_type: ElementType) -> Vec<ElementKey> {
        self.elements
            .keys()
            .filter(|k| k.element_type == element_type)
            .cloned()
            .collect()
    }

    /// Owning module of an element.
    ///
    /// Uses the element's module tag, falling back to the module part of
    /// its name.
    #[must_use]
    pub fn module_namespace(&self, key: &ElementKey) -> Option<RigName> {
        if let Some(module) = self.elements.get(key).and_then(|e| e.module.clone()) {
            return Some(module);
        }
        key.module_path().module_name().map(RigName::from)
    }

    /// Keys of all elements owned by `module`
    #[must_use]
    pub fn elements_of_module(&self, module: &str) -> Vec<ElementKey> {
        self.elements
            .values()
            .filter(|e| e.module.as_ref().is_some_and(|m| m == module))
            .map(|e| e.key.clone())
            .collect()
    }

    /// Connector elements owned by `module`
    #[must_use]
    pub fn connectors_of_module(&self, module: &str) -> Vec<ElementKey> {
        self.elements_of_module(module)
            .into_iter()
            .filter(|k| k.element_type == ElementType::Connector)
            .collect()
    }

    /// The primary connector owned by `module`
    #[must_use]
    pub fn primary_connector_of_module(&self, module: &str) -> Option<ElementKey> {
        self.elements
            .values()
            .find(|e| e.is_primary_connector() && e.module.as_ref().is_some_and(|m| m == module))
            .map(|e| e.key.clone())
    }

    /// Create the connector elements a module declares.
    ///
    /// Existing connectors keep their place and get their settings updated.
    /// Returns the namespaced keys in declaration order.
    pub fn spawn_module_connectors(
        &mut self,
        module: &str,
        declarations: &[ConnectorDeclaration],
    ) -> Vec<ElementKey> {
        let mut keys = Vec::with_capacity(declarations.len());
        for declaration in declarations {
            let key = declaration.local_key().in_module(module);
            match self.elements.get_mut(&key) {
                Some(existing) => existing.connector = Some(declaration.settings.clone()),
                None => {
                    let element = RigElement::new(key.clone())
                        .with_module(module)
                        .with_connector(declaration.settings.clone());
                    self.elements.insert(key.clone(), element);
                    self.topology_version += 1;
                }
            }
            keys.push(key);
        }
        keys
    }

    /// Parent of an element
    #[must_use]
    pub fn parent_of(&self, key: &ElementKey) -> Option<&ElementKey> {
        self.elements.get(key)?.parent.as_ref()
    }

    /// Direct children of an element
    #[must_use]
    pub fn children_of(&self, key: &ElementKey) -> Vec<ElementKey> {
        self.elements
            .values()
            .filter(|e| e.parent.as_ref() == Some(key))
            .map(|e| e.key.clone())
            .collect()
    }

    /// Current global transform
    #[must_use]
    pub fn global_transform(&self, key: &ElementKey) -> Option<Transform> {
        self.elements.get(key).map(|e| e.global)
    }

    /// Reference pose global transform
    #[must_use]
    pub fn initial_global_transform(&self, key: &ElementKey) -> Option<Transform> {
        self.elements.get(key).map(|e| e.initial_global)
    }

    /// Set the current global transform. Children are not moved.
    ///
    /// # Errors
    ///
    /// Returns error if the element does not exist
    pub fn set_global_transform(&mut self, key: &ElementKey, transform: Transform) -> HierarchyResult<()> {
        let element = self
            .elements
            .get_mut(key)
            .ok_or_else(|| HierarchyError::ElementNotFound(key.clone()))?;
        element.global = transform;
        Ok(())
    }

    /// Return every element to its reference pose
    pub fn reset_pose(&mut self) {
        for element in self.elements.values_mut() {
            element.global = element.initial_global;
        }
    }

    /// Counter bumped on every structural change
    #[must_use]
    pub fn topology_version(&self) -> u64 {
        self.topology_version
    }

    /// Resolve a key through the active redirector, if any
    #[must_use]
    pub fn resolve_key(&self, key: &ElementKey) -> ElementKey {
        match &self.active_redirector {
            Some(redirector) => redirector.resolve(key, self),
            None => key.clone(),
        }
    }

    /// Redirector used by [`resolve_key`](Self::resolve_key)
    #[must_use]
    pub fn active_redirector(&self) -> Option<&Arc<ElementKeyRedirector>> {
        self.active_redirector.as_ref()
    }

    /// Slot holding the active redirector
    pub fn active_redirector_mut(&mut self) -> &mut Option<Arc<ElementKeyRedirector>> {
        &mut self.active_redirector
    }

    /// Module currently executing against this hierarchy
    #[must_use]
    pub fn active_module(&self) -> Option<&RigName> {
        self.active_module.as_ref()
    }

    /// Slot holding the active module
    pub fn active_module_mut(&mut self) -> &mut Option<RigName> {
        &mut self.active_module
    }

    /// Iterate elements in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &RigElement> {
        self.elements.values()
    }

    /// Number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ConnectorSettings;
    use modrig_core::{ModulePath, Vec3};

    fn skeleton() -> RigHierarchy {
        let mut h = RigHierarchy::new();
        h.add_element(RigElement::new(ElementKey::bone("root"))).unwrap();
        h.add_element(RigElement::new(ElementKey::bone("pelvis")).with_parent(ElementKey::bone("root")))
            .unwrap();
        h.add_element(
            RigElement::new(ElementKey::bone("thigh"))
                .with_parent(ElementKey::bone("pelvis"))
                .with_transform(Transform::from_translation(Vec3::new(0.0, 0.0, 90.0))),
        )
        .unwrap();
        h
    }

    #[test]
    fn test_add_and_find() {
        let h = skeleton();
        assert_eq!(h.len(), 3);
        assert!(h.contains(&ElementKey::bone("pelvis")));
        assert_eq!(h.parent_of(&ElementKey::bone("thigh")), Some(&ElementKey::bone("pelvis")));
        assert_eq!(h.children_of(&ElementKey::bone("root")), vec![ElementKey::bone("pelvis")]);
    }

    #[test]
    fn test_add_rejects_duplicates_and_missing_parents() {
        let mut h = skeleton();
        let err = h.add_element(RigElement::new(ElementKey::bone("root"))).unwrap_err();
        assert!(matches!(err, HierarchyError::DuplicateElement(_)));

        let err = h
            .add_element(RigElement::new(ElementKey::bone("foot")).with_parent(ElementKey::bone("calf")))
            .unwrap_err();
        assert!(matches!(err, HierarchyError::ParentNotFound { .. }));

        let err = h.add_element(RigElement::new(ElementKey::bone(""))).unwrap_err();
        assert!(matches!(err, HierarchyError::InvalidKey(_)));
    }

    #[test]
    fn test_topology_version_bumps() {
        let mut h = skeleton();
        let before = h.topology_version();
        h.remove_element(&ElementKey::bone("pelvis")).unwrap();
        assert!(h.topology_version() > before);
        assert_eq!(h.parent_of(&ElementKey::bone("thigh")), Some(&ElementKey::bone("root")));
    }

    #[test]
    fn test_find_elements_by_type() {
        let mut h = skeleton();
        h.spawn_module_connectors("Leg", &[ConnectorDeclaration::new("Root", ConnectorSettings::primary())]);
        assert_eq!(h.find_elements_by_type(ElementType::Bone).len(), 3);
        assert_eq!(
            h.find_elements_by_type(ElementType::Connector),
            vec![ElementKey::connector("Leg/Root")]
        );
    }

    #[test]
    fn test_spawn_module_connectors() {
        let mut h = RigHierarchy::new();
        let decls = [
            ConnectorDeclaration::new("Root", ConnectorSettings::primary()),
            ConnectorDeclaration::new("Tip", ConnectorSettings::secondary().optional()),
        ];
        let keys = h.spawn_module_connectors("Leg", &decls);
        assert_eq!(keys[0].name.as_str(), "Leg/Root");
        assert_eq!(h.connectors_of_module("Leg").len(), 2);
        assert_eq!(h.primary_connector_of_module("Leg"), Some(ElementKey::connector("Leg/Root")));

        let version = h.topology_version();
        h.spawn_module_connectors("Leg", &decls);
        assert_eq!(h.topology_version(), version);
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn test_module_namespace() {
        let mut h = RigHierarchy::new();
        h.add_element(RigElement::new(ElementKey::new(ElementType::Control, "Leg/ik_ctrl")).with_module("Leg"))
            .unwrap();
        assert_eq!(
            h.module_namespace(&ElementKey::new(ElementType::Control, "Leg/ik_ctrl")),
            Some(RigName::from("Leg"))
        );
        assert_eq!(
            h.module_namespace(&ElementKey::new(ElementType::Control, "Arm/fk")),
            Some(RigName::from("Arm"))
        );
        assert_eq!(h.module_namespace(&ElementKey::bone("pelvis")), None);
        assert_eq!(ModulePath::join("Leg", "ik_ctrl").module_name(), Some("Leg"));
    }

    #[test]
    fn test_transforms_and_reset() {
        let mut h = skeleton();
        let thigh = ElementKey::bone("thigh");
        let moved = Transform::from_translation(Vec3::new(1.0, 0.0, 0.0));
        h.set_global_transform(&thigh, moved).unwrap();
        assert_eq!(h.global_transform(&thigh), Some(moved));
        h.reset_pose();
        assert_eq!(h.global_transform(&thigh), h.initial_global_transform(&thigh));
        assert!(h.set_global_transform(&ElementKey::bone("nope"), moved).is_err());
    }

    #[test]
    fn test_resolve_key_through_active_redirector() {
        let mut h = skeleton();
        let mut connections = IndexMap::new();
        connections.insert(RigName::from("Root"), vec![ElementKey::bone("pelvis")]);
        *h.active_redirector_mut() = Some(Arc::new(ElementKeyRedirector::new("Leg", &connections)));

        assert_eq!(h.resolve_key(&ElementKey::connector("Root")), ElementKey::bone("pelvis"));
        *h.active_redirector_mut() = None;
        assert_eq!(h.resolve_key(&ElementKey::connector("Root")), ElementKey::connector("Root"));
    }

    #[test]
    fn test_remove_module_elements() {
        let mut h = skeleton();
        h.spawn_module_connectors("Leg", &[ConnectorDeclaration::new("Root", ConnectorSettings::primary())]);
        assert_eq!(h.remove_module_elements("Leg"), 1);
        assert!(h.connectors_of_module("Leg").is_empty());
    }

    #[test]
    fn test_retain_module_connectors() {
        let mut h = skeleton();
        h.spawn_module_connectors(
            "Leg",
            &[
                ConnectorDeclaration::new("Root", ConnectorSettings::primary()),
                ConnectorDeclaration::new("Tip", ConnectorSettings::secondary()),
            ],
        );
        h.spawn_module_connectors("Arm", &[ConnectorDeclaration::new("Root", ConnectorSettings::primary())]);
        let keep = h.spawn_module_connectors("Leg", &[ConnectorDeclaration::new("Tip", ConnectorSettings::primary())]);

        let version = h.topology_version();
        assert_eq!(h.retain_module_connectors("Leg", &keep), 1);
        assert!(h.topology_version() > version);
        assert_eq!(h.connectors_of_module("Leg"), vec![ElementKey::connector("Leg/Tip")]);
        assert_eq!(h.primary_connector_of_module("Leg"), Some(ElementKey::connector("Leg/Tip")));
        assert!(h.contains(&ElementKey::connector("Arm/Root")));
        assert_eq!(h.len(), 5);

        let version = h.topology_version();
        assert_eq!(h.retain_module_connectors("Leg", &keep), 0);
        assert_eq!(h.topology_version(), version);
    }

    #[test]
    fn test_json_round_trip_preserves_order() {
        let h = skeleton();
        let json = h.to_json().unwrap();
        let back = RigHierarchy::from_json(&json).unwrap();
        let keys: Vec<_> = back.iter().map(|e| e.key.clone()).collect();
        let expected: Vec<_> = h.iter().map(|e| e.key.clone()).collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_json_rejects_missing_parent() {
        let json = r#"{"elements":[{"key":{"type":"Bone","name":"a"},"parent":{"type":"Bone","name":"b"}}]}"#;
        assert!(RigHierarchy::from_json(json).is_err());
    }

    proptest::proptest! {
        #[test]
        fn prop_find_by_type_keeps_insertion_order(names in proptest::collection::vec("[a-z]{1,8}", 1..24)) {
            let mut h = RigHierarchy::new();
            let mut inserted = Vec::new();
            for name in names {
                let key = ElementKey::bone(name.as_str());
                if h.add_element(RigElement::new(key.clone())).is_ok() {
                    inserted.push(key);
                }
            }
            proptest::prop_assert_eq!(h.find_elements_by_type(ElementType::Bone), inserted);
        }
    }
}

//! Hierarchy elements and connector settings.

use modrig_core::{ElementKey, ElementType, RigName, Transform};
use serde::{Deserialize, Serialize};

/// Settings carried by connector elements
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorSettings {
    /// The primary connector places the module in the hierarchy
    #[serde(default)]
    pub primary: bool,
    /// Optional connectors may stay unresolved
    #[serde(default)]
    pub optional: bool,
    /// Array connectors accept several targets
    #[serde(default)]
    pub array: bool,
}

impl ConnectorSettings {
    /// Settings for a primary connector
    #[must_use]
    pub fn primary() -> Self {
        Self {
            primary: true,
            ..Self::default()
        }
    }

    /// Settings for a secondary connector
    #[must_use]
    pub fn secondary() -> Self {
        Self::default()
    }

    /// Mark as optional
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Mark as array
    #[must_use]
    pub fn array(mut self) -> Self {
        self.array = true;
        self
    }
}

/// A connector declared by a behavior class, in module-local terms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorDeclaration {
    /// Local connector name (no module prefix)
    pub name: RigName,
    /// Connector settings
    #[serde(default)]
    pub settings: ConnectorSettings,
}

impl ConnectorDeclaration {
    /// Create a new declaration
    #[must_use]
    pub fn new(name: impl Into<RigName>, settings: ConnectorSettings) -> Self {
        Self {
            name: name.into(),
            settings,
        }
    }

    /// Local key of this connector
    #[must_use]
    pub fn local_key(&self) -> ElementKey {
        ElementKey::connector(self.name.clone())
    }
}

/// One element in the hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigElement {
    /// Element key
    pub key: ElementKey,
    /// Parent element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ElementKey>,
    /// Owning module
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<RigName>,
    /// Reference pose transform in global space
    #[serde(default)]
    pub initial_global: Transform,
    /// Current transform in global space
    #[serde(default)]
    pub global: Transform,
    /// Connector settings, for connector elements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector: Option<ConnectorSettings>,
}

impl RigElement {
    /// Create a new element at the identity transform
    #[must_use]
    pub fn new(key: ElementKey) -> Self {
        let connector = (key.element_type == ElementType::Connector).then(ConnectorSettings::default);
        Self {
            key,
            parent: None,
            module: None,
            initial_global: Transform::IDENTITY,
            global: Transform::IDENTITY,
            connector,
        }
    }

    /// Set the parent
    #[must_use]
    pub fn with_parent(mut self, parent: ElementKey) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Set the owning module
    #[must_use]
    pub fn with_module(mut self, module: impl Into<RigName>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Set both initial and current global transform
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.initial_global = transform;
        self.global = transform;
        self
    }

    /// Set connector settings
    #[must_use]
    pub fn with_connector(mut self, settings: ConnectorSettings) -> Self {
        self.connector = Some(settings);
        self
    }

    /// Check if this is a primary connector
    #[must_use]
    pub fn is_primary_connector(&self) -> bool {
        self.connector.as_ref().is_some_and(|c| c.primary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_element_gets_settings() {
        let element = RigElement::new(ElementKey::connector("Leg/Root"));
        assert!(element.connector.is_some());
        assert!(!element.is_primary_connector());

        let bone = RigElement::new(ElementKey::bone("pelvis"));
        assert!(bone.connector.is_none());
    }

    #[test]
    fn test_builder() {
        let element = RigElement::new(ElementKey::connector("Leg/Root"))
            .with_module("Leg")
            .with_connector(ConnectorSettings::primary());
        assert!(element.is_primary_connector());
        assert_eq!(element.module.as_ref().map(RigName::as_str), Some("Leg"));
    }

    #[test]
    fn test_settings_flags() {
        let s = ConnectorSettings::secondary().optional().array();
        assert!(!s.primary);
        assert!(s.optional);
        assert!(s.array);
    }
}

//! Hierarchy element keys.

use crate::name::{ModulePath, RigName};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a hierarchy element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementType {
    /// Skeleton bone
    Bone,
    /// Transform-only helper
    Null,
    /// Animator-facing control
    Control,
    /// Float curve
    Curve,
    /// Reference to an external transform
    Reference,
    /// Socket that a module must resolve to a concrete element
    Connector,
    /// Attachment point other modules can connect to
    Socket,
}

impl ElementType {
    /// All element types in declaration order
    pub const ALL: [Self; 7] = [
        Self::Bone,
        Self::Null,
        Self::Control,
        Self::Curve,
        Self::Reference,
        Self::Connector,
        Self::Socket,
    ];
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bone => "Bone",
            Self::Null => "Null",
            Self::Control => "Control",
            Self::Curve => "Curve",
            Self::Reference => "Reference",
            Self::Connector => "Connector",
            Self::Socket => "Socket",
        };
        f.write_str(name)
    }
}

/// Key of a hierarchy element: type plus name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementKey {
    /// Element type
    #[serde(rename = "type")]
    pub element_type: ElementType,
    /// Element name (module-qualified for module-owned elements)
    pub name: RigName,
}

impl ElementKey {
    /// Create a new key
    #[must_use]
    pub fn new(element_type: ElementType, name: impl Into<RigName>) -> Self {
        Self {
            element_type,
            name: name.into(),
        }
    }

    /// Shorthand for a bone key
    #[must_use]
    pub fn bone(name: impl Into<RigName>) -> Self {
        Self::new(ElementType::Bone, name)
    }

    /// Shorthand for a connector key
    #[must_use]
    pub fn connector(name: impl Into<RigName>) -> Self {
        Self::new(ElementType::Connector, name)
    }

    /// A key is valid when it has a name
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.name.is_none()
    }

    /// Name interpreted as a module path
    #[must_use]
    pub fn module_path(&self) -> ModulePath {
        ModulePath::from(&self.name)
    }

    /// Same type, name with the module part removed
    #[must_use]
    pub fn without_module(&self) -> Self {
        Self::new(self.element_type, self.module_path().element_name())
    }

    /// Same type, name qualified with `module`
    #[must_use]
    pub fn in_module(&self, module: &str) -> Self {
        Self::new(
            self.element_type,
            ModulePath::join(module, self.name.as_str()).to_name(),
        )
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.element_type, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display() {
        let key = ElementKey::bone("pelvis");
        assert_eq!(key.to_string(), "Bone(pelvis)");
    }

    #[test]
    fn test_key_module_roundtrip() {
        let local = ElementKey::connector("Root");
        let qualified = local.in_module("Leg");
        assert_eq!(qualified.name.as_str(), "Leg/Root");
        assert_eq!(qualified.without_module(), local);
        assert_eq!(qualified.module_path().module_name(), Some("Leg"));
    }

    #[test]
    fn test_key_validity() {
        assert!(ElementKey::bone("spine").is_valid());
        assert!(!ElementKey::bone("").is_valid());
    }
}

//! Class descriptions.
//!
//! The model refers to behavior classes by name. Anything that can describe
//! those classes (a runtime class registry, a static table) implements
//! [`ClassCatalog`].

use modrig_core::{RigName, VariableSet};
use modrig_hierarchy::ConnectorDeclaration;

/// Name of a behavior class
pub type ClassName = RigName;

/// What the model needs to know about a behavior class
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassDescriptor {
    /// Class name
    pub name: ClassName,
    /// Whether instances can be composed into a modular rig
    pub is_module: bool,
    /// Declared connectors
    pub connectors: Vec<ConnectorDeclaration>,
    /// Declared variables with their class defaults
    pub variables: VariableSet,
}

impl ClassDescriptor {
    /// Find a connector declaration by local name
    #[must_use]
    pub fn connector(&self, name: &str) -> Option<&ConnectorDeclaration> {
        self.connectors.iter().find(|c| c.name == name)
    }

    /// The primary connector declaration
    #[must_use]
    pub fn primary_connector(&self) -> Option<&ConnectorDeclaration> {
        self.connectors.iter().find(|c| c.settings.primary)
    }
}

/// Source of class descriptions
pub trait ClassCatalog {
    /// Describe a class, `None` when unknown
    fn describe(&self, class: &str) -> Option<ClassDescriptor>;

    /// Variables of the owning rig that bindings may read
    fn host_variables(&self) -> VariableSet {
        VariableSet::new()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use indexmap::IndexMap;
    use modrig_core::{Value, VariableDescriptor};
    use modrig_hierarchy::ConnectorSettings;

    /// Leg / Foot / Arm classes plus a non-module helper class
    pub(crate) struct TestCatalog {
        classes: IndexMap<String, ClassDescriptor>,
        host: VariableSet,
    }

    impl TestCatalog {
        pub(crate) fn new() -> Self {
            let limb = |name: &str| ClassDescriptor {
                name: RigName::from(name),
                is_module: true,
                connectors: vec![
                    ConnectorDeclaration::new("Root", ConnectorSettings::primary()),
                    ConnectorDeclaration::new("Tip", ConnectorSettings::secondary().optional()),
                    ConnectorDeclaration::new("Targets", ConnectorSettings::secondary().array()),
                ],
                variables: VariableSet::new()
                    .with(VariableDescriptor::new("Speed", Value::Float(1.0)))
                    .with(VariableDescriptor::new("Count", Value::Int(0)))
                    .with(VariableDescriptor::new("Locked", Value::Bool(false)).read_only())
                    .with(VariableDescriptor::new("Color", {
                        let mut m = IndexMap::new();
                        m.insert("R".to_string(), Value::Float(1.0));
                        m.insert("G".to_string(), Value::Float(1.0));
                        Value::Struct(m)
                    })),
            };
            let mut classes = IndexMap::new();
            for name in ["Leg", "Foot", "Arm"] {
                classes.insert(name.to_string(), limb(name));
            }
            let mut tail = limb("Tail");
            tail.variables = VariableSet::new().with(VariableDescriptor::new("Speed", Value::Float(2.0)));
            tail.connectors.truncate(1);
            classes.insert("Tail".to_string(), tail);
            classes.insert(
                "Helper".to_string(),
                ClassDescriptor {
                    name: RigName::from("Helper"),
                    is_module: false,
                    ..ClassDescriptor::default()
                },
            );
            Self {
                classes,
                host: VariableSet::new().with(VariableDescriptor::new("GlobalSpeed", Value::Float(1.0))),
            }
        }
    }

    impl ClassCatalog for TestCatalog {
        fn describe(&self, class: &str) -> Option<ClassDescriptor> {
            self.classes.get(class).cloned()
        }

        fn host_variables(&self) -> VariableSet {
            self.host.clone()
        }
    }
}

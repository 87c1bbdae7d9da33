//! Executables: a behavior instance plus its runtime setup.

use crate::behavior::{ExecutionScope, RigBehavior};
use crate::context::ExecuteContext;
use modrig_core::{AssetUserData, EventName, ExecutableId, NameHash, RigName, VariableSet};
use modrig_hierarchy::{ConnectorDeclaration, ElementKeyRedirector, RigHierarchy};
use modrig_model::ClassName;
use std::sync::Arc;
use tracing::debug;

/// How an executable is wired into its owning rig
#[derive(Debug, Clone)]
pub struct ExecutableSetup {
    /// Namespace prefix, `Module/`
    pub module_prefix: String,
    /// Hash of the namespace prefix
    pub prefix_hash: NameHash,
    /// Key redirector built from the module's connections
    pub redirector: Option<Arc<ElementKeyRedirector>>,
    /// Reset the hierarchy pose before construction. Modules share the
    /// rig's hierarchy and keep this off.
    pub copy_hierarchy_before_construction: bool,
}

impl Default for ExecutableSetup {
    fn default() -> Self {
        Self {
            module_prefix: String::new(),
            prefix_hash: NameHash::NONE,
            redirector: None,
            copy_hierarchy_before_construction: true,
        }
    }
}

/// Live instance of a behavior class
pub struct Executable {
    id: ExecutableId,
    name: RigName,
    class: ClassName,
    behavior: Box<dyn RigBehavior>,
    /// Wiring into the owning rig
    pub setup: ExecutableSetup,
    /// The executable's own context
    pub context: ExecuteContext,
    init_required: bool,
    garbage: bool,
}

impl Executable {
    /// Create a new executable
    #[must_use]
    pub fn new(name: impl Into<RigName>, class: impl Into<ClassName>, behavior: Box<dyn RigBehavior>) -> Self {
        Self {
            id: ExecutableId::new(),
            name: name.into(),
            class: class.into(),
            behavior,
            setup: ExecutableSetup::default(),
            context: ExecuteContext::new(),
            init_required: true,
            garbage: false,
        }
    }

    /// Identity, stable for the executable's whole life
    #[must_use]
    pub fn id(&self) -> ExecutableId {
        self.id
    }

    /// Current name
    #[must_use]
    pub fn name(&self) -> &RigName {
        &self.name
    }

    /// Class this executable was created from
    #[must_use]
    pub fn class(&self) -> &ClassName {
        &self.class
    }

    /// Check if the executable has been discarded
    #[must_use]
    pub fn is_garbage(&self) -> bool {
        self.garbage
    }

    /// Whether the behavior can be composed into a modular rig
    #[must_use]
    pub fn is_composable_module(&self) -> bool {
        self.behavior.is_composable_module()
    }

    /// Check if `event` is handled
    #[must_use]
    pub fn supports_event(&self, event: &str) -> bool {
        !self.garbage && self.behavior.supports_event(event)
    }

    /// Events handled by the behavior
    #[must_use]
    pub fn supported_events(&self) -> Vec<EventName> {
        self.behavior.supported_events()
    }

    /// Connectors declared by the behavior
    #[must_use]
    pub fn connectors(&self) -> Vec<ConnectorDeclaration> {
        self.behavior.connectors()
    }

    /// Declared variables
    #[must_use]
    pub fn variables(&self) -> &VariableSet {
        self.behavior.variables()
    }

    /// Declared variables, writable
    pub fn variables_mut(&mut self) -> &mut VariableSet {
        self.behavior.variables_mut()
    }

    /// User data the behavior carries
    #[must_use]
    pub fn asset_user_data(&self) -> Vec<Arc<AssetUserData>> {
        self.behavior.asset_user_data()
    }

    /// Check if initialization is pending
    #[must_use]
    pub fn is_init_required(&self) -> bool {
        self.init_required || self.behavior.is_init_required()
    }

    /// Ask for initialization before the next execution
    pub fn request_init(&mut self) {
        self.init_required = true;
    }

    /// Initialize against `hierarchy`. Returns false on failure.
    pub fn initialize(&mut self, hierarchy: &mut RigHierarchy) -> bool {
        if self.garbage {
            return false;
        }
        let mut scope = ExecutionScope {
            module: &self.name,
            prefix: &self.setup.module_prefix,
            hierarchy,
            context: &mut self.context,
        };
        let ok = self.behavior.initialize(&mut scope);
        if ok {
            self.init_required = false;
        }
        debug!(module = %self.name, ok, "initialized executable");
        ok
    }

    /// Run one event against `hierarchy`. Returns false on failure.
    pub fn execute(&mut self, event: &str, construction_event: &str, hierarchy: &mut RigHierarchy) -> bool {
        if !self.supports_event(event) {
            return false;
        }
        if event == construction_event && self.setup.copy_hierarchy_before_construction {
            hierarchy.reset_pose();
        }
        self.context.event = Some(EventName::from(event));
        let mut scope = ExecutionScope {
            module: &self.name,
            prefix: &self.setup.module_prefix,
            hierarchy,
            context: &mut self.context,
        };
        let ok = self.behavior.execute(event, &mut scope);
        self.context.event = None;
        ok
    }

    /// Rename to a transient name and mark for collection
    pub fn discard(&mut self) {
        if self.garbage {
            return;
        }
        debug!(module = %self.name, id = %self.id, "discarding executable");
        self.name = RigName::from(format!("{}_TRANSIENT_{}", self.name, self.id));
        self.setup.redirector = None;
        self.garbage = true;
    }
}

impl std::fmt::Debug for Executable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executable")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("class", &self.class)
            .field("init_required", &self.init_required)
            .field("garbage", &self.garbage)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::{ScriptOp, ScriptedBehavior, ScriptedClass};
    use modrig_core::{ElementKey, Transform, Value, Vec3, VariableDescriptor};
    use modrig_hierarchy::RigElement;

    fn executable() -> Executable {
        let class = ScriptedClass::new("Leg")
            .with_variable(VariableDescriptor::new("Speed", Value::Float(1.0)))
            .with_event(
                "Construction",
                vec![ScriptOp::Add {
                    variable: "Speed".to_string(),
                    amount: 1.0,
                }],
            );
        Executable::new("Leg", "Leg", Box::new(ScriptedBehavior::new(Arc::new(class))))
    }

    #[test]
    fn test_initialize_clears_flag() {
        let mut exe = executable();
        assert!(exe.is_init_required());
        assert!(exe.initialize(&mut RigHierarchy::new()));
        assert!(!exe.is_init_required());
        exe.request_init();
        assert!(exe.is_init_required());
    }

    #[test]
    fn test_construction_resets_pose_when_copying() {
        let key = ElementKey::bone("pelvis");
        let mut hierarchy = RigHierarchy::new();
        hierarchy.add_element(RigElement::new(key.clone())).unwrap();
        let moved = Transform::from_translation(Vec3::new(1.0, 0.0, 0.0));
        hierarchy.set_global_transform(&key, moved).unwrap();

        let mut exe = executable();
        exe.setup.copy_hierarchy_before_construction = false;
        assert!(exe.execute("Construction", "Construction", &mut hierarchy));
        assert_eq!(hierarchy.global_transform(&key), Some(moved));

        exe.setup.copy_hierarchy_before_construction = true;
        assert!(exe.execute("Construction", "Construction", &mut hierarchy));
        assert_eq!(hierarchy.global_transform(&key), Some(Transform::IDENTITY));
        assert_eq!(exe.variables().value("Speed"), Some(&Value::Float(3.0)));
    }

    #[test]
    fn test_discard() {
        let mut exe = executable();
        let id = exe.id();
        exe.discard();
        assert!(exe.is_garbage());
        assert!(exe.name().as_str().starts_with("Leg_TRANSIENT_"));
        assert_eq!(exe.id(), id);
        assert!(!exe.supports_event("Construction"));
        assert!(!exe.execute("Construction", "Construction", &mut RigHierarchy::new()));
    }
}

//! Data-driven behaviors.
//!
//! A [`ScriptedClass`] lists, per event, a sequence of [`ScriptOp`]s run
//! against the module's own variables, the hierarchy and the execution
//! context. Class libraries are plain JSON.

use crate::behavior::{ExecutionScope, RigBehavior};
use crate::context::DrawInstruction;
use crate::error::RigResult;
use crate::registry::{BehaviorClass, ClassRegistry};
use indexmap::IndexMap;
use modrig_core::{
    AssetUserData, CoreError, ElementKey, ElementType, EventName, Transform, Value, VariableDescriptor,
    VariableSet,
};
use modrig_hierarchy::{ConnectorDeclaration, HierarchyError};
use modrig_model::ClassName;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// One step of a scripted event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum ScriptOp {
    /// Assign a value to a variable path
    Set {
        /// Target path
        variable: String,
        /// New value
        value: Value,
    },
    /// Add to a numeric variable
    Add {
        /// Target path
        variable: String,
        /// Amount to add
        amount: f64,
    },
    /// Add the context's delta time to a float variable
    AddTime {
        /// Target path
        variable: String,
    },
    /// Copy one variable path to another
    Copy {
        /// Source path
        from: String,
        /// Target path
        to: String,
    },
    /// Move an element to the translation held by a vector variable
    SetTranslation {
        /// Module-local element key
        element: ElementKey,
        /// Vector variable path
        from: String,
    },
    /// Queue a debug drawing
    Draw {
        /// Label
        label: String,
        /// Element whose transform is drawn
        #[serde(default)]
        element: Option<ElementKey>,
    },
    /// Store the number of elements being interacted with
    CountInteractions {
        /// Int variable path
        variable: String,
    },
    /// Exclude connector candidates that do not match
    FilterCandidates {
        /// Required element type
        #[serde(default)]
        element_type: Option<ElementType>,
        /// Required name fragment
        #[serde(default)]
        name_contains: Option<String>,
    },
    /// Mark the candidate with this element name as default
    SetDefaultMatch {
        /// Element name
        name: String,
    },
    /// Report failure
    Fail,
}

/// Why a scripted op failed
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// Variable access failed
    #[error(transparent)]
    Core(#[from] CoreError),
    /// Hierarchy access failed
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
    /// A `Fail` op ran
    #[error("script requested failure")]
    Failed,
}

fn default_true() -> bool {
    true
}

/// A behavior class described as data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedClass {
    /// Class name
    pub name: ClassName,
    /// Whether instances can be composed into a modular rig
    #[serde(default = "default_true")]
    pub is_module: bool,
    /// Declared connectors
    #[serde(default)]
    pub connectors: Vec<ConnectorDeclaration>,
    /// Declared variables with defaults
    #[serde(default)]
    pub variables: Vec<VariableDescriptor>,
    /// Ops per event
    #[serde(default)]
    pub events: IndexMap<EventName, Vec<ScriptOp>>,
    /// User data carried by every instance
    #[serde(default)]
    pub user_data: Vec<AssetUserData>,
}

impl ScriptedClass {
    /// Create a module class without variables or events
    #[must_use]
    pub fn new(name: impl Into<ClassName>) -> Self {
        Self {
            name: name.into(),
            is_module: true,
            connectors: Vec::new(),
            variables: Vec::new(),
            events: IndexMap::new(),
            user_data: Vec::new(),
        }
    }

    /// Declare a variable
    #[must_use]
    pub fn with_variable(mut self, descriptor: VariableDescriptor) -> Self {
        self.variables.push(descriptor);
        self
    }

    /// Declare a connector
    #[must_use]
    pub fn with_connector(mut self, connector: ConnectorDeclaration) -> Self {
        self.connectors.push(connector);
        self
    }

    /// Handle an event with the given ops
    #[must_use]
    pub fn with_event(mut self, event: impl Into<EventName>, ops: Vec<ScriptOp>) -> Self {
        self.events.insert(event.into(), ops);
        self
    }

    /// Mark as not composable
    #[must_use]
    pub fn not_a_module(mut self) -> Self {
        self.is_module = false;
        self
    }

    /// Wrap into a registrable class
    #[must_use]
    pub fn into_behavior_class(self) -> BehaviorClass {
        let name = self.name.clone();
        let class = Arc::new(self);
        BehaviorClass::new(name, move || Box::new(ScriptedBehavior::new(Arc::clone(&class))))
    }
}

/// Instance of a [`ScriptedClass`]
#[derive(Debug)]
pub struct ScriptedBehavior {
    class: Arc<ScriptedClass>,
    variables: VariableSet,
    user_data: Vec<Arc<AssetUserData>>,
}

impl ScriptedBehavior {
    /// Create an instance with class default variables
    #[must_use]
    pub fn new(class: Arc<ScriptedClass>) -> Self {
        let variables = class
            .variables
            .iter()
            .cloned()
            .fold(VariableSet::new(), VariableSet::with);
        let user_data = class.user_data.iter().cloned().map(Arc::new).collect();
        Self {
            class,
            variables,
            user_data,
        }
    }

    fn apply(&mut self, op: &ScriptOp, scope: &mut ExecutionScope<'_>) -> Result<(), ScriptError> {
        match op {
            ScriptOp::Set { variable, value } => self.variables.set_path(variable, value.clone())?,
            ScriptOp::Add { variable, amount } => self.add(variable, *amount)?,
            ScriptOp::AddTime { variable } => self.add(variable, scope.context.delta_time)?,
            ScriptOp::Copy { from, to } => {
                let value = self
                    .variables
                    .value_at_path(from)
                    .cloned()
                    .ok_or_else(|| CoreError::InvalidPath { path: from.clone() })?;
                self.variables.set_path(to, value)?;
            }
            ScriptOp::SetTranslation { element, from } => {
                let translation = match self.variables.value_at_path(from) {
                    Some(Value::Vector(v)) => *v,
                    Some(other) => {
                        return Err(CoreError::TypeMismatch {
                            expected: "Vector".to_string(),
                            actual: other.value_type().to_string(),
                        }
                        .into());
                    }
                    None => return Err(CoreError::InvalidPath { path: from.clone() }.into()),
                };
                let key = scope.resolve(element);
                let mut transform = scope
                    .hierarchy
                    .global_transform(&key)
                    .ok_or_else(|| HierarchyError::ElementNotFound(key.clone()))?;
                transform.translation = translation;
                scope.hierarchy.set_global_transform(&key, transform)?;
            }
            ScriptOp::Draw { label, element } => {
                let transform = element
                    .as_ref()
                    .and_then(|e| scope.hierarchy.global_transform(&scope.resolve(e)))
                    .unwrap_or(Transform::IDENTITY);
                scope.context.draw.draw(DrawInstruction {
                    module: scope.module.clone(),
                    label: label.clone(),
                    transform,
                });
            }
            ScriptOp::CountInteractions { variable } => {
                let count = i64::try_from(scope.context.interaction_elements.len()).unwrap_or(i64::MAX);
                self.variables.set_path(variable, Value::Int(count))?;
            }
            ScriptOp::FilterCandidates {
                element_type,
                name_contains,
            } => {
                scope.context.connector.exclude_where(|key| {
                    element_type.is_some_and(|t| key.element_type != t)
                        || name_contains
                            .as_deref()
                            .is_some_and(|fragment| !key.name.as_str().contains(fragment))
                });
            }
            ScriptOp::SetDefaultMatch { name } => {
                let key = scope
                    .context
                    .connector
                    .candidates
                    .iter()
                    .find(|c| c.key.name == name.as_str())
                    .map(|c| c.key.clone());
                match key {
                    Some(key) => {
                        scope.context.connector.set_default_match(&key);
                    }
                    None => debug!(module = %scope.module, candidate = %name, "default match not among candidates"),
                }
            }
            ScriptOp::Fail => return Err(ScriptError::Failed),
        }
        Ok(())
    }

    fn add(&mut self, path: &str, amount: f64) -> Result<(), CoreError> {
        let updated = match self.variables.value_at_path(path) {
            Some(Value::Float(v)) => Value::Float(v + amount),
            Some(Value::Int(v)) => Value::Int(v + amount.round() as i64),
            Some(other) => {
                return Err(CoreError::TypeMismatch {
                    expected: "Float".to_string(),
                    actual: other.value_type().to_string(),
                });
            }
            None => {
                return Err(CoreError::InvalidPath {
                    path: path.to_string(),
                });
            }
        };
        self.variables.set_path(path, updated)
    }
}

impl RigBehavior for ScriptedBehavior {
    fn supported_events(&self) -> Vec<EventName> {
        self.class.events.keys().cloned().collect()
    }

    fn supports_event(&self, event: &str) -> bool {
        self.class.events.contains_key(event)
    }

    fn is_composable_module(&self) -> bool {
        self.class.is_module
    }

    fn connectors(&self) -> Vec<ConnectorDeclaration> {
        self.class.connectors.clone()
    }

    fn variables(&self) -> &VariableSet {
        &self.variables
    }

    fn variables_mut(&mut self) -> &mut VariableSet {
        &mut self.variables
    }

    fn execute(&mut self, event: &str, scope: &mut ExecutionScope<'_>) -> bool {
        let class = Arc::clone(&self.class);
        let Some(ops) = class.events.get(event) else {
            return false;
        };
        for op in ops {
            if let Err(err) = self.apply(op, scope) {
                warn!(module = %scope.module, event, error = %err, "scripted op failed");
                return false;
            }
        }
        true
    }

    fn asset_user_data(&self) -> Vec<Arc<AssetUserData>> {
        self.user_data.clone()
    }
}

/// A set of scripted classes plus the variables of the owning rig
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptLibrary {
    /// Variables of the owning rig
    #[serde(default)]
    pub host_variables: Vec<VariableDescriptor>,
    /// Classes
    #[serde(default)]
    pub classes: Vec<ScriptedClass>,
}

impl ScriptLibrary {
    /// Create an empty library
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a class
    #[must_use]
    pub fn with_class(mut self, class: ScriptedClass) -> Self {
        self.classes.push(class);
        self
    }

    /// Add a variable of the owning rig
    #[must_use]
    pub fn with_host_variable(mut self, descriptor: VariableDescriptor) -> Self {
        self.host_variables.push(descriptor);
        self
    }

    /// Load a library from JSON
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed
    pub fn from_json(json: &str) -> RigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> RigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Variables of the owning rig as a set
    #[must_use]
    pub fn host_variable_set(&self) -> VariableSet {
        self.host_variables
            .iter()
            .cloned()
            .fold(VariableSet::new(), VariableSet::with)
    }

    /// Build a registry holding every class
    #[must_use]
    pub fn into_registry(self) -> ClassRegistry {
        let registry = ClassRegistry::new().with_host_variables(self.host_variable_set());
        for class in self.classes {
            registry.register(class.into_behavior_class());
        }
        registry
    }
}

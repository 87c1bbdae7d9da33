//! Behavior interface implemented by every module class.

use crate::context::ExecuteContext;
use modrig_core::{AssetUserData, ElementKey, EventName, RigName, VariableSet};
use modrig_hierarchy::{ConnectorDeclaration, RigHierarchy};
use std::sync::Arc;

/// Everything a behavior may touch while it runs
pub struct ExecutionScope<'a> {
    /// Name of the executing module
    pub module: &'a RigName,
    /// Namespace prefix of the module, `Module/`
    pub prefix: &'a str,
    /// Shared hierarchy, with the module's redirector active
    pub hierarchy: &'a mut RigHierarchy,
    /// The module's own context
    pub context: &'a mut ExecuteContext,
}

impl ExecutionScope<'_> {
    /// Resolve a module-local key through the active redirector
    #[must_use]
    pub fn resolve(&self, key: &ElementKey) -> ElementKey {
        self.hierarchy.resolve_key(key)
    }
}

/// A unit of rig behavior.
///
/// The runtime never inspects a behavior beyond this interface: capability,
/// events, connectors and an explicit variable list.
pub trait RigBehavior: Send {
    /// Events this behavior handles
    fn supported_events(&self) -> Vec<EventName>;

    /// Check if `event` is handled
    fn supports_event(&self, event: &str) -> bool {
        self.supported_events().iter().any(|e| e == event)
    }

    /// Whether instances can be composed into a modular rig
    fn is_composable_module(&self) -> bool;

    /// Connectors declared by this behavior
    fn connectors(&self) -> Vec<ConnectorDeclaration> {
        Vec::new()
    }

    /// Declared variables
    fn variables(&self) -> &VariableSet;

    /// Declared variables, writable
    fn variables_mut(&mut self) -> &mut VariableSet;

    /// Prepare for execution. Returns false on failure.
    fn initialize(&mut self, _scope: &mut ExecutionScope<'_>) -> bool {
        true
    }

    /// Run one event. Returns false on failure.
    fn execute(&mut self, event: &str, scope: &mut ExecutionScope<'_>) -> bool;

    /// Whether the behavior changed and must be initialized again
    fn is_init_required(&self) -> bool {
        false
    }

    /// User data the behavior carries itself
    fn asset_user_data(&self) -> Vec<Arc<AssetUserData>> {
        Vec::new()
    }
}

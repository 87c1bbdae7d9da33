//! The modular rig.

use crate::config::RigConfig;
use crate::context::{AssetUserDataSources, DrawInterface, ExecuteContext, InteractionType};
use crate::error::{ErrorSink, RigError, RigResult};
use crate::module::ModuleInstance;
use crate::monitor::RigMetrics;
use crate::registry::ClassRegistry;
use crate::scheduler::{ExecutionElement, ExecutionQueue};
use crate::tree::ModuleTree;
use indexmap::IndexSet;
use modrig_core::{ElementKey, EventName, ExecutableId, RigName, Value, ValueGuard, VariableSet};
use modrig_hierarchy::RigHierarchy;
use modrig_model::{ClassCatalog, ClassDescriptor, ModularRigModel};
use once_cell::unsync::OnceCell;
use std::sync::Arc;
use tracing::debug;

/// A rig composed of modules.
///
/// The rig reconciles its module instances against a shared model the
/// first time it is evaluated after the model changed, then runs events
/// across the modules in breadth-first tree order.
#[derive(Debug)]
pub struct ModularRig {
    pub(crate) config: RigConfig,
    pub(crate) registry: Arc<ClassRegistry>,
    pub(crate) model: Arc<ModularRigModel>,
    pub(crate) modules: Vec<ModuleInstance>,
    pub(crate) tree: ModuleTree,
    pub(crate) hierarchy: RigHierarchy,
    pub(crate) context: ExecuteContext,
    pub(crate) queue: ExecutionQueue,
    pub(crate) host_variables: VariableSet,
    pub(crate) user_data: AssetUserDataSources,
    pub(crate) supported_events: OnceCell<Vec<EventName>>,
    pub(crate) metrics: RigMetrics,
    pub(crate) errors: ErrorSink,
    pub(crate) needs_compose: bool,
}

impl ModularRig {
    /// Create a new rig over `model`, resolving classes through `registry`
    #[must_use]
    pub fn new(model: impl Into<Arc<ModularRigModel>>, registry: Arc<ClassRegistry>) -> Self {
        let host_variables = registry.host_variables();
        Self {
            config: RigConfig::default(),
            registry,
            model: model.into(),
            modules: Vec::new(),
            tree: ModuleTree::new(),
            hierarchy: RigHierarchy::new(),
            context: ExecuteContext::new(),
            queue: ExecutionQueue::new(),
            host_variables,
            user_data: AssetUserDataSources::default(),
            supported_events: OnceCell::new(),
            metrics: RigMetrics::new(),
            errors: ErrorSink::new(),
            needs_compose: true,
        }
    }

    /// Set the configuration
    #[must_use]
    pub fn with_config(mut self, config: RigConfig) -> Self {
        self.config = config;
        self.needs_compose = true;
        self
    }

    /// Set the hierarchy the modules run against
    #[must_use]
    pub fn with_hierarchy(mut self, hierarchy: RigHierarchy) -> Self {
        self.hierarchy = hierarchy;
        self
    }

    /// Replace the model. Modules are reconciled on next use.
    pub fn set_model(&mut self, model: impl Into<Arc<ModularRigModel>>) {
        self.model = model.into();
        self.needs_compose = true;
    }

    /// The model this rig composes
    #[must_use]
    pub fn model(&self) -> &Arc<ModularRigModel> {
        &self.model
    }

    /// Configuration
    #[must_use]
    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    /// Class registry
    #[must_use]
    pub fn registry(&self) -> &Arc<ClassRegistry> {
        &self.registry
    }

    /// Shared hierarchy
    #[must_use]
    pub fn hierarchy(&self) -> &RigHierarchy {
        &self.hierarchy
    }

    /// Shared hierarchy, writable
    pub fn hierarchy_mut(&mut self) -> &mut RigHierarchy {
        &mut self.hierarchy
    }

    /// Shared execution context
    #[must_use]
    pub fn context(&self) -> &ExecuteContext {
        &self.context
    }

    /// Shared execution context, writable
    pub fn context_mut(&mut self) -> &mut ExecuteContext {
        &mut self.context
    }

    /// Debug drawing sink shared with every module
    #[must_use]
    pub fn draw_interface(&self) -> &DrawInterface {
        &self.context.draw
    }

    /// Set the user data sources merged for every module
    pub fn set_user_data(&mut self, sources: AssetUserDataSources) {
        self.user_data = sources;
    }

    /// The persistent execution queue
    #[must_use]
    pub fn queue(&self) -> &ExecutionQueue {
        &self.queue
    }

    /// Metrics
    #[must_use]
    pub fn metrics(&self) -> &RigMetrics {
        &self.metrics
    }

    /// Install a callback receiving every reported error
    pub fn set_error_handler(&mut self, handler: impl FnMut(&RigError) + Send + 'static) {
        self.errors.set_handler(Box::new(handler));
    }

    /// Number of errors reported so far
    #[must_use]
    pub fn reported_errors(&self) -> u64 {
        self.errors.reported()
    }

    /// Check if the modules are out of date with the model
    #[must_use]
    pub fn needs_compose(&self) -> bool {
        self.needs_compose
    }

    /// Run one event across every module supporting it.
    ///
    /// Reconciles first when the model changed. Returns the modules that
    /// executed successfully, in execution order.
    pub fn evaluate(&mut self, event: &str) -> Vec<RigName> {
        if self.needs_compose {
            self.update_module_hierarchy();
        }
        self.reset_execution_queue();
        self.enqueue(event);
        self.execute_queue();
        executed_names(&self.queue, &self.modules)
    }

    /// Run one event on a single module, outside the persistent queue
    pub fn execute_event_on_module(&mut self, event: &str, module: &str) -> bool {
        if self.needs_compose {
            self.update_module_hierarchy();
        }
        let Some(index) = self.tree.find(module) else {
            self.errors.report(RigError::ModuleNotFound(RigName::from(module)));
            return false;
        };
        if self.tree.orphans().contains(&index) {
            debug!(module, event, "orphaned module not executed");
            return false;
        }
        let single = ExecutionQueue::single(ExecutionElement::new(index, self.tree.generation(), event));
        let mut rig = ValueGuard::new(self, |r| &mut r.queue, single);
        rig.execute_queue();
        rig.queue.elements().first().and_then(|e| e.executed).unwrap_or(false)
    }

    /// Run one event on every module supporting it, outside the persistent
    /// queue. Returns the modules that executed successfully.
    pub fn execute_event_on_all_modules(&mut self, event: &str) -> Vec<RigName> {
        if self.needs_compose {
            self.update_module_hierarchy();
        }
        let mut rig = ValueGuard::new(self, |r| &mut r.queue, ExecutionQueue::new());
        rig.enqueue(event);
        rig.execute_queue();
        executed_names(&rig.queue, &rig.modules)
    }

    /// Union of the events supported by the modules, as of the last
    /// reconciliation
    pub fn supported_events(&self) -> &[EventName] {
        self.supported_events.get_or_init(|| {
            let mut events = IndexSet::new();
            for module in &self.modules {
                if let Some(executable) = module.executable() {
                    events.extend(executable.supported_events());
                }
            }
            events.into_iter().collect()
        })
    }

    /// Check if any module supports `event`
    #[must_use]
    pub fn supports_event(&self, event: &str) -> bool {
        self.supported_events().iter().any(|e| e == event)
    }

    pub(crate) fn invalidate_supported_events(&mut self) {
        self.supported_events = OnceCell::new();
    }

    /// Discard every executable and clear the module tree
    pub fn reset(&mut self) {
        for module in &mut self.modules {
            if let Some(mut executable) = module.take_executable() {
                executable.discard();
                self.metrics.record_discarded();
            }
            self.hierarchy.remove_module_elements(module.name.as_str());
        }
        self.modules.clear();
        self.tree.clear();
        self.queue.reset();
        self.invalidate_supported_events();
        self.needs_compose = true;
        debug!("rig reset");
    }

    /// Module instances in model order
    #[must_use]
    pub fn modules(&self) -> &[ModuleInstance] {
        &self.modules
    }

    /// Module tree index
    #[must_use]
    pub fn tree(&self) -> &ModuleTree {
        &self.tree
    }

    /// Root modules in list order
    #[must_use]
    pub fn root_modules(&self) -> Vec<&ModuleInstance> {
        self.tree.roots().iter().filter_map(|&i| self.modules.get(i)).collect()
    }

    /// Direct children of a module
    #[must_use]
    pub fn child_modules(&self, module: &str) -> Vec<&ModuleInstance> {
        self.find_module(module)
            .map(|m| m.child_indices().iter().filter_map(|&i| self.modules.get(i)).collect())
            .unwrap_or_default()
    }

    pub(crate) fn module_index(&self, name: &str) -> Option<usize> {
        self.modules.iter().position(|m| m.name == name)
    }

    /// Find a module by name
    #[must_use]
    pub fn find_module(&self, name: &str) -> Option<&ModuleInstance> {
        self.module_index(name).map(|i| &self.modules[i])
    }

    /// Find a module by name, writable
    pub fn find_module_mut(&mut self, name: &str) -> Option<&mut ModuleInstance> {
        let index = self.module_index(name)?;
        self.modules.get_mut(index)
    }

    /// Find the module owning an element
    #[must_use]
    pub fn find_module_by_element(&self, key: &ElementKey) -> Option<&ModuleInstance> {
        let module = self.hierarchy.module_namespace(key)?;
        self.find_module(module.as_str())
    }

    /// Find the module holding an executable
    #[must_use]
    pub fn find_module_by_executable(&self, id: ExecutableId) -> Option<&ModuleInstance> {
        self.modules
            .iter()
            .find(|m| m.executable().is_some_and(|e| e.id() == id))
    }

    /// Module names in execution order
    #[must_use]
    pub fn module_names(&self) -> Vec<RigName> {
        let mut names = Vec::with_capacity(self.modules.len());
        self.tree.for_each(&self.modules, |_, m| {
            names.push(m.name.clone());
            true
        });
        names
    }

    /// Deprecated module paths in execution order
    #[must_use]
    pub fn module_paths(&self) -> Vec<String> {
        let mut paths = Vec::with_capacity(self.modules.len());
        self.tree.for_each(&self.modules, |_, m| {
            paths.push(m.path.clone());
            true
        });
        paths
    }

    /// Set the elements being interacted with and the kind of interaction
    pub fn set_elements_being_interacted(&mut self, elements: Vec<ElementKey>, interaction: InteractionType) {
        self.context.interaction_elements = elements;
        self.context.interaction_type = interaction;
    }

    /// Elements being interacted with
    #[must_use]
    pub fn elements_being_interacted(&self) -> &[ElementKey] {
        &self.context.interaction_elements
    }

    /// Advance the clock by `delta` seconds
    pub fn advance_time(&mut self, delta: f64) {
        self.context.delta_time = delta;
        self.context.absolute_time += delta;
        if delta > 0.0 {
            self.context.frames_per_second = 1.0 / delta;
        }
    }

    /// Variables of the rig itself
    #[must_use]
    pub fn host_variables(&self) -> &VariableSet {
        &self.host_variables
    }

    /// Value of a rig variable
    #[must_use]
    pub fn host_variable(&self, path: &str) -> Option<&Value> {
        self.host_variables.value_at_path(path)
    }

    /// Write a rig variable
    ///
    /// # Errors
    ///
    /// Returns error if the variable is unknown or the type is incompatible
    pub fn set_host_variable(&mut self, path: &str, value: Value) -> RigResult<()> {
        Ok(self.host_variables.set_path(path, value)?)
    }

    /// Value of a module variable
    #[must_use]
    pub fn module_variable(&self, module: &str, path: &str) -> Option<&Value> {
        self.find_module(module)?
            .executable()?
            .variables()
            .value_at_path(path)
    }

    /// Write a public module variable
    ///
    /// # Errors
    ///
    /// Returns error if the module has no live executable, or the variable
    /// is unknown, not public, read only or of another type
    pub fn set_module_variable(&mut self, module: &str, path: &str, value: Value) -> RigResult<()> {
        let executable = self
            .find_module_mut(module)
            .and_then(ModuleInstance::get_executable)
            .ok_or_else(|| RigError::ModuleNotFound(RigName::from(module)))?;
        Ok(executable.variables_mut().set_external(path, value)?)
    }
}

fn executed_names(queue: &ExecutionQueue, modules: &[ModuleInstance]) -> Vec<RigName> {
    queue
        .elements()
        .iter()
        .filter(|e| e.executed == Some(true))
        .filter_map(|e| modules.get(e.module))
        .map(|m| m.name.clone())
        .collect()
}

impl ClassCatalog for ModularRig {
    fn describe(&self, class: &str) -> Option<ClassDescriptor> {
        self.registry.describe(class)
    }

    fn host_variables(&self) -> VariableSet {
        self.host_variables.clone()
    }
}

//! Execution queue and drain.
//!
//! The queue holds (module, event) pairs in tree order. Draining it runs
//! each module with its redirector and active module installed on the
//! shared hierarchy, after pushing the shared context and bound values
//! into the module.

use crate::bindings::copy_bound_values;
use crate::context::{merge_user_data, InteractionType};
use crate::error::RigError;
use crate::rig::ModularRig;
use modrig_core::{EventName, RigName, Value, ValueGuard};
use modrig_hierarchy::RigHierarchy;
use std::sync::Arc;
use tracing::{debug, trace};

/// One queued execution
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionElement {
    /// Module index in the rig's instance list
    pub module: usize,
    /// Tree generation the index belongs to
    pub generation: u64,
    /// Event to run
    pub event: EventName,
    /// Outcome, set once the element has been drained
    pub executed: Option<bool>,
}

impl ExecutionElement {
    /// Create a pending element
    #[must_use]
    pub fn new(module: usize, generation: u64, event: impl Into<EventName>) -> Self {
        Self {
            module,
            generation,
            event: event.into(),
            executed: None,
        }
    }
}

/// FIFO of execution elements with a front index
#[derive(Debug, Clone, Default)]
pub struct ExecutionQueue {
    elements: Vec<ExecutionElement>,
    front: usize,
}

impl ExecutionQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue holding a single element
    #[must_use]
    pub fn single(element: ExecutionElement) -> Self {
        Self {
            elements: vec![element],
            front: 0,
        }
    }

    /// Clear elements and front index
    pub fn reset(&mut self) {
        self.elements.clear();
        self.front = 0;
    }

    /// Append an element
    pub fn push(&mut self, element: ExecutionElement) {
        self.elements.push(element);
    }

    /// Element at the front
    #[must_use]
    pub fn current(&self) -> Option<&ExecutionElement> {
        self.elements.get(self.front)
    }

    /// Element at the front, writable
    pub fn current_mut(&mut self) -> Option<&mut ExecutionElement> {
        self.elements.get_mut(self.front)
    }

    /// Move the front forward
    pub fn advance(&mut self) {
        if self.front < self.elements.len() {
            self.front += 1;
        }
    }

    /// Front index
    #[must_use]
    pub fn front(&self) -> usize {
        self.front
    }

    /// Check if every element has been drained
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.front >= self.elements.len()
    }

    /// All elements, drained or not
    #[must_use]
    pub fn elements(&self) -> &[ExecutionElement] {
        &self.elements
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

impl ModularRig {
    /// Empty the execution queue
    pub fn reset_execution_queue(&mut self) {
        self.queue.reset();
    }

    /// Queue `event` for every module that supports it, in tree order.
    ///
    /// The interaction event is only queued for modules owning one of the
    /// elements being interacted with. Returns the number of elements
    /// queued.
    pub fn enqueue(&mut self, event: &str) -> usize {
        let generation = self.tree.generation();
        let interaction = self.config.interaction_event == event;
        let mut queued = 0;
        for &index in self.tree.order() {
            let module = &self.modules[index];
            if !module.executable().is_some_and(|e| e.supports_event(event)) {
                continue;
            }
            if interaction && !self.is_module_interacted(module.name.as_str()) {
                continue;
            }
            self.queue.push(ExecutionElement::new(index, generation, event));
            queued += 1;
        }
        debug!(event, queued, "queued event");
        queued
    }

    /// Drain the queue. Every element is visited once; failures are
    /// recorded on the element and never retried.
    pub fn execute_queue(&mut self) {
        while let Some(element) = self.queue.current().cloned() {
            let outcome = self.run_element(&element);
            if let Some(current) = self.queue.current_mut() {
                current.executed = Some(outcome);
            }
            self.queue.advance();
        }
    }

    fn is_module_interacted(&self, module: &str) -> bool {
        self.context
            .interaction_elements
            .iter()
            .any(|key| self.hierarchy.module_namespace(key).is_some_and(|m| m == module))
    }

    /// Initialize a module's executable with its redirector installed
    pub(crate) fn initialize_module(&mut self, index: usize) -> bool {
        let ModularRig {
            modules,
            hierarchy,
            errors,
            ..
        } = self;
        let Some(module) = modules.get_mut(index) else {
            return false;
        };
        let name = module.name.clone();
        let Some(executable) = module.get_executable() else {
            return false;
        };
        let redirector = executable.setup.redirector.clone();
        let mut hierarchy = ValueGuard::new(hierarchy, RigHierarchy::active_redirector_mut, redirector);
        let mut hierarchy = ValueGuard::new(&mut *hierarchy, RigHierarchy::active_module_mut, Some(name.clone()));
        let ok = executable.initialize(&mut hierarchy);
        if !ok {
            errors.report(RigError::ReinitFailed(name));
        }
        ok
    }

    fn run_element(&mut self, element: &ExecutionElement) -> bool {
        if element.generation != self.tree.generation() {
            self.metrics.record_skip();
            return false;
        }
        let event = element.event.as_str();
        let Some(name) = self.modules.get(element.module).map(|m| m.name.clone()) else {
            self.metrics.record_skip();
            return false;
        };

        let values = self.bound_values(element.module);
        let interaction_elements: Vec<_> = self
            .context
            .interaction_elements
            .iter()
            .filter(|key| self.hierarchy.module_namespace(key).is_some_and(|m| m == name))
            .cloned()
            .collect();
        let interaction_type = if interaction_elements.is_empty() {
            InteractionType::NONE
        } else {
            self.context.interaction_type
        };
        let external_user_data: Vec<_> = self
            .host_variables
            .iter()
            .filter_map(|d| match &d.value {
                Value::UserData(data) => Some(Arc::clone(data)),
                _ => None,
            })
            .collect();

        let ModularRig {
            modules,
            hierarchy,
            context: shared,
            config,
            metrics,
            errors,
            user_data,
            ..
        } = self;
        let module = &mut modules[element.module];
        let overrides = module.config_overrides.clone();
        let Some(executable) = module.get_executable() else {
            metrics.record_skip();
            return false;
        };
        if !executable.supports_event(event) {
            trace!(module = %name, event, "event no longer supported, skipping");
            metrics.record_skip();
            return false;
        }

        let is_connector_event = config.connector_event == event;
        let redirector = if is_connector_event {
            hierarchy
                .active_redirector()
                .cloned()
                .or_else(|| executable.setup.redirector.clone())
        } else {
            executable.setup.redirector.clone()
        };
        let mut hierarchy = ValueGuard::new(hierarchy, RigHierarchy::active_redirector_mut, redirector);
        let mut hierarchy = ValueGuard::new(&mut *hierarchy, RigHierarchy::active_module_mut, Some(name.clone()));

        executable.context.copy_shared_from(shared);

        if executable.is_init_required() {
            metrics.record_reinit();
            if !executable.initialize(&mut hierarchy) {
                errors.report(RigError::ReinitFailed(name));
                return false;
            }
            for (path, source) in overrides.apply_to(executable.variables_mut()) {
                errors.report(RigError::OverrideFailed {
                    module: name.clone(),
                    path,
                    source,
                });
            }
        }

        executable.context.interaction_elements = interaction_elements;
        executable.context.interaction_type = interaction_type;

        let own_user_data = executable.asset_user_data();
        executable.context.asset_user_data = merge_user_data([
            user_data.skeleton.as_slice(),
            user_data.mesh.as_slice(),
            user_data.component.as_slice(),
            own_user_data.as_slice(),
            user_data.outer.as_slice(),
            external_user_data.as_slice(),
        ]);

        copy_bound_values(&name, executable.variables_mut(), values, metrics, errors);

        if is_connector_event {
            executable.context.connector = shared.connector.clone();
        }
        let ok = executable.execute(event, config.construction_event.as_str(), &mut hierarchy);
        metrics.record_execution(ok);
        if is_connector_event {
            shared.connector = executable.context.connector.clone();
        }
        if !ok {
            errors.report(RigError::ExecutionFailed {
                module: name,
                event: RigName::from(event),
            });
        }
        ok
    }
}

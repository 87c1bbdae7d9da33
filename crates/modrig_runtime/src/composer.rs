//! Reconciliation of live module instances against the model.

use crate::error::RigError;
use crate::executable::Executable;
use crate::module::ModuleInstance;
use crate::registry::BehaviorClass;
use crate::rig::ModularRig;
use crate::config::OrphanPolicy;
use indexmap::IndexMap;
use modrig_core::{ModulePath, NameHash, RigName};
use modrig_hierarchy::ElementKeyRedirector;
use modrig_model::ModuleReference;
use std::sync::Arc;
use tracing::{debug, info};

/// Executables parked during one reconciliation pass.
///
/// Whatever is not reclaimed is discarded when the pass finishes, or when
/// this value is dropped on an early exit.
#[derive(Debug, Default)]
pub(crate) struct PreviousExecutables {
    parked: IndexMap<RigName, Executable>,
    discarded: Vec<RigName>,
}

impl PreviousExecutables {
    pub(crate) fn park(&mut self, module: RigName, executable: Executable) {
        if let Some(mut displaced) = self.parked.insert(module.clone(), executable) {
            displaced.discard();
            self.discarded.push(module);
        }
    }

    /// Reclaim the executable parked under `module` if it was made from
    /// `class`. A parked executable of another class is discarded.
    pub(crate) fn take(&mut self, module: &str, class: &str) -> Option<Executable> {
        let mut executable = self.parked.shift_remove(module)?;
        if executable.class() == class && !executable.is_garbage() {
            return Some(executable);
        }
        debug!(module, class, previous = %executable.class(), "parked executable does not match, discarding");
        executable.discard();
        self.discarded.push(RigName::from(module));
        None
    }

    /// Discard everything still parked. Returns the names of every module
    /// whose executable was discarded during the pass.
    pub(crate) fn finish(mut self) -> Vec<RigName> {
        self.discard_remaining();
        std::mem::take(&mut self.discarded)
    }

    fn discard_remaining(&mut self) {
        for (module, mut executable) in self.parked.drain(..) {
            executable.discard();
            self.discarded.push(module);
        }
    }
}

impl Drop for PreviousExecutables {
    fn drop(&mut self) {
        self.discard_remaining();
    }
}

impl ModularRig {
    /// Converge the live module instances to the model.
    ///
    /// Safe to call repeatedly. Executables are reused when a module keeps
    /// its name and class. Malformed references are reported and skipped.
    pub fn update_module_hierarchy(&mut self) {
        self.metrics.record_reconciliation();
        self.needs_compose = false;

        let mut previous = PreviousExecutables::default();
        for module in &mut self.modules {
            if let Some(executable) = module.take_executable() {
                previous.park(module.name.clone(), executable);
            }
        }
        self.modules.clear();
        self.tree.clear();
        self.queue.reset();
        self.invalidate_supported_events();

        let model = Arc::clone(&self.model);
        let may_load = !self.config.enforce_owner_thread || self.registry.is_owner_thread();
        for reference in &model.modules {
            let Some(class) = self.registry.resolve(reference.class.as_str(), may_load) else {
                self.errors.report(RigError::UnknownClass {
                    module: reference.name.clone(),
                    class: reference.class.clone(),
                });
                continue;
            };
            self.add_module_instance(reference, &class, &mut previous);
        }

        for module in previous.finish() {
            self.metrics.record_discarded();
            if !self.modules.iter().any(|m| m.name == module) {
                let removed = self.hierarchy.remove_module_elements(module.as_str());
                debug!(module = %module, removed, "removed elements of deleted module");
            }
        }

        for index in 0..self.modules.len() {
            let name = self.modules[index].name.clone();
            let bindings = model
                .find_module(name.as_str())
                .map(|r| r.bindings.clone())
                .unwrap_or_default();
            if !self.set_module_variable_bindings(name.as_str(), &bindings) {
                self.modules[index].bindings.clear();
            }
            self.initialize_module(index);
        }

        self.tree.rebuild(&mut self.modules, self.config.resolve_legacy_paths);
        if self.config.orphan_policy == OrphanPolicy::Warn {
            for &index in self.tree.orphans() {
                let module = &self.modules[index];
                let parent = module
                    .parent_name
                    .as_ref()
                    .map(ToString::to_string)
                    .or_else(|| module.parent_path.clone())
                    .unwrap_or_default();
                self.errors.report(RigError::OrphanModule {
                    module: module.name.clone(),
                    parent,
                });
            }
        }
        info!(
            modules = self.modules.len(),
            orphans = self.tree.orphans().len(),
            "module hierarchy updated"
        );
    }

    /// Add one module instance. Returns its index, or `None` when the
    /// reference is rejected.
    pub(crate) fn add_module_instance(
        &mut self,
        reference: &ModuleReference,
        class: &BehaviorClass,
        previous: &mut PreviousExecutables,
    ) -> Option<usize> {
        let name = &reference.name;
        if self.modules.iter().any(|m| m.name == *name) {
            self.errors.report(RigError::DuplicateModule(name.clone()));
            return None;
        }
        if !class.is_module() {
            self.errors.report(RigError::NotAModule {
                module: name.clone(),
                class: class.name().clone(),
            });
            return None;
        }

        let mut executable = match previous.take(name.as_str(), class.name().as_str()) {
            Some(mut reused) => {
                let reset = reused.variables_mut().reset_from(class.default_variables());
                debug!(module = %name, reset, "reusing executable");
                self.metrics.record_reused();
                reused
            }
            None => {
                debug!(module = %name, class = %class.name(), "instantiating executable");
                self.metrics.record_created();
                Executable::new(name.clone(), class.name().clone(), class.instantiate())
            }
        };

        let prefix = format!("{}{}", name, ModulePath::MODULE_SEPARATOR);
        executable.request_init();
        executable.setup.copy_hierarchy_before_construction = false;
        executable.setup.prefix_hash = NameHash::of(&prefix);
        executable.setup.module_prefix = prefix;
        executable.setup.redirector = Some(Arc::new(ElementKeyRedirector::new(
            name.clone(),
            &reference.connections,
        )));

        let connectors = self.hierarchy.spawn_module_connectors(name.as_str(), class.connectors());
        let stale = self.hierarchy.retain_module_connectors(name.as_str(), &connectors);
        if stale > 0 {
            debug!(module = %name, stale, "removed connectors the class no longer declares");
        }

        for (path, source) in reference.config_overrides.apply_to(executable.variables_mut()) {
            self.errors.report(RigError::OverrideFailed {
                module: name.clone(),
                path,
                source,
            });
        }

        let mut module = ModuleInstance::from_reference(reference);
        module.set_executable(Some(executable));
        self.modules.push(module);
        Some(self.modules.len() - 1)
    }
}

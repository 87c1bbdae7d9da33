//! Editing API for the modular rig model.
//!
//! Every mutation keeps the model consistent: renames rewrite parents,
//! connections and binding sources; deletions remove everything that
//! referenced the deleted modules. Successful mutations are announced to
//! subscribers unless notifications are suspended.

use crate::binding::BindingSource;
use crate::catalog::{ClassCatalog, ClassDescriptor};
use crate::error::{ModelError, ModelResult};
use crate::model::{ModularRigModel, ModuleReference};
use crate::overrides::root_variable;
use indexmap::IndexMap;
use modrig_core::{sanitize_name, CoreError, ElementKey, ElementType, ModulePath, RigName, Value, ValueType, VariableDescriptor};
use tracing::{debug, warn};

/// Change announced by the controller
#[derive(Debug, Clone, PartialEq)]
pub enum ModelNotification {
    /// A module was added
    ModuleAdded(RigName),
    /// A module was removed
    ModuleRemoved(RigName),
    /// A module was renamed
    ModuleRenamed {
        /// Previous name
        old: RigName,
        /// New name
        new: RigName,
    },
    /// A module got a new parent
    ModuleReparented {
        /// Module
        module: RigName,
        /// New parent, `None` for root
        parent: Option<RigName>,
    },
    /// A connection was made or removed
    ConnectionChanged {
        /// Module-qualified connector key
        connector: ElementKey,
    },
    /// A config override was set or reset
    ConfigValueChanged {
        /// Module
        module: RigName,
        /// Property path
        path: String,
    },
    /// A variable binding was made or removed
    BindingChanged {
        /// Module
        module: RigName,
        /// Target variable
        variable: RigName,
    },
    /// A module changed class
    ClassChanged {
        /// Module
        module: RigName,
        /// New class
        class: RigName,
    },
}

type Subscriber = Box<dyn FnMut(&ModelNotification) + Send>;

/// Controller owning a model and applying checked edits to it
pub struct ModelController {
    model: ModularRigModel,
    subscribers: Vec<Subscriber>,
    notifications_suspended: bool,
}

impl Default for ModelController {
    fn default() -> Self {
        Self::new(ModularRigModel::new())
    }
}

impl ModelController {
    /// Create a controller for a model
    #[must_use]
    pub fn new(model: ModularRigModel) -> Self {
        Self {
            model,
            subscribers: Vec::new(),
            notifications_suspended: false,
        }
    }

    /// The model being edited
    #[must_use]
    pub fn model(&self) -> &ModularRigModel {
        &self.model
    }

    /// Take the edited model
    #[must_use]
    pub fn into_model(self) -> ModularRigModel {
        self.model
    }

    /// Register a notification subscriber
    pub fn subscribe(&mut self, subscriber: impl FnMut(&ModelNotification) + Send + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    /// Suspend or resume notifications, returning the previous state
    pub fn suspend_notifications(&mut self, suspend: bool) -> bool {
        std::mem::replace(&mut self.notifications_suspended, suspend)
    }

    fn notify(&mut self, notification: ModelNotification) {
        if self.notifications_suspended {
            return;
        }
        for subscriber in &mut self.subscribers {
            subscriber(&notification);
        }
    }

    fn module(&self, name: &str) -> ModelResult<&ModuleReference> {
        self.model
            .find_module(name)
            .ok_or_else(|| ModelError::ModuleNotFound(RigName::from(name)))
    }

    fn module_mut(&mut self, name: &str) -> ModelResult<&mut ModuleReference> {
        self.model
            .find_module_mut(name)
            .ok_or_else(|| ModelError::ModuleNotFound(RigName::from(name)))
    }

    fn module_class(&self, name: &str, catalog: &dyn ClassCatalog) -> ModelResult<ClassDescriptor> {
        let class = self.module(name)?.class.clone();
        catalog.describe(class.as_str()).ok_or(ModelError::UnknownClass(class))
    }

    /// Check if no module uses `name`
    #[must_use]
    pub fn is_name_available(&self, name: &str) -> bool {
        !name.is_empty() && !self.model.contains(name)
    }

    /// Sanitized, unused variant of `desired`, suffixed `_1`, `_2`, ...
    #[must_use]
    pub fn safe_new_name(&self, desired: &str) -> RigName {
        let mut base = sanitize_name(desired, false);
        if base.is_empty() {
            base = "Module".to_string();
        }
        if self.is_name_available(&base) {
            return RigName::new(base);
        }
        let mut suffix = 1usize;
        loop {
            let candidate = format!("{}_{}", base, suffix);
            if self.is_name_available(&candidate) {
                return RigName::new(candidate);
            }
            suffix += 1;
        }
    }

    /// Check a name for use as a module name
    ///
    /// # Errors
    ///
    /// Returns error if the name is empty, contains separators or
    /// characters removed by sanitization
    pub fn check_module_name(name: &str) -> ModelResult<()> {
        let invalid = |reason: &str| ModelError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        };
        if name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if name.contains(ModulePath::MODULE_SEPARATOR) || name.contains(ModulePath::NAMESPACE_SEPARATOR_DEPRECATED) {
            return Err(invalid("name contains a path separator"));
        }
        if sanitize_name(name, false) != name {
            return Err(invalid("name contains invalid characters"));
        }
        Ok(())
    }

    /// Add a module of `class` below `parent`.
    ///
    /// The name is sanitized and made unique. Returns the name used.
    ///
    /// # Errors
    ///
    /// Returns error if the class is unknown or not a module, or the parent
    /// does not exist
    pub fn add_module(
        &mut self,
        desired_name: &str,
        class: &str,
        parent: Option<&str>,
        catalog: &dyn ClassCatalog,
    ) -> ModelResult<RigName> {
        let descriptor = catalog
            .describe(class)
            .ok_or_else(|| ModelError::UnknownClass(RigName::from(class)))?;
        if !descriptor.is_module {
            return Err(ModelError::NotAModule(RigName::from(class)));
        }
        if let Some(parent) = parent {
            self.module(parent)?;
        }
        let desired = if desired_name.is_empty() { class } else { desired_name };
        let name = self.safe_new_name(desired);
        let mut module = ModuleReference::new(name.clone(), class);
        module.parent = parent.map(RigName::from);
        self.model.modules.push(module);
        debug!(module = %name, class, "Added module");
        self.notify(ModelNotification::ModuleAdded(name.clone()));
        Ok(name)
    }

    /// Delete a module and all modules below it.
    ///
    /// Connections into deleted modules and bindings reading from them are
    /// removed from the remaining modules. Returns the deleted names,
    /// children first.
    ///
    /// # Errors
    ///
    /// Returns error if the module does not exist
    pub fn delete_module(&mut self, name: &str) -> ModelResult<Vec<RigName>> {
        self.module(name)?;
        let mut deleted = self.model.descendants_of(name);
        deleted.reverse();
        deleted.push(RigName::from(name));

        self.model.modules.retain(|m| !deleted.contains(&m.name));
        let mut changed_connectors = Vec::new();
        for module in &mut self.model.modules {
            let own = module.name.clone();
            module.connections.retain(|connector, targets| {
                let into_deleted = targets
                    .iter()
                    .any(|t| t.module_path().module_name().is_some_and(|m| deleted.iter().any(|d| d == m)));
                if into_deleted {
                    changed_connectors.push(ElementKey::connector(connector.clone()).in_module(own.as_str()));
                }
                !into_deleted
            });
            module.bindings.retain(|_, expr| {
                BindingSource::parse(expr)
                    .is_none_or(|source| source.module.as_ref().is_none_or(|m| !deleted.contains(m)))
            });
        }

        for connector in changed_connectors {
            self.notify(ModelNotification::ConnectionChanged { connector });
        }
        for removed in &deleted {
            debug!(module = %removed, "Deleted module");
            self.notify(ModelNotification::ModuleRemoved(removed.clone()));
        }
        Ok(deleted)
    }

    /// Rename a module, rewriting every reference to it
    ///
    /// # Errors
    ///
    /// Returns error if the module does not exist, the new name is invalid
    /// or already in use
    pub fn rename_module(&mut self, old: &str, new: &str) -> ModelResult<RigName> {
        self.module(old)?;
        if old == new {
            return Ok(RigName::from(new));
        }
        Self::check_module_name(new)?;
        if !self.is_name_available(new) {
            return Err(ModelError::DuplicateModule(RigName::from(new)));
        }

        let renamed = self.module(old)?;
        let old_legacy = renamed.legacy_path();
        let new_legacy = match &renamed.parent_path {
            Some(parent) => format!("{}{}{}", parent, ModulePath::NAMESPACE_SEPARATOR_DEPRECATED, new),
            None => new.to_string(),
        };
        let nested_prefix = format!("{}{}", old_legacy, ModulePath::NAMESPACE_SEPARATOR_DEPRECATED);
        let new_name = RigName::from(new);
        for module in &mut self.model.modules {
            if module.name == old {
                module.name = new_name.clone();
            }
            if module.parent.as_ref().is_some_and(|p| p == old) {
                module.parent = Some(new_name.clone());
            }
            if let Some(path) = module.parent_path.as_mut() {
                let updated = if *path == old_legacy {
                    Some(new_legacy.clone())
                } else {
                    path.strip_prefix(&nested_prefix).map(|rest| {
                        format!("{}{}{}", new_legacy, ModulePath::NAMESPACE_SEPARATOR_DEPRECATED, rest)
                    })
                };
                if let Some(updated) = updated {
                    *path = updated;
                }
            }
            for target in module.connections.values_mut().flatten() {
                if let Some(path) = target.module_path().replace_module_name(old, new) {
                    target.name = path.to_name();
                }
            }
            for expr in module.bindings.values_mut() {
                if let Some(source) = BindingSource::parse(expr) {
                    *expr = source.renamed(old, new).to_string();
                }
            }
        }
        debug!(old, new, "Renamed module");
        self.notify(ModelNotification::ModuleRenamed {
            old: RigName::from(old),
            new: new_name.clone(),
        });
        Ok(new_name)
    }

    /// Move a module below another module, or to the root with `None`.
    ///
    /// Connections that would now point into the module's own subtree are
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns error if either module does not exist or the move creates a
    /// cycle
    pub fn reparent_module(&mut self, name: &str, new_parent: Option<&str>) -> ModelResult<()> {
        self.module(name)?;
        if let Some(parent) = new_parent {
            self.module(parent)?;
            if parent == name || self.model.is_module_parented_to(parent, name) {
                return Err(ModelError::ParentCycle {
                    module: RigName::from(name),
                    parent: RigName::from(parent),
                });
            }
        }
        let module = self.module_mut(name)?;
        module.parent = new_parent.map(RigName::from);
        module.parent_path = None;
        self.disconnect_cyclic_connectors();
        self.notify(ModelNotification::ModuleReparented {
            module: RigName::from(name),
            parent: new_parent.map(RigName::from),
        });
        Ok(())
    }

    /// Remove connections that target a module below the connecting module.
    fn disconnect_cyclic_connectors(&mut self) {
        let mut cyclic: Vec<(usize, RigName)> = Vec::new();
        for (index, module) in self.model.modules.iter().enumerate() {
            for (connector, targets) in &module.connections {
                let into_child = targets.iter().any(|t| {
                    t.module_path()
                        .module_name()
                        .is_some_and(|target| self.model.is_module_parented_to(target, module.name.as_str()))
                });
                if into_child {
                    cyclic.push((index, connector.clone()));
                }
            }
        }
        for (index, connector) in cyclic {
            let module = &mut self.model.modules[index];
            module.connections.shift_remove(&connector);
            let key = ElementKey::connector(connector).in_module(module.name.as_str());
            warn!(connector = %key, "Disconnected cyclic connector");
            self.notify(ModelNotification::ConnectionChanged { connector: key });
        }
    }

    /// Change the class of a module.
    ///
    /// Connections to connectors the new class does not declare are
    /// dropped, then overrides and bindings are refreshed.
    ///
    /// # Errors
    ///
    /// Returns error if the module does not exist or the class is unknown
    /// or not a module
    pub fn swap_module_class(&mut self, name: &str, class: &str, catalog: &dyn ClassCatalog) -> ModelResult<()> {
        let descriptor = catalog
            .describe(class)
            .ok_or_else(|| ModelError::UnknownClass(RigName::from(class)))?;
        if !descriptor.is_module {
            return Err(ModelError::NotAModule(RigName::from(class)));
        }
        let module = self.module_mut(name)?;
        module.class = RigName::from(class);
        module
            .connections
            .retain(|connector, _| descriptor.connector(connector.as_str()).is_some());
        self.refresh_module_variables(name, catalog)?;
        self.notify(ModelNotification::ClassChanged {
            module: RigName::from(name),
            class: RigName::from(class),
        });
        Ok(())
    }

    /// Drop overrides and bindings that no longer match the module's class
    ///
    /// # Errors
    ///
    /// Returns error if the module does not exist or its class is unknown
    pub fn refresh_module_variables(&mut self, name: &str, catalog: &dyn ClassCatalog) -> ModelResult<()> {
        let descriptor = self.module_class(name, catalog)?;
        let module = self.module_mut(name)?;
        module.config_overrides.retain(|path, value| {
            descriptor
                .variables
                .value_at_path(path)
                .is_some_and(|default| value.value_type().is_compatible_with(&default.value_type()))
        });
        module
            .bindings
            .retain(|variable, _| descriptor.variables.get(variable.as_str()).is_some_and(|d| d.public && !d.read_only));
        Ok(())
    }

    /// Connect a module connector to elements.
    ///
    /// Connecting the primary connector parents the module under the module
    /// owning the first target.
    ///
    /// # Errors
    ///
    /// Returns error if the connector is unknown, the targets are invalid,
    /// a secondary connector is connected before the primary, or the
    /// connection would create a parent cycle
    pub fn connect_connector(
        &mut self,
        connector: &ElementKey,
        targets: Vec<ElementKey>,
        catalog: &dyn ClassCatalog,
    ) -> ModelResult<()> {
        let invalid = |reason: &str| ModelError::InvalidConnection {
            connector: connector.clone(),
            reason: reason.to_string(),
        };
        let path = connector.module_path();
        let (module_name, local) = path
            .split()
            .filter(|_| connector.element_type == ElementType::Connector)
            .ok_or_else(|| ModelError::ConnectorNotFound(connector.clone()))?;
        let descriptor = self.module_class(module_name, catalog)?;
        let declaration = descriptor
            .connector(local)
            .ok_or_else(|| ModelError::ConnectorNotFound(connector.clone()))?;

        if targets.is_empty() {
            return Err(invalid("no targets"));
        }
        if targets.iter().any(|t| t == connector) {
            return Err(invalid("connector cannot target itself"));
        }
        if !declaration.settings.array && targets.len() > 1 {
            return Err(invalid("connector accepts a single target"));
        }

        let module = self.module(module_name)?;
        let mut new_parent = module.parent.clone();
        if declaration.settings.primary {
            new_parent = targets[0].module_path().module_name().map(RigName::from);
            if let Some(parent) = &new_parent {
                if parent == module_name || self.model.is_module_parented_to(parent.as_str(), module_name) {
                    return Err(ModelError::ParentCycle {
                        module: RigName::from(module_name),
                        parent: parent.clone(),
                    });
                }
            }
        } else if let Some(primary) = descriptor.primary_connector() {
            if !module.connections.get(&primary.name).is_some_and(|t| !t.is_empty()) {
                return Err(invalid("primary connector must be resolved first"));
            }
        }

        let module_name = RigName::from(module_name);
        let module = self.module_mut(module_name.as_str())?;
        let reparented = module.parent != new_parent;
        module.parent = new_parent.clone();
        if reparented {
            module.parent_path = None;
        }
        module.connections.insert(declaration.name.clone(), targets);
        debug!(connector = %connector, "Connected connector");
        self.notify(ModelNotification::ConnectionChanged {
            connector: connector.clone(),
        });
        if reparented {
            self.disconnect_cyclic_connectors();
            self.notify(ModelNotification::ModuleReparented {
                module: module_name,
                parent: new_parent,
            });
        }
        Ok(())
    }

    /// Disconnect a module connector.
    ///
    /// Disconnecting the primary connector removes every connection of the
    /// module and moves it to the root.
    ///
    /// # Errors
    ///
    /// Returns error if the connector is unknown or not connected
    pub fn disconnect_connector(&mut self, connector: &ElementKey, catalog: &dyn ClassCatalog) -> ModelResult<()> {
        let path = connector.module_path();
        let (module_name, local) = path
            .split()
            .ok_or_else(|| ModelError::ConnectorNotFound(connector.clone()))?;
        let descriptor = self.module_class(module_name, catalog)?;
        let declaration = descriptor
            .connector(local)
            .ok_or_else(|| ModelError::ConnectorNotFound(connector.clone()))?;

        let module = self.module_mut(module_name)?;
        if !module.connections.contains_key(&declaration.name) {
            return Err(ModelError::InvalidConnection {
                connector: connector.clone(),
                reason: "not connected".to_string(),
            });
        }
        let mut unparented = false;
        if declaration.settings.primary {
            module.connections.clear();
            unparented = module.parent.take().is_some() | module.parent_path.take().is_some();
        } else {
            module.connections.shift_remove(&declaration.name);
        }
        self.notify(ModelNotification::ConnectionChanged {
            connector: connector.clone(),
        });
        if unparented {
            self.notify(ModelNotification::ModuleReparented {
                module: RigName::from(module_name),
                parent: None,
            });
        }
        Ok(())
    }

    fn writable_variable(
        &self,
        module: &str,
        variable: &str,
        catalog: &dyn ClassCatalog,
    ) -> ModelResult<VariableDescriptor> {
        let descriptor = self.module_class(module, catalog)?;
        let variable = descriptor
            .variables
            .get(variable)
            .cloned()
            .ok_or_else(|| CoreError::UnknownVariable {
                name: variable.to_string(),
            })?;
        if variable.read_only || !variable.public {
            return Err(CoreError::ReadOnly {
                name: variable.name.to_string(),
            }
            .into());
        }
        Ok(variable)
    }

    /// Override a config value of a module.
    ///
    /// Setting a path removes overrides nested below it.
    ///
    /// # Errors
    ///
    /// Returns error if the variable is unknown, read only, of another
    /// type, or a parent path already carries an override
    pub fn set_config_value(
        &mut self,
        module: &str,
        path: &str,
        value: Value,
        catalog: &dyn ClassCatalog,
    ) -> ModelResult<()> {
        let variable = self.writable_variable(module, root_variable(path), catalog)?;
        let rest = path.strip_prefix(variable.name.as_str()).unwrap_or_default();
        let rest = rest.strip_prefix(modrig_core::value::PATH_SEPARATOR).unwrap_or(rest);
        let default = variable.value.get_path(rest).ok_or_else(|| CoreError::InvalidPath {
            path: path.to_string(),
        })?;
        let (expected, actual) = (default.value_type(), value.value_type());
        if !actual.is_compatible_with(&expected) {
            return Err(CoreError::TypeMismatch {
                expected: expected.to_string(),
                actual: actual.to_string(),
            }
            .into());
        }

        let reference = self.module_mut(module)?;
        if let Some(parent) = reference.config_overrides.overridden_parent(path) {
            return Err(ModelError::OverrideBlocked {
                path: path.to_string(),
                parent: parent.to_string(),
            });
        }
        reference.config_overrides.set(path, value);
        self.notify(ModelNotification::ConfigValueChanged {
            module: RigName::from(module),
            path: path.to_string(),
        });
        Ok(())
    }

    /// Remove a config override. Returns whether one was present.
    ///
    /// # Errors
    ///
    /// Returns error if the module does not exist
    pub fn reset_config_value(&mut self, module: &str, path: &str) -> ModelResult<bool> {
        let removed = self.module_mut(module)?.config_overrides.remove(path).is_some();
        if removed {
            self.notify(ModelNotification::ConfigValueChanged {
                module: RigName::from(module),
                path: path.to_string(),
            });
        }
        Ok(removed)
    }

    fn source_type(&self, source: &BindingSource, catalog: &dyn ClassCatalog) -> Option<ValueType> {
        let variables = match &source.module {
            None => catalog.host_variables(),
            Some(module) => self.module_class(module.as_str(), catalog).ok()?.variables,
        };
        let variable = variables.get(source.variable.as_str())?;
        (variable.public || source.is_host()).then(|| variable.value_type())
    }

    /// Check whether `module.variable` may be bound to `source`
    ///
    /// # Errors
    ///
    /// Returns the reason the binding is rejected
    pub fn can_bind_module_variable(
        &self,
        module: &str,
        variable: &str,
        source: &str,
        catalog: &dyn ClassCatalog,
    ) -> ModelResult<()> {
        let reject = |reason: String| ModelError::InvalidBinding {
            module: RigName::from(module),
            variable: RigName::from(variable),
            reason,
        };
        let target = self.writable_variable(module, variable, catalog)?;
        let parsed = BindingSource::parse(source).ok_or_else(|| reject(format!("invalid source '{}'", source)))?;
        if let Some(source_module) = &parsed.module {
            if !self.model.contains(source_module.as_str()) {
                return Err(reject(format!("source module '{}' not found", source_module)));
            }
            if source_module == module {
                return Err(reject("cannot bind to the same module".to_string()));
            }
            if self.model.is_module_parented_to(source_module.as_str(), module) {
                return Err(reject(format!("source module '{}' is a child of '{}'", source_module, module)));
            }
        }
        let source_type = self
            .source_type(&parsed, catalog)
            .ok_or_else(|| reject(format!("source '{}' not found", source)))?;
        if !source_type.is_compatible_with(&target.value_type()) {
            return Err(reject(format!(
                "type {} is not compatible with {}",
                source_type,
                target.value_type()
            )));
        }
        Ok(())
    }

    /// Bind `module.variable` to `source`
    ///
    /// # Errors
    ///
    /// Returns error if the binding is rejected
    pub fn bind_module_variable(
        &mut self,
        module: &str,
        variable: &str,
        source: &str,
        catalog: &dyn ClassCatalog,
    ) -> ModelResult<()> {
        self.can_bind_module_variable(module, variable, source, catalog)?;
        self.module_mut(module)?
            .bindings
            .insert(RigName::from(variable), source.to_string());
        self.notify(ModelNotification::BindingChanged {
            module: RigName::from(module),
            variable: RigName::from(variable),
        });
        Ok(())
    }

    /// Remove a binding. Returns whether one was present.
    ///
    /// # Errors
    ///
    /// Returns error if the module does not exist
    pub fn unbind_module_variable(&mut self, module: &str, variable: &str) -> ModelResult<bool> {
        let removed = self.module_mut(module)?.bindings.shift_remove(variable).is_some();
        if removed {
            self.notify(ModelNotification::BindingChanged {
                module: RigName::from(module),
                variable: RigName::from(variable),
            });
        }
        Ok(removed)
    }

    /// Every source expression `module.variable` could be bound to
    #[must_use]
    pub fn possible_bindings(&self, module: &str, variable: &str, catalog: &dyn ClassCatalog) -> Vec<String> {
        let candidates = catalog
            .host_variables()
            .iter()
            .map(|v| v.name.to_string())
            .chain(self.model.modules.iter().flat_map(|m| {
                catalog
                    .describe(m.class.as_str())
                    .map(|class| class.variables.names())
                    .unwrap_or_default()
                    .into_iter()
                    .map(move |v| BindingSource::in_module(m.name.clone(), v).to_string())
            }))
            .collect::<Vec<_>>();
        candidates
            .into_iter()
            .filter(|source| self.can_bind_module_variable(module, variable, source, catalog).is_ok())
            .collect()
    }

    /// Export modules and everything below them as JSON
    ///
    /// # Errors
    ///
    /// Returns error if a module does not exist or serialization fails
    pub fn export_modules(&self, names: &[&str]) -> ModelResult<String> {
        let mut selected: Vec<RigName> = Vec::new();
        for name in names {
            self.module(name)?;
            for module in std::iter::once(RigName::from(*name)).chain(self.model.descendants_of(name)) {
                if !selected.contains(&module) {
                    selected.push(module);
                }
            }
        }
        let modules: Vec<&ModuleReference> = self
            .model
            .modules
            .iter()
            .filter(|m| selected.contains(&m.name))
            .collect();
        Ok(serde_json::to_string_pretty(&modules)?)
    }

    /// Import modules exported with [`export_modules`](Self::export_modules).
    ///
    /// Clashing names are made unique and every reference between imported
    /// modules follows the rename. Imported modules whose parent was not
    /// part of the export are placed below `parent`. Modules with unknown
    /// or non-module classes are skipped. Returns the imported names.
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed or `parent` does not exist
    pub fn import_modules(
        &mut self,
        json: &str,
        parent: Option<&str>,
        catalog: &dyn ClassCatalog,
    ) -> ModelResult<Vec<RigName>> {
        if let Some(parent) = parent {
            self.module(parent)?;
        }
        let incoming: Vec<ModuleReference> = serde_json::from_str(json)?;

        let mut renames: IndexMap<RigName, RigName> = IndexMap::new();
        for module in &incoming {
            let usable = catalog.describe(module.class.as_str()).is_some_and(|c| c.is_module);
            if !usable {
                warn!(module = %module.name, class = %module.class, "Skipping import of module with unusable class");
                continue;
            }
            let mut name = self.safe_new_name(module.name.as_str());
            while renames.values().any(|taken| *taken == name) {
                name = RigName::new(format!("{}_{}", name, renames.len()));
            }
            renames.insert(module.name.clone(), name);
        }

        let mut imported = Vec::new();
        for mut module in incoming {
            let Some(new_name) = renames.get(&module.name).cloned() else {
                continue;
            };
            let old_name = std::mem::replace(&mut module.name, new_name.clone());
            module.parent = match &module.parent {
                Some(p) if renames.contains_key(p) => renames.get(p).cloned(),
                _ => parent.map(RigName::from),
            };
            module.parent_path = None;
            for target in module.connections.values_mut().flatten() {
                let path = target.module_path();
                if let Some((owner, element)) = path.split() {
                    if let Some(renamed) = renames.get(owner) {
                        target.name = ModulePath::join(renamed.as_str(), element).to_name();
                    }
                }
            }
            for expr in module.bindings.values_mut() {
                let Some(source) = BindingSource::parse(expr) else {
                    continue;
                };
                if let Some(renamed) = source.module.as_ref().and_then(|m| renames.get(m)) {
                    *expr = BindingSource::in_module(renamed.clone(), source.variable).to_string();
                }
            }
            debug!(old = %old_name, new = %new_name, "Imported module");
            self.model.modules.push(module);
            imported.push(new_name);
        }
        for name in &imported {
            self.notify(ModelNotification::ModuleAdded(name.clone()));
        }
        Ok(imported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::testing::TestCatalog;
    use crate::validate::{IssueKind, ModelValidator};
    use proptest::prelude::*;
    use std::sync::{Arc, Mutex};

    fn controller() -> (ModelController, TestCatalog) {
        let catalog = TestCatalog::new();
        let mut c = ModelController::default();
        c.add_module("Leg", "Leg", None, &catalog).unwrap();
        c.add_module("Foot", "Foot", Some("Leg"), &catalog).unwrap();
        (c, catalog)
    }

    fn recorder(c: &mut ModelController) -> Arc<Mutex<Vec<ModelNotification>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        c.subscribe(move |n| sink.lock().unwrap().push(n.clone()));
        log
    }

    #[test]
    fn test_add_module_checks_class() {
        let (mut c, catalog) = controller();
        assert!(matches!(
            c.add_module("X", "Nope", None, &catalog),
            Err(ModelError::UnknownClass(_))
        ));
        assert!(matches!(
            c.add_module("X", "Helper", None, &catalog),
            Err(ModelError::NotAModule(_))
        ));
        assert!(matches!(
            c.add_module("X", "Leg", Some("Missing"), &catalog),
            Err(ModelError::ModuleNotFound(_))
        ));
    }

    #[test]
    fn test_add_module_makes_names_unique() {
        let (mut c, catalog) = controller();
        assert_eq!(c.add_module("Leg", "Leg", None, &catalog).unwrap(), "Leg_1");
        assert_eq!(c.add_module("Leg", "Leg", None, &catalog).unwrap(), "Leg_2");
        assert_eq!(c.add_module("Left:Arm", "Arm", None, &catalog).unwrap(), "Left_Arm");
        assert_eq!(c.add_module("", "Arm", None, &catalog).unwrap(), "Arm");
    }

    #[test]
    fn test_notifications_and_suspension() {
        let (mut c, catalog) = controller();
        let log = recorder(&mut c);
        c.add_module("Arm", "Arm", None, &catalog).unwrap();
        let previous = c.suspend_notifications(true);
        assert!(!previous);
        c.add_module("Arm", "Arm", None, &catalog).unwrap();
        c.suspend_notifications(false);
        assert_eq!(*log.lock().unwrap(), vec![ModelNotification::ModuleAdded(RigName::from("Arm"))]);
    }

    #[test]
    fn test_delete_module_is_recursive() {
        let (mut c, catalog) = controller();
        c.add_module("Toe", "Foot", Some("Foot"), &catalog).unwrap();
        c.add_module("Arm", "Arm", None, &catalog).unwrap();
        c.connect_connector(&ElementKey::connector("Arm/Root"), vec![ElementKey::bone("spine")], &catalog)
            .unwrap();
        c.connect_connector(
            &ElementKey::connector("Arm/Tip"),
            vec![ElementKey::bone("Foot/ball")],
            &catalog,
        )
        .unwrap();
        c.bind_module_variable("Arm", "Speed", "Leg.Speed", &catalog).unwrap();

        let deleted = c.delete_module("Leg").unwrap();
        assert_eq!(deleted, vec![RigName::from("Toe"), RigName::from("Foot"), RigName::from("Leg")]);
        let arm = c.model().find_module("Arm").unwrap();
        assert!(arm.connections.contains_key("Root"));
        assert!(!arm.connections.contains_key("Tip"));
        assert!(arm.bindings.is_empty());
        assert_eq!(c.model().len(), 1);
    }

    #[test]
    fn test_rename_rewrites_references() {
        let (mut c, catalog) = controller();
        c.add_module("Arm", "Arm", None, &catalog).unwrap();
        c.connect_connector(&ElementKey::connector("Arm/Root"), vec![ElementKey::bone("Leg/thigh")], &catalog)
            .unwrap();
        c.bind_module_variable("Arm", "Speed", "Leg.Speed", &catalog).unwrap();

        c.rename_module("Leg", "LeftLeg").unwrap();
        let model = c.model();
        assert!(model.find_module("Leg").is_none());
        assert_eq!(model.find_module("Foot").unwrap().parent, Some(RigName::from("LeftLeg")));
        let arm = model.find_module("Arm").unwrap();
        assert_eq!(arm.parent, Some(RigName::from("LeftLeg")));
        assert_eq!(arm.connections["Root"], vec![ElementKey::bone("LeftLeg/thigh")]);
        assert_eq!(arm.bindings["Speed"], "LeftLeg.Speed");
    }

    #[test]
    fn test_rename_rejects_bad_names() {
        let (mut c, _) = controller();
        assert!(matches!(c.rename_module("Leg", ""), Err(ModelError::InvalidName { .. })));
        assert!(matches!(c.rename_module("Leg", "A/B"), Err(ModelError::InvalidName { .. })));
        assert!(matches!(c.rename_module("Leg", "A:B"), Err(ModelError::InvalidName { .. })));
        assert!(matches!(c.rename_module("Leg", "A#B"), Err(ModelError::InvalidName { .. })));
        assert!(matches!(c.rename_module("Leg", "Foot"), Err(ModelError::DuplicateModule(_))));
        assert!(matches!(c.rename_module("Nope", "X"), Err(ModelError::ModuleNotFound(_))));
    }

    #[test]
    fn test_reparent_rejects_cycles() {
        let (mut c, _) = controller();
        assert!(matches!(
            c.reparent_module("Leg", Some("Foot")),
            Err(ModelError::ParentCycle { .. })
        ));
        assert!(matches!(c.reparent_module("Leg", Some("Leg")), Err(ModelError::ParentCycle { .. })));
        c.reparent_module("Foot", None).unwrap();
        assert!(c.model().find_module("Foot").unwrap().is_root());
    }

    #[test]
    fn test_reparent_disconnects_cyclic_connectors() {
        let (mut c, catalog) = controller();
        c.add_module("Arm", "Arm", None, &catalog).unwrap();
        c.connect_connector(&ElementKey::connector("Leg/Root"), vec![ElementKey::bone("pelvis")], &catalog)
            .unwrap();
        c.connect_connector(&ElementKey::connector("Leg/Tip"), vec![ElementKey::bone("Arm/hand")], &catalog)
            .unwrap();
        c.reparent_module("Arm", Some("Foot")).unwrap();
        assert!(!c.model().find_module("Leg").unwrap().connections.contains_key("Tip"));
        assert!(c.model().find_module("Leg").unwrap().connections.contains_key("Root"));
    }

    #[test]
    fn test_connect_rules() {
        let (mut c, catalog) = controller();
        let tip = ElementKey::connector("Foot/Tip");
        let root = ElementKey::connector("Foot/Root");
        assert!(matches!(
            c.connect_connector(&tip, vec![ElementKey::bone("ball")], &catalog),
            Err(ModelError::InvalidConnection { .. })
        ));
        assert!(matches!(
            c.connect_connector(&root, vec![ElementKey::bone("a"), ElementKey::bone("b")], &catalog),
            Err(ModelError::InvalidConnection { .. })
        ));
        assert!(matches!(
            c.connect_connector(&root, vec![root.clone()], &catalog),
            Err(ModelError::InvalidConnection { .. })
        ));
        assert!(matches!(
            c.connect_connector(&ElementKey::connector("Foot/Elbow"), vec![ElementKey::bone("a")], &catalog),
            Err(ModelError::ConnectorNotFound(_))
        ));

        c.connect_connector(&root, vec![ElementKey::bone("Leg/ankle")], &catalog).unwrap();
        c.connect_connector(&tip, vec![ElementKey::bone("ball")], &catalog).unwrap();
        c.connect_connector(
            &ElementKey::connector("Foot/Targets"),
            vec![ElementKey::bone("a"), ElementKey::bone("b")],
            &catalog,
        )
        .unwrap();
        assert_eq!(c.model().find_module("Foot").unwrap().connections.len(), 3);
    }

    #[test]
    fn test_primary_connection_reparents() {
        let (mut c, catalog) = controller();
        c.add_module("Arm", "Arm", None, &catalog).unwrap();
        let log = recorder(&mut c);
        c.connect_connector(&ElementKey::connector("Arm/Root"), vec![ElementKey::bone("Foot/ball")], &catalog)
            .unwrap();
        assert_eq!(c.model().find_module("Arm").unwrap().parent, Some(RigName::from("Foot")));
        assert!(log.lock().unwrap().contains(&ModelNotification::ModuleReparented {
            module: RigName::from("Arm"),
            parent: Some(RigName::from("Foot")),
        }));

        assert!(matches!(
            c.connect_connector(&ElementKey::connector("Leg/Root"), vec![ElementKey::bone("Arm/hand")], &catalog),
            Err(ModelError::ParentCycle { .. })
        ));
    }

    #[test]
    fn test_disconnect_primary_unparents() {
        let (mut c, catalog) = controller();
        let root = ElementKey::connector("Foot/Root");
        c.connect_connector(&root, vec![ElementKey::bone("Leg/ankle")], &catalog).unwrap();
        c.connect_connector(&ElementKey::connector("Foot/Tip"), vec![ElementKey::bone("ball")], &catalog)
            .unwrap();
        c.disconnect_connector(&root, &catalog).unwrap();
        let foot = c.model().find_module("Foot").unwrap();
        assert!(foot.connections.is_empty());
        assert!(foot.is_root());
        assert!(c.disconnect_connector(&root, &catalog).is_err());
    }

    #[test]
    fn test_config_values() {
        let (mut c, catalog) = controller();
        c.set_config_value("Foot", "Speed", Value::Float(2.0), &catalog).unwrap();
        c.set_config_value("Foot", "Color->R", Value::Float(0.0), &catalog).unwrap();

        assert!(matches!(
            c.set_config_value("Foot", "Speed", Value::Int(2), &catalog),
            Err(ModelError::Core(CoreError::TypeMismatch { .. }))
        ));
        assert!(matches!(
            c.set_config_value("Foot", "Locked", Value::Bool(true), &catalog),
            Err(ModelError::Core(CoreError::ReadOnly { .. }))
        ));
        assert!(matches!(
            c.set_config_value("Foot", "Mass", Value::Float(1.0), &catalog),
            Err(ModelError::Core(CoreError::UnknownVariable { .. }))
        ));

        let mut color = IndexMap::new();
        color.insert("R".to_string(), Value::Float(0.2));
        color.insert("G".to_string(), Value::Float(0.2));
        c.set_config_value("Foot", "Color", Value::Struct(color), &catalog).unwrap();
        let overrides = &c.model().find_module("Foot").unwrap().config_overrides;
        assert!(overrides.get("Color->R").is_none());
        assert!(matches!(
            c.set_config_value("Foot", "Color->G", Value::Float(0.0), &catalog),
            Err(ModelError::OverrideBlocked { .. })
        ));

        assert!(c.reset_config_value("Foot", "Speed").unwrap());
        assert!(!c.reset_config_value("Foot", "Speed").unwrap());
    }

    #[test]
    fn test_binding_rules() {
        let (mut c, catalog) = controller();
        assert!(c.can_bind_module_variable("Foot", "Speed", "Leg.Speed", &catalog).is_ok());
        assert!(c.can_bind_module_variable("Foot", "Speed", "GlobalSpeed", &catalog).is_ok());
        assert!(c.can_bind_module_variable("Leg", "Speed", "Foot.Speed", &catalog).is_err());
        assert!(c.can_bind_module_variable("Foot", "Speed", "Foot.Speed", &catalog).is_err());
        assert!(c.can_bind_module_variable("Foot", "Speed", "Leg.Count", &catalog).is_err());
        assert!(c.can_bind_module_variable("Foot", "Locked", "Leg.Locked", &catalog).is_err());
        assert!(c.can_bind_module_variable("Foot", "Speed", "Arm.Speed", &catalog).is_err());

        c.bind_module_variable("Foot", "Speed", "Leg.Speed", &catalog).unwrap();
        assert_eq!(c.model().find_module("Foot").unwrap().bindings["Speed"], "Leg.Speed");
        assert!(c.unbind_module_variable("Foot", "Speed").unwrap());
        assert!(!c.unbind_module_variable("Foot", "Speed").unwrap());
    }

    #[test]
    fn test_possible_bindings() {
        let (c, catalog) = controller();
        let sources = c.possible_bindings("Foot", "Speed", &catalog);
        assert_eq!(sources, vec!["GlobalSpeed".to_string(), "Leg.Speed".to_string()]);
        assert!(c.possible_bindings("Leg", "Speed", &catalog).iter().all(|s| !s.starts_with("Foot.")));
    }

    #[test]
    fn test_swap_class_refreshes() {
        let (mut c, catalog) = controller();
        c.connect_connector(&ElementKey::connector("Foot/Root"), vec![ElementKey::bone("Leg/ankle")], &catalog)
            .unwrap();
        c.connect_connector(&ElementKey::connector("Foot/Tip"), vec![ElementKey::bone("ball")], &catalog)
            .unwrap();
        c.set_config_value("Foot", "Speed", Value::Float(3.0), &catalog).unwrap();
        c.set_config_value("Foot", "Count", Value::Int(3), &catalog).unwrap();
        c.bind_module_variable("Foot", "Count", "Leg.Count", &catalog).unwrap();

        c.swap_module_class("Foot", "Tail", &catalog).unwrap();
        let foot = c.model().find_module("Foot").unwrap();
        assert_eq!(foot.class, "Tail");
        assert_eq!(foot.connections.keys().collect::<Vec<_>>(), vec!["Root"]);
        assert!(foot.config_overrides.get("Speed").is_some());
        assert!(foot.config_overrides.get("Count").is_none());
        assert!(foot.bindings.is_empty());
    }

    #[test]
    fn test_export_import() {
        let (mut c, catalog) = controller();
        c.connect_connector(&ElementKey::connector("Foot/Root"), vec![ElementKey::bone("Leg/ankle")], &catalog)
            .unwrap();
        c.bind_module_variable("Foot", "Speed", "Leg.Speed", &catalog).unwrap();
        let json = c.export_modules(&["Leg"]).unwrap();

        let imported = c.import_modules(&json, None, &catalog).unwrap();
        assert_eq!(imported, vec![RigName::from("Leg_1"), RigName::from("Foot_1")]);
        let foot = c.model().find_module("Foot_1").unwrap();
        assert_eq!(foot.parent, Some(RigName::from("Leg_1")));
        assert_eq!(foot.connections["Root"], vec![ElementKey::bone("Leg_1/ankle")]);
        assert_eq!(foot.bindings["Speed"], "Leg_1.Speed");
        assert_eq!(c.model().len(), 4);
    }

    #[test]
    fn test_import_below_parent() {
        let (mut c, catalog) = controller();
        let json = c.export_modules(&["Foot"]).unwrap();
        let imported = c.import_modules(&json, Some("Foot"), &catalog).unwrap();
        assert_eq!(imported, vec![RigName::from("Foot_1")]);
        assert_eq!(c.model().find_module("Foot_1").unwrap().parent, Some(RigName::from("Foot")));
    }

    proptest! {
        #[test]
        fn test_added_names_are_unique_and_valid(
            desired in proptest::collection::vec("[ a-zA-Z0-9_/:.#-]{0,12}", 1..16),
            parents in proptest::collection::vec(any::<prop::sample::Index>(), 16),
        ) {
            let catalog = TestCatalog::new();
            let mut c = ModelController::default();
            let mut added: Vec<RigName> = Vec::new();
            for (i, name) in desired.iter().enumerate() {
                let parent = (i % 2 == 1 && !added.is_empty()).then(|| parents[i].get(&added).clone());
                let used = c.add_module(name, "Leg", parent.as_ref().map(RigName::as_str), &catalog).unwrap();
                prop_assert!(ModelController::check_module_name(used.as_str()).is_ok());
                prop_assert!(!added.contains(&used));
                added.push(used);
            }
            prop_assert_eq!(c.model().breadth_first().len(), added.len());
            let issues = ModelValidator::new().validate(c.model(), &catalog).err().unwrap_or_default();
            prop_assert!(issues.iter().all(|i| i.kind != IssueKind::DuplicateName));
        }
    }
}

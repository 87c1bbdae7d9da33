//! Behavior class registry.
//!
//! Classes are registered either eagerly or as lazy loaders. A lazy class
//! is only loaded on the thread that created the registry; other threads
//! see it as unknown until it has been loaded there.

use crate::behavior::RigBehavior;
use indexmap::IndexMap;
use modrig_core::{EventName, VariableSet};
use modrig_hierarchy::ConnectorDeclaration;
use modrig_model::{ClassCatalog, ClassDescriptor, ClassName};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, ThreadId};
use tracing::debug;

/// Creates fresh behavior instances
pub type BehaviorFactory = Arc<dyn Fn() -> Box<dyn RigBehavior> + Send + Sync>;

/// Produces a class on first use
pub type ClassLoader = Arc<dyn Fn() -> Option<BehaviorClass> + Send + Sync>;

/// A registered behavior class.
///
/// The class default instance is queried once at construction; its
/// capability, connectors, variables and events are cached.
#[derive(Clone)]
pub struct BehaviorClass {
    name: ClassName,
    factory: BehaviorFactory,
    is_module: bool,
    connectors: Vec<ConnectorDeclaration>,
    default_variables: VariableSet,
    supported_events: Vec<EventName>,
}

impl BehaviorClass {
    /// Create a new class from a factory
    pub fn new(
        name: impl Into<ClassName>,
        factory: impl Fn() -> Box<dyn RigBehavior> + Send + Sync + 'static,
    ) -> Self {
        let factory: BehaviorFactory = Arc::new(factory);
        let defaults = factory();
        Self {
            name: name.into(),
            is_module: defaults.is_composable_module(),
            connectors: defaults.connectors(),
            default_variables: defaults.variables().clone(),
            supported_events: defaults.supported_events(),
            factory,
        }
    }

    /// Class name
    #[must_use]
    pub fn name(&self) -> &ClassName {
        &self.name
    }

    /// Whether instances can be composed into a modular rig
    #[must_use]
    pub fn is_module(&self) -> bool {
        self.is_module
    }

    /// Declared connectors
    #[must_use]
    pub fn connectors(&self) -> &[ConnectorDeclaration] {
        &self.connectors
    }

    /// Variables with their class defaults
    #[must_use]
    pub fn default_variables(&self) -> &VariableSet {
        &self.default_variables
    }

    /// Events of the class default instance
    #[must_use]
    pub fn supported_events(&self) -> &[EventName] {
        &self.supported_events
    }

    /// Create a new behavior instance
    #[must_use]
    pub fn instantiate(&self) -> Box<dyn RigBehavior> {
        (self.factory)()
    }

    /// Description for model editing and validation
    #[must_use]
    pub fn descriptor(&self) -> ClassDescriptor {
        ClassDescriptor {
            name: self.name.clone(),
            is_module: self.is_module,
            connectors: self.connectors.clone(),
            variables: self.default_variables.clone(),
        }
    }
}

impl std::fmt::Debug for BehaviorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorClass")
            .field("name", &self.name)
            .field("is_module", &self.is_module)
            .field("connectors", &self.connectors.len())
            .field("variables", &self.default_variables.len())
            .finish()
    }
}

#[derive(Clone)]
enum ClassEntry {
    Loaded(Arc<BehaviorClass>),
    Lazy(ClassLoader),
}

/// Registry of behavior classes, shared between rigs
pub struct ClassRegistry {
    entries: RwLock<IndexMap<ClassName, ClassEntry>>,
    host_variables: VariableSet,
    owner: ThreadId,
}

impl ClassRegistry {
    /// Create an empty registry owned by the current thread
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
            host_variables: VariableSet::new(),
            owner: thread::current().id(),
        }
    }

    /// Set the variables of the owning rig
    #[must_use]
    pub fn with_host_variables(mut self, variables: VariableSet) -> Self {
        self.host_variables = variables;
        self
    }

    /// Register a class, replacing any class of the same name
    pub fn register(&self, class: BehaviorClass) {
        let name = class.name().clone();
        debug!(class = %name, "registering behavior class");
        self.write().insert(name, ClassEntry::Loaded(Arc::new(class)));
    }

    /// Register a class that is loaded on first use
    pub fn register_lazy(
        &self,
        name: impl Into<ClassName>,
        loader: impl Fn() -> Option<BehaviorClass> + Send + Sync + 'static,
    ) {
        let name = name.into();
        debug!(class = %name, "registering lazy behavior class");
        self.write().insert(name, ClassEntry::Lazy(Arc::new(loader)));
    }

    /// Check if the caller runs on the thread that owns this registry
    #[must_use]
    pub fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Resolve a class by name.
    ///
    /// Lazy classes are loaded only when `may_load` is set. A loader that
    /// returns `None` leaves the entry unloaded.
    #[must_use]
    pub fn resolve(&self, name: &str, may_load: bool) -> Option<Arc<BehaviorClass>> {
        let loader = match self.read().get(name)? {
            ClassEntry::Loaded(class) => return Some(Arc::clone(class)),
            ClassEntry::Lazy(loader) => Arc::clone(loader),
        };
        if !may_load {
            debug!(class = name, "lazy class not loaded, loading not allowed here");
            return None;
        }

        // the loader runs without the lock held
        let class = Arc::new(loader()?);
        debug!(class = name, "loaded lazy behavior class");
        let mut entries = self.write();
        if let Some(ClassEntry::Loaded(existing)) = entries.get(name) {
            return Some(Arc::clone(existing));
        }
        entries.insert(ClassName::from(name), ClassEntry::Loaded(Arc::clone(&class)));
        Some(class)
    }

    /// Check if a class is registered, loaded or not
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Check if a class is registered and loaded
    #[must_use]
    pub fn is_loaded(&self, name: &str) -> bool {
        matches!(self.read().get(name), Some(ClassEntry::Loaded(_)))
    }

    /// Registered class names in registration order
    #[must_use]
    pub fn class_names(&self) -> Vec<ClassName> {
        self.read().keys().cloned().collect()
    }

    /// Number of registered classes
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, IndexMap<ClassName, ClassEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, IndexMap<ClassName, ClassEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("classes", &self.class_names())
            .field("owner", &self.owner)
            .finish()
    }
}

impl ClassCatalog for ClassRegistry {
    fn describe(&self, class: &str) -> Option<ClassDescriptor> {
        self.resolve(class, self.is_owner_thread())
            .map(|c| c.descriptor())
    }

    fn host_variables(&self) -> VariableSet {
        self.host_variables.clone()
    }
}

//! Module instances.
//!
//! Instances live in a dense vector owned by the rig. Parent and child
//! links are indices into that vector, valid for one tree generation only.

use crate::bindings::ExternalVariable;
use crate::executable::Executable;
use indexmap::IndexMap;
use modrig_core::{ElementKey, RigName};
use modrig_hierarchy::RigHierarchy;
use modrig_model::{ClassName, ConfigOverrides, ModuleReference};

/// One instantiated module of a rig
#[derive(Debug)]
pub struct ModuleInstance {
    /// Module name, unique within the rig
    pub name: RigName,
    /// Behavior class
    pub class: ClassName,
    /// Declared parent, `None` for roots
    pub parent_name: Option<RigName>,
    /// Deprecated parent path
    pub parent_path: Option<String>,
    /// Deprecated path of this module, `Parent:Child`
    pub path: String,
    /// Config overrides from the model
    pub config_overrides: ConfigOverrides,
    /// Connector local name to connected elements
    pub connections: IndexMap<RigName, Vec<ElementKey>>,
    /// Resolved variable bindings, keyed by target variable
    pub bindings: IndexMap<RigName, ExternalVariable>,
    executable: Option<Executable>,
    pub(crate) parent: Option<usize>,
    pub(crate) children: Vec<usize>,
    primary_connector: Option<(u64, Option<ElementKey>)>,
}

impl ModuleInstance {
    /// Create an instance from a model reference
    #[must_use]
    pub fn from_reference(reference: &ModuleReference) -> Self {
        Self {
            name: reference.name.clone(),
            class: reference.class.clone(),
            parent_name: reference.parent.clone(),
            parent_path: reference.parent_path.clone(),
            path: reference.legacy_path(),
            config_overrides: reference.config_overrides.clone(),
            connections: reference.connections.clone(),
            bindings: IndexMap::new(),
            executable: None,
            parent: None,
            children: Vec::new(),
            primary_connector: None,
        }
    }

    /// Check if this module has no declared parent
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_name.is_none() && self.parent_path.is_none()
    }

    /// The executable, if it is still alive.
    ///
    /// A discarded executable is dropped here and `None` returned.
    pub fn get_executable(&mut self) -> Option<&mut Executable> {
        if self.executable.as_ref().is_some_and(Executable::is_garbage) {
            self.executable = None;
        }
        self.executable.as_mut()
    }

    /// The executable, if it is still alive, without resetting the handle
    #[must_use]
    pub fn executable(&self) -> Option<&Executable> {
        self.executable.as_ref().filter(|e| !e.is_garbage())
    }

    /// Install an executable.
    ///
    /// A previous executable with another id is discarded. Returns whether
    /// one was.
    pub fn set_executable(&mut self, executable: Option<Executable>) -> bool {
        let same = match (&self.executable, &executable) {
            (Some(old), Some(new)) => old.id() == new.id(),
            _ => false,
        };
        match std::mem::replace(&mut self.executable, executable) {
            Some(mut previous) if !same => {
                previous.discard();
                true
            }
            _ => false,
        }
    }

    /// Take the executable out, leaving none
    pub fn take_executable(&mut self) -> Option<Executable> {
        self.executable.take()
    }

    /// Index of the parent module
    #[must_use]
    pub fn parent_index(&self) -> Option<usize> {
        self.parent
    }

    /// Indices of the child modules
    #[must_use]
    pub fn child_indices(&self) -> &[usize] {
        &self.children
    }

    /// Parent module within `modules`
    #[must_use]
    pub fn parent_module<'a>(&self, modules: &'a [ModuleInstance]) -> Option<&'a ModuleInstance> {
        modules.get(self.parent?)
    }

    /// Topmost ancestor, or `self` for roots.
    ///
    /// Returns `None` when the parent chain is broken.
    #[must_use]
    pub fn root_module<'a>(&'a self, modules: &'a [ModuleInstance]) -> Option<&'a ModuleInstance> {
        let mut current = self;
        for _ in 0..=modules.len() {
            match current.parent {
                None => return Some(current),
                Some(index) => current = modules.get(index)?,
            }
        }
        None
    }

    /// Check if a module named `name` is a child, or any descendant when
    /// `recursive` is set
    #[must_use]
    pub fn has_child_module(&self, name: &str, recursive: bool, modules: &[ModuleInstance]) -> bool {
        let mut pending: Vec<usize> = self.children.clone();
        let mut visited = 0;
        while let Some(index) = pending.pop() {
            let Some(child) = modules.get(index) else {
                continue;
            };
            if child.name == name {
                return true;
            }
            visited += 1;
            if recursive && visited <= modules.len() {
                pending.extend_from_slice(&child.children);
            }
        }
        false
    }

    /// The primary connector of this module.
    ///
    /// Cached until the hierarchy's topology changes.
    pub fn find_primary_connector(&mut self, hierarchy: &RigHierarchy) -> Option<ElementKey> {
        let version = hierarchy.topology_version();
        if let Some((cached_version, key)) = &self.primary_connector {
            if *cached_version == version {
                return key.clone();
            }
        }
        let key = hierarchy.primary_connector_of_module(self.name.as_str());
        self.primary_connector = Some((version, key.clone()));
        key
    }

    /// All connectors owned by this module
    #[must_use]
    pub fn find_connectors(&self, hierarchy: &RigHierarchy) -> Vec<ElementKey> {
        hierarchy.connectors_of_module(self.name.as_str())
    }

    pub(crate) fn clear_links(&mut self) {
        self.parent = None;
        self.children.clear();
    }
}

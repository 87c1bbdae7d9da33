//! Module tree index.
//!
//! Derived from the flat instance list and rebuilt wholesale whenever the
//! list changes. Traversal is breadth-first: roots in list order, then
//! each node's children in list order.

use crate::module::ModuleInstance;
use indexmap::IndexMap;
use modrig_core::RigName;
use std::collections::VecDeque;
use tracing::debug;

/// Parent/child index over a rig's module instances
#[derive(Debug, Clone, Default)]
pub struct ModuleTree {
    roots: Vec<usize>,
    orphans: Vec<usize>,
    order: Vec<usize>,
    by_name: IndexMap<RigName, usize>,
    by_path: IndexMap<String, usize>,
    generation: u64,
}

impl ModuleTree {
    /// Create an empty tree
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every link and index. The generation still advances.
    pub fn clear(&mut self) {
        self.roots.clear();
        self.orphans.clear();
        self.order.clear();
        self.by_name.clear();
        self.by_path.clear();
        self.generation += 1;
    }

    /// Relink `modules` and recompute the traversal order.
    ///
    /// When `legacy_paths` is set, a parent that cannot be found by name is
    /// looked up by its deprecated path. Modules whose parent cannot be
    /// found, or that are not reachable from a root, become orphans.
    pub fn rebuild(&mut self, modules: &mut [ModuleInstance], legacy_paths: bool) {
        self.clear();
        for (index, module) in modules.iter_mut().enumerate() {
            module.clear_links();
            self.by_name.entry(module.name.clone()).or_insert(index);
            if legacy_paths {
                self.by_path.entry(module.path.clone()).or_insert(index);
            }
        }

        for index in 0..modules.len() {
            let module = &modules[index];
            if module.is_root() {
                self.roots.push(index);
                continue;
            }
            let by_name = module
                .parent_name
                .as_ref()
                .and_then(|p| self.by_name.get(p.as_str()).copied());
            let parent = by_name.or_else(|| {
                module
                    .parent_path
                    .as_deref()
                    .and_then(|p| self.by_path.get(p).copied())
            });
            match parent {
                Some(parent) if parent != index => {
                    modules[index].parent = Some(parent);
                    modules[parent].children.push(index);
                }
                _ => {
                    debug!(module = %modules[index].name, "module parent not found");
                    self.orphans.push(index);
                }
            }
        }

        let mut visited = vec![false; modules.len()];
        let mut queue: VecDeque<usize> = self.roots.iter().copied().collect();
        while let Some(index) = queue.pop_front() {
            if std::mem::replace(&mut visited[index], true) {
                continue;
            }
            self.order.push(index);
            queue.extend(modules[index].children.iter().copied());
        }

        // modules caught in a parent cycle are never reached from a root
        for (index, seen) in visited.into_iter().enumerate() {
            if !seen && !self.orphans.contains(&index) {
                self.orphans.push(index);
            }
        }
    }

    /// Counter bumped on every rebuild, used to validate stored indices
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Root module indices in list order
    #[must_use]
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Indices of modules excluded from traversal
    #[must_use]
    pub fn orphans(&self) -> &[usize] {
        &self.orphans
    }

    /// Breadth-first traversal order
    #[must_use]
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Index of a module by name
    #[must_use]
    pub fn find(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Index of a module by deprecated path
    #[must_use]
    pub fn find_by_path(&self, path: &str) -> Option<usize> {
        self.by_path.get(path).copied()
    }

    /// Visit modules breadth-first until `visitor` returns false
    pub fn for_each<'a>(
        &self,
        modules: &'a [ModuleInstance],
        mut visitor: impl FnMut(usize, &'a ModuleInstance) -> bool,
    ) {
        for &index in &self.order {
            let Some(module) = modules.get(index) else {
                continue;
            };
            if !visitor(index, module) {
                break;
            }
        }
    }

    /// Visit modules breadth-first, mutably, until `visitor` returns false.
    ///
    /// Visits in the same order as [`for_each`](Self::for_each).
    pub fn for_each_mut(
        &self,
        modules: &mut [ModuleInstance],
        mut visitor: impl FnMut(usize, &mut ModuleInstance) -> bool,
    ) {
        for &index in &self.order {
            let Some(module) = modules.get_mut(index) else {
                continue;
            };
            if !visitor(index, module) {
                break;
            }
        }
    }
}

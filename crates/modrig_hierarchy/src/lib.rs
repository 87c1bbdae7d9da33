//! modrig Hierarchy
//!
//! The element store shared by every module of a rig. Elements are keyed by
//! type and name, carry an optional owning module and parent, and are kept
//! in insertion order.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod element;
pub mod error;
pub mod hierarchy;
pub mod redirector;

pub use element::{ConnectorDeclaration, ConnectorSettings, RigElement};
pub use error::{HierarchyError, HierarchyResult};
pub use hierarchy::RigHierarchy;
pub use redirector::ElementKeyRedirector;

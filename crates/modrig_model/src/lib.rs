//! modrig Model
//!
//! The declarative description of a modular rig: which modules exist, their
//! classes, parents, connections, config overrides and variable bindings.
//! The model is data only. `modrig_runtime` composes live rigs against it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod binding;
pub mod catalog;
pub mod controller;
pub mod error;
pub mod model;
pub mod overrides;
pub mod validate;

pub use binding::BindingSource;
pub use catalog::{ClassCatalog, ClassDescriptor, ClassName};
pub use controller::{ModelController, ModelNotification};
pub use error::{ModelError, ModelResult};
pub use model::{ModularRigModel, ModuleReference};
pub use overrides::ConfigOverrides;
pub use validate::{IssueKind, IssueSeverity, ModelIssue, ModelValidator};

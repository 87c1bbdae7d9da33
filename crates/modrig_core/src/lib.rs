//! modrig Core Types
//!
//! Pure types shared by the hierarchy store, the declarative model and the
//! runtime. Nothing in this crate performs I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod event;
pub mod hash;
pub mod id;
pub mod key;
pub mod name;
pub mod scope;
pub mod transform;
pub mod value;

// Re-exports
pub use error::{CoreError, CoreResult};
pub use event::EventName;
pub use hash::NameHash;
pub use id::ExecutableId;
pub use key::{ElementKey, ElementType};
pub use name::{ModulePath, RigName, sanitize_name, MAX_NAME_LENGTH};
pub use scope::ValueGuard;
pub use transform::{Quat, Transform, Vec3};
pub use value::{AssetUserData, Value, ValueType, VariableDescriptor, VariableSet};

//! Model errors.

use modrig_core::{CoreError, ElementKey, RigName};

/// Result type for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Model error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// No module with this name
    #[error("Module not found: {0}")]
    ModuleNotFound(RigName),

    /// A module with this name already exists
    #[error("Module name already in use: {0}")]
    DuplicateModule(RigName),

    /// Name rejected
    #[error("Invalid module name '{name}': {reason}")]
    InvalidName {
        /// Offending name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// Class is not known to the catalog
    #[error("Unknown class: {0}")]
    UnknownClass(RigName),

    /// Class is not a composable module
    #[error("Class is not a rig module: {0}")]
    NotAModule(RigName),

    /// Operation would make a module its own ancestor
    #[error("Cannot parent {module} under {parent}: cycle")]
    ParentCycle {
        /// Module being moved
        module: RigName,
        /// Requested parent
        parent: RigName,
    },

    /// Connector is not declared by the module's class
    #[error("Connector not found: {0}")]
    ConnectorNotFound(ElementKey),

    /// Connection rejected
    #[error("Cannot connect {connector}: {reason}")]
    InvalidConnection {
        /// Connector being connected
        connector: ElementKey,
        /// Why it was rejected
        reason: String,
    },

    /// A parent path of this config path already carries an override
    #[error("Override on '{parent}' blocks '{path}'")]
    OverrideBlocked {
        /// Requested path
        path: String,
        /// Overridden parent path
        parent: String,
    },

    /// Binding rejected
    #[error("Cannot bind {module}.{variable}: {reason}")]
    InvalidBinding {
        /// Target module
        module: RigName,
        /// Target variable
        variable: RigName,
        /// Why it was rejected
        reason: String,
    },

    /// Value or variable error
    #[error(transparent)]
    Core(#[from] CoreError),

    /// JSON could not be read or written
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

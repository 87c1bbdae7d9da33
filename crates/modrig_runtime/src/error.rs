//! Runtime errors.
//!
//! Nothing in the runtime aborts on these. Operations that detect a problem
//! report it through [`ModularRig`](crate::ModularRig)'s error handler and
//! carry on with the rest of the work.

use modrig_core::{CoreError, ElementKey, RigName};
use modrig_hierarchy::HierarchyError;
use modrig_model::ModelError;
use tracing::{error, warn};

/// Result type for runtime operations
pub type RigResult<T> = Result<T, RigError>;

/// Callback receiving every reported error
pub type ErrorHandler = Box<dyn FnMut(&RigError) + Send>;

/// How a reported error should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Logged, the affected item is skipped
    Ignorable,
    /// A precondition was violated
    Fatal,
}

/// Runtime error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RigError {
    /// Class is not registered or could not be loaded
    #[error("Module {module}: class {class} not found")]
    UnknownClass {
        /// Module being composed
        module: RigName,
        /// Missing class
        class: RigName,
    },

    /// Class is not a composable module
    #[error("Module {module}: class {class} is not a rig module")]
    NotAModule {
        /// Module being composed
        module: RigName,
        /// Class
        class: RigName,
    },

    /// Another module of the rig already uses this name
    #[error("Module {0} already exists below the same parent")]
    DuplicateModule(RigName),

    /// No module with this name
    #[error("Module not found: {0}")]
    ModuleNotFound(RigName),

    /// Declared parent cannot be found
    #[error("Module {module}: parent {parent} not found, module will not execute")]
    OrphanModule {
        /// Orphaned module
        module: RigName,
        /// Declared parent
        parent: String,
    },

    /// Config override could not be applied
    #[error("Module {module}: override {path} not applied: {source}")]
    OverrideFailed {
        /// Module
        module: RigName,
        /// Property path
        path: String,
        /// Reason
        source: CoreError,
    },

    /// Binding source does not parse or resolve
    #[error("Module {module}: binding {variable} <- {source_expr} cannot be resolved")]
    UnresolvedBinding {
        /// Target module
        module: RigName,
        /// Target variable
        variable: RigName,
        /// Source expression
        source_expr: String,
    },

    /// Bound target variable no longer exists
    #[error("Module {module}: bound variable {variable} not found")]
    BindingTargetMissing {
        /// Target module
        module: RigName,
        /// Target variable
        variable: RigName,
    },

    /// Source and target of a binding have incompatible types
    #[error("Module {module}: binding {variable} skipped, {source}")]
    BindingTypeMismatch {
        /// Target module
        module: RigName,
        /// Target variable
        variable: RigName,
        /// Type error
        source: CoreError,
    },

    /// Re-initialization before execution failed
    #[error("Module {0}: re-initialization failed")]
    ReinitFailed(RigName),

    /// Executable reported failure for an event
    #[error("Module {module}: event {event} failed")]
    ExecutionFailed {
        /// Module
        module: RigName,
        /// Event
        event: RigName,
    },

    /// Connector resolution was requested without a module
    #[error("Connector {0}: no owning module")]
    ConnectorWithoutModule(ElementKey),

    /// Connector resolution was requested without a redirector
    #[error("Connector {0}: no redirector")]
    ConnectorWithoutRedirector(ElementKey),

    /// Model error
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Hierarchy error
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    /// Value error
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Class definitions could not be read
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl RigError {
    /// Severity of this error
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::ConnectorWithoutModule(_) | Self::ConnectorWithoutRedirector(_) => Severity::Fatal,
            _ => Severity::Ignorable,
        }
    }
}

/// Destination of reported errors: the log and an optional handler
#[derive(Default)]
pub struct ErrorSink {
    handler: Option<ErrorHandler>,
    reported: u64,
}

impl ErrorSink {
    /// Create a sink that only logs
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a handler, replacing any previous one
    pub fn set_handler(&mut self, handler: ErrorHandler) {
        self.handler = Some(handler);
    }

    /// Remove the handler
    pub fn clear_handler(&mut self) {
        self.handler = None;
    }

    /// Log an error and pass it to the handler
    pub fn report(&mut self, err: RigError) {
        self.reported += 1;
        match err.severity() {
            Severity::Ignorable => warn!(error = %err, "ignorable rig error"),
            Severity::Fatal => error!(error = %err, "rig precondition violated"),
        }
        if let Some(handler) = self.handler.as_mut() {
            handler(&err);
        }
    }

    /// Number of errors reported so far
    #[must_use]
    pub fn reported(&self) -> u64 {
        self.reported
    }
}

impl std::fmt::Debug for ErrorSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorSink")
            .field("handler", &self.handler.is_some())
            .field("reported", &self.reported)
            .finish()
    }
}

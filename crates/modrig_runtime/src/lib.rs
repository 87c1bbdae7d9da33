//! modrig Runtime
//!
//! Composes live rigs from a [`ModularRigModel`](modrig_model::ModularRigModel)
//! and executes them. A [`ModularRig`] owns one module instance per model
//! entry, keeps them in a breadth-first module tree, and drains a queue of
//! (module, event) pairs each time it is evaluated.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod behavior;
pub mod bindings;
pub mod composer;
pub mod config;
pub mod connector;
pub mod context;
pub mod error;
pub mod executable;
pub mod module;
pub mod monitor;
pub mod registry;
pub mod rig;
pub mod scheduler;
pub mod scripted;
pub mod tree;

pub use behavior::{ExecutionScope, RigBehavior};
pub use bindings::ExternalVariable;
pub use config::{OrphanPolicy, RigConfig};
pub use context::{
    AssetUserDataSources, ConnectorResolveState, DrawInstruction, DrawInterface, ExecuteContext,
    InteractionType, ResolveResult, ResolveState, RuntimeSettings,
};
pub use error::{ErrorHandler, ErrorSink, RigError, RigResult, Severity};
pub use executable::{Executable, ExecutableSetup};
pub use module::ModuleInstance;
pub use monitor::RigMetrics;
pub use registry::{BehaviorClass, ClassRegistry};
pub use rig::ModularRig;
pub use scheduler::{ExecutionElement, ExecutionQueue};
pub use scripted::{ScriptLibrary, ScriptOp, ScriptedBehavior, ScriptedClass};
pub use tree::ModuleTree;

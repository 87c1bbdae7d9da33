//! Event names.
//!
//! Executables advertise the events they support by name. A handful of
//! names carry special meaning for the scheduler.

use crate::name::RigName;

/// Name of an execution phase
pub type EventName = RigName;

/// Builds the rig's elements
pub const CONSTRUCTION: &str = "Construction";
/// Runs after construction for every module
pub const POST_CONSTRUCTION: &str = "PostConstruction";
/// Per-frame solve
pub const FORWARD_SOLVE: &str = "Forward";
/// Inverse solve
pub const BACKWARD_SOLVE: &str = "Backward";
/// Runs while elements are being interacted with
pub const INTERACTION: &str = "Interaction";
/// Resolves a single connector to a hierarchy element
pub const CONNECTOR_RESOLUTION: &str = "ResolveConnector";

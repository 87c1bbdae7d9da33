//! Rig configuration.

use modrig_core::event;
use modrig_core::EventName;
use serde::{Deserialize, Serialize};

/// What to do with modules whose declared parent cannot be found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrphanPolicy {
    /// Exclude from execution without reporting
    Exclude,
    /// Exclude from execution and report an ignorable error
    #[default]
    Warn,
}

/// Modular rig configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    /// Event that builds the rig's elements
    pub construction_event: EventName,
    /// Event run after construction
    pub post_construction_event: EventName,
    /// Event filtered by the elements being interacted with
    pub interaction_event: EventName,
    /// Event used to resolve connectors
    pub connector_event: EventName,
    /// Handling of orphaned modules
    pub orphan_policy: OrphanPolicy,
    /// Resolve parents through deprecated module paths when name lookup fails
    pub resolve_legacy_paths: bool,
    /// Only load lazily registered classes on the thread that created the rig
    pub enforce_owner_thread: bool,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            construction_event: EventName::from(event::CONSTRUCTION),
            post_construction_event: EventName::from(event::POST_CONSTRUCTION),
            interaction_event: EventName::from(event::INTERACTION),
            connector_event: EventName::from(event::CONNECTOR_RESOLUTION),
            orphan_policy: OrphanPolicy::Warn,
            resolve_legacy_paths: true,
            enforce_owner_thread: true,
        }
    }
}

impl RigConfig {
    /// Create a new config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the interaction event name
    #[must_use]
    pub fn with_interaction_event(mut self, name: impl Into<EventName>) -> Self {
        self.interaction_event = name.into();
        self
    }

    /// Set the connector resolution event name
    #[must_use]
    pub fn with_connector_event(mut self, name: impl Into<EventName>) -> Self {
        self.connector_event = name.into();
        self
    }

    /// Set the orphan policy
    #[must_use]
    pub fn with_orphan_policy(mut self, policy: OrphanPolicy) -> Self {
        self.orphan_policy = policy;
        self
    }

    /// Enable or disable deprecated path resolution
    #[must_use]
    pub fn with_legacy_paths(mut self, enabled: bool) -> Self {
        self.resolve_legacy_paths = enabled;
        self
    }

    /// Enable or disable owner thread enforcement for class loading
    #[must_use]
    pub fn with_owner_thread_enforcement(mut self, enabled: bool) -> Self {
        self.enforce_owner_thread = enabled;
        self
    }

    /// Load a config from JSON, missing fields take defaults
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

//! Execution context.
//!
//! The rig keeps one shared [`ExecuteContext`]; every executable keeps its
//! own. Before a module runs, the shared fields are pushed into the
//! module's context. Only the connector resolution state flows back.

use indexmap::IndexMap;
use modrig_core::{AssetUserData, ElementKey, EventName, RigName, Transform};
use serde::{Deserialize, Serialize};
use std::ops::BitOr;
use std::sync::{Arc, Mutex, PoisonError};

/// Kind of manipulation applied to the elements being interacted with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct InteractionType(u8);

impl InteractionType {
    /// No interaction
    pub const NONE: Self = Self(0);
    /// Translation
    pub const TRANSLATE: Self = Self(1);
    /// Rotation
    pub const ROTATE: Self = Self(1 << 1);
    /// Scale
    pub const SCALE: Self = Self(1 << 2);
    /// Every kind
    pub const ALL: Self = Self(0b111);

    /// Check if no interaction is taking place
    #[must_use]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Check if all bits of `other` are set
    #[must_use]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for InteractionType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// One debug drawing request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawInstruction {
    /// Module that issued the request
    pub module: RigName,
    /// Label
    pub label: String,
    /// Where to draw
    pub transform: Transform,
}

/// Shared sink for draw instructions
///
/// Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct DrawInterface {
    instructions: Arc<Mutex<Vec<DrawInstruction>>>,
}

impl DrawInterface {
    /// Create an empty interface
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an instruction
    pub fn draw(&self, instruction: DrawInstruction) {
        self.instructions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(instruction);
    }

    /// Take every queued instruction
    #[must_use]
    pub fn take(&self) -> Vec<DrawInstruction> {
        std::mem::take(&mut *self.instructions.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Number of queued instructions
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if nothing is queued
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if two interfaces share a buffer
    #[must_use]
    pub fn shares_buffer_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.instructions, &other.instructions)
    }
}

/// Settings forwarded unchanged to every module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Emit debug drawing
    #[serde(default)]
    pub enable_debug_drawing: bool,
    /// Free-form settings
    #[serde(default)]
    pub values: IndexMap<String, String>,
}

/// Named library of control shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeLibrary {
    /// Library name
    pub name: String,
    /// Shape names
    pub shapes: Vec<String>,
}

/// State of a connector resolution candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolveState {
    /// Could be used as target
    PossibleTarget,
    /// Preferred target
    DefaultTarget,
}

/// One candidate element for a connector
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolveResult {
    /// Candidate element
    pub key: ElementKey,
    /// Candidate state
    pub state: ResolveState,
}

impl ResolveResult {
    /// A possible target
    #[must_use]
    pub fn possible(key: ElementKey) -> Self {
        Self {
            key,
            state: ResolveState::PossibleTarget,
        }
    }
}

/// Working set of one connector resolution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectorResolveState {
    /// Connector being resolved, module-local
    pub connector: Option<ElementKey>,
    /// Remaining candidates
    pub candidates: Vec<ResolveResult>,
    /// Candidates ruled out
    pub excluded: Vec<ResolveResult>,
}

impl ConnectorResolveState {
    /// The candidate marked as default
    #[must_use]
    pub fn default_match(&self) -> Option<&ElementKey> {
        self.candidates
            .iter()
            .find(|c| c.state == ResolveState::DefaultTarget)
            .map(|c| &c.key)
    }

    /// Move candidates matching `exclude` to the excluded list
    pub fn exclude_where(&mut self, mut exclude: impl FnMut(&ElementKey) -> bool) {
        let (excluded, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.candidates)
            .into_iter()
            .partition(|c| exclude(&c.key));
        self.candidates = kept;
        for result in excluded {
            if !self.excluded.iter().any(|e| e.key == result.key) {
                self.excluded.push(result);
            }
        }
    }

    /// Mark `key` as the default match. Returns false if it is not a
    /// candidate.
    pub fn set_default_match(&mut self, key: &ElementKey) -> bool {
        if !self.candidates.iter().any(|c| &c.key == key) {
            return false;
        }
        for candidate in &mut self.candidates {
            candidate.state = if &candidate.key == key {
                ResolveState::DefaultTarget
            } else {
                ResolveState::PossibleTarget
            };
        }
        true
    }
}

/// Host-provided user data, merged for each module before it runs
#[derive(Debug, Clone, Default)]
pub struct AssetUserDataSources {
    /// From the skeleton
    pub skeleton: Vec<Arc<AssetUserData>>,
    /// From the mesh
    pub mesh: Vec<Arc<AssetUserData>>,
    /// From the mesh component
    pub component: Vec<Arc<AssetUserData>>,
    /// From the owning rig
    pub outer: Vec<Arc<AssetUserData>>,
}

/// Per-rig and per-module execution context
#[derive(Debug, Clone, Default)]
pub struct ExecuteContext {
    /// Event currently executing
    pub event: Option<EventName>,
    /// Absolute time in seconds
    pub absolute_time: f64,
    /// Time since the previous evaluation
    pub delta_time: f64,
    /// Frames per second
    pub frames_per_second: f64,
    /// World name
    pub world: Option<RigName>,
    /// Owning actor
    pub owning_actor: Option<RigName>,
    /// Owning component
    pub owning_component: Option<RigName>,
    /// Debug drawing sink
    pub draw: DrawInterface,
    /// Runtime settings
    pub runtime_settings: RuntimeSettings,
    /// Transform from rig space to world space
    pub to_world_space: Transform,
    /// Available shape libraries
    pub shape_libraries: Vec<Arc<ShapeLibrary>>,
    /// Elements currently being interacted with
    pub interaction_elements: Vec<ElementKey>,
    /// Kind of interaction
    pub interaction_type: InteractionType,
    /// Connector resolution working set
    pub connector: ConnectorResolveState,
    /// Result of the most recent connector resolution
    pub connector_result: Option<ConnectorResolveState>,
    /// User data visible to the module
    pub asset_user_data: Vec<Arc<AssetUserData>>,
}

impl ExecuteContext {
    /// Create a new context
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push the fields every module shares from the rig's context
    pub fn copy_shared_from(&mut self, shared: &ExecuteContext) {
        self.draw = shared.draw.clone();
        self.absolute_time = shared.absolute_time;
        self.delta_time = shared.delta_time;
        self.world.clone_from(&shared.world);
        self.owning_actor.clone_from(&shared.owning_actor);
        self.owning_component.clone_from(&shared.owning_component);
        self.frames_per_second = shared.frames_per_second;
        self.runtime_settings.clone_from(&shared.runtime_settings);
        self.to_world_space = shared.to_world_space;
        self.shape_libraries.clone_from(&shared.shape_libraries);
    }

    /// Check if an interaction is taking place
    #[must_use]
    pub fn is_interacting(&self) -> bool {
        !self.interaction_type.is_none() && !self.interaction_elements.is_empty()
    }
}

/// Merge user data lists, dropping duplicates by identity or name
#[must_use]
pub fn merge_user_data<'a>(lists: impl IntoIterator<Item = &'a [Arc<AssetUserData>]>) -> Vec<Arc<AssetUserData>> {
    let mut merged: Vec<Arc<AssetUserData>> = Vec::new();
    for list in lists {
        for data in list {
            if !merged.iter().any(|m| Arc::ptr_eq(m, data) || m.name == data.name) {
                merged.push(Arc::clone(data));
            }
        }
    }
    merged
}

//! Hierarchy errors.

use modrig_core::ElementKey;

/// Result type for hierarchy operations
pub type HierarchyResult<T> = Result<T, HierarchyError>;

/// Hierarchy error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    /// An element with this key already exists
    #[error("Element already exists: {0}")]
    DuplicateElement(ElementKey),

    /// No element with this key
    #[error("Element not found: {0}")]
    ElementNotFound(ElementKey),

    /// The declared parent does not exist
    #[error("Parent {parent} of {key} not found")]
    ParentNotFound {
        /// Element being added
        key: ElementKey,
        /// Missing parent
        parent: ElementKey,
    },

    /// Element key has an empty name
    #[error("Invalid element key: {0}")]
    InvalidKey(ElementKey),

    /// Snapshot could not be read or written
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for HierarchyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

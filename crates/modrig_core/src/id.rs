//! Executable identity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Executable identifier - one per instantiated executable
///
/// Reuse checks compare ids, never structural equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExecutableId(Uuid);

impl ExecutableId {
    /// Create a new random ExecutableId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from UUID bytes
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Get as UUID
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ExecutableId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExecutableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "exe_{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(ExecutableId::new(), ExecutableId::new());
    }

    #[test]
    fn test_display_prefix() {
        let id = ExecutableId::from_bytes([0u8; 16]);
        assert!(id.to_string().starts_with("exe_"));
    }
}

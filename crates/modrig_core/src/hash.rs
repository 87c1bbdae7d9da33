//! Name hashes.
//!
//! Module prefixes are hashed once when a module is configured so that
//! namespace checks during execution compare integers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-bit BLAKE3-derived hash of a name, case-insensitive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NameHash(u32);

impl NameHash {
    /// Hash of the empty name
    pub const NONE: Self = Self(0);

    /// Compute the hash of a name
    #[must_use]
    pub fn of(name: &str) -> Self {
        if name.is_empty() {
            return Self::NONE;
        }
        let lowered = name.to_lowercase();
        let digest = blake3::hash(lowered.as_bytes());
        let bytes = digest.as_bytes();
        Self(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Get the raw value
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Convert to hex string
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_be_bytes())
    }
}

impl Default for NameHash {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for NameHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        assert_eq!(NameHash::of("Leg/"), NameHash::of("Leg/"));
        assert_ne!(NameHash::of("Leg/"), NameHash::of("Arm/"));
    }

    #[test]
    fn test_hash_case_insensitive() {
        assert_eq!(NameHash::of("Leg/"), NameHash::of("LEG/"));
    }

    #[test]
    fn test_hash_empty() {
        assert_eq!(NameHash::of(""), NameHash::NONE);
        assert_eq!(NameHash::NONE.to_hex(), "00000000");
    }
}

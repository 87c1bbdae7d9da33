//! Core error types for modrig.

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// Name failed sanitization rules
    #[error("Invalid name '{name}': {reason}")]
    InvalidName {
        /// Offending name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// Value type does not match the declared type
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Declared type
        expected: String,
        /// Provided type
        actual: String,
    },

    /// Variable is not declared
    #[error("Unknown variable: {name}")]
    UnknownVariable {
        /// Variable name
        name: String,
    },

    /// Variable cannot be written
    #[error("Variable is read only: {name}")]
    ReadOnly {
        /// Variable name
        name: String,
    },

    /// Property path does not resolve
    #[error("Invalid property path: {path}")]
    InvalidPath {
        /// The path that failed to resolve
        path: String,
    },

    /// Encoding or decoding failed
    #[error("Serialization error: {message}")]
    Serialization {
        /// Underlying error message
        message: String,
    },
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::UnknownVariable {
            name: "Speed".to_string(),
        };
        assert_eq!(format!("{}", err), "Unknown variable: Speed");

        let err = CoreError::TypeMismatch {
            expected: "Float".to_string(),
            actual: "Bool".to_string(),
        };
        let s = format!("{}", err);
        assert!(s.contains("Float"));
        assert!(s.contains("Bool"));
    }

    #[test]
    fn test_from_serde_json() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        let core: CoreError = err.into();
        assert!(matches!(core, CoreError::Serialization { .. }));
    }
}

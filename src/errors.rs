// Copyright 2025 Cowboy AI, LLC.

//! Error types for diagram operations

use thiserror::Error;

use crate::entity::EntityKind;
use crate::identifiers::Uid;

/// Errors that can occur while editing a diagram document
#[derive(Debug, Clone, Error)]
pub enum DiagramError {
    /// Entity not found in the document
    #[error("Entity not found: {uid}")]
    EntityNotFound {
        /// Uid that was looked up
        uid: Uid,
    },

    /// Entity exists but is not of the kind the operation needs
    #[error("Entity {uid} is a {actual}, expected {expected}")]
    WrongKind {
        /// Uid of the offending entity
        uid: Uid,
        /// Kind the operation requires
        expected: &'static str,
        /// Kind the entity actually has
        actual: EntityKind,
    },

    /// Invalid operation
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Reason why the operation is invalid
        reason: String,
    },

    /// Invariant violation
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O error while loading or saving
    #[error("I/O error: {0}")]
    Io(String),
}

/// Result type for diagram operations
pub type DiagramResult<T> = Result<T, DiagramError>;

impl From<serde_json::Error> for DiagramError {
    fn from(err: serde_json::Error) -> Self {
        DiagramError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for DiagramError {
    fn from(err: std::io::Error) -> Self {
        DiagramError::Io(err.to_string())
    }
}

impl DiagramError {
    /// Create an invalid operation error
    pub fn invalid(reason: impl Into<String>) -> Self {
        DiagramError::InvalidOperation {
            reason: reason.into(),
        }
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, DiagramError::EntityNotFound { .. })
    }

    /// Check if this error rejects the operation itself
    pub fn is_invalid_operation(&self) -> bool {
        matches!(
            self,
            DiagramError::InvalidOperation { .. }
                | DiagramError::WrongKind { .. }
                | DiagramError::InvariantViolation(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let uid = Uid::new();
        let err = DiagramError::EntityNotFound { uid };
        assert_eq!(err.to_string(), format!("Entity not found: {uid}"));

        let err = DiagramError::WrongKind {
            uid,
            expected: "diagram",
            actual: EntityKind::Object,
        };
        assert_eq!(
            err.to_string(),
            format!("Entity {uid} is a object, expected diagram")
        );

        let err = DiagramError::invalid("bezier arrows have 4 control points");
        assert_eq!(
            err.to_string(),
            "Invalid operation: bezier arrows have 4 control points"
        );
    }

    #[test]
    fn test_error_predicates() {
        let uid = Uid::new();
        assert!(DiagramError::EntityNotFound { uid }.is_not_found());
        assert!(!DiagramError::EntityNotFound { uid }.is_invalid_operation());
        assert!(DiagramError::invalid("nope").is_invalid_operation());
        assert!(DiagramError::InvariantViolation("x".into()).is_invalid_operation());
    }

    #[test]
    fn test_json_error_conversion() {
        let err: DiagramError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, DiagramError::SerializationError(_)));
    }
}

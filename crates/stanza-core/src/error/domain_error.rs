//! Domain errors - error types for the domain layer

use thiserror::Error;

use crate::value_objects::JidError;

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Invalid JID: {0}")]
    InvalidJid(#[from] JidError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    // =========================================================================
    // Capability Errors
    // =========================================================================
    #[error("{operation} is not supported by the {backend} backend")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    // =========================================================================
    // Infrastructure Errors (wrapped)
    // =========================================================================
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DomainError {
    /// Shorthand for an unsupported backend operation
    pub fn unsupported(backend: &'static str, operation: &'static str) -> Self {
        Self::Unsupported { backend, operation }
    }

    /// Get an error code string for logs and metrics
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidJid(_) => "INVALID_JID",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::Unsupported { .. } => "UNSUPPORTED",
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::CacheError(_) => "CACHE_ERROR",
            Self::SerializationError(_) => "SERIALIZATION_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if the backend does not implement the operation
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidJid(_) | Self::ValidationError(_))
    }

    /// Check if this error comes from a storage backend
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::DatabaseError(_) | Self::CacheError(_) | Self::SerializationError(_)
        )
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = DomainError::unsupported("redis", "insert_slot");
        assert_eq!(err.code(), "UNSUPPORTED");

        let err = DomainError::DatabaseError("boom".to_string());
        assert_eq!(err.code(), "DATABASE_ERROR");
    }

    #[test]
    fn test_classifiers() {
        assert!(DomainError::unsupported("redis", "fetch_slot").is_unsupported());
        assert!(DomainError::from(JidError::EmptyDomain).is_validation());
        assert!(DomainError::CacheError("x".to_string()).is_infrastructure());
        assert!(!DomainError::InternalError("x".to_string()).is_infrastructure());
    }

    #[test]
    fn test_error_display() {
        let err = DomainError::unsupported("redis", "insert_slot");
        assert_eq!(
            err.to_string(),
            "insert_slot is not supported by the redis backend"
        );

        let err = DomainError::from(JidError::EmptyNode);
        assert_eq!(err.to_string(), "Invalid JID: JID node is empty");
    }
}

//! Error handling utilities for repositories

use sqlx::Error as SqlxError;
use stanza_core::DomainError;

/// Convert SQLx error to DomainError
pub fn map_db_error(e: SqlxError) -> DomainError {
    DomainError::DatabaseError(e.to_string())
}

//! Gateway errors

use stanza_common::AppError;
use stanza_core::{DomainError, Jid};
use stanza_service::{RegistryError, ServiceError};
use thiserror::Error;

/// Errors raised by the session layer and the HTTP listener
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid session JID: {0}")]
    InvalidJid(String),

    #[error("Session already bound: {0}")]
    SessionConflict(Jid),

    #[error("Session closed: {0}")]
    SessionClosed(Jid),

    #[error("HTTP listener already started")]
    AlreadyStarted,

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Bind { .. } => AppError::Bind(err.to_string()),
            GatewayError::Domain(e) => AppError::Domain(e),
            other => AppError::internal(other),
        }
    }
}

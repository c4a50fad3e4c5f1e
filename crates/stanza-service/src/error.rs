//! Service layer error types
//!
//! Errors a module can return while processing a stanza. The dispatcher
//! answers every one of them with `internal-server-error`.

use stanza_core::{DomainError, RouteError, StanzaErrorCondition};
use std::fmt;

use crate::hook::HookError;
use crate::module::RegistryError;

/// Service layer error type
#[derive(Debug)]
pub enum ServiceError {
    /// Repository or resource manager failure
    Domain(DomainError),

    /// Outbound delivery failure
    Route(RouteError),

    /// Interceptor chain failure
    Hook(HookError),

    /// Module start/stop failure
    Lifecycle(RegistryError),

    /// Internal error
    Internal(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(e) => write!(f, "{e}"),
            Self::Route(e) => write!(f, "Routing error: {e}"),
            Self::Hook(e) => write!(f, "{e}"),
            Self::Lifecycle(e) => write!(f, "{e}"),
            Self::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Domain(e) => Some(e),
            Self::Route(e) => Some(e),
            Self::Hook(e) => Some(e),
            Self::Lifecycle(e) => Some(e),
            Self::Internal(_) => None,
        }
    }
}

impl ServiceError {
    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Condition sent back to the requester
    pub fn condition(&self) -> StanzaErrorCondition {
        StanzaErrorCondition::InternalServerError
    }

    /// Get the error code for logs
    pub fn error_code(&self) -> &str {
        match self {
            Self::Domain(e) => e.code(),
            Self::Route(_) => "ROUTE_ERROR",
            Self::Hook(_) => "HOOK_ERROR",
            Self::Lifecycle(_) => "LIFECYCLE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

impl From<RouteError> for ServiceError {
    fn from(err: RouteError) -> Self {
        Self::Route(err)
    }
}

impl From<HookError> for ServiceError {
    fn from(err: HookError) -> Self {
        Self::Hook(err)
    }
}

impl From<RegistryError> for ServiceError {
    fn from(err: RegistryError) -> Self {
        Self::Lifecycle(err)
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

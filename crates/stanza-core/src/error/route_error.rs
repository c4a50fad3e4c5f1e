//! Outbound routing errors

use thiserror::Error;

use crate::value_objects::Jid;

/// Why a stanza could not be delivered
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("Stanza has no recipient")]
    MissingRecipient,

    #[error("Domain is not served locally: {0}")]
    RemoteDomain(String),

    #[error("Recipient not available: {0}")]
    NotAvailable(Jid),

    #[error("Timed out delivering to {0}")]
    Timeout(Jid),

    #[error("Session closed: {0}")]
    Closed(Jid),
}

impl RouteError {
    /// Recipient has no connected session
    pub fn is_not_available(&self) -> bool {
        matches!(self, Self::NotAvailable(_))
    }
}

//! Presence stanza

use serde::{Deserialize, Serialize};

use super::element::Element;
use super::error::StanzaError;
use crate::value_objects::Jid;

/// Presence type attribute. A missing attribute means available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceType {
    #[default]
    Available,
    Unavailable,
    Subscribe,
    Subscribed,
    Unsubscribe,
    Unsubscribed,
    Probe,
    Error,
}

/// Availability and subscription signalling
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Presence {
    pub id: Option<String>,
    pub presence_type: PresenceType,
    pub from: Option<Jid>,
    pub to: Option<Jid>,
    pub show: Option<String>,
    pub status: Option<String>,
    pub priority: i8,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Element>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StanzaError>,
}

impl Presence {
    pub fn new(presence_type: PresenceType) -> Self {
        Self {
            presence_type,
            ..Self::default()
        }
    }

    pub fn available() -> Self {
        Self::new(PresenceType::Available)
    }

    pub fn unavailable() -> Self {
        Self::new(PresenceType::Unavailable)
    }

    #[must_use]
    pub fn with_from(mut self, from: Jid) -> Self {
        self.from = Some(from);
        self
    }

    #[must_use]
    pub fn with_to(mut self, to: Jid) -> Self {
        self.to = Some(to);
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn is_available(&self) -> bool {
        self.presence_type == PresenceType::Available
    }

    pub fn is_unavailable(&self) -> bool {
        self.presence_type == PresenceType::Unavailable
    }

    /// Status text, empty when absent
    pub fn status(&self) -> &str {
        self.status.as_deref().unwrap_or_default()
    }

    /// Broadcast presence has no recipient or is addressed to the sender's bare JID
    pub fn is_broadcast(&self) -> bool {
        match (&self.to, &self.from) {
            (None, _) => true,
            (Some(to), Some(from)) => to.is_bare() && to.same_account(from),
            (Some(_), None) => false,
        }
    }

    pub fn error_reply(&self, error: StanzaError) -> Self {
        Self {
            id: self.id.clone(),
            presence_type: PresenceType::Error,
            from: self.to.clone(),
            to: self.from.clone(),
            error: Some(error),
            ..Self::default()
        }
    }
}

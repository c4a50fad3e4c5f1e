//! Domain events - occurrences published by the session layer
//!
//! These events are used for:
//! - Letting modules react to session lifecycle outside the stanza path
//! - Keeping per-module state (e.g. last activity) current

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::entities::Resource;
use crate::stanza::Presence;
use crate::value_objects::Jid;

/// All possible domain events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    StreamConnected(StreamConnectedEvent),
    ResourceBound(ResourceBoundEvent),
    PresenceReceived(PresenceReceivedEvent),
    StreamDisconnected(StreamDisconnectedEvent),
}

/// Event name used for subscription filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    StreamConnected,
    ResourceBound,
    PresenceReceived,
    StreamDisconnected,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StreamConnected => "STREAM_CONNECTED",
            Self::ResourceBound => "RESOURCE_BOUND",
            Self::PresenceReceived => "PRESENCE_RECEIVED",
            Self::StreamDisconnected => "STREAM_DISCONNECTED",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::StreamConnected(_) => EventKind::StreamConnected,
            Self::ResourceBound(_) => EventKind::ResourceBound,
            Self::PresenceReceived(_) => EventKind::PresenceReceived,
            Self::StreamDisconnected(_) => EventKind::StreamDisconnected,
        }
    }

    pub fn stream_connected(jid: Jid) -> Self {
        Self::StreamConnected(StreamConnectedEvent {
            jid,
            timestamp: Utc::now(),
        })
    }

    pub fn resource_bound(resource: Resource) -> Self {
        Self::ResourceBound(ResourceBoundEvent {
            resource,
            timestamp: Utc::now(),
        })
    }

    pub fn presence_received(jid: Jid, presence: Presence) -> Self {
        Self::PresenceReceived(PresenceReceivedEvent {
            jid,
            presence,
            timestamp: Utc::now(),
        })
    }

    pub fn stream_disconnected(jid: Jid) -> Self {
        Self::StreamDisconnected(StreamDisconnectedEvent {
            jid,
            timestamp: Utc::now(),
        })
    }
}

// =============================================================================
// Event Payloads
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConnectedEvent {
    pub jid: Jid,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceBoundEvent {
    pub resource: Resource,
    pub timestamp: DateTime<Utc>,
}

/// Presence received from a local session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceReceivedEvent {
    /// Session that sent the presence
    pub jid: Jid,
    pub presence: Presence,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamDisconnectedEvent {
    pub jid: Jid,
    pub timestamp: DateTime<Utc>,
}

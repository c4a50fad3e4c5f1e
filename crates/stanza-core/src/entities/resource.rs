//! Bound session resource

use serde::{Deserialize, Serialize};

use crate::stanza::Presence;
use crate::value_objects::Jid;

/// A bound, connected session of a user, as seen cluster-wide
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Full JID of the session
    pub jid: Jid,
    /// Cluster node hosting the session
    pub instance_id: String,
    /// Last broadcast presence, if any
    pub presence: Option<Presence>,
}

impl Resource {
    pub fn new(jid: Jid, instance_id: impl Into<String>) -> Self {
        Self {
            jid,
            instance_id: instance_id.into(),
            presence: None,
        }
    }

    pub fn username(&self) -> &str {
        self.jid.node().unwrap_or_default()
    }

    pub fn resource(&self) -> &str {
        self.jid.resource().unwrap_or_default()
    }

    /// True once an available presence was broadcast
    pub fn is_available(&self) -> bool {
        self.presence.as_ref().is_some_and(Presence::is_available)
    }
}

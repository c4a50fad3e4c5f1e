//! Last activity entity

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// When an account last went offline, and with which status text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastActivity {
    pub username: String,
    /// Unix timestamp (seconds) of the last unavailable presence
    pub seconds: i64,
    pub status: String,
}

impl LastActivity {
    pub fn new(username: impl Into<String>, seconds: i64, status: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            seconds,
            status: status.into(),
        }
    }

    /// Record stamped with the current time
    pub fn now(username: impl Into<String>, status: impl Into<String>) -> Self {
        Self::new(username, Utc::now().timestamp(), status)
    }

    /// Seconds elapsed since the record was written, never negative
    pub fn elapsed_since(&self, now: i64) -> u64 {
        u64::try_from(now.saturating_sub(self.seconds)).unwrap_or(0)
    }
}

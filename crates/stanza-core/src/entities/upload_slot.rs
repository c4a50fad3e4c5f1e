//! HTTP upload slot entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A reserved upload location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSlot {
    /// Assigned by the repository on insert; empty before that
    pub id: String,
    pub filename: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UploadSlot {
    /// New slot without an id
    pub fn new(filename: impl Into<String>, size: u64, content_type: Option<String>) -> Self {
        Self {
            id: String::new(),
            filename: filename.into(),
            size,
            content_type,
            created_at: Utc::now(),
        }
    }

    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }
}

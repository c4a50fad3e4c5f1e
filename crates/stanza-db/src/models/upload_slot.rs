//! Upload slot database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for slot_file_upload table
#[derive(Debug, Clone, FromRow)]
pub struct UploadSlotModel {
    pub id: String,
    pub filename: String,
    pub size: i64,
    pub content_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

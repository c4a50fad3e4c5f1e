//! Last activity database model

use sqlx::FromRow;

/// Database model for last table
#[derive(Debug, Clone, FromRow)]
pub struct LastModel {
    pub username: String,
    pub seconds: i64,
    pub status: String,
}

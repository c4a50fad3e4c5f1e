//! Roster item database model

use sqlx::FromRow;

/// Database model for roster_items table
#[derive(Debug, Clone, FromRow)]
pub struct RosterItemModel {
    pub username: String,
    pub jid: String,
    pub subscription: String,
}

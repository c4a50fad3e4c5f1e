//! Entity to model mappers
//!
//! This module provides conversions between domain entities (stanza-core) and database models.
//! - `From<Model> for Entity` / `TryFrom<Model>`: Convert database rows to domain objects
//! - `*Insert` structs: Prepare entity data for database operations

mod last;
mod roster;
mod upload_slot;

pub use roster::RosterItemInsert;
pub use upload_slot::UploadSlotInsert;

//! Database models
//!
//! These structs map directly to database tables using SQLx's `FromRow` derive.

mod last;
mod roster;
mod upload_slot;

pub use last::LastModel;
pub use roster::RosterItemModel;
pub use upload_slot::UploadSlotModel;

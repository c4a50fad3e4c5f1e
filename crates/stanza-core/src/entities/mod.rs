//! Domain entities

mod last_activity;
mod resource;
mod roster;
mod upload_slot;

pub use last_activity::LastActivity;
pub use resource::Resource;
pub use roster::{RosterItem, Subscription};
pub use upload_slot::UploadSlot;

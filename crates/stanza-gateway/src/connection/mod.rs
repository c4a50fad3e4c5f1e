//! Connection management
//!
//! Tracks bound sessions and the channels stanzas are delivered through.

mod connection;
mod manager;
mod session;

pub use connection::Connection;
pub use manager::ConnectionManager;
pub use session::SessionHandle;

pub(crate) use session::run_session;

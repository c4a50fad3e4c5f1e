//! # stanza-gateway
//!
//! Server assembly: the stanza dispatcher, the local router, bound sessions,
//! and the HTTP listener modules register their endpoints on.

pub mod connection;
pub mod dispatch;
pub mod error;
pub mod router;
pub mod server;

pub use connection::{Connection, ConnectionManager, SessionHandle};
pub use dispatch::{DispatchError, DispatchOutcome, StanzaDispatcher};
pub use error::GatewayError;
pub use router::LocalRouter;
pub use server::{build_gateway_state, create_gateway_state, run, GatewayState, HttpServer};

//! Inbound stanza dispatch
//!
//! Routes every inbound stanza to a module, a local session, or an error reply.

mod dispatcher;

pub use dispatcher::{DispatchError, DispatchOutcome, StanzaDispatcher};

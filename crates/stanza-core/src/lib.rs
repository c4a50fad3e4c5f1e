//! # stanza-core
//!
//! Domain layer containing JIDs, the structured stanza model, entities, domain events,
//! and the ports (repositories, resource manager, router) the pipeline depends on.
//! This crate has zero dependencies on infrastructure (database, cache, web framework).

pub mod entities;
pub mod error;
pub mod events;
pub mod stanza;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{LastActivity, Resource, RosterItem, Subscription, UploadSlot};
pub use error::{DomainError, RouteError};
pub use events::{
    Event, EventKind, PresenceReceivedEvent, ResourceBoundEvent, StreamConnectedEvent,
    StreamDisconnectedEvent,
};
pub use stanza::{
    Element, ElementBuilder, Iq, IqType, Message, MessageType, Presence, PresenceType, Stanza,
    StanzaError, StanzaErrorCondition, StanzaErrorType, STANZAS_NS,
};
pub use traits::{
    tx_fn, LastRepository, RepoResult, Repository, ResourceManager, RosterRepository, Router,
    Transaction, TxFn, UploadSlotRepository,
};
pub use value_objects::{Hosts, Jid, JidError};

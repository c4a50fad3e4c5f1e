//! Server-wide domain events

mod event;

pub use event::{
    Event, EventKind, PresenceReceivedEvent, ResourceBoundEvent, StreamConnectedEvent,
    StreamDisconnectedEvent,
};

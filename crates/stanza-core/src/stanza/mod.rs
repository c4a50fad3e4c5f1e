//! Structured stanza model
//!
//! The three top-level XMPP stanzas plus the payload element tree and the
//! protocol error conditions used to answer them.

mod element;
mod error;
mod iq;
mod message;
mod presence;

pub use element::{Element, ElementBuilder, XMLNS};
pub use error::{StanzaError, StanzaErrorCondition, StanzaErrorType, STANZAS_NS};
pub use iq::{Iq, IqType};
pub use message::{Message, MessageType};
pub use presence::{Presence, PresenceType};

use serde::{Deserialize, Serialize};

use crate::value_objects::Jid;

/// Any top-level stanza
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stanza", rename_all = "lowercase")]
pub enum Stanza {
    Iq(Iq),
    Presence(Presence),
    Message(Message),
}

impl Stanza {
    /// Element name on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Self::Iq(_) => "iq",
            Self::Presence(_) => "presence",
            Self::Message(_) => "message",
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Iq(iq) => Some(&iq.id),
            Self::Presence(p) => p.id.as_deref(),
            Self::Message(m) => m.id.as_deref(),
        }
    }

    /// Sender address, when stamped
    pub fn sender(&self) -> Option<&Jid> {
        match self {
            Self::Iq(iq) => iq.from.as_ref(),
            Self::Presence(p) => p.from.as_ref(),
            Self::Message(m) => m.from.as_ref(),
        }
    }

    pub fn to(&self) -> Option<&Jid> {
        match self {
            Self::Iq(iq) => iq.to.as_ref(),
            Self::Presence(p) => p.to.as_ref(),
            Self::Message(m) => m.to.as_ref(),
        }
    }

    pub fn set_from(&mut self, from: Option<Jid>) {
        match self {
            Self::Iq(iq) => iq.from = from,
            Self::Presence(p) => p.from = from,
            Self::Message(m) => m.from = from,
        }
    }

    pub fn set_to(&mut self, to: Option<Jid>) {
        match self {
            Self::Iq(iq) => iq.to = to,
            Self::Presence(p) => p.to = to,
            Self::Message(m) => m.to = to,
        }
    }

    /// True for stanzas of type `error`. These are never answered with another error.
    pub fn is_error(&self) -> bool {
        match self {
            Self::Iq(iq) => iq.iq_type == IqType::Error,
            Self::Presence(p) => p.presence_type == PresenceType::Error,
            Self::Message(m) => m.message_type == MessageType::Error,
        }
    }

    /// Error reply: original id kept, `from`/`to` swapped
    pub fn error_reply(&self, error: impl Into<StanzaError>) -> Self {
        let error = error.into();
        match self {
            Self::Iq(iq) => Self::Iq(iq.error_reply(error)),
            Self::Presence(p) => Self::Presence(p.error_reply(error)),
            Self::Message(m) => Self::Message(m.error_reply(error)),
        }
    }

    pub fn as_iq(&self) -> Option<&Iq> {
        match self {
            Self::Iq(iq) => Some(iq),
            _ => None,
        }
    }

    pub fn as_presence(&self) -> Option<&Presence> {
        match self {
            Self::Presence(p) => Some(p),
            _ => None,
        }
    }

    /// Condition carried by an error stanza
    pub fn error_condition(&self) -> Option<StanzaErrorCondition> {
        let error = match self {
            Self::Iq(iq) => iq.error.as_ref(),
            Self::Presence(p) => p.error.as_ref(),
            Self::Message(m) => m.error.as_ref(),
        };
        error.map(|e| e.condition)
    }
}

impl From<Iq> for Stanza {
    fn from(iq: Iq) -> Self {
        Self::Iq(iq)
    }
}

impl From<Presence> for Stanza {
    fn from(presence: Presence) -> Self {
        Self::Presence(presence)
    }
}

impl From<Message> for Stanza {
    fn from(message: Message) -> Self {
        Self::Message(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_accessors() {
        let from: Jid = "ortuman@jackal.im/chamber".parse().unwrap();
        let to: Jid = "noelia@jackal.im".parse().unwrap();
        let mut stanza = Stanza::from(
            Message::chat("hi")
                .with_id("m1")
                .with_from(from.clone())
                .with_to(to.clone()),
        );

        assert_eq!(stanza.name(), "message");
        assert_eq!(stanza.id(), Some("m1"));
        assert_eq!(stanza.sender(), Some(&from));
        assert_eq!(stanza.to(), Some(&to));

        stanza.set_to(None);
        assert!(stanza.to().is_none());
    }

    #[test]
    fn test_error_reply_for_each_kind() {
        let from: Jid = "ortuman@jackal.im/chamber".parse().unwrap();
        let to: Jid = "noelia@jackal.im".parse().unwrap();

        let stanzas = [
            Stanza::from(Iq::get("1").with_from(from.clone()).with_to(to.clone())),
            Stanza::from(Presence::available().with_from(from.clone()).with_to(to.clone())),
            Stanza::from(Message::chat("x").with_from(from.clone()).with_to(to.clone())),
        ];

        for stanza in stanzas {
            let reply = stanza.error_reply(StanzaErrorCondition::ServiceUnavailable);
            assert!(reply.is_error());
            assert_eq!(reply.to(), Some(&from));
            assert_eq!(reply.sender(), Some(&to));
            assert_eq!(reply.id(), stanza.id());
            assert_eq!(
                reply.error_condition(),
                Some(StanzaErrorCondition::ServiceUnavailable)
            );
        }
    }

    #[test]
    fn test_serde_tagged() {
        let stanza = Stanza::from(Presence::unavailable().with_status("bye"));
        let json = serde_json::to_value(&stanza).unwrap();
        assert_eq!(json["stanza"], "presence");
        assert_eq!(json["presence_type"], "unavailable");

        let back: Stanza = serde_json::from_value(json).unwrap();
        assert_eq!(back, stanza);
    }
}

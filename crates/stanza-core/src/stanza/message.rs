//! Message stanza

use serde::{Deserialize, Serialize};

use super::element::Element;
use super::error::StanzaError;
use crate::value_objects::Jid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Normal,
    Chat,
    Groupchat,
    Headline,
    Error,
}

/// Push-style payload delivered to the recipient
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    pub id: Option<String>,
    pub message_type: MessageType,
    pub from: Option<Jid>,
    pub to: Option<Jid>,
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Element>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StanzaError>,
}

impl Message {
    /// Chat message with a body
    pub fn chat(body: impl Into<String>) -> Self {
        Self {
            message_type: MessageType::Chat,
            body: Some(body.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_from(mut self, from: Jid) -> Self {
        self.from = Some(from);
        self
    }

    #[must_use]
    pub fn with_to(mut self, to: Jid) -> Self {
        self.to = Some(to);
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn error_reply(&self, error: StanzaError) -> Self {
        Self {
            id: self.id.clone(),
            message_type: MessageType::Error,
            from: self.to.clone(),
            to: self.from.clone(),
            body: self.body.clone(),
            children: Vec::new(),
            error: Some(error),
        }
    }
}

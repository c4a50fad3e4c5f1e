//! Info/query stanza

use serde::{Deserialize, Serialize};

use super::element::Element;
use super::error::StanzaError;
use crate::value_objects::Jid;

/// IQ type attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IqType {
    Get,
    Set,
    Result,
    Error,
}

impl IqType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Set => "set",
            Self::Result => "result",
            Self::Error => "error",
        }
    }

    /// `get` and `set` expect exactly one response
    pub fn is_request(&self) -> bool {
        matches!(self, Self::Get | Self::Set)
    }
}

/// Request/response stanza carrying one namespaced payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Iq {
    pub id: String,
    pub iq_type: IqType,
    pub from: Option<Jid>,
    pub to: Option<Jid>,
    pub payload: Option<Element>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StanzaError>,
}

impl Iq {
    pub fn new(id: impl Into<String>, iq_type: IqType) -> Self {
        Self {
            id: id.into(),
            iq_type,
            from: None,
            to: None,
            payload: None,
            error: None,
        }
    }

    /// Shorthand for a `get` request
    pub fn get(id: impl Into<String>) -> Self {
        Self::new(id, IqType::Get)
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
    pub fn with_payload(mut self, payload: Element) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Namespace of the payload element
    pub fn namespace(&self) -> Option<&str> {
        self.payload.as_ref().and_then(Element::namespace)
    }

    /// Payload matching both name and namespace
    pub fn payload_ns(&self, name: &str, namespace: &str) -> Option<&Element> {
        self.payload
            .as_ref()
            .filter(|p| p.name() == name && p.namespace() == Some(namespace))
    }

    pub fn is_get(&self) -> bool {
        self.iq_type == IqType::Get
    }

    pub fn is_request(&self) -> bool {
        self.iq_type.is_request()
    }

    /// `result` answering this request: same id, addresses swapped
    pub fn result_reply(&self, payload: Option<Element>) -> Self {
        Self {
            id: self.id.clone(),
            iq_type: IqType::Result,
            from: self.to.clone(),
            to: self.from.clone(),
            payload,
            error: None,
        }
    }

    /// `error` answering this request: same id, addresses swapped
    pub fn error_reply(&self, error: StanzaError) -> Self {
        Self {
            id: self.id.clone(),
            iq_type: IqType::Error,
            from: self.to.clone(),
            to: self.from.clone(),
            payload: self.payload.clone(),
            error: Some(error),
        }
    }
}

//! Protocol-level stanza errors
//!
//! Conditions are the XMPP-standard defined conditions qualified by the
//! `urn:ietf:params:xml:ns:xmpp-stanzas` namespace.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::element::Element;

/// Namespace of the defined stanza error conditions
pub const STANZAS_NS: &str = "urn:ietf:params:xml:ns:xmpp-stanzas";

/// How the requester is expected to react to an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StanzaErrorType {
    Auth,
    Cancel,
    Continue,
    Modify,
    Wait,
}

impl StanzaErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Cancel => "cancel",
            Self::Continue => "continue",
            Self::Modify => "modify",
            Self::Wait => "wait",
        }
    }
}

/// Defined error conditions used by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StanzaErrorCondition {
    BadRequest,
    FeatureNotImplemented,
    Forbidden,
    InternalServerError,
    ItemNotFound,
    NotAcceptable,
    RemoteServerNotFound,
    RemoteServerTimeout,
    ServiceUnavailable,
}

impl StanzaErrorCondition {
    /// Element name of the condition
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "bad-request",
            Self::FeatureNotImplemented => "feature-not-implemented",
            Self::Forbidden => "forbidden",
            Self::InternalServerError => "internal-server-error",
            Self::ItemNotFound => "item-not-found",
            Self::NotAcceptable => "not-acceptable",
            Self::RemoteServerNotFound => "remote-server-not-found",
            Self::RemoteServerTimeout => "remote-server-timeout",
            Self::ServiceUnavailable => "service-unavailable",
        }
    }

    /// Error type paired with the condition on the wire
    pub fn error_type(&self) -> StanzaErrorType {
        match self {
            Self::BadRequest | Self::NotAcceptable => StanzaErrorType::Modify,
            Self::Forbidden => StanzaErrorType::Auth,
            Self::RemoteServerTimeout => StanzaErrorType::Wait,
            Self::FeatureNotImplemented
            | Self::InternalServerError
            | Self::ItemNotFound
            | Self::RemoteServerNotFound
            | Self::ServiceUnavailable => StanzaErrorType::Cancel,
        }
    }
}

impl fmt::Display for StanzaErrorCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error payload attached to an error stanza
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StanzaError {
    pub condition: StanzaErrorCondition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Application-specific condition element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<Element>,
}

impl StanzaError {
    pub fn new(condition: StanzaErrorCondition) -> Self {
        Self {
            condition,
            text: None,
            application: None,
        }
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn with_application(mut self, element: Element) -> Self {
        self.application = Some(element);
        self
    }

    /// Render as an `<error/>` element
    pub fn to_element(&self) -> Element {
        let mut builder = Element::builder("error")
            .attribute("type", self.condition.error_type().as_str())
            .child(
                Element::builder(self.condition.as_str())
                    .namespace(STANZAS_NS)
                    .build(),
            );
        if let Some(text) = &self.text {
            builder = builder.child(
                Element::builder("text")
                    .namespace(STANZAS_NS)
                    .text(text.clone())
                    .build(),
            );
        }
        if let Some(app) = &self.application {
            builder = builder.child(app.clone());
        }
        builder.build()
    }
}

impl From<StanzaErrorCondition> for StanzaError {
    fn from(condition: StanzaErrorCondition) -> Self {
        Self::new(condition)
    }
}

//! Jabber identifier
//!
//! `node@domain/resource`, where only the domain is mandatory. A JID without a
//! resource is *bare*; a JID without a node addresses the server itself.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length in bytes of each JID part
const MAX_PART_LEN: usize = 1023;

/// JID parse errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JidError {
    #[error("JID domain is empty")]
    EmptyDomain,

    #[error("JID node is empty")]
    EmptyNode,

    #[error("JID resource is empty")]
    EmptyResource,

    #[error("JID {0} part exceeds 1023 bytes")]
    TooLong(&'static str),

    #[error("JID domain contains an invalid character: {0}")]
    InvalidDomain(String),
}

/// XMPP address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Jid {
    node: Option<String>,
    domain: String,
    resource: Option<String>,
}

impl Jid {
    /// Build a JID from its parts. Node and domain are lower-cased.
    pub fn new(node: Option<&str>, domain: &str, resource: Option<&str>) -> Result<Self, JidError> {
        if domain.is_empty() {
            return Err(JidError::EmptyDomain);
        }
        if domain.contains(['@', '/']) {
            return Err(JidError::InvalidDomain(domain.to_string()));
        }
        if domain.len() > MAX_PART_LEN {
            return Err(JidError::TooLong("domain"));
        }
        if let Some(node) = node {
            if node.is_empty() {
                return Err(JidError::EmptyNode);
            }
            if node.len() > MAX_PART_LEN {
                return Err(JidError::TooLong("node"));
            }
        }
        if let Some(resource) = resource {
            if resource.is_empty() {
                return Err(JidError::EmptyResource);
            }
            if resource.len() > MAX_PART_LEN {
                return Err(JidError::TooLong("resource"));
            }
        }

        Ok(Self {
            node: node.map(str::to_lowercase),
            domain: domain.to_lowercase(),
            resource: resource.map(str::to_string),
        })
    }

    /// JID addressing a server domain
    pub fn domain_only(domain: &str) -> Result<Self, JidError> {
        Self::new(None, domain, None)
    }

    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// Strip the resource part
    #[must_use]
    pub fn bare(&self) -> Self {
        Self {
            node: self.node.clone(),
            domain: self.domain.clone(),
            resource: None,
        }
    }

    /// Same node and domain with another resource
    pub fn with_resource(&self, resource: &str) -> Result<Self, JidError> {
        Self::new(self.node(), &self.domain, Some(resource))
    }

    pub fn is_bare(&self) -> bool {
        self.resource.is_none()
    }

    pub fn is_full(&self) -> bool {
        self.resource.is_some()
    }

    /// True when the JID addresses a server (no node, no resource)
    pub fn is_server(&self) -> bool {
        self.node.is_none() && self.resource.is_none()
    }

    /// True when both JIDs belong to the same account
    pub fn same_account(&self, other: &Self) -> bool {
        self.node == other.node && self.domain == other.domain
    }
}

impl FromStr for Jid {
    type Err = JidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (rest, resource) = match s.split_once('/') {
            Some((rest, resource)) => (rest, Some(resource)),
            None => (s, None),
        };
        let (node, domain) = match rest.split_once('@') {
            Some((node, domain)) => (Some(node), domain),
            None => (None, rest),
        };
        Self::new(node, domain, resource)
    }
}

impl TryFrom<String> for Jid {
    type Error = JidError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Jid> for String {
    fn from(jid: Jid) -> Self {
        jid.to_string()
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(node) = &self.node {
            write!(f, "{node}@")?;
        }
        f.write_str(&self.domain)?;
        if let Some(resource) = &self.resource {
            write!(f, "/{resource}")?;
        }
        Ok(())
    }
}

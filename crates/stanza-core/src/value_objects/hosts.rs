//! Local host domains served by this node

use std::collections::BTreeSet;

use crate::value_objects::JidError;

/// The set of domains considered local
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hosts {
    default_host: String,
    domains: BTreeSet<String>,
}

impl Hosts {
    /// Create from a list of domains. The first one becomes the default host.
    pub fn new<I, S>(domains: I) -> Result<Self, JidError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ordered = Vec::new();
        for domain in domains {
            let domain = domain.as_ref().trim().to_lowercase();
            if domain.is_empty() {
                continue;
            }
            if domain.contains(['@', '/']) {
                return Err(JidError::InvalidDomain(domain));
            }
            ordered.push(domain);
        }

        let default_host = ordered.first().cloned().ok_or(JidError::EmptyDomain)?;
        Ok(Self {
            default_host,
            domains: ordered.into_iter().collect(),
        })
    }

    pub fn is_local(&self, domain: &str) -> bool {
        self.domains.contains(&domain.to_lowercase())
    }

    pub fn default_host(&self) -> &str {
        &self.default_host
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(String::as_str)
    }
}

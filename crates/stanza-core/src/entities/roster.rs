//! Roster entity

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Presence subscription state between a roster owner and a contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subscription {
    #[default]
    None,
    /// The owner receives the contact's presence
    To,
    /// The contact receives the owner's presence
    From,
    Both,
}

impl Subscription {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::To => "to",
            Self::From => "from",
            Self::Both => "both",
        }
    }

    /// True when the contact is allowed to see the owner's presence
    pub fn allows_contact(&self) -> bool {
        matches!(self, Self::From | Self::Both)
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subscription {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "to" => Ok(Self::To),
            "from" => Ok(Self::From),
            "both" => Ok(Self::Both),
            _ => Err(format!("Invalid subscription: {s}")),
        }
    }
}

/// A contact in a user's roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterItem {
    /// Roster owner
    pub username: String,
    /// Bare JID of the contact
    pub jid: String,
    pub subscription: Subscription,
}

impl RosterItem {
    pub fn new(
        username: impl Into<String>,
        jid: impl Into<String>,
        subscription: Subscription,
    ) -> Self {
        Self {
            username: username.into(),
            jid: jid.into(),
            subscription,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_contact() {
        assert!(Subscription::From.allows_contact());
        assert!(Subscription::Both.allows_contact());
        assert!(!Subscription::To.allows_contact());
        assert!(!Subscription::None.allows_contact());
    }

    #[test]
    fn test_parse() {
        assert_eq!("BOTH".parse::<Subscription>(), Ok(Subscription::Both));
        assert!("pending".parse::<Subscription>().is_err());
        assert_eq!(Subscription::From.to_string(), "from");
    }
}

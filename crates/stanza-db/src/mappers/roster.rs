//! Roster mappers

use stanza_core::{DomainError, RosterItem, Subscription};

use crate::models::RosterItemModel;

impl TryFrom<RosterItemModel> for RosterItem {
    type Error = DomainError;

    fn try_from(model: RosterItemModel) -> Result<Self, Self::Error> {
        let subscription = model
            .subscription
            .parse::<Subscription>()
            .map_err(DomainError::DatabaseError)?;
        Ok(RosterItem::new(model.username, model.jid, subscription))
    }
}

/// Data for upserting a roster item
#[derive(Debug, Clone)]
pub struct RosterItemInsert<'a> {
    pub username: &'a str,
    pub jid: &'a str,
    pub subscription: &'static str,
}

impl<'a> From<&'a RosterItem> for RosterItemInsert<'a> {
    fn from(item: &'a RosterItem) -> Self {
        Self {
            username: &item.username,
            jid: &item.jid,
            subscription: item.subscription.as_str(),
        }
    }
}

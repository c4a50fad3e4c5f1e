//! Connection manager
//!
//! Manages all bound sessions using DashMap for thread-safe access.

use super::Connection;
use crate::error::GatewayError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use stanza_core::{Jid, Stanza};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Manages all bound sessions of this node
///
/// Uses `DashMap` for concurrent access to connection state.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    /// Active connections by full JID
    connections: DashMap<Jid, Arc<Connection>>,

    /// Bare JID to bound full JIDs mapping
    account_connections: DashMap<Jid, HashSet<Jid>>,
}

impl ConnectionManager {
    /// Create a new connection manager
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new connection manager wrapped in Arc
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a bound session
    ///
    /// Fails when the full JID is already bound on this node.
    pub fn add_connection(
        &self,
        jid: Jid,
        sender: mpsc::Sender<Stanza>,
    ) -> Result<Arc<Connection>, GatewayError> {
        let connection = match self.connections.entry(jid.clone()) {
            Entry::Occupied(_) => return Err(GatewayError::SessionConflict(jid)),
            Entry::Vacant(slot) => slot.insert(Connection::new(jid.clone(), sender)).clone(),
        };

        self.account_connections
            .entry(jid.bare())
            .or_default()
            .insert(jid.clone());

        tracing::debug!(jid = %jid, "Connection added");

        Ok(connection)
    }

    /// Remove a connection
    ///
    /// Uses `alter` for atomic modify-and-cleanup operations to avoid TOCTOU race conditions.
    pub fn remove_connection(&self, jid: &Jid) -> Option<Arc<Connection>> {
        let (_, connection) = self.connections.remove(jid)?;

        self.account_connections.alter(&jid.bare(), |_, mut bound| {
            bound.remove(jid);
            bound
        });
        self.account_connections.retain(|_, bound| !bound.is_empty());

        tracing::debug!(jid = %jid, "Connection removed");

        Some(connection)
    }

    /// Get a connection by full JID
    pub fn get_connection(&self, jid: &Jid) -> Option<Arc<Connection>> {
        self.connections.get(jid).map(|r| r.clone())
    }

    /// Get all connections of the account `jid` belongs to
    pub fn get_account_connections(&self, jid: &Jid) -> Vec<Arc<Connection>> {
        self.account_connections
            .get(&jid.bare())
            .map(|bound| {
                bound
                    .iter()
                    .filter_map(|full| self.connections.get(full).map(|c| c.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get the total number of bound sessions
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Get the number of accounts with at least one bound session
    pub fn account_count(&self) -> usize {
        self.account_connections.len()
    }

    /// Check if a full JID is bound
    pub fn has_session(&self, jid: &Jid) -> bool {
        self.connections.contains_key(jid)
    }

    /// Get all bound full JIDs
    pub fn all_sessions(&self) -> Vec<Jid> {
        self.connections.iter().map(|r| r.key().clone()).collect()
    }
}

//! Local stanza router
//!
//! Delivers outbound stanzas to sessions bound on this node after running
//! the outgoing interception chain.

use async_trait::async_trait;
use stanza_core::{Hosts, Jid, RouteError, Router, Stanza};
use stanza_service::{HookContext, HookOutcome, HookPoint, Hooks};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, trace};

use crate::connection::{Connection, ConnectionManager};

/// Router delivering to locally bound sessions
pub struct LocalRouter {
    hosts: Arc<Hosts>,
    connections: Arc<ConnectionManager>,
    hooks: Arc<Hooks>,
    send_timeout: Duration,
}

impl LocalRouter {
    pub fn new(
        hosts: Arc<Hosts>,
        connections: Arc<ConnectionManager>,
        hooks: Arc<Hooks>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            hosts,
            connections,
            hooks,
            send_timeout,
        }
    }

    fn targets(&self, to: &Jid) -> Vec<Arc<Connection>> {
        if to.is_full() {
            self.connections.get_connection(to).into_iter().collect()
        } else if to.node().is_some() {
            self.connections.get_account_connections(to)
        } else {
            Vec::new()
        }
    }
}

impl std::fmt::Debug for LocalRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalRouter")
            .field("hosts", &self.hosts)
            .field("connections", &self.connections.connection_count())
            .field("send_timeout", &self.send_timeout)
            .finish()
    }
}

#[async_trait]
impl Router for LocalRouter {
    async fn route(&self, stanza: Stanza) -> Result<Vec<Jid>, RouteError> {
        let stanza = match self
            .hooks
            .run(HookPoint::StanzaOutgoing, HookContext::new(stanza))
            .await
        {
            Ok(HookOutcome::Completed(ctx)) => ctx.into_stanza(),
            Ok(HookOutcome::Interrupted { by, .. }) => {
                trace!(hook = %by, "Outgoing stanza intercepted");
                return Ok(Vec::new());
            }
            Err(e) => {
                error!(error = %e, "Outgoing hook failed, stanza dropped");
                return Ok(Vec::new());
            }
        };

        let to = stanza.to().cloned().ok_or(RouteError::MissingRecipient)?;
        if !self.hosts.is_local(to.domain()) {
            return Err(RouteError::RemoteDomain(to.domain().to_string()));
        }

        let targets = self.targets(&to);
        if targets.is_empty() {
            return Err(RouteError::NotAvailable(to));
        }

        let mut delivered = Vec::with_capacity(targets.len());
        let mut last_error = None;
        for conn in targets {
            match conn.send(stanza.clone(), self.send_timeout).await {
                Ok(()) => delivered.push(conn.jid().clone()),
                Err(e) => {
                    trace!(to = %conn.jid(), error = %e, "Delivery to session failed");
                    last_error = Some(e);
                }
            }
        }

        trace!(
            stanza = stanza.name(),
            to = %to,
            delivered = delivered.len(),
            "Stanza routed"
        );

        match last_error {
            Some(e) if delivered.is_empty() => Err(e),
            _ => Ok(delivered),
        }
    }
}

//! Bound client session
//!
//! Each session owns one task processing its inbound stanzas strictly in
//! receipt order. The task ends when the inbound side is dropped or closed,
//! then tears the session down.

use stanza_core::{Event, Jid, Presence, Resource, Stanza};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::Connection;
use crate::error::GatewayError;
use crate::server::GatewayState;

/// Client side of a bound session
///
/// Stanzas sent through the handle enter the pipeline as if received on the
/// client stream; stanzas routed to the session are read back with `recv`.
#[derive(Debug)]
pub struct SessionHandle {
    jid: Jid,
    inbound: Option<mpsc::Sender<Stanza>>,
    outbound: mpsc::Receiver<Stanza>,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    pub(crate) fn new(
        jid: Jid,
        inbound: mpsc::Sender<Stanza>,
        outbound: mpsc::Receiver<Stanza>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            jid,
            inbound: Some(inbound),
            outbound,
            task: Some(task),
        }
    }

    /// Full JID the session is bound to
    pub fn jid(&self) -> &Jid {
        &self.jid
    }

    /// Submit a stanza received from the client
    pub async fn send(&self, stanza: impl Into<Stanza>) -> Result<(), GatewayError> {
        let inbound = self
            .inbound
            .as_ref()
            .ok_or_else(|| GatewayError::SessionClosed(self.jid.clone()))?;
        inbound
            .send(stanza.into())
            .await
            .map_err(|_| GatewayError::SessionClosed(self.jid.clone()))
    }

    /// Next stanza routed to the session
    pub async fn recv(&mut self) -> Option<Stanza> {
        self.outbound.recv().await
    }

    /// Next stanza routed to the session, waiting at most `timeout`
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<Stanza> {
        tokio::time::timeout(timeout, self.outbound.recv())
            .await
            .ok()
            .flatten()
    }

    /// Close the session and wait until it is torn down
    pub async fn close(mut self) -> Result<(), GatewayError> {
        self.inbound.take();
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| GatewayError::Internal(format!("session task failed: {e}")))?;
        }
        Ok(())
    }
}

/// Session task: process inbound stanzas in order, then tear down
pub(crate) async fn run_session(
    state: GatewayState,
    conn: Arc<Connection>,
    mut inbound: mpsc::Receiver<Stanza>,
) {
    let jid = conn.jid().clone();
    debug!(jid = %jid, "Session task started");

    while let Some(mut stanza) = inbound.recv().await {
        stanza.set_from(Some(jid.clone()));

        if let Stanza::Presence(presence) = &stanza {
            if presence.to.is_none() {
                broadcast_presence(&state, &conn, presence.clone()).await;
            }
        }

        match state.dispatcher().route(stanza).await {
            Ok(outcome) => trace!(jid = %jid, ?outcome, "Stanza dispatched"),
            Err(e) => warn!(jid = %jid, error = %e, "Stanza not dispatched"),
        }
    }

    teardown(&state, &conn).await;
}

/// Record a broadcast presence and announce it on the bus
async fn broadcast_presence(state: &GatewayState, conn: &Connection, presence: Presence) {
    conn.set_presence(presence.clone());

    let mut resource = Resource::new(conn.jid().clone(), state.node_id());
    resource.presence = Some(presence.clone());
    if let Err(e) = state.resource_manager().put_resource(&resource).await {
        error!(jid = %conn.jid(), error = %e, "Failed to store resource presence");
    }

    state
        .publish(Event::presence_received(conn.jid().clone(), presence))
        .await;
}

async fn teardown(state: &GatewayState, conn: &Connection) {
    let jid = conn.jid().clone();

    if conn.is_available() {
        let unavailable = Presence::unavailable().with_from(jid.clone());
        conn.set_presence(unavailable.clone());
        state
            .publish(Event::presence_received(jid.clone(), unavailable))
            .await;
    }

    let username = jid.node().unwrap_or_default();
    let resource = jid.resource().unwrap_or_default();
    if let Err(e) = state
        .resource_manager()
        .del_resource(username, resource)
        .await
    {
        error!(jid = %jid, error = %e, "Failed to remove resource");
    }

    state.connections().remove_connection(&jid);
    state.publish(Event::stream_disconnected(jid.clone())).await;

    info!(jid = %jid, "Session closed");
}

//! Individual bound session
//!
//! Represents one connected resource and its outbound channel.

use parking_lot::RwLock;
use stanza_core::{Jid, Presence, RouteError, Stanza};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::SendTimeoutError};

/// A single bound session
pub struct Connection {
    /// Full JID the session is bound to
    jid: Jid,

    /// Channel to the client side of the session
    sender: mpsc::Sender<Stanza>,

    /// Last presence broadcast by the session
    presence: RwLock<Option<Presence>>,

    /// Connection creation time
    created_at: Instant,
}

impl Connection {
    /// Create a new connection
    pub fn new(jid: Jid, sender: mpsc::Sender<Stanza>) -> Arc<Self> {
        Arc::new(Self {
            jid,
            sender,
            presence: RwLock::new(None),
            created_at: Instant::now(),
        })
    }

    /// Get the bound JID
    pub fn jid(&self) -> &Jid {
        &self.jid
    }

    /// Last presence broadcast by the session
    pub fn presence(&self) -> Option<Presence> {
        self.presence.read().clone()
    }

    /// Record a broadcast presence
    pub fn set_presence(&self, presence: Presence) {
        *self.presence.write() = Some(presence);
    }

    /// True when the last broadcast presence was available
    pub fn is_available(&self) -> bool {
        self.presence
            .read()
            .as_ref()
            .is_some_and(Presence::is_available)
    }

    /// Deliver a stanza, waiting at most `timeout` for queue space
    pub async fn send(&self, stanza: Stanza, timeout: Duration) -> Result<(), RouteError> {
        self.sender
            .send_timeout(stanza, timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => RouteError::Timeout(self.jid.clone()),
                SendTimeoutError::Closed(_) => RouteError::Closed(self.jid.clone()),
            })
    }

    /// Check if the client side has gone away
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Get connection duration
    pub fn connected_duration(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("jid", &self.jid)
            .field("available", &self.is_available())
            .field("created_at", &self.created_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stanza_core::Message;

    fn jid() -> Jid {
        "noelia@jackal.im/yard".parse().unwrap()
    }

    #[tokio::test]
    async fn test_send_delivers() {
        let (tx, mut rx) = mpsc::channel(1);
        let conn = Connection::new(jid(), tx);

        conn.send(Message::chat("hi").into(), Duration::from_millis(50))
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().name(), "message");
    }

    #[tokio::test]
    async fn test_send_times_out_on_full_queue() {
        let (tx, _rx) = mpsc::channel(1);
        let conn = Connection::new(jid(), tx);
        conn.send(Message::chat("one").into(), Duration::from_millis(10))
            .await
            .unwrap();

        let err = conn
            .send(Message::chat("two").into(), Duration::from_millis(10))
            .await
            .unwrap_err();

        assert!(matches!(err, RouteError::Timeout(j) if j == jid()));
    }

    #[tokio::test]
    async fn test_send_to_closed_session() {
        let (tx, rx) = mpsc::channel(1);
        let conn = Connection::new(jid(), tx);
        drop(rx);

        let err = conn
            .send(Message::chat("hi").into(), Duration::from_millis(10))
            .await
            .unwrap_err();

        assert!(matches!(err, RouteError::Closed(_)));
        assert!(conn.is_closed());
    }

    #[test]
    fn test_presence_tracking() {
        let (tx, _rx) = mpsc::channel(1);
        let conn = Connection::new(jid(), tx);
        assert!(!conn.is_available());

        conn.set_presence(Presence::available());
        assert!(conn.is_available());

        conn.set_presence(Presence::unavailable());
        assert!(!conn.is_available());
        assert!(conn.presence().is_some());
    }
}

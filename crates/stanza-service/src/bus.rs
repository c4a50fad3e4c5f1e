//! Event bus
//!
//! In-process publish/subscribe for session-layer events. Delivery is
//! synchronous: `publish` awaits every matching handler, in subscription
//! order, before returning. A failing handler does not stop delivery to the
//! others; all failures are reported together.

use async_trait::async_trait;
use parking_lot::RwLock;
use stanza_core::{Event, EventKind};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{trace, warn};

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Which events a subscription receives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    Kind(EventKind),
    All,
}

impl EventFilter {
    pub fn matches(&self, kind: EventKind) -> bool {
        match self {
            Self::Kind(k) => *k == kind,
            Self::All => true,
        }
    }
}

impl From<EventKind> for EventFilter {
    fn from(kind: EventKind) -> Self {
        Self::Kind(kind)
    }
}

/// Receiver of published events
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event) -> anyhow::Result<()>;
}

/// Adapter turning an async closure into an `EventHandler`
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Event) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        (self.0)(event.clone()).await
    }
}

/// Wrap an async closure as a shareable handler
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn EventHandler>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Failures collected while delivering one event
#[derive(Debug, thiserror::Error)]
#[error("{} subscriber(s) failed handling {kind}: {}", .failures.len(), failed_names(.failures))]
pub struct PublishError {
    pub kind: EventKind,
    /// Subscriber name and the error it returned, in delivery order
    pub failures: Vec<(String, anyhow::Error)>,
}

fn failed_names(failures: &[(String, anyhow::Error)]) -> String {
    failures
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

struct Subscription {
    id: SubscriptionId,
    name: String,
    filter: EventFilter,
    handler: Arc<dyn EventHandler>,
}

/// Publish/subscribe hub shared by the session layer and modules
pub struct EventBus {
    next_id: AtomicU64,
    subscriptions: RwLock<Vec<Subscription>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            subscriptions: RwLock::new(Vec::new()),
        }
    }

    /// Register `handler` for the events matching `filter`
    pub fn subscribe(
        &self,
        filter: impl Into<EventFilter>,
        name: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let filter = filter.into();
        let name = name.into();
        trace!(%id, subscriber = %name, ?filter, "Subscribed");

        self.subscriptions.write().push(Subscription {
            id,
            name,
            filter,
            handler,
        });
        id
    }

    /// Remove one subscription. Returns false when the id is unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscriptions.write();
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }

    /// Remove several subscriptions at once
    pub fn unsubscribe_all(&self, ids: &[SubscriptionId]) {
        self.subscriptions.write().retain(|s| !ids.contains(&s.id));
    }

    /// Deliver `event` to every matching subscriber
    ///
    /// Events without subscribers are dropped.
    pub async fn publish(&self, event: Event) -> Result<(), PublishError> {
        let kind = event.kind();
        let targets: Vec<(String, Arc<dyn EventHandler>)> = self
            .subscriptions
            .read()
            .iter()
            .filter(|s| s.filter.matches(kind))
            .map(|s| (s.name.clone(), Arc::clone(&s.handler)))
            .collect();

        trace!(event = %kind, deliveries = targets.len(), "Publishing event");

        let mut failures = Vec::new();
        for (name, handler) in targets {
            if let Err(e) = handler.handle(&event).await {
                warn!(event = %kind, subscriber = %name, error = %e, "Event handler failed");
                failures.push((name, e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PublishError { kind, failures })
        }
    }

    /// Number of active subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Drop every subscription
    pub fn clear(&self) {
        self.subscriptions.write().clear();
    }
}

//! Hook chain
//!
//! Priority-ordered interception of stanzas at fixed points of the pipeline.
//! Handlers run in ascending priority, ties broken by registration order.
//! Any handler may rewrite the stanza or halt the chain; a halted chain is
//! reported as an explicit `HookOutcome::Interrupted` the caller must handle.

use async_trait::async_trait;
use parking_lot::RwLock;
use stanza_core::Stanza;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Interception point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    /// Inbound stanza, before dispatch
    StanzaReceived,
    /// Outbound stanza, before local delivery
    StanzaOutgoing,
}

impl HookPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StanzaReceived => "stanza_received",
            Self::StanzaOutgoing => "stanza_outgoing",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle returned by `register`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookId(u64);

/// Priority used when a module has no preference
pub const DEFAULT_PRIORITY: i32 = 0;

/// Mutable state passed along the chain
#[derive(Debug, Clone)]
pub struct HookContext {
    pub stanza: Stanza,
}

impl HookContext {
    pub fn new(stanza: Stanza) -> Self {
        Self { stanza }
    }

    pub fn into_stanza(self) -> Stanza {
        self.stanza
    }
}

/// What the chain does after a handler returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookFlow {
    Continue,
    Halt,
}

/// Result of running a chain to its end or to the first halt
#[derive(Debug)]
pub enum HookOutcome {
    /// Every handler continued
    Completed(HookContext),
    /// Handler `by` halted the chain
    Interrupted { by: String, context: HookContext },
}

impl HookOutcome {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }
}

/// A handler failed; the chain was aborted at that point
#[derive(Debug, thiserror::Error)]
#[error("Hook {handler} failed at {point}: {source}")]
pub struct HookError {
    pub point: HookPoint,
    pub handler: String,
    #[source]
    pub source: anyhow::Error,
}

/// Interception handler
#[async_trait]
pub trait HookHandler: Send + Sync {
    async fn call(&self, ctx: &mut HookContext) -> anyhow::Result<HookFlow>;
}

#[derive(Clone)]
struct Entry {
    id: HookId,
    priority: i32,
    name: String,
    handler: Arc<dyn HookHandler>,
}

/// Registry of interception chains, one per point
pub struct Hooks {
    next_id: AtomicU64,
    chains: RwLock<HashMap<HookPoint, Vec<Entry>>>,
}

impl Default for Hooks {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chains = self.chains.read();
        f.debug_struct("Hooks")
            .field("points", &chains.len())
            .field("handlers", &chains.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

impl Hooks {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            chains: RwLock::new(HashMap::new()),
        }
    }

    /// Add `handler` to the chain of `point`
    pub fn register(
        &self,
        point: HookPoint,
        priority: i32,
        name: impl Into<String>,
        handler: Arc<dyn HookHandler>,
    ) -> HookId {
        // Ids grow monotonically, so they double as registration sequence
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = Entry {
            id,
            priority,
            name: name.into(),
            handler,
        };
        debug!(%point, priority, hook = %entry.name, "Hook registered");

        let mut chains = self.chains.write();
        let chain = chains.entry(point).or_default();
        let pos = chain.partition_point(|e| (e.priority, e.id) <= (priority, id));
        chain.insert(pos, entry);
        id
    }

    /// Remove a handler. Returns false when it was not registered at `point`.
    pub fn unregister(&self, point: HookPoint, id: HookId) -> bool {
        let mut chains = self.chains.write();
        let Some(chain) = chains.get_mut(&point) else {
            return false;
        };
        let before = chain.len();
        chain.retain(|e| e.id != id);
        chain.len() != before
    }

    /// Run the chain of `point` over `ctx`
    pub async fn run(&self, point: HookPoint, mut ctx: HookContext) -> Result<HookOutcome, HookError> {
        let chain: Vec<Entry> = self
            .chains
            .read()
            .get(&point)
            .cloned()
            .unwrap_or_default();

        for entry in chain {
            let flow = entry.handler.call(&mut ctx).await.map_err(|source| HookError {
                point,
                handler: entry.name.clone(),
                source,
            })?;

            if flow == HookFlow::Halt {
                trace!(%point, hook = %entry.name, "Hook chain interrupted");
                return Ok(HookOutcome::Interrupted {
                    by: entry.name,
                    context: ctx,
                });
            }
        }

        Ok(HookOutcome::Completed(ctx))
    }

    /// Number of handlers at `point`
    pub fn handler_count(&self, point: HookPoint) -> usize {
        self.chains.read().get(&point).map_or(0, Vec::len)
    }

    /// Drop every handler
    pub fn clear(&self) {
        self.chains.write().clear();
    }
}

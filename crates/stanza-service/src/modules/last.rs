//! Last Activity module (XEP-0012)
//!
//! Answers `jabber:iq:last` queries: server uptime for the server domain, and
//! the time since an account last went offline for bare account JIDs.
//! Queries to full JIDs are vetoed by an incoming interceptor. The only write
//! path is the unavailable broadcast presence event.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use stanza_core::{
    Element, Event, EventKind, Iq, Jid, LastActivity, PresenceReceivedEvent, Stanza,
    StanzaErrorCondition,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

use super::{can_disclose, send, send_error};
use crate::bus::{EventFilter, EventHandler};
use crate::context::ServiceContext;
use crate::error::ServiceResult;
use crate::hook::{HookContext, HookFlow, HookHandler, DEFAULT_PRIORITY};
use crate::module::{
    EventSubscriber, InterceptDirection, Interceptor, IqProcessor, Lifecycle, Module,
    StanzaInterceptor,
};

pub const MODULE_NAME: &str = "last";
pub const XEP_NUMBER: &str = "0012";
pub const LAST_NAMESPACE: &str = "jabber:iq:last";

const FEATURES: &[&str] = &[LAST_NAMESPACE];

/// Last Activity module
pub struct Last {
    ctx: ServiceContext,
    started_at: RwLock<Instant>,
}

impl Last {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            ctx,
            started_at: RwLock::new(Instant::now()),
        }
    }

    /// Whole seconds since the module was last started
    pub fn uptime(&self) -> u64 {
        self.started_at.read().elapsed().as_secs()
    }

    #[cfg(test)]
    fn backdate(&self, secs: u64) {
        let mut started = self.started_at.write();
        if let Some(earlier) = started.checked_sub(std::time::Duration::from_secs(secs)) {
            *started = earlier;
        }
    }

    async fn server_uptime(&self, iq: &Iq) {
        let query = query_element(self.uptime(), "");
        send(&self.ctx, MODULE_NAME, Stanza::from(iq.result_reply(Some(query)))).await;
    }

    #[instrument(skip(self, iq), fields(module = MODULE_NAME, id = %iq.id))]
    async fn account_last_activity(&self, iq: &Iq, requester: &Jid, target: &Jid) -> ServiceResult<()> {
        if !can_disclose(&self.ctx, requester, target).await? {
            debug!(from = %requester, to = %target, "Last activity not disclosed");
            send_error(&self.ctx, MODULE_NAME, iq, StanzaErrorCondition::Forbidden).await;
            return Ok(());
        }
        let username = target.node().unwrap_or_default();

        // Any bound resource means the account is online right now
        let online = !self
            .ctx
            .resource_manager()
            .get_resources(username)
            .await?
            .is_empty();

        let query = if online {
            query_element(0, "")
        } else {
            match self.ctx.repository().fetch_last(username).await? {
                Some(last) => {
                    query_element(last.elapsed_since(Utc::now().timestamp()), &last.status)
                }
                None => query_element(0, ""),
            }
        };
        send(&self.ctx, MODULE_NAME, Stanza::from(iq.result_reply(Some(query)))).await;
        Ok(())
    }
}

fn query_element(seconds: u64, status: &str) -> Element {
    let mut builder = Element::builder("query")
        .namespace(LAST_NAMESPACE)
        .attribute("seconds", seconds.to_string());
    if !status.is_empty() {
        builder = builder.text(status);
    }
    builder.build()
}

fn is_last_query(iq: &Iq) -> bool {
    iq.is_get() && iq.payload_ns("query", LAST_NAMESPACE).is_some()
}

impl Module for Last {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn version(&self) -> &'static str {
        XEP_NUMBER
    }

    fn matches_namespace(&self, namespace: &str, _server_target: bool) -> bool {
        namespace == LAST_NAMESPACE
    }

    fn server_features(&self) -> &[&'static str] {
        FEATURES
    }

    fn account_features(&self) -> &[&'static str] {
        FEATURES
    }

    fn iq_processor(&self) -> Option<&dyn IqProcessor> {
        Some(self)
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        Some(self)
    }

    fn event_subscriber(&self) -> Option<&dyn EventSubscriber> {
        Some(self)
    }

    fn stanza_interceptor(&self) -> Option<&dyn StanzaInterceptor> {
        Some(self)
    }
}

#[async_trait]
impl IqProcessor for Last {
    async fn process_iq(&self, iq: Iq) -> ServiceResult<()> {
        if !is_last_query(&iq) {
            send_error(&self.ctx, MODULE_NAME, &iq, StanzaErrorCondition::BadRequest).await;
            return Ok(());
        }
        let (Some(from), Some(to)) = (iq.from.clone(), iq.to.clone()) else {
            send_error(&self.ctx, MODULE_NAME, &iq, StanzaErrorCondition::BadRequest).await;
            return Ok(());
        };

        if to.is_server() {
            self.server_uptime(&iq).await;
            Ok(())
        } else if to.is_bare() {
            self.account_last_activity(&iq, &from, &to).await
        } else {
            send_error(&self.ctx, MODULE_NAME, &iq, StanzaErrorCondition::Forbidden).await;
            Ok(())
        }
    }
}

#[async_trait]
impl Lifecycle for Last {
    async fn start(&self) -> anyhow::Result<()> {
        *self.started_at.write() = Instant::now();
        info!(module = MODULE_NAME, xep = XEP_NUMBER, "Started last module");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        info!(module = MODULE_NAME, xep = XEP_NUMBER, "Stopped last module");
        Ok(())
    }
}

impl EventSubscriber for Last {
    fn subscriptions(&self) -> Vec<(EventFilter, Arc<dyn EventHandler>)> {
        vec![(
            EventFilter::Kind(EventKind::PresenceReceived),
            Arc::new(PresenceRecorder {
                ctx: self.ctx.clone(),
            }),
        )]
    }
}

impl StanzaInterceptor for Last {
    fn interceptors(&self) -> Vec<Interceptor> {
        vec![Interceptor {
            direction: InterceptDirection::Incoming,
            priority: DEFAULT_PRIORITY,
            handler: Arc::new(FullJidGuard {
                ctx: self.ctx.clone(),
            }),
        }]
    }
}

// ============================================================================
// Presence recorder
// ============================================================================

/// Stores the time and status of every unavailable broadcast presence
struct PresenceRecorder {
    ctx: ServiceContext,
}

#[async_trait]
impl EventHandler for PresenceRecorder {
    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        let Event::PresenceReceived(PresenceReceivedEvent { jid, presence, .. }) = event else {
            return Ok(());
        };
        if !presence.is_unavailable() || !presence.is_broadcast() {
            return Ok(());
        }
        let Some(username) = jid.node() else {
            return Ok(());
        };

        let last = LastActivity::now(username, presence.status());
        self.ctx.repository().upsert_last(&last).await?;
        debug!(module = MODULE_NAME, jid = %jid, "Last activity stored");
        Ok(())
    }
}

// ============================================================================
// Full-JID guard
// ============================================================================

/// Rejects last activity queries addressed to a specific resource
struct FullJidGuard {
    ctx: ServiceContext,
}

#[async_trait]
impl HookHandler for FullJidGuard {
    async fn call(&self, hook_ctx: &mut HookContext) -> anyhow::Result<HookFlow> {
        let Stanza::Iq(iq) = &hook_ctx.stanza else {
            return Ok(HookFlow::Continue);
        };
        let addressed_to_resource = iq
            .to
            .as_ref()
            .is_some_and(|to| to.is_full() && to.node().is_some());
        if !addressed_to_resource || !is_last_query(iq) {
            return Ok(HookFlow::Continue);
        }

        send_error(&self.ctx, MODULE_NAME, iq, StanzaErrorCondition::Forbidden).await;
        Ok(HookFlow::Halt)
    }
}

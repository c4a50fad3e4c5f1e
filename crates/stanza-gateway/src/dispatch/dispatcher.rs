//! Stanza dispatcher
//!
//! Runs the inbound interception chain, then hands each stanza to the module
//! claiming it or forwards it through the router. Every request that cannot
//! be served is answered with exactly one error reply.

use stanza_core::{Hosts, Iq, Jid, Router, Stanza, StanzaErrorCondition};
use stanza_service::{HookContext, HookOutcome, HookPoint, Hooks, ModuleRegistry};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, trace};

/// What happened to an inbound stanza
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Forwarded through the router to these sessions
    Delivered(Vec<Jid>),
    /// Handled by a module
    Processed { module: &'static str },
    /// Stopped by an incoming interceptor
    Interrupted { by: String },
    /// Answered with an error reply carrying this condition
    Rejected(StanzaErrorCondition),
}

/// Stanzas the dispatcher cannot even answer
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Inbound {0} has no sender")]
    MissingSender(&'static str),
}

/// Entry point of the processing pipeline
pub struct StanzaDispatcher {
    registry: Arc<ModuleRegistry>,
    hooks: Arc<Hooks>,
    router: Arc<dyn Router>,
    hosts: Arc<Hosts>,
    timeout: Duration,
}

impl StanzaDispatcher {
    pub fn new(
        registry: Arc<ModuleRegistry>,
        hooks: Arc<Hooks>,
        router: Arc<dyn Router>,
        hosts: Arc<Hosts>,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            hooks,
            router,
            hosts,
            timeout,
        }
    }

    /// Process one inbound stanza whose `from` is already stamped
    pub async fn route(&self, stanza: Stanza) -> Result<DispatchOutcome, DispatchError> {
        let Some(sender) = stanza.sender().cloned() else {
            return Err(DispatchError::MissingSender(stanza.name()));
        };

        let fallback = stanza.clone();
        let stanza = match self
            .hooks
            .run(HookPoint::StanzaReceived, HookContext::new(stanza))
            .await
        {
            Ok(HookOutcome::Completed(ctx)) => ctx.into_stanza(),
            Ok(HookOutcome::Interrupted { by, .. }) => {
                debug!(stanza = fallback.name(), id = ?fallback.id(), hook = %by, "Inbound stanza intercepted");
                return Ok(DispatchOutcome::Interrupted { by });
            }
            Err(e) => {
                error!(stanza = fallback.name(), id = ?fallback.id(), error = %e, "Incoming hook failed");
                return Ok(self
                    .reject(&fallback, StanzaErrorCondition::InternalServerError)
                    .await);
            }
        };

        Ok(match stanza {
            Stanza::Iq(iq) => self.route_iq(iq, &sender).await,
            Stanza::Message(_) => self.forward(stanza, true).await,
            Stanza::Presence(_) => self.forward(stanza, false).await,
        })
    }

    async fn route_iq(&self, mut iq: Iq, sender: &Jid) -> DispatchOutcome {
        if !iq.is_request() {
            return self.forward(Stanza::Iq(iq), false).await;
        }

        let to = iq.to.clone().unwrap_or_else(|| sender.bare());
        iq.to = Some(to.clone());

        if !self.hosts.is_local(to.domain()) {
            return self
                .reject(&Stanza::Iq(iq), StanzaErrorCondition::RemoteServerNotFound)
                .await;
        }

        if to.is_full() {
            return self.forward(Stanza::Iq(iq), true).await;
        }

        let Some(namespace) = iq.namespace().map(ToString::to_string) else {
            return self
                .reject(&Stanza::Iq(iq), StanzaErrorCondition::BadRequest)
                .await;
        };

        let server_target = to.is_server();
        let Some(module) = self.registry.lookup(&namespace, server_target) else {
            let condition = if self.registry.knows_namespace(&namespace) {
                StanzaErrorCondition::BadRequest
            } else {
                StanzaErrorCondition::ServiceUnavailable
            };
            debug!(namespace = %namespace, server_target, %condition, "No module for IQ");
            return self.reject(&Stanza::Iq(iq), condition).await;
        };

        let Some(processor) = module.iq_processor() else {
            return self
                .reject(&Stanza::Iq(iq), StanzaErrorCondition::ServiceUnavailable)
                .await;
        };

        let request = Stanza::Iq(iq.clone());
        match tokio::time::timeout(self.timeout, processor.process_iq(iq)).await {
            Ok(Ok(())) => {
                trace!(module = module.name(), namespace = %namespace, "IQ processed");
                DispatchOutcome::Processed {
                    module: module.name(),
                }
            }
            Ok(Err(e)) => {
                error!(
                    module = module.name(),
                    xep = module.version(),
                    id = ?request.id(),
                    code = e.error_code(),
                    error = %e,
                    "Module failed processing IQ"
                );
                self.reject(&request, e.condition()).await
            }
            Err(_) => {
                error!(
                    module = module.name(),
                    xep = module.version(),
                    id = ?request.id(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Module timed out processing IQ"
                );
                self.reject(&request, StanzaErrorCondition::InternalServerError)
                    .await
            }
        }
    }

    /// Forward through the router. Undeliverable stanzas are answered with
    /// `service-unavailable` when `answer_undeliverable` is set and dropped otherwise.
    async fn forward(&self, stanza: Stanza, answer_undeliverable: bool) -> DispatchOutcome {
        let name = stanza.name();
        let fallback = answer_undeliverable.then(|| stanza.clone());

        match self.router.route(stanza).await {
            Ok(reached) => DispatchOutcome::Delivered(reached),
            Err(e) => match fallback {
                Some(original) => {
                    debug!(stanza = name, error = %e, "Stanza undeliverable");
                    self.reject(&original, StanzaErrorCondition::ServiceUnavailable)
                        .await
                }
                None => {
                    trace!(stanza = name, error = %e, "Undeliverable stanza dropped");
                    DispatchOutcome::Delivered(Vec::new())
                }
            },
        }
    }

    /// Answer `stanza` with an error reply. Error stanzas are never answered.
    async fn reject(&self, stanza: &Stanza, condition: StanzaErrorCondition) -> DispatchOutcome {
        if stanza.is_error() {
            trace!(stanza = stanza.name(), %condition, "Not answering an error stanza");
            return DispatchOutcome::Rejected(condition);
        }

        let reply = stanza.error_reply(condition);
        let to = reply.to().map(ToString::to_string).unwrap_or_default();
        if let Err(e) = self.router.route(reply).await {
            error!(to = %to, %condition, error = %e, "Failed to deliver error reply");
        }
        DispatchOutcome::Rejected(condition)
    }
}

impl std::fmt::Debug for StanzaDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StanzaDispatcher")
            .field("modules", &self.registry.module_names())
            .field("hooks", &self.hooks)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use stanza_core::{Element, IqType, Message, Presence};
    use stanza_service::modules::{Last, LAST_NAMESPACE};
    use stanza_service::{
        EventBus, IqProcessor, MemoryRepository, MemoryResourceManager, Module, ServiceContext,
        ServiceError, ServiceResult,
    };
    use tokio::sync::mpsc;

    use crate::connection::ConnectionManager;
    use crate::router::LocalRouter;

    const FAILING_NS: &str = "urn:test:failing";
    const SLOW_NS: &str = "urn:test:slow";
    const SERVER_ONLY_NS: &str = "urn:test:server-only";

    /// Test module with one namespace per behavior
    struct Scripted;

    impl Module for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn version(&self) -> &'static str {
            "0000"
        }

        fn matches_namespace(&self, namespace: &str, server_target: bool) -> bool {
            match namespace {
                FAILING_NS | SLOW_NS => true,
                SERVER_ONLY_NS => server_target,
                _ => false,
            }
        }

        fn iq_processor(&self) -> Option<&dyn IqProcessor> {
            Some(self)
        }
    }

    #[async_trait]
    impl IqProcessor for Scripted {
        async fn process_iq(&self, iq: Iq) -> ServiceResult<()> {
            match iq.namespace() {
                Some(SLOW_NS) => {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    Ok(())
                }
                Some(FAILING_NS) => Err(ServiceError::internal("scripted failure")),
                _ => Ok(()),
            }
        }
    }

    struct Fixture {
        dispatcher: StanzaDispatcher,
        registry: Arc<ModuleRegistry>,
        connections: Arc<ConnectionManager>,
    }

    fn jid(s: &str) -> Jid {
        s.parse().unwrap()
    }

    fn fixture() -> Fixture {
        let hosts = Arc::new(Hosts::new(["jackal.im"]).unwrap());
        let hooks = Arc::new(Hooks::new());
        let connections = ConnectionManager::new_shared();
        let router: Arc<dyn Router> = Arc::new(LocalRouter::new(
            hosts.clone(),
            connections.clone(),
            hooks.clone(),
            Duration::from_millis(50),
        ));
        let ctx = ServiceContext::new(
            Arc::new(MemoryRepository::new()),
            Arc::new(MemoryResourceManager::new()),
            router.clone(),
            hosts.clone(),
            None,
        );
        let registry = Arc::new(ModuleRegistry::new(Arc::new(EventBus::new()), hooks.clone()));
        registry.register(Arc::new(Last::new(ctx))).unwrap();
        registry.register(Arc::new(Scripted)).unwrap();

        Fixture {
            dispatcher: StanzaDispatcher::new(
                registry.clone(),
                hooks,
                router,
                hosts,
                Duration::from_millis(50),
            ),
            registry,
            connections,
        }
    }

    fn bind(f: &Fixture, full: &str) -> mpsc::Receiver<Stanza> {
        let (tx, rx) = mpsc::channel(8);
        f.connections.add_connection(jid(full), tx).unwrap();
        rx
    }

    fn query(id: &str, to: &str, namespace: &str) -> Stanza {
        Iq::get(id)
            .with_from(jid("noelia@jackal.im/yard"))
            .with_to(jid(to))
            .with_payload(Element::builder("query").namespace(namespace).build())
            .into()
    }

    fn reply(rx: &mut mpsc::Receiver<Stanza>) -> Stanza {
        rx.try_recv().expect("a reply was delivered")
    }

    #[tokio::test]
    async fn test_module_processes_server_query() {
        let f = fixture();
        let mut rx = bind(&f, "noelia@jackal.im/yard");

        let outcome = f
            .dispatcher
            .route(query("q1", "jackal.im", LAST_NAMESPACE))
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Processed { module: "last" });
        let Stanza::Iq(iq) = reply(&mut rx) else {
            panic!("expected iq")
        };
        assert_eq!(iq.iq_type, IqType::Result);
        assert_eq!(iq.id, "q1");
    }

    #[tokio::test]
    async fn test_missing_to_means_own_account() {
        let f = fixture();
        let mut rx = bind(&f, "noelia@jackal.im/yard");
        let iq = Iq::get("q2")
            .with_from(jid("noelia@jackal.im/yard"))
            .with_payload(Element::builder("query").namespace(LAST_NAMESPACE).build());

        let outcome = f.dispatcher.route(iq.into()).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Processed { module: "last" });
        let answer = reply(&mut rx);
        assert_eq!(answer.sender(), Some(&jid("noelia@jackal.im")));
        assert!(!answer.is_error());
    }

    #[tokio::test]
    async fn test_unknown_namespace_is_service_unavailable() {
        let f = fixture();
        let mut rx = bind(&f, "noelia@jackal.im/yard");

        let outcome = f
            .dispatcher
            .route(query("q3", "jackal.im", "urn:xmpp:unknown"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Rejected(StanzaErrorCondition::ServiceUnavailable)
        );
        let answer = reply(&mut rx);
        assert_eq!(answer.id(), Some("q3"));
        assert_eq!(answer.sender(), Some(&jid("jackal.im")));
        assert_eq!(
            answer.error_condition(),
            Some(StanzaErrorCondition::ServiceUnavailable)
        );
    }

    #[tokio::test]
    async fn test_namespace_known_for_other_class_is_bad_request() {
        let f = fixture();
        let mut rx = bind(&f, "noelia@jackal.im/yard");

        let outcome = f
            .dispatcher
            .route(query("q4", "romeo@jackal.im", SERVER_ONLY_NS))
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Rejected(StanzaErrorCondition::BadRequest));
        assert_eq!(
            reply(&mut rx).error_condition(),
            Some(StanzaErrorCondition::BadRequest)
        );
    }

    #[tokio::test]
    async fn test_iq_without_payload_is_bad_request() {
        let f = fixture();
        let mut rx = bind(&f, "noelia@jackal.im/yard");
        let iq = Iq::get("q5")
            .with_from(jid("noelia@jackal.im/yard"))
            .with_to(jid("jackal.im"));

        let outcome = f.dispatcher.route(iq.into()).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Rejected(StanzaErrorCondition::BadRequest));
        assert!(reply(&mut rx).is_error());
    }

    #[tokio::test]
    async fn test_remote_domain() {
        let f = fixture();
        let mut rx = bind(&f, "noelia@jackal.im/yard");

        let outcome = f
            .dispatcher
            .route(query("q6", "romeo@montague.lit", LAST_NAMESPACE))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Rejected(StanzaErrorCondition::RemoteServerNotFound)
        );
        assert_eq!(reply(&mut rx).sender(), Some(&jid("romeo@montague.lit")));
    }

    #[tokio::test]
    async fn test_full_jid_request_is_forwarded() {
        let f = fixture();
        let mut noelia = bind(&f, "noelia@jackal.im/yard");
        let mut romeo = bind(&f, "romeo@jackal.im/balcony");

        let outcome = f
            .dispatcher
            .route(query("q7", "romeo@jackal.im/balcony", "urn:xmpp:ping"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::Delivered(vec![jid("romeo@jackal.im/balcony")])
        );
        assert_eq!(reply(&mut romeo).id(), Some("q7"));

        let outcome = f
            .dispatcher
            .route(query("q8", "romeo@jackal.im/garden", "urn:xmpp:ping"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::Rejected(StanzaErrorCondition::ServiceUnavailable)
        );
        assert_eq!(reply(&mut noelia).id(), Some("q8"));
    }

    #[tokio::test]
    async fn test_module_failure_is_internal_server_error() {
        let f = fixture();
        let mut rx = bind(&f, "noelia@jackal.im/yard");

        let outcome = f
            .dispatcher
            .route(query("q9", "jackal.im", FAILING_NS))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Rejected(StanzaErrorCondition::InternalServerError)
        );
        assert_eq!(
            reply(&mut rx).error_condition(),
            Some(StanzaErrorCondition::InternalServerError)
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_module_deadline() {
        let f = fixture();
        let mut rx = bind(&f, "noelia@jackal.im/yard");

        let outcome = f
            .dispatcher
            .route(query("q10", "jackal.im", SLOW_NS))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Rejected(StanzaErrorCondition::InternalServerError)
        );
        assert_eq!(reply(&mut rx).id(), Some("q10"));
    }

    #[tokio::test]
    async fn test_incoming_interceptor_interrupts() {
        let f = fixture();
        f.registry.start().await.unwrap();
        let mut rx = bind(&f, "noelia@jackal.im/yard");
        let _romeo = bind(&f, "romeo@jackal.im/balcony");

        let outcome = f
            .dispatcher
            .route(query("q11", "romeo@jackal.im/balcony", LAST_NAMESPACE))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Interrupted {
                by: "last".to_string()
            }
        );
        assert_eq!(
            reply(&mut rx).error_condition(),
            Some(StanzaErrorCondition::Forbidden)
        );
    }

    #[tokio::test]
    async fn test_undeliverable_message_and_presence() {
        let f = fixture();
        let mut rx = bind(&f, "noelia@jackal.im/yard");
        let from = jid("noelia@jackal.im/yard");

        let message = Message::chat("hi")
            .with_id("m1")
            .with_from(from.clone())
            .with_to(jid("romeo@jackal.im"));
        let outcome = f.dispatcher.route(message.into()).await.unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::Rejected(StanzaErrorCondition::ServiceUnavailable)
        );
        assert_eq!(reply(&mut rx).id(), Some("m1"));

        let presence = Presence::available()
            .with_from(from)
            .with_to(jid("romeo@jackal.im"));
        let outcome = f.dispatcher.route(presence.into()).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Delivered(Vec::new()));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_error_stanzas_are_never_answered() {
        let f = fixture();
        let mut rx = bind(&f, "noelia@jackal.im/yard");
        let iq = Iq::new("e1", IqType::Error)
            .with_from(jid("noelia@jackal.im/yard"))
            .with_to(jid("romeo@jackal.im/balcony"));

        let outcome = f.dispatcher.route(iq.into()).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Delivered(Vec::new()));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_missing_sender() {
        let f = fixture();
        let err = f
            .dispatcher
            .route(Message::chat("hi").with_to(jid("romeo@jackal.im")).into())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::MissingSender("message")));
    }
}

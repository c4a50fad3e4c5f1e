//! Service Discovery info module (XEP-0030)
//!
//! Answers `disco#info` queries with an identity and the features the
//! registered modules advertise for the addressed entity.

use async_trait::async_trait;
use stanza_core::{Element, Iq, Jid, Stanza, StanzaErrorCondition};
use std::sync::Weak;
use tracing::{debug, info};

use super::{can_disclose, send, send_error};
use crate::context::ServiceContext;
use crate::error::{ServiceError, ServiceResult};
use crate::module::{FeatureScope, IqProcessor, Lifecycle, Module, ModuleRegistry};

pub const MODULE_NAME: &str = "disco";
pub const XEP_NUMBER: &str = "0030";
pub const DISCO_INFO_NAMESPACE: &str = "http://jabber.org/protocol/disco#info";

const FEATURES: &[&str] = &[DISCO_INFO_NAMESPACE];

/// Service discovery module
pub struct Disco {
    ctx: ServiceContext,
    registry: Weak<ModuleRegistry>,
}

impl Disco {
    pub fn new(ctx: ServiceContext, registry: Weak<ModuleRegistry>) -> Self {
        Self { ctx, registry }
    }

    fn info(&self, category: &str, kind: &str, scope: FeatureScope) -> ServiceResult<Element> {
        let registry = self
            .registry
            .upgrade()
            .ok_or_else(|| ServiceError::internal("module registry is gone"))?;

        let identity = Element::builder("identity")
            .attribute("category", category)
            .attribute("type", kind)
            .build();
        let features = registry
            .features_for(scope)
            .into_iter()
            .map(|var| Element::builder("feature").attribute("var", var).build());

        Ok(Element::builder("query")
            .namespace(DISCO_INFO_NAMESPACE)
            .child(identity)
            .children(features)
            .build())
    }

    async fn account_info(&self, iq: &Iq, requester: &Jid, target: &Jid) -> ServiceResult<()> {
        if !can_disclose(&self.ctx, requester, target).await? {
            debug!(module = MODULE_NAME, from = %requester, to = %target, "Account info not disclosed");
            send_error(&self.ctx, MODULE_NAME, iq, StanzaErrorCondition::Forbidden).await;
            return Ok(());
        }
        let query = self.info("account", "registered", FeatureScope::Account)?;
        send(&self.ctx, MODULE_NAME, Stanza::from(iq.result_reply(Some(query)))).await;
        Ok(())
    }
}

impl Module for Disco {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn version(&self) -> &'static str {
        XEP_NUMBER
    }

    fn matches_namespace(&self, namespace: &str, _server_target: bool) -> bool {
        namespace == DISCO_INFO_NAMESPACE
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
}

#[async_trait]
impl IqProcessor for Disco {
    async fn process_iq(&self, iq: Iq) -> ServiceResult<()> {
        let is_info_query = iq.is_get() && iq.payload_ns("query", DISCO_INFO_NAMESPACE).is_some();
        let (true, Some(from), Some(to)) = (is_info_query, iq.from.clone(), iq.to.clone()) else {
            send_error(&self.ctx, MODULE_NAME, &iq, StanzaErrorCondition::BadRequest).await;
            return Ok(());
        };

        if to.is_server() {
            let query = self.info("server", "im", FeatureScope::Server)?;
            send(&self.ctx, MODULE_NAME, Stanza::from(iq.result_reply(Some(query)))).await;
            Ok(())
        } else if to.is_bare() {
            self.account_info(&iq, &from, &to).await
        } else {
            send_error(&self.ctx, MODULE_NAME, &iq, StanzaErrorCondition::ServiceUnavailable)
                .await;
            Ok(())
        }
    }
}

#[async_trait]
impl Lifecycle for Disco {
    async fn start(&self) -> anyhow::Result<()> {
        info!(module = MODULE_NAME, xep = XEP_NUMBER, "Started disco module");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        info!(module = MODULE_NAME, xep = XEP_NUMBER, "Stopped disco module");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::hook::Hooks;
    use crate::modules::testing::{error_condition, fixture, jid, Fixture};
    use crate::modules::{Last, LAST_NAMESPACE};
    use stanza_core::IqType;
    use std::sync::Arc;

    fn setup(f: &Fixture) -> Arc<ModuleRegistry> {
        let registry = Arc::new(ModuleRegistry::new(
            Arc::new(EventBus::new()),
            Arc::new(Hooks::new()),
        ));
        registry
            .register(Arc::new(Disco::new(f.ctx.clone(), Arc::downgrade(&registry))))
            .unwrap();
        registry.register(Arc::new(Last::new(f.ctx.clone()))).unwrap();
        registry
    }

    fn info_query(from: &str, to: &str) -> Iq {
        Iq::get("disco-1")
            .with_from(jid(from))
            .with_to(jid(to))
            .with_payload(Element::builder("query").namespace(DISCO_INFO_NAMESPACE).build())
    }

    fn features(iq: &Iq) -> Vec<String> {
        iq.payload_ns("query", DISCO_INFO_NAMESPACE)
            .unwrap()
            .children()
            .iter()
            .filter(|c| c.name() == "feature")
            .filter_map(|c| c.attribute("var").map(ToString::to_string))
            .collect()
    }

    fn identity(iq: &Iq) -> (String, String) {
        let identity = iq
            .payload_ns("query", DISCO_INFO_NAMESPACE)
            .and_then(|q| q.child("identity"))
            .unwrap();
        (
            identity.attribute("category").unwrap().to_string(),
            identity.attribute("type").unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn test_server_info() {
        let f = fixture();
        let registry = setup(&f);
        let disco = registry.lookup(DISCO_INFO_NAMESPACE, true).unwrap();

        disco
            .iq_processor()
            .unwrap()
            .process_iq(info_query("noelia@jackal.im/yard", "jackal.im"))
            .await
            .unwrap();

        let reply = f.router.single_iq();
        assert_eq!(reply.iq_type, IqType::Result);
        assert_eq!(identity(&reply), ("server".to_string(), "im".to_string()));
        assert_eq!(features(&reply), vec![DISCO_INFO_NAMESPACE, LAST_NAMESPACE]);
    }

    #[tokio::test]
    async fn test_own_account_info() {
        let f = fixture();
        let registry = setup(&f);
        let disco = Disco::new(f.ctx.clone(), Arc::downgrade(&registry));

        disco
            .process_iq(info_query("noelia@jackal.im/yard", "noelia@jackal.im"))
            .await
            .unwrap();

        let reply = f.router.single_iq();
        assert_eq!(identity(&reply), ("account".to_string(), "registered".to_string()));
        assert!(features(&reply).contains(&LAST_NAMESPACE.to_string()));
    }

    #[tokio::test]
    async fn test_account_info_forbidden_for_strangers() {
        let f = fixture();
        let registry = setup(&f);
        let disco = Disco::new(f.ctx.clone(), Arc::downgrade(&registry));

        disco
            .process_iq(info_query("romeo@jackal.im/balcony", "noelia@jackal.im"))
            .await
            .unwrap();

        let reply = f.router.single_iq();
        assert_eq!(error_condition(&reply), Some(StanzaErrorCondition::Forbidden));
    }

    #[tokio::test]
    async fn test_dropped_registry_is_internal_error() {
        let f = fixture();
        let registry = setup(&f);
        let disco = Disco::new(f.ctx.clone(), Arc::downgrade(&registry));
        drop(registry);

        let result = disco
            .process_iq(info_query("noelia@jackal.im/yard", "jackal.im"))
            .await;

        assert!(result.is_err());
        assert!(f.router.take().is_empty());
    }
}

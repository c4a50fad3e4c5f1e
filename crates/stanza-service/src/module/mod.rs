//! Module capability surface
//!
//! Every module implements `Module` (identity and disco features). The
//! optional capabilities are exposed through accessor methods returning
//! `Option<&dyn ...>`; the registry detects them once at registration.

mod registry;

pub use registry::{ModuleRegistry, RegistryError};

use async_trait::async_trait;
use bitflags::bitflags;
use stanza_core::{Element, Iq};
use std::sync::Arc;

use crate::bus::{EventFilter, EventHandler};
use crate::error::ServiceResult;
use crate::hook::HookHandler;

/// Which request class a feature is advertised for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureScope {
    /// Requests addressed to the server domain
    Server,
    /// Requests addressed to a bare account JID
    Account,
}

/// Identity and discovery surface of a protocol-extension module
pub trait Module: Send + Sync {
    /// Unique module name
    fn name(&self) -> &'static str;

    /// Number of the XEP the module implements
    fn version(&self) -> &'static str;

    /// True when IQs with payload namespace `namespace` belong to this module.
    /// `server_target` is set when the IQ is addressed to the server domain.
    fn matches_namespace(&self, _namespace: &str, _server_target: bool) -> bool {
        false
    }

    fn server_features(&self) -> &[&'static str] {
        &[]
    }

    fn account_features(&self) -> &[&'static str] {
        &[]
    }

    /// Element advertised in the stream features of `domain`
    fn stream_feature(&self, _domain: &str) -> Option<Element> {
        None
    }

    fn iq_processor(&self) -> Option<&dyn IqProcessor> {
        None
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        None
    }

    fn event_subscriber(&self) -> Option<&dyn EventSubscriber> {
        None
    }

    fn stanza_interceptor(&self) -> Option<&dyn StanzaInterceptor> {
        None
    }
}

/// Handles IQ requests routed to the module
///
/// The module sends its own reply through the router. Returning `Err`
/// makes the dispatcher answer `internal-server-error`.
#[async_trait]
pub trait IqProcessor: Send + Sync {
    async fn process_iq(&self, iq: Iq) -> ServiceResult<()>;
}

/// Start/stop hooks, run by the registry in registration order
#[async_trait]
pub trait Lifecycle: Send + Sync {
    async fn start(&self) -> anyhow::Result<()>;
    async fn stop(&self) -> anyhow::Result<()>;
}

/// Bus subscriptions the registry manages on the module's behalf
pub trait EventSubscriber: Send + Sync {
    fn subscriptions(&self) -> Vec<(EventFilter, Arc<dyn EventHandler>)>;
}

/// Direction an interceptor watches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptDirection {
    Incoming,
    Outgoing,
}

/// One interceptor exposed by a module
#[derive(Clone)]
pub struct Interceptor {
    pub direction: InterceptDirection,
    pub priority: i32,
    pub handler: Arc<dyn HookHandler>,
}

/// Hook-chain interceptors the registry manages on the module's behalf
pub trait StanzaInterceptor: Send + Sync {
    fn interceptors(&self) -> Vec<Interceptor>;
}

bitflags! {
    /// Optional capabilities found on a module at registration
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ModuleCapabilities: u8 {
        const IQ_PROCESSOR       = 1 << 0;
        const LIFECYCLE          = 1 << 1;
        const EVENT_SUBSCRIBER   = 1 << 2;
        const STANZA_INTERCEPTOR = 1 << 3;
    }
}

impl ModuleCapabilities {
    /// Detect the optional capabilities of `module`
    pub fn detect(module: &dyn Module) -> Self {
        let mut caps = Self::empty();
        caps.set(Self::IQ_PROCESSOR, module.iq_processor().is_some());
        caps.set(Self::LIFECYCLE, module.lifecycle().is_some());
        caps.set(Self::EVENT_SUBSCRIBER, module.event_subscriber().is_some());
        caps.set(Self::STANZA_INTERCEPTOR, module.stanza_interceptor().is_some());
        caps
    }
}

//! Module registry and lifecycle
//!
//! Holds the registered modules in registration order, answers routing and
//! discovery queries, and wires each module's bus subscriptions and
//! interceptors while it runs.

use parking_lot::RwLock;
use stanza_core::Element;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

use super::{FeatureScope, InterceptDirection, Module, ModuleCapabilities};
use crate::bus::{EventBus, SubscriptionId};
use crate::hook::{HookId, HookPoint, Hooks};

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Module already registered: {0}")]
    DuplicateName(String),

    #[error("Feature {feature} is already provided by module {owner}")]
    DuplicateFeature { feature: String, owner: String },

    #[error("Module lifecycle failed: {}", failed_modules(.0))]
    Lifecycle(Vec<(String, anyhow::Error)>),
}

fn failed_modules(failures: &[(String, anyhow::Error)]) -> String {
    failures
        .iter()
        .map(|(name, e)| format!("{name} ({e})"))
        .collect::<Vec<_>>()
        .join(", ")
}

struct Entry {
    module: Arc<dyn Module>,
    capabilities: ModuleCapabilities,
    subscriptions: Vec<SubscriptionId>,
    hooks: Vec<(HookPoint, HookId)>,
    running: bool,
}

/// Ordered set of modules plus the bus and hook chain they attach to
pub struct ModuleRegistry {
    bus: Arc<EventBus>,
    hooks: Arc<Hooks>,
    entries: RwLock<Vec<Entry>>,
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.module_names())
            .finish()
    }
}

impl ModuleRegistry {
    pub fn new(bus: Arc<EventBus>, hooks: Arc<Hooks>) -> Self {
        Self {
            bus,
            hooks,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Bus module subscriptions are attached to
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Hook chain module interceptors are attached to
    pub fn hooks(&self) -> &Arc<Hooks> {
        &self.hooks
    }

    /// Add a module, probing its capabilities
    ///
    /// Rejects a second module with the same name, and a feature namespace
    /// already advertised by another module for the same request class.
    pub fn register(&self, module: Arc<dyn Module>) -> Result<ModuleCapabilities, RegistryError> {
        let mut entries = self.entries.write();

        if entries.iter().any(|e| e.module.name() == module.name()) {
            return Err(RegistryError::DuplicateName(module.name().to_string()));
        }

        for existing in entries.iter() {
            let clash = module
                .server_features()
                .iter()
                .find(|f| existing.module.server_features().contains(*f))
                .or_else(|| {
                    module
                        .account_features()
                        .iter()
                        .find(|f| existing.module.account_features().contains(*f))
                });
            if let Some(feature) = clash {
                return Err(RegistryError::DuplicateFeature {
                    feature: (*feature).to_string(),
                    owner: existing.module.name().to_string(),
                });
            }
        }

        let capabilities = ModuleCapabilities::detect(module.as_ref());
        info!(
            module = module.name(),
            xep = module.version(),
            ?capabilities,
            "Module registered"
        );

        entries.push(Entry {
            module,
            capabilities,
            subscriptions: Vec::new(),
            hooks: Vec::new(),
            running: false,
        });
        Ok(capabilities)
    }

    /// Start every registered module, in registration order
    ///
    /// A module failing to start is detached again; the others still start.
    pub async fn start(&self) -> Result<(), RegistryError> {
        let pending: Vec<Arc<dyn Module>> = self
            .entries
            .read()
            .iter()
            .filter(|e| !e.running)
            .map(|e| Arc::clone(&e.module))
            .collect();

        let mut failures = Vec::new();
        for module in pending {
            let (subscriptions, hooks) = self.attach(module.as_ref());

            let result = match module.lifecycle() {
                Some(lifecycle) => lifecycle.start().await,
                None => Ok(()),
            };

            match result {
                Ok(()) => {
                    let mut entries = self.entries.write();
                    if let Some(entry) = entries.iter_mut().find(|e| e.module.name() == module.name()) {
                        entry.subscriptions = subscriptions;
                        entry.hooks = hooks;
                        entry.running = true;
                    }
                    info!(module = module.name(), xep = module.version(), "Module started");
                }
                Err(e) => {
                    self.detach(&subscriptions, &hooks);
                    error!(module = module.name(), xep = module.version(), error = %e, "Module failed to start");
                    failures.push((module.name().to_string(), e));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::Lifecycle(failures))
        }
    }

    /// Stop every running module, in registration order
    pub async fn stop(&self) -> Result<(), RegistryError> {
        let running: Vec<Arc<dyn Module>> = self
            .entries
            .read()
            .iter()
            .filter(|e| e.running)
            .map(|e| Arc::clone(&e.module))
            .collect();

        let mut failures = Vec::new();
        for module in running {
            let result = match module.lifecycle() {
                Some(lifecycle) => lifecycle.stop().await,
                None => Ok(()),
            };

            let (subscriptions, hooks) = {
                let mut entries = self.entries.write();
                match entries.iter_mut().find(|e| e.module.name() == module.name()) {
                    Some(entry) => {
                        entry.running = false;
                        (
                            std::mem::take(&mut entry.subscriptions),
                            std::mem::take(&mut entry.hooks),
                        )
                    }
                    None => (Vec::new(), Vec::new()),
                }
            };
            self.detach(&subscriptions, &hooks);

            match result {
                Ok(()) => info!(module = module.name(), "Module stopped"),
                Err(e) => {
                    error!(module = module.name(), error = %e, "Module failed to stop");
                    failures.push((module.name().to_string(), e));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::Lifecycle(failures))
        }
    }

    fn attach(&self, module: &dyn Module) -> (Vec<SubscriptionId>, Vec<(HookPoint, HookId)>) {
        let subscriptions = module
            .event_subscriber()
            .map(|s| {
                s.subscriptions()
                    .into_iter()
                    .map(|(filter, handler)| self.bus.subscribe(filter, module.name(), handler))
                    .collect()
            })
            .unwrap_or_default();

        let hooks = module
            .stanza_interceptor()
            .map(|s| {
                s.interceptors()
                    .into_iter()
                    .map(|interceptor| {
                        let point = match interceptor.direction {
                            InterceptDirection::Incoming => HookPoint::StanzaReceived,
                            InterceptDirection::Outgoing => HookPoint::StanzaOutgoing,
                        };
                        let id = self.hooks.register(
                            point,
                            interceptor.priority,
                            module.name(),
                            interceptor.handler,
                        );
                        (point, id)
                    })
                    .collect()
            })
            .unwrap_or_default();

        (subscriptions, hooks)
    }

    fn detach(&self, subscriptions: &[SubscriptionId], hooks: &[(HookPoint, HookId)]) {
        self.bus.unsubscribe_all(subscriptions);
        for (point, id) in hooks {
            self.hooks.unregister(*point, *id);
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Union of the features advertised for `scope`
    pub fn features_for(&self, scope: FeatureScope) -> BTreeSet<String> {
        self.entries
            .read()
            .iter()
            .flat_map(|e| match scope {
                FeatureScope::Server => e.module.server_features().to_vec(),
                FeatureScope::Account => e.module.account_features().to_vec(),
            })
            .map(String::from)
            .collect()
    }

    /// First IQ-processing module claiming `namespace` for the request class
    pub fn lookup(&self, namespace: &str, server_target: bool) -> Option<Arc<dyn Module>> {
        self.entries
            .read()
            .iter()
            .find(|e| {
                e.capabilities.contains(ModuleCapabilities::IQ_PROCESSOR)
                    && e.module.matches_namespace(namespace, server_target)
            })
            .map(|e| Arc::clone(&e.module))
    }

    /// True when any module handles `namespace` for either request class
    pub fn knows_namespace(&self, namespace: &str) -> bool {
        self.entries.read().iter().any(|e| {
            e.module.matches_namespace(namespace, true) || e.module.matches_namespace(namespace, false)
        })
    }

    /// Stream feature elements for `domain`
    pub fn stream_features(&self, domain: &str) -> Vec<Element> {
        self.entries
            .read()
            .iter()
            .filter_map(|e| e.module.stream_feature(domain))
            .collect()
    }

    /// Registered module names, in registration order
    pub fn module_names(&self) -> Vec<&'static str> {
        self.entries.read().iter().map(|e| e.module.name()).collect()
    }

    pub fn capabilities(&self, name: &str) -> Option<ModuleCapabilities> {
        self.entries
            .read()
            .iter()
            .find(|e| e.module.name() == name)
            .map(|e| e.capabilities)
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.entries
            .read()
            .iter()
            .any(|e| e.module.name() == name && e.running)
    }
}

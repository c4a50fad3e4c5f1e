//! Gateway state
//!
//! Application state for the stanza server.

use crate::connection::{run_session, ConnectionManager, SessionHandle};
use crate::dispatch::StanzaDispatcher;
use crate::error::GatewayError;
use crate::server::HttpServer;
use prometheus::Registry;
use stanza_common::AppConfig;
use stanza_core::{Event, Hosts, Jid, Repository, Resource, ResourceManager};
use stanza_service::{EventBus, Hooks, ModuleRegistry, ServiceContext};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Gateway application state
///
/// Holds all shared dependencies of the server.
#[derive(Clone)]
pub struct GatewayState {
    /// Service context handed to modules
    service_context: ServiceContext,
    /// Registered protocol-extension modules
    registry: Arc<ModuleRegistry>,
    /// Inbound stanza pipeline
    dispatcher: Arc<StanzaDispatcher>,
    /// Sessions bound on this node
    connections: Arc<ConnectionManager>,
    /// HTTP listener modules mount their routes on
    http: Arc<HttpServer>,
    /// Metrics registry the storage instrumentation reports to
    metrics: Registry,
    /// Application configuration
    config: Arc<AppConfig>,
}

impl GatewayState {
    /// Create a new gateway state
    pub fn new(
        config: AppConfig,
        service_context: ServiceContext,
        registry: Arc<ModuleRegistry>,
        connections: Arc<ConnectionManager>,
        http: Arc<HttpServer>,
        metrics: Registry,
    ) -> Self {
        let dispatcher = Arc::new(StanzaDispatcher::new(
            registry.clone(),
            registry.hooks().clone(),
            service_context.router_handle(),
            service_context.hosts_handle(),
            config.dispatch.timeout(),
        ));

        Self {
            service_context,
            registry,
            dispatcher,
            connections,
            http,
            metrics,
            config: Arc::new(config),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Get the service context
    pub fn service_context(&self) -> &ServiceContext {
        &self.service_context
    }

    pub fn repository(&self) -> &dyn Repository {
        self.service_context.repository()
    }

    pub fn resource_manager(&self) -> &dyn ResourceManager {
        self.service_context.resource_manager()
    }

    pub fn hosts(&self) -> &Hosts {
        self.service_context.hosts()
    }

    /// Get the module registry
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn bus(&self) -> &EventBus {
        self.registry.bus()
    }

    pub fn hooks(&self) -> &Hooks {
        self.registry.hooks()
    }

    /// Get the stanza dispatcher
    pub fn dispatcher(&self) -> &StanzaDispatcher {
        &self.dispatcher
    }

    /// Get the connection manager
    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Get the HTTP listener
    pub fn http(&self) -> &HttpServer {
        &self.http
    }

    /// Get the metrics registry
    pub fn metrics(&self) -> &Registry {
        &self.metrics
    }

    /// Get the application configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Identifier of this cluster node
    pub fn node_id(&self) -> &str {
        &self.config.xmpp.node_id
    }

    /// Publish an event. Subscriber failures are logged by the bus.
    pub async fn publish(&self, event: Event) {
        if let Err(e) = self.bus().publish(event).await {
            debug!(error = %e, "Event delivered with failures");
        }
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Bind a session for the full JID `jid`
    ///
    /// Registers the connection and the resource, announces the stream and
    /// the bound resource, and spawns the session task.
    pub async fn open_session(&self, jid: Jid) -> Result<SessionHandle, GatewayError> {
        if !jid.is_full() || jid.node().is_none() {
            return Err(GatewayError::InvalidJid(format!(
                "{jid} is not a full account JID"
            )));
        }
        if !self.hosts().is_local(jid.domain()) {
            return Err(GatewayError::InvalidJid(format!(
                "{} is not served locally",
                jid.domain()
            )));
        }

        let queue_size = self.config.dispatch.session_queue_size.max(1);
        let (outbound_tx, outbound_rx) = mpsc::channel(queue_size);
        let conn = self.connections.add_connection(jid.clone(), outbound_tx)?;

        let resource = Resource::new(jid.clone(), self.node_id());
        if let Err(e) = self.resource_manager().put_resource(&resource).await {
            self.connections.remove_connection(&jid);
            return Err(e.into());
        }

        self.publish(Event::stream_connected(jid.clone())).await;
        self.publish(Event::resource_bound(resource)).await;

        let (inbound_tx, inbound_rx) = mpsc::channel(queue_size);
        let task = tokio::spawn(run_session(self.clone(), conn, inbound_rx));

        info!(jid = %jid, "Session opened");
        Ok(SessionHandle::new(jid, inbound_tx, outbound_rx, task))
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start the modules, then the HTTP listener
    ///
    /// Modules are stopped again when the listener cannot start.
    pub async fn start(&self) -> Result<SocketAddr, GatewayError> {
        self.registry.start().await?;
        let addr = match self.http.start().await {
            Ok(addr) => addr,
            Err(e) => {
                if let Err(stop_err) = self.registry.stop().await {
                    error!(error = %stop_err, "Modules failed to stop after listener error");
                }
                return Err(e);
            }
        };
        info!(%addr, modules = ?self.registry.module_names(), "Server started");
        Ok(addr)
    }

    /// Stop the HTTP listener, then the modules, then drop every subscription
    pub async fn shutdown(&self) {
        self.http.stop().await;
        if let Err(e) = self.registry.stop().await {
            error!(error = %e, "Modules failed to stop cleanly");
        }
        self.bus().clear();
        self.hooks().clear();
        info!("Server stopped");
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("registry", &self.registry)
            .field("connections", &self.connections)
            .field("config", &"AppConfig")
            .finish()
    }
}

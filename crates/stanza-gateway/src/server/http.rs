//! HTTP listener
//!
//! Collects the routes modules register during start, then serves them
//! together with the built-in health check.

use axum::routing::{get, MethodRouter};
use axum::Router as HttpRouter;
use parking_lot::Mutex;
use stanza_service::HttpRegistrar;
use std::collections::BTreeSet;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::error::GatewayError;

const HEALTH_PATH: &str = "/healthz";

struct Running {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

/// axum listener implementing the module HTTP registration boundary
pub struct HttpServer {
    addr: String,
    /// Routes collected so far; taken when the listener starts
    routes: Mutex<Option<HttpRouter>>,
    paths: Mutex<BTreeSet<String>>,
    running: Mutex<Option<Running>>,
}

impl HttpServer {
    /// Create a listener that will bind `addr` (`host:port`)
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            routes: Mutex::new(Some(
                HttpRouter::new().route(HEALTH_PATH, get(health_check)),
            )),
            paths: Mutex::new(BTreeSet::from([HEALTH_PATH.to_string()])),
            running: Mutex::new(None),
        }
    }

    /// Bind and start serving every registered route
    ///
    /// Routes can no longer be registered afterwards.
    pub async fn start(&self) -> Result<SocketAddr, GatewayError> {
        let listener = TcpListener::bind(&self.addr)
            .await
            .map_err(|source| GatewayError::Bind {
                addr: self.addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| GatewayError::Bind {
            addr: self.addr.clone(),
            source,
        })?;

        let router = self.routes.lock().take().ok_or(GatewayError::AlreadyStarted)?;
        let app = router.layer(TraceLayer::new_for_http());

        let (shutdown, signal) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = signal.await;
                })
                .await
        });

        *self.running.lock() = Some(Running {
            local_addr,
            shutdown,
            task,
        });

        info!(
            addr = %local_addr,
            routes = ?self.paths.lock(),
            "HTTP listener started"
        );
        Ok(local_addr)
    }

    /// Address the listener is bound to, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().as_ref().map(|r| r.local_addr)
    }

    /// Stop accepting connections and wait for in-flight requests
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };
        let _ = running.shutdown.send(());

        match running.task.await {
            Ok(Ok(())) => info!(addr = %running.local_addr, "HTTP listener stopped"),
            Ok(Err(e)) => error!(error = %e, "HTTP listener failed"),
            Err(e) => error!(error = %e, "HTTP listener task panicked"),
        }
    }
}

impl HttpRegistrar for HttpServer {
    fn register(&self, path: &str, route: MethodRouter) -> anyhow::Result<()> {
        let mut routes = self.routes.lock();
        let Some(router) = routes.take() else {
            anyhow::bail!("HTTP listener already started, cannot register {path}");
        };

        if !self.paths.lock().insert(path.to_string()) {
            *routes = Some(router);
            anyhow::bail!("HTTP route already registered: {path}");
        }

        *routes = Some(router.route(path, route));
        debug!(path, "HTTP route registered");
        Ok(())
    }
}

impl std::fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServer")
            .field("addr", &self.addr)
            .field("paths", &self.paths.lock())
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check_and_registered_route() {
        let server = HttpServer::new("127.0.0.1:0");
        server
            .register("/hello", get(|| async { "hello" }))
            .unwrap();

        let addr = server.start().await.unwrap();
        assert_eq!(server.local_addr(), Some(addr));

        let health = reqwest::get(format!("http://{addr}/healthz"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(health, "OK");

        let hello = reqwest::get(format!("http://{addr}/hello"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(hello, "hello");

        server.stop().await;
        assert!(server.local_addr().is_none());
    }

    #[test]
    fn test_duplicate_path_rejected() {
        let server = HttpServer::new("127.0.0.1:0");
        server.register("/a", get(|| async { "a" })).unwrap();

        let err = server.register("/a", get(|| async { "b" })).unwrap_err();
        assert!(err.to_string().contains("already registered"));
        assert!(server.register(HEALTH_PATH, get(|| async { "c" })).is_err());
        assert!(server.register("/b", get(|| async { "b" })).is_ok());
    }

    #[tokio::test]
    async fn test_register_after_start_rejected() {
        let server = HttpServer::new("127.0.0.1:0");
        server.start().await.unwrap();

        assert!(server.register("/late", get(|| async { "late" })).is_err());
        assert!(matches!(
            server.start().await,
            Err(GatewayError::AlreadyStarted)
        ));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_bind_failure() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();

        let server = HttpServer::new(addr.to_string());
        let err = server.start().await.unwrap_err();

        assert!(matches!(err, GatewayError::Bind { .. }));
        assert!(server.register("/still-open", get(|| async { "ok" })).is_ok());
    }
}

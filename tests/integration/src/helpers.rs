//! Test helpers for integration tests
//!
//! Provides utilities for spawning test servers, binding sessions, and
//! making HTTP requests against the upload endpoints.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, Response};
use stanza_common::AppConfig;
use stanza_core::{Iq, Repository, Stanza};
use stanza_gateway::{build_gateway_state, create_gateway_state, GatewayState, SessionHandle};
use stanza_service::MemoryResourceManager;
use tempfile::TempDir;

use crate::fixtures::{jid, DOMAIN};

/// Counter for unique test ports
static PORT_COUNTER: AtomicU16 = AtomicU16::new(19100);

/// How long a scenario waits for a stanza
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Get a unique port for testing
pub fn get_test_port() -> u16 {
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Test server instance that manages lifecycle
pub struct TestServer {
    pub state: GatewayState,
    pub addr: SocketAddr,
    pub client: Client,
    _uploads: TempDir,
}

impl TestServer {
    /// Start a server on memory backends
    pub async fn start() -> Result<Self> {
        Self::start_with(&[]).await
    }

    /// Start a server with extra configuration variables
    pub async fn start_with(vars: &[(&str, &str)]) -> Result<Self> {
        let uploads = tempfile::tempdir()?;
        let config = test_config(&uploads, vars)?;
        let state = create_gateway_state(config).await?;
        Self::launch(state, uploads).await
    }

    /// Start a server on the given repository
    pub async fn start_with_repository(repository: Arc<dyn Repository>) -> Result<Self> {
        let uploads = tempfile::tempdir()?;
        let config = test_config(&uploads, &[])?;
        let state = build_gateway_state(
            config,
            repository,
            Arc::new(MemoryResourceManager::new()),
            prometheus::Registry::new(),
        )?;
        Self::launch(state, uploads).await
    }

    async fn launch(state: GatewayState, uploads: TempDir) -> Result<Self> {
        let addr = state.start().await?;

        // Create HTTP client
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            state,
            addr,
            client,
            _uploads: uploads,
        })
    }

    /// Bind a session for a full JID
    pub async fn connect(&self, full_jid: &str) -> Result<SessionHandle> {
        Ok(self.state.open_session(jid(full_jid)).await?)
    }

    /// Get base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, url: &str) -> Result<Response> {
        Ok(self.client.get(url).send().await?)
    }

    /// Make a PUT request with a raw body
    pub async fn put(&self, url: &str, body: Vec<u8>) -> Result<Response> {
        Ok(self.client.put(url).body(body).send().await?)
    }

    /// Current value of `storage_operations_total{operation, outcome}`
    pub fn storage_operations(&self, operation: &str, outcome: &str) -> u64 {
        let has_label = |metric: &prometheus::proto::Metric, name: &str, value: &str| {
            metric
                .get_label()
                .iter()
                .any(|l| l.get_name() == name && l.get_value() == value)
        };
        self.state
            .metrics()
            .gather()
            .iter()
            .filter(|family| family.get_name() == "storage_operations_total")
            .flat_map(|family| family.get_metric())
            .find(|m| has_label(m, "operation", operation) && has_label(m, "outcome", outcome))
            .map(|m| m.get_counter().get_value() as u64)
            .unwrap_or(0)
    }

    /// Stop the listener and the modules
    pub async fn shutdown(self) {
        self.state.shutdown().await;
    }
}

/// Create a test configuration on memory backends
///
/// The HTTP listener gets a unique port so slot URLs point back at it.
pub fn test_config(uploads: &TempDir, vars: &[(&str, &str)]) -> Result<AppConfig> {
    let port = get_test_port();
    let folder = uploads.path().to_string_lossy().into_owned();
    let base_url = format!("http://127.0.0.1:{port}");

    let mut pairs: Vec<(String, String)> = vec![
        ("XMPP_DOMAINS".into(), DOMAIN.into()),
        ("HTTP_HOST".into(), "127.0.0.1".into()),
        ("HTTP_PORT".into(), port.to_string()),
        ("HTTP_UPLOAD_STORAGE_FOLDER".into(), folder),
        ("HTTP_UPLOAD_BASE_URL".into(), base_url),
        ("HTTP_UPLOAD_MAX_FILE_SIZE".into(), "1024".into()),
        ("DISPATCH_TIMEOUT_MS".into(), "1000".into()),
    ];
    for (key, value) in vars {
        pairs.retain(|(k, _)| k != key);
        pairs.push(((*key).to_string(), (*value).to_string()));
    }

    AppConfig::from_source(|key| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    })
    .map_err(|e| anyhow::anyhow!("Config error: {e}"))
}

/// Wait for the next stanza routed to `session`
pub async fn expect_stanza(session: &mut SessionHandle) -> Result<Stanza> {
    let jid = session.jid().clone();
    session
        .recv_timeout(RECV_TIMEOUT)
        .await
        .ok_or_else(|| anyhow::anyhow!("no stanza delivered to {jid}"))
}

/// Wait for the next stanza routed to `session` and require an IQ
pub async fn expect_iq(session: &mut SessionHandle) -> Result<Iq> {
    match expect_stanza(session).await? {
        Stanza::Iq(iq) => Ok(iq),
        other => anyhow::bail!("expected iq, got {}", other.name()),
    }
}

/// Assert nothing is routed to `session` for a short while
pub async fn expect_silence(session: &mut SessionHandle) -> Result<()> {
    match session.recv_timeout(Duration::from_millis(200)).await {
        Some(stanza) => anyhow::bail!("unexpected {} delivered", stanza.name()),
        None => Ok(()),
    }
}

/// Send a stanza and wait for the IQ answering it
pub async fn request(session: &mut SessionHandle, stanza: Stanza) -> Result<Iq> {
    let id = stanza.id().map(ToString::to_string);
    session.send(stanza).await?;
    let reply = expect_iq(session).await?;
    if reply.id.as_str() != id.as_deref().unwrap_or_default() {
        anyhow::bail!("reply id {} does not match request {:?}", reply.id, id);
    }
    Ok(reply)
}

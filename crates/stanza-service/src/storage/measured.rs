//! Instrumented repository decorator
//!
//! Wraps any `Repository`, forwarding every call unchanged while recording
//! an operation counter and a latency histogram in a prometheus registry.

use async_trait::async_trait;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use stanza_core::{
    tx_fn, LastActivity, LastRepository, RepoResult, Repository, RosterItem, RosterRepository,
    Transaction, TxFn, UploadSlot, UploadSlotRepository,
};

/// Storage metrics handles
#[derive(Clone)]
pub struct StorageMetrics {
    operations: IntCounterVec,
    duration: HistogramVec,
}

impl StorageMetrics {
    /// Create the metric families and register them in `registry`
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        let operations = IntCounterVec::new(
            Opts::new("storage_operations_total", "Storage operations by outcome"),
            &["operation", "outcome"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new(
                "storage_operation_duration_seconds",
                "Storage operation latency in seconds",
            ),
            &["operation"],
        )?;

        registry.register(Box::new(operations.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self {
            operations,
            duration,
        })
    }

    fn observe(&self, operation: &str, outcome: &str, started: Instant) {
        self.operations
            .with_label_values(&[operation, outcome])
            .inc();
        self.duration
            .with_label_values(&[operation])
            .observe(started.elapsed().as_secs_f64());
    }

    /// Current value of `storage_operations_total{operation, outcome}`
    pub fn operation_count(&self, operation: &str, outcome: &str) -> u64 {
        self.operations
            .with_label_values(&[operation, outcome])
            .get()
    }

    /// Number of latency samples recorded for `operation`
    pub fn sample_count(&self, operation: &str) -> u64 {
        self.duration
            .with_label_values(&[operation])
            .get_sample_count()
    }
}

fn outcome<T>(result: &RepoResult<T>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(e) if e.is_unsupported() => "unsupported",
        Err(_) => "failure",
    }
}

/// View over a repository or transaction that records each call unless it
/// runs inside a transaction already being measured.
struct Measured<'a, T: ?Sized> {
    inner: &'a T,
    metrics: &'a StorageMetrics,
    in_tx: bool,
}

impl<T: ?Sized> Measured<'_, T> {
    async fn measure<R>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = RepoResult<R>>,
    ) -> RepoResult<R> {
        if self.in_tx {
            return fut.await;
        }
        let started = Instant::now();
        let result = fut.await;
        self.metrics.observe(operation, outcome(&result), started);
        result
    }
}

#[async_trait]
impl<T: Transaction + ?Sized> LastRepository for Measured<'_, T> {
    async fn upsert_last(&self, last: &LastActivity) -> RepoResult<()> {
        self.measure("upsert_last", self.inner.upsert_last(last)).await
    }

    async fn fetch_last(&self, username: &str) -> RepoResult<Option<LastActivity>> {
        self.measure("fetch_last", self.inner.fetch_last(username)).await
    }
}

#[async_trait]
impl<T: Transaction + ?Sized> RosterRepository for Measured<'_, T> {
    async fn upsert_roster_item(&self, item: &RosterItem) -> RepoResult<()> {
        self.measure("upsert_roster_item", self.inner.upsert_roster_item(item))
            .await
    }

    async fn fetch_roster_item(&self, username: &str, jid: &str) -> RepoResult<Option<RosterItem>> {
        self.measure(
            "fetch_roster_item",
            self.inner.fetch_roster_item(username, jid),
        )
        .await
    }

    async fn fetch_roster_items(&self, username: &str) -> RepoResult<Vec<RosterItem>> {
        self.measure("fetch_roster_items", self.inner.fetch_roster_items(username))
            .await
    }
}

#[async_trait]
impl<T: Transaction + ?Sized> UploadSlotRepository for Measured<'_, T> {
    async fn insert_slot(&self, slot: &mut UploadSlot) -> RepoResult<()> {
        self.measure("insert_slot", self.inner.insert_slot(slot)).await
    }

    async fn fetch_slot(&self, id: &str) -> RepoResult<Option<UploadSlot>> {
        self.measure("fetch_slot", self.inner.fetch_slot(id)).await
    }
}

/// Repository decorator recording storage metrics
#[derive(Clone)]
pub struct MeasuredRepository {
    inner: Arc<dyn Repository>,
    metrics: StorageMetrics,
}

impl MeasuredRepository {
    pub fn new(inner: Arc<dyn Repository>, metrics: StorageMetrics) -> Self {
        Self { inner, metrics }
    }

    pub fn metrics(&self) -> &StorageMetrics {
        &self.metrics
    }

    fn view(&self) -> Measured<'_, dyn Repository> {
        Measured {
            inner: self.inner.as_ref(),
            metrics: &self.metrics,
            in_tx: false,
        }
    }
}

#[async_trait]
impl LastRepository for MeasuredRepository {
    async fn upsert_last(&self, last: &LastActivity) -> RepoResult<()> {
        self.view().upsert_last(last).await
    }

    async fn fetch_last(&self, username: &str) -> RepoResult<Option<LastActivity>> {
        self.view().fetch_last(username).await
    }
}

#[async_trait]
impl RosterRepository for MeasuredRepository {
    async fn upsert_roster_item(&self, item: &RosterItem) -> RepoResult<()> {
        self.view().upsert_roster_item(item).await
    }

    async fn fetch_roster_item(&self, username: &str, jid: &str) -> RepoResult<Option<RosterItem>> {
        self.view().fetch_roster_item(username, jid).await
    }

    async fn fetch_roster_items(&self, username: &str) -> RepoResult<Vec<RosterItem>> {
        self.view().fetch_roster_items(username).await
    }
}

#[async_trait]
impl UploadSlotRepository for MeasuredRepository {
    async fn insert_slot(&self, slot: &mut UploadSlot) -> RepoResult<()> {
        self.view().insert_slot(slot).await
    }

    async fn fetch_slot(&self, id: &str) -> RepoResult<Option<UploadSlot>> {
        self.view().fetch_slot(id).await
    }
}

#[async_trait]
impl Repository for MeasuredRepository {
    async fn in_transaction(&self, f: TxFn) -> RepoResult<()> {
        let metrics = self.metrics.clone();
        let started = Instant::now();

        let result = self
            .inner
            .in_transaction(tx_fn(move |tx| {
                Box::pin(async move {
                    let view = Measured {
                        inner: tx,
                        metrics: &metrics,
                        in_tx: true,
                    };
                    f(&view).await
                })
            }))
            .await;

        self.metrics
            .observe("in_transaction", outcome(&result), started);
        result
    }
}

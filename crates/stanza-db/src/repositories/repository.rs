//! Aggregate PostgreSQL repository with transactional execution

use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use tokio::sync::Mutex;
use tracing::{instrument, warn};

use stanza_core::{
    LastActivity, LastRepository, RepoResult, Repository, RosterItem, RosterRepository,
    Transaction, TxFn, UploadSlot, UploadSlotRepository,
};

use super::error::map_db_error;
use super::{last, roster, upload_slot};
use super::{PgLastRepository, PgRosterRepository, PgUploadSlotRepository};

/// PostgreSQL implementation of every repository trait
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
    last: PgLastRepository,
    roster: PgRosterRepository,
    upload_slots: PgUploadSlotRepository,
}

impl PgRepository {
    /// Create a new PgRepository sharing one pool across entity repositories
    pub fn new(pool: PgPool) -> Self {
        Self {
            last: PgLastRepository::new(pool.clone()),
            roster: PgRosterRepository::new(pool.clone()),
            upload_slots: PgUploadSlotRepository::new(pool.clone()),
            pool,
        }
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LastRepository for PgRepository {
    async fn upsert_last(&self, last: &LastActivity) -> RepoResult<()> {
        self.last.upsert_last(last).await
    }

    async fn fetch_last(&self, username: &str) -> RepoResult<Option<LastActivity>> {
        self.last.fetch_last(username).await
    }
}

#[async_trait]
impl RosterRepository for PgRepository {
    async fn upsert_roster_item(&self, item: &RosterItem) -> RepoResult<()> {
        self.roster.upsert_roster_item(item).await
    }

    async fn fetch_roster_item(&self, username: &str, jid: &str) -> RepoResult<Option<RosterItem>> {
        self.roster.fetch_roster_item(username, jid).await
    }

    async fn fetch_roster_items(&self, username: &str) -> RepoResult<Vec<RosterItem>> {
        self.roster.fetch_roster_items(username).await
    }
}

#[async_trait]
impl UploadSlotRepository for PgRepository {
    async fn insert_slot(&self, slot: &mut UploadSlot) -> RepoResult<()> {
        self.upload_slots.insert_slot(slot).await
    }

    async fn fetch_slot(&self, id: &str) -> RepoResult<Option<UploadSlot>> {
        self.upload_slots.fetch_slot(id).await
    }
}

#[async_trait]
impl Repository for PgRepository {
    #[instrument(skip_all)]
    async fn in_transaction(&self, f: TxFn) -> RepoResult<()> {
        let tx = PgTransaction::new(self.pool.begin().await.map_err(map_db_error)?);

        let view: &dyn Transaction = &tx;
        match f(view).await {
            Ok(()) => tx.commit().await,
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Transaction rollback failed");
                }
                Err(e)
            }
        }
    }
}

// ============================================================================
// Transaction view
// ============================================================================

/// Repository view bound to one open database transaction
///
/// Every call runs on the transaction's connection, so reads observe the
/// transaction's own uncommitted writes.
pub struct PgTransaction {
    tx: Mutex<sqlx::Transaction<'static, Postgres>>,
}

impl PgTransaction {
    fn new(tx: sqlx::Transaction<'static, Postgres>) -> Self {
        Self { tx: Mutex::new(tx) }
    }

    async fn commit(self) -> RepoResult<()> {
        self.tx.into_inner().commit().await.map_err(map_db_error)
    }

    async fn rollback(self) -> RepoResult<()> {
        self.tx.into_inner().rollback().await.map_err(map_db_error)
    }
}

#[async_trait]
impl LastRepository for PgTransaction {
    async fn upsert_last(&self, last: &LastActivity) -> RepoResult<()> {
        let mut guard = self.tx.lock().await;
        last::upsert_last(&mut **guard, last).await
    }

    async fn fetch_last(&self, username: &str) -> RepoResult<Option<LastActivity>> {
        let mut guard = self.tx.lock().await;
        last::fetch_last(&mut **guard, username).await
    }
}

#[async_trait]
impl RosterRepository for PgTransaction {
    async fn upsert_roster_item(&self, item: &RosterItem) -> RepoResult<()> {
        let mut guard = self.tx.lock().await;
        roster::upsert_roster_item(&mut **guard, item).await
    }

    async fn fetch_roster_item(&self, username: &str, jid: &str) -> RepoResult<Option<RosterItem>> {
        let mut guard = self.tx.lock().await;
        roster::fetch_roster_item(&mut **guard, username, jid).await
    }

    async fn fetch_roster_items(&self, username: &str) -> RepoResult<Vec<RosterItem>> {
        let mut guard = self.tx.lock().await;
        roster::fetch_roster_items(&mut **guard, username).await
    }
}

#[async_trait]
impl UploadSlotRepository for PgTransaction {
    async fn insert_slot(&self, slot: &mut UploadSlot) -> RepoResult<()> {
        let mut guard = self.tx.lock().await;
        upload_slot::insert_slot(&mut **guard, slot).await
    }

    async fn fetch_slot(&self, id: &str) -> RepoResult<Option<UploadSlot>> {
        let mut guard = self.tx.lock().await;
        upload_slot::fetch_slot(&mut **guard, id).await
    }
}

//! Key-value repository in Redis.
//!
//! Layout:
//! - `last:{username}` holds the JSON-encoded `LastActivity`
//! - `roster:{username}` is a hash keyed by contact JID with JSON `RosterItem` values
//!
//! Upload slots are not supported by this backend.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, instrument};

use stanza_core::{
    DomainError, LastActivity, LastRepository, RepoResult, Repository, RosterItem,
    RosterRepository, Transaction, TxFn, UploadSlot, UploadSlotRepository,
};

use crate::pool::{RedisPool, RedisPoolError};

/// Backend name reported by unsupported operations
const BACKEND: &str = "redis";

/// Key prefix for last activity records
const LAST_PREFIX: &str = "last:";
/// Key prefix for roster hashes
const ROSTER_PREFIX: &str = "roster:";

fn last_key(username: &str) -> String {
    format!("{LAST_PREFIX}{username}")
}

fn roster_key(username: &str) -> String {
    format!("{ROSTER_PREFIX}{username}")
}

/// Redis implementation of every repository trait
#[derive(Debug, Clone)]
pub struct RedisRepository {
    pool: RedisPool,
}

impl RedisRepository {
    /// Create a new repository
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LastRepository for RedisRepository {
    #[instrument(skip(self))]
    async fn upsert_last(&self, last: &LastActivity) -> RepoResult<()> {
        self.pool.set(&last_key(&last.username), last).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_last(&self, username: &str) -> RepoResult<Option<LastActivity>> {
        Ok(self.pool.get_value(&last_key(username)).await?)
    }
}

#[async_trait]
impl RosterRepository for RedisRepository {
    #[instrument(skip(self))]
    async fn upsert_roster_item(&self, item: &RosterItem) -> RepoResult<()> {
        self.pool
            .hset(&roster_key(&item.username), &item.jid, item)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_roster_item(&self, username: &str, jid: &str) -> RepoResult<Option<RosterItem>> {
        Ok(self.pool.hget(&roster_key(username), jid).await?)
    }

    #[instrument(skip(self))]
    async fn fetch_roster_items(&self, username: &str) -> RepoResult<Vec<RosterItem>> {
        let mut items: Vec<RosterItem> = self.pool.hvals(&roster_key(username)).await?;
        items.sort_by(|a, b| a.jid.cmp(&b.jid));
        Ok(items)
    }
}

#[async_trait]
impl UploadSlotRepository for RedisRepository {
    async fn insert_slot(&self, _slot: &mut UploadSlot) -> RepoResult<()> {
        Err(DomainError::unsupported(BACKEND, "insert_slot"))
    }

    async fn fetch_slot(&self, _id: &str) -> RepoResult<Option<UploadSlot>> {
        Err(DomainError::unsupported(BACKEND, "fetch_slot"))
    }
}

#[async_trait]
impl Repository for RedisRepository {
    #[instrument(skip_all)]
    async fn in_transaction(&self, f: TxFn) -> RepoResult<()> {
        let tx = RedisTransaction::new(self.clone());
        let view: &dyn Transaction = &tx;
        f(view).await?;
        tx.commit().await
    }
}

// ============================================================================
// Transaction view
// ============================================================================

/// Writes buffered by an open transaction
#[derive(Debug, Default)]
struct PendingWrites {
    last: HashMap<String, LastActivity>,
    roster: HashMap<(String, String), RosterItem>,
}

impl PendingWrites {
    fn is_empty(&self) -> bool {
        self.last.is_empty() && self.roster.is_empty()
    }

    fn to_pipeline(&self) -> Result<redis::Pipeline, RedisPoolError> {
        let mut pipe = redis::pipe();
        pipe.atomic();

        for (username, last) in &self.last {
            pipe.set(last_key(username), serde_json::to_string(last)?)
                .ignore();
        }
        for ((username, jid), item) in &self.roster {
            pipe.hset(roster_key(username), jid, serde_json::to_string(item)?)
                .ignore();
        }
        Ok(pipe)
    }
}

/// Repository view over a Redis transaction
///
/// Writes are buffered in memory and read back by later calls in the same
/// transaction. Commit sends them as one `MULTI`/`EXEC` pipeline; dropping the
/// view without committing discards them.
#[derive(Debug)]
pub struct RedisTransaction {
    repo: RedisRepository,
    pending: Mutex<PendingWrites>,
}

impl RedisTransaction {
    fn new(repo: RedisRepository) -> Self {
        Self {
            repo,
            pending: Mutex::new(PendingWrites::default()),
        }
    }

    async fn commit(self) -> RepoResult<()> {
        let pending = self.pending.into_inner();
        if pending.is_empty() {
            return Ok(());
        }

        let writes = pending.last.len() + pending.roster.len();
        let pipe = pending.to_pipeline()?;
        self.repo.pool.execute(&pipe).await?;
        debug!(writes, "Redis transaction committed");
        Ok(())
    }
}

#[async_trait]
impl LastRepository for RedisTransaction {
    async fn upsert_last(&self, last: &LastActivity) -> RepoResult<()> {
        self.pending
            .lock()
            .last
            .insert(last.username.clone(), last.clone());
        Ok(())
    }

    async fn fetch_last(&self, username: &str) -> RepoResult<Option<LastActivity>> {
        let buffered = self.pending.lock().last.get(username).cloned();
        match buffered {
            Some(last) => Ok(Some(last)),
            None => self.repo.fetch_last(username).await,
        }
    }
}

#[async_trait]
impl RosterRepository for RedisTransaction {
    async fn upsert_roster_item(&self, item: &RosterItem) -> RepoResult<()> {
        self.pending
            .lock()
            .roster
            .insert((item.username.clone(), item.jid.clone()), item.clone());
        Ok(())
    }

    async fn fetch_roster_item(&self, username: &str, jid: &str) -> RepoResult<Option<RosterItem>> {
        let buffered = self
            .pending
            .lock()
            .roster
            .get(&(username.to_string(), jid.to_string()))
            .cloned();
        match buffered {
            Some(item) => Ok(Some(item)),
            None => self.repo.fetch_roster_item(username, jid).await,
        }
    }

    async fn fetch_roster_items(&self, username: &str) -> RepoResult<Vec<RosterItem>> {
        let mut items: HashMap<String, RosterItem> = self
            .repo
            .fetch_roster_items(username)
            .await?
            .into_iter()
            .map(|item| (item.jid.clone(), item))
            .collect();

        for ((owner, jid), item) in self.pending.lock().roster.iter() {
            if owner == username {
                items.insert(jid.clone(), item.clone());
            }
        }

        let mut items: Vec<RosterItem> = items.into_values().collect();
        items.sort_by(|a, b| a.jid.cmp(&b.jid));
        Ok(items)
    }
}

#[async_trait]
impl UploadSlotRepository for RedisTransaction {
    async fn insert_slot(&self, _slot: &mut UploadSlot) -> RepoResult<()> {
        Err(DomainError::unsupported(BACKEND, "insert_slot"))
    }

    async fn fetch_slot(&self, _id: &str) -> RepoResult<Option<UploadSlot>> {
        Err(DomainError::unsupported(BACKEND, "fetch_slot"))
    }
}

//! Repository traits (ports) - define the interface for data access
//!
//! One trait per persisted entity. Storage backends implement all of them;
//! modules depend only on the traits. `Repository` adds transactional
//! execution on top of the per-entity contracts.

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::entities::{LastActivity, RosterItem, UploadSlot};
use crate::error::DomainError;

/// Result type for repository operations
pub type RepoResult<T> = Result<T, DomainError>;

// ============================================================================
// Last Activity Repository
// ============================================================================

#[async_trait]
pub trait LastRepository: Send + Sync {
    /// Insert or replace the record for `last.username`
    async fn upsert_last(&self, last: &LastActivity) -> RepoResult<()>;

    /// Fetch the record of a user, if any
    async fn fetch_last(&self, username: &str) -> RepoResult<Option<LastActivity>>;
}

// ============================================================================
// Roster Repository
// ============================================================================

#[async_trait]
pub trait RosterRepository: Send + Sync {
    /// Insert or replace a roster item keyed by (username, jid)
    async fn upsert_roster_item(&self, item: &RosterItem) -> RepoResult<()>;

    /// Fetch the item for contact `jid` in the roster of `username`
    async fn fetch_roster_item(&self, username: &str, jid: &str)
        -> RepoResult<Option<RosterItem>>;

    /// Fetch every item of a roster
    async fn fetch_roster_items(&self, username: &str) -> RepoResult<Vec<RosterItem>>;
}

// ============================================================================
// Upload Slot Repository
// ============================================================================

#[async_trait]
pub trait UploadSlotRepository: Send + Sync {
    /// Persist a slot and populate its id
    async fn insert_slot(&self, slot: &mut UploadSlot) -> RepoResult<()>;

    /// Fetch a slot by id
    async fn fetch_slot(&self, id: &str) -> RepoResult<Option<UploadSlot>>;
}

// ============================================================================
// Transactions
// ============================================================================

/// Every entity repository, as seen from inside a transaction
pub trait Transaction: LastRepository + RosterRepository + UploadSlotRepository {}

impl<T> Transaction for T where T: LastRepository + RosterRepository + UploadSlotRepository + ?Sized {}

/// Work executed inside a transaction
pub type TxFn =
    Box<dyn for<'a> FnOnce(&'a dyn Transaction) -> BoxFuture<'a, RepoResult<()>> + Send>;

/// Box a transaction closure, letting the compiler infer its signature
///
/// ```ignore
/// repo.in_transaction(tx_fn(move |tx| Box::pin(async move {
///     tx.upsert_last(&last).await
/// }))).await?;
/// ```
pub fn tx_fn<F>(f: F) -> TxFn
where
    F: for<'a> FnOnce(&'a dyn Transaction) -> BoxFuture<'a, RepoResult<()>> + Send + 'static,
{
    Box::new(f)
}

/// Aggregate repository handed to modules
#[async_trait]
pub trait Repository: Transaction {
    /// Run `f` atomically: its writes commit together when it returns `Ok`,
    /// and none of them are applied when it returns `Err`.
    async fn in_transaction(&self, f: TxFn) -> RepoResult<()>;
}

//! In-memory storage backend
//!
//! Single-node repository and resource manager backed by `DashMap`. Used by
//! tests and development setups; nothing survives a restart.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

use stanza_core::{
    LastActivity, LastRepository, RepoResult, Repository, Resource, ResourceManager, RosterItem,
    RosterRepository, Transaction, TxFn, UploadSlot, UploadSlotRepository,
};

fn new_slot_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Default)]
struct MemoryStore {
    last: DashMap<String, LastActivity>,
    /// username -> contact jid -> item
    roster: DashMap<String, BTreeMap<String, RosterItem>>,
    slots: DashMap<String, UploadSlot>,
}

impl MemoryStore {
    fn put_roster_item(&self, item: RosterItem) {
        self.roster
            .entry(item.username.clone())
            .or_default()
            .insert(item.jid.clone(), item);
    }

    fn roster_item(&self, username: &str, jid: &str) -> Option<RosterItem> {
        self.roster
            .get(username)
            .and_then(|items| items.get(jid).cloned())
    }

    fn roster_items(&self, username: &str) -> Vec<RosterItem> {
        self.roster
            .get(username)
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default()
    }
}

/// In-memory implementation of every repository trait
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    store: Arc<MemoryStore>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LastRepository for MemoryRepository {
    async fn upsert_last(&self, last: &LastActivity) -> RepoResult<()> {
        self.store.last.insert(last.username.clone(), last.clone());
        Ok(())
    }

    async fn fetch_last(&self, username: &str) -> RepoResult<Option<LastActivity>> {
        Ok(self.store.last.get(username).map(|l| l.clone()))
    }
}

#[async_trait]
impl RosterRepository for MemoryRepository {
    async fn upsert_roster_item(&self, item: &RosterItem) -> RepoResult<()> {
        self.store.put_roster_item(item.clone());
        Ok(())
    }

    async fn fetch_roster_item(&self, username: &str, jid: &str) -> RepoResult<Option<RosterItem>> {
        Ok(self.store.roster_item(username, jid))
    }

    async fn fetch_roster_items(&self, username: &str) -> RepoResult<Vec<RosterItem>> {
        Ok(self.store.roster_items(username))
    }
}

#[async_trait]
impl UploadSlotRepository for MemoryRepository {
    async fn insert_slot(&self, slot: &mut UploadSlot) -> RepoResult<()> {
        slot.id = new_slot_id();
        self.store.slots.insert(slot.id.clone(), slot.clone());
        Ok(())
    }

    async fn fetch_slot(&self, id: &str) -> RepoResult<Option<UploadSlot>> {
        Ok(self.store.slots.get(id).map(|s| s.clone()))
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn in_transaction(&self, f: TxFn) -> RepoResult<()> {
        let tx = MemoryTransaction::new(Arc::clone(&self.store));
        let view: &dyn Transaction = &tx;
        f(view).await?;
        tx.commit();
        Ok(())
    }
}

// ============================================================================
// Transaction view
// ============================================================================

#[derive(Debug, Default)]
struct PendingWrites {
    last: HashMap<String, LastActivity>,
    roster: HashMap<(String, String), RosterItem>,
    slots: HashMap<String, UploadSlot>,
}

/// Overlay of buffered writes on top of the shared store
#[derive(Debug)]
struct MemoryTransaction {
    store: Arc<MemoryStore>,
    pending: Mutex<PendingWrites>,
}

impl MemoryTransaction {
    fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            pending: Mutex::new(PendingWrites::default()),
        }
    }

    fn commit(self) {
        let pending = self.pending.into_inner();
        let writes = pending.last.len() + pending.roster.len() + pending.slots.len();

        for (username, last) in pending.last {
            self.store.last.insert(username, last);
        }
        for (_, item) in pending.roster {
            self.store.put_roster_item(item);
        }
        for (id, slot) in pending.slots {
            self.store.slots.insert(id, slot);
        }
        debug!(writes, "Memory transaction committed");
    }
}

#[async_trait]
impl LastRepository for MemoryTransaction {
    async fn upsert_last(&self, last: &LastActivity) -> RepoResult<()> {
        self.pending
            .lock()
            .last
            .insert(last.username.clone(), last.clone());
        Ok(())
    }

    async fn fetch_last(&self, username: &str) -> RepoResult<Option<LastActivity>> {
        let buffered = self.pending.lock().last.get(username).cloned();
        Ok(buffered.or_else(|| self.store.last.get(username).map(|l| l.clone())))
    }
}

#[async_trait]
impl RosterRepository for MemoryTransaction {
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
        Ok(buffered.or_else(|| self.store.roster_item(username, jid)))
    }

    async fn fetch_roster_items(&self, username: &str) -> RepoResult<Vec<RosterItem>> {
        let mut items: BTreeMap<String, RosterItem> = self
            .store
            .roster_items(username)
            .into_iter()
            .map(|item| (item.jid.clone(), item))
            .collect();

        for ((owner, jid), item) in &self.pending.lock().roster {
            if owner == username {
                items.insert(jid.clone(), item.clone());
            }
        }
        Ok(items.into_values().collect())
    }
}

#[async_trait]
impl UploadSlotRepository for MemoryTransaction {
    async fn insert_slot(&self, slot: &mut UploadSlot) -> RepoResult<()> {
        slot.id = new_slot_id();
        self.pending
            .lock()
            .slots
            .insert(slot.id.clone(), slot.clone());
        Ok(())
    }

    async fn fetch_slot(&self, id: &str) -> RepoResult<Option<UploadSlot>> {
        let buffered = self.pending.lock().slots.get(id).cloned();
        Ok(buffered.or_else(|| self.store.slots.get(id).map(|s| s.clone())))
    }
}

// ============================================================================
// Resource manager
// ============================================================================

/// Single-node resource manager
#[derive(Debug, Clone, Default)]
pub struct MemoryResourceManager {
    /// username -> resource name -> resource
    resources: Arc<DashMap<String, BTreeMap<String, Resource>>>,
}

impl MemoryResourceManager {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResourceManager for MemoryResourceManager {
    async fn put_resource(&self, resource: &Resource) -> RepoResult<()> {
        self.resources
            .entry(resource.username().to_string())
            .or_default()
            .insert(resource.resource().to_string(), resource.clone());
        Ok(())
    }

    async fn get_resource(&self, username: &str, resource: &str) -> RepoResult<Option<Resource>> {
        Ok(self
            .resources
            .get(username)
            .and_then(|r| r.get(resource).cloned()))
    }

    async fn get_resources(&self, username: &str) -> RepoResult<Vec<Resource>> {
        Ok(self
            .resources
            .get(username)
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn del_resource(&self, username: &str, resource: &str) -> RepoResult<()> {
        let now_empty = match self.resources.get_mut(username) {
            Some(mut r) => {
                r.remove(resource);
                r.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.resources.remove_if(username, |_, r| r.is_empty());
        }
        Ok(())
    }
}

//! Cluster-wide resource tracking in Redis.
//!
//! Every user has one hash whose fields are resource names and whose values
//! are the JSON-encoded `Resource`.

use async_trait::async_trait;
use tracing::instrument;

use stanza_core::{RepoResult, Resource, ResourceManager};

use crate::pool::RedisPool;

/// Key prefix for per-user resource hashes
const RESOURCES_PREFIX: &str = "resources:";

fn resources_key(username: &str) -> String {
    format!("{RESOURCES_PREFIX}{username}")
}

/// Redis implementation of ResourceManager
#[derive(Debug, Clone)]
pub struct RedisResourceManager {
    pool: RedisPool,
}

impl RedisResourceManager {
    /// Create a new resource manager
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResourceManager for RedisResourceManager {
    #[instrument(skip(self, resource), fields(jid = %resource.jid))]
    async fn put_resource(&self, resource: &Resource) -> RepoResult<()> {
        self.pool
            .hset(&resources_key(resource.username()), resource.resource(), resource)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_resource(&self, username: &str, resource: &str) -> RepoResult<Option<Resource>> {
        Ok(self.pool.hget(&resources_key(username), resource).await?)
    }

    #[instrument(skip(self))]
    async fn get_resources(&self, username: &str) -> RepoResult<Vec<Resource>> {
        let mut resources: Vec<Resource> = self.pool.hvals(&resources_key(username)).await?;
        resources.sort_by(|a, b| a.resource().cmp(b.resource()));
        Ok(resources)
    }

    #[instrument(skip(self))]
    async fn del_resource(&self, username: &str, resource: &str) -> RepoResult<()> {
        self.pool.hdel(&resources_key(username), resource).await?;
        Ok(())
    }
}

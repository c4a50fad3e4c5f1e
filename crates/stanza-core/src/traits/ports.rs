//! Non-storage ports: cluster session state and outbound routing

use async_trait::async_trait;

use crate::entities::Resource;
use crate::error::RouteError;
use crate::stanza::Stanza;
use crate::traits::RepoResult;
use crate::value_objects::Jid;

/// Cluster-wide view of bound resources
///
/// Written by the session layer only. Reads are eventually consistent across
/// nodes.
#[async_trait]
pub trait ResourceManager: Send + Sync {
    /// Insert or replace a resource keyed by its full JID
    async fn put_resource(&self, resource: &Resource) -> RepoResult<()>;

    /// Fetch one resource of a user
    async fn get_resource(&self, username: &str, resource: &str) -> RepoResult<Option<Resource>>;

    /// Fetch every resource of a user
    async fn get_resources(&self, username: &str) -> RepoResult<Vec<Resource>>;

    /// Remove a resource
    async fn del_resource(&self, username: &str, resource: &str) -> RepoResult<()>;
}

/// Outbound stanza delivery
#[async_trait]
pub trait Router: Send + Sync {
    /// Deliver a stanza to its `to` address, returning the JIDs it reached
    async fn route(&self, stanza: Stanza) -> Result<Vec<Jid>, RouteError>;
}

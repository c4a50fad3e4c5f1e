//! Service context - dependency container for modules
//!
//! Holds the storage, session-state and routing ports every module is built
//! from.

use std::sync::Arc;

use stanza_core::{Hosts, Repository, ResourceManager, Router};

use crate::error::{ServiceError, ServiceResult};
use crate::http::HttpRegistrar;

/// Dependencies shared by all modules
#[derive(Clone)]
pub struct ServiceContext {
    repository: Arc<dyn Repository>,
    resource_manager: Arc<dyn ResourceManager>,
    router: Arc<dyn Router>,
    hosts: Arc<Hosts>,
    http: Option<Arc<dyn HttpRegistrar>>,
}

impl ServiceContext {
    pub fn new(
        repository: Arc<dyn Repository>,
        resource_manager: Arc<dyn ResourceManager>,
        router: Arc<dyn Router>,
        hosts: Arc<Hosts>,
        http: Option<Arc<dyn HttpRegistrar>>,
    ) -> Self {
        Self {
            repository,
            resource_manager,
            router,
            hosts,
            http,
        }
    }

    // === Storage ===

    pub fn repository(&self) -> &dyn Repository {
        self.repository.as_ref()
    }

    pub fn resource_manager(&self) -> &dyn ResourceManager {
        self.resource_manager.as_ref()
    }

    // === Routing ===

    /// Outbound router modules send their replies through
    pub fn router(&self) -> &dyn Router {
        self.router.as_ref()
    }

    /// Shared handle to the router, for handlers that outlive a borrow
    pub fn router_handle(&self) -> Arc<dyn Router> {
        Arc::clone(&self.router)
    }

    pub fn hosts(&self) -> &Hosts {
        self.hosts.as_ref()
    }

    pub fn hosts_handle(&self) -> Arc<Hosts> {
        Arc::clone(&self.hosts)
    }

    /// HTTP listener, when one is configured
    pub fn http(&self) -> Option<&dyn HttpRegistrar> {
        self.http.as_deref()
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("hosts", &self.hosts)
            .field("repository", &"...")
            .field("resource_manager", &"...")
            .field("http", &self.http.is_some())
            .finish()
    }
}

/// Builder for creating a ServiceContext
#[derive(Default)]
pub struct ServiceContextBuilder {
    repository: Option<Arc<dyn Repository>>,
    resource_manager: Option<Arc<dyn ResourceManager>>,
    router: Option<Arc<dyn Router>>,
    hosts: Option<Arc<Hosts>>,
    http: Option<Arc<dyn HttpRegistrar>>,
}

impl ServiceContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repository(mut self, repository: Arc<dyn Repository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn resource_manager(mut self, manager: Arc<dyn ResourceManager>) -> Self {
        self.resource_manager = Some(manager);
        self
    }

    pub fn router(mut self, router: Arc<dyn Router>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn hosts(mut self, hosts: Arc<Hosts>) -> Self {
        self.hosts = Some(hosts);
        self
    }

    pub fn http(mut self, http: Arc<dyn HttpRegistrar>) -> Self {
        self.http = Some(http);
        self
    }

    /// Build the ServiceContext
    ///
    /// # Errors
    /// Returns `ServiceError::Internal` if a required dependency is missing
    pub fn build(self) -> ServiceResult<ServiceContext> {
        Ok(ServiceContext::new(
            self.repository
                .ok_or_else(|| ServiceError::internal("repository is required"))?,
            self.resource_manager
                .ok_or_else(|| ServiceError::internal("resource_manager is required"))?,
            self.router
                .ok_or_else(|| ServiceError::internal("router is required"))?,
            self.hosts
                .ok_or_else(|| ServiceError::internal("hosts is required"))?,
            self.http,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::testing::RecordingRouter;
    use crate::storage::{MemoryRepository, MemoryResourceManager};

    #[test]
    fn test_builder_requires_ports() {
        let err = ServiceContextBuilder::new()
            .repository(Arc::new(MemoryRepository::new()))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("resource_manager is required"));
    }

    #[test]
    fn test_builder() {
        let ctx = ServiceContextBuilder::new()
            .repository(Arc::new(MemoryRepository::new()))
            .resource_manager(Arc::new(MemoryResourceManager::new()))
            .router(Arc::new(RecordingRouter::default()))
            .hosts(Arc::new(Hosts::new(["jackal.im"]).unwrap()))
            .build()
            .unwrap();

        assert!(ctx.hosts().is_local("jackal.im"));
        assert!(ctx.http().is_none());
    }
}

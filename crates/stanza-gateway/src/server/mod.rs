//! Server setup
//!
//! Builds the storage backends, the module pipeline and the HTTP listener
//! from configuration, and runs them until shutdown.

mod http;
mod state;

pub use http::HttpServer;
pub use state::GatewayState;

use crate::connection::ConnectionManager;
use crate::router::LocalRouter;
use prometheus::Registry;
use stanza_cache::{RedisPool, RedisRepository, RedisResourceManager};
use stanza_common::{AppConfig, AppError, ResourceManagerBackend, StorageBackend};
use stanza_core::{Hosts, Repository, ResourceManager};
use stanza_service::{
    register_modules, EventBus, Hooks, MeasuredRepository, MemoryRepository,
    MemoryResourceManager, ModuleRegistry, ServiceContextBuilder, StorageMetrics,
};
use std::sync::Arc;

/// Initialize all dependencies and create `GatewayState`
pub async fn create_gateway_state(config: AppConfig) -> Result<GatewayState, AppError> {
    tracing::info!(domains = ?config.xmpp.domains, node = %config.xmpp.node_id, "Serving domains");

    // Redis pool, shared by every Redis-backed component
    let redis_pool = match &config.redis {
        Some(redis) if needs_redis(&config) => {
            tracing::info!("Connecting to Redis...");
            let pool = RedisPool::from_config(redis).map_err(|e| AppError::Cache(e.to_string()))?;
            pool.health_check()
                .await
                .map_err(|e| AppError::Cache(e.to_string()))?;
            tracing::info!("Redis connection established");
            Some(pool)
        }
        _ => None,
    };

    let metrics = Registry::new();
    let repository = create_repository(&config, redis_pool.as_ref(), &metrics).await?;
    let resource_manager = create_resource_manager(&config, redis_pool.as_ref())?;

    build_gateway_state(config, repository, resource_manager, metrics)
}

/// Assemble the pipeline over already constructed backends
///
/// Modules are registered but not started.
pub fn build_gateway_state(
    config: AppConfig,
    repository: Arc<dyn Repository>,
    resource_manager: Arc<dyn ResourceManager>,
    metrics: Registry,
) -> Result<GatewayState, AppError> {
    let hosts = Hosts::new(&config.xmpp.domains).map_err(|e| AppError::Config(e.to_string()))?;
    let hosts = Arc::new(hosts);

    // Pipeline
    let bus = Arc::new(EventBus::new());
    let hooks = Arc::new(Hooks::new());
    let connections = ConnectionManager::new_shared();
    let router = Arc::new(LocalRouter::new(
        hosts.clone(),
        connections.clone(),
        hooks.clone(),
        config.dispatch.timeout(),
    ));
    let http = Arc::new(HttpServer::new(config.http.address()));

    // Build service context
    let service_context = ServiceContextBuilder::new()
        .repository(repository)
        .resource_manager(resource_manager)
        .router(router)
        .hosts(hosts)
        .http(http.clone())
        .build()
        .map_err(|e| AppError::Config(e.to_string()))?;

    let registry = Arc::new(ModuleRegistry::new(bus, hooks));
    register_modules(&registry, &service_context, &config.modules)
        .map_err(|e| AppError::Config(e.to_string()))?;

    Ok(GatewayState::new(
        config,
        service_context,
        registry,
        connections,
        http,
        metrics,
    ))
}

fn needs_redis(config: &AppConfig) -> bool {
    config.storage.backend == StorageBackend::Redis
        || config.resource_manager == ResourceManagerBackend::Redis
}

fn missing_redis() -> AppError {
    AppError::Config("REDIS_URL is required for Redis-backed components".to_string())
}

async fn create_repository(
    config: &AppConfig,
    redis_pool: Option<&RedisPool>,
    metrics: &Registry,
) -> Result<Arc<dyn Repository>, AppError> {
    let repository: Arc<dyn Repository> = match config.storage.backend {
        StorageBackend::Memory => Arc::new(MemoryRepository::new()),
        StorageBackend::Pgsql => {
            let database = config.database.as_ref().ok_or_else(|| {
                AppError::Config("DATABASE_URL is required for the pgsql backend".to_string())
            })?;

            tracing::info!("Connecting to PostgreSQL...");
            let pool = stanza_db::create_pool(&stanza_db::DatabaseConfig::from(database))
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            stanza_db::run_migrations(&pool)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            tracing::info!("PostgreSQL connection established");

            Arc::new(stanza_db::PgRepository::new(pool))
        }
        StorageBackend::Redis => {
            let pool = redis_pool.ok_or_else(missing_redis)?;
            Arc::new(RedisRepository::new(pool.clone()))
        }
    };
    tracing::info!(backend = ?config.storage.backend, "Repository ready");

    if !config.storage.measured {
        return Ok(repository);
    }
    let storage_metrics = StorageMetrics::new(metrics).map_err(AppError::internal)?;
    Ok(Arc::new(MeasuredRepository::new(repository, storage_metrics)))
}

fn create_resource_manager(
    config: &AppConfig,
    redis_pool: Option<&RedisPool>,
) -> Result<Arc<dyn ResourceManager>, AppError> {
    let manager: Arc<dyn ResourceManager> = match config.resource_manager {
        ResourceManagerBackend::Memory => Arc::new(MemoryResourceManager::new()),
        ResourceManagerBackend::Redis => {
            let pool = redis_pool.ok_or_else(missing_redis)?;
            Arc::new(RedisResourceManager::new(pool.clone()))
        }
    };
    tracing::info!(backend = ?config.resource_manager, "Resource manager ready");
    Ok(manager)
}

/// Run the complete server with configuration
///
/// Starts the modules and the HTTP listener, then waits for Ctrl-C.
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let state = create_gateway_state(config).await?;

    let addr = state.start().await?;
    tracing::info!("HTTP listening on http://{}", addr);

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| AppError::internal(anyhow::anyhow!("Failed to listen for shutdown: {e}")))?;
    tracing::info!("Shutdown signal received");

    state.shutdown().await;
    Ok(())
}

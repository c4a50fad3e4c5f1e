//! Redis connection pool using deadpool-redis.
//!
//! Wraps a managed pool of Redis connections and exposes the small set of
//! JSON-valued string and hash commands the stores need.

use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use stanza_core::DomainError;

/// Redis pool configuration
#[derive(Debug, Clone)]
pub struct RedisPoolConfig {
    /// Redis connection URL (e.g., `redis://localhost:6379`)
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: usize,
}

impl Default for RedisPoolConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            max_connections: 16,
        }
    }
}

impl From<&stanza_common::RedisConfig> for RedisPoolConfig {
    fn from(config: &stanza_common::RedisConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections as usize,
        }
    }
}

/// Error type for Redis pool operations
#[derive(Debug, thiserror::Error)]
pub enum RedisPoolError {
    #[error("Failed to create Redis pool: {0}")]
    CreatePool(String),

    #[error("Failed to get connection from pool: {0}")]
    GetConnection(#[from] deadpool_redis::PoolError),

    #[error("Redis command error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<RedisPoolError> for DomainError {
    fn from(err: RedisPoolError) -> Self {
        match err {
            RedisPoolError::Serialization(e) => DomainError::SerializationError(e.to_string()),
            other => DomainError::CacheError(other.to_string()),
        }
    }
}

/// Result type for Redis pool operations
pub type RedisResult<T> = Result<T, RedisPoolError>;

/// Managed Redis connection pool
#[derive(Clone)]
pub struct RedisPool {
    pool: Pool,
}

impl std::fmt::Debug for RedisPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPool")
            .field("status", &self.pool.status())
            .finish()
    }
}

impl RedisPool {
    /// Create a new Redis pool with the given configuration
    pub fn new(config: RedisPoolConfig) -> RedisResult<Self> {
        let cfg = Config::from_url(&config.url);
        let pool = cfg
            .builder()
            .map_err(|e| RedisPoolError::CreatePool(e.to_string()))?
            .max_size(config.max_connections)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| RedisPoolError::CreatePool(e.to_string()))?;

        // Redact credentials from URL for logging
        let safe_url = config.url.split('@').next_back().unwrap_or(&config.url);
        tracing::info!(
            url = %safe_url,
            max_connections = config.max_connections,
            "Redis pool created"
        );

        Ok(Self { pool })
    }

    /// Create a new Redis pool from stanza-common config
    pub fn from_config(config: &stanza_common::RedisConfig) -> RedisResult<Self> {
        Self::new(RedisPoolConfig::from(config))
    }

    /// Get a connection from the pool
    pub async fn get(&self) -> RedisResult<deadpool_redis::Connection> {
        self.pool.get().await.map_err(RedisPoolError::GetConnection)
    }

    /// Check if the pool is healthy by pinging Redis
    pub async fn health_check(&self) -> RedisResult<()> {
        let mut conn = self.get().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // String values
    // ------------------------------------------------------------------------

    /// Store a JSON value under `key`
    pub async fn set<V: Serialize>(&self, key: &str, value: &V) -> RedisResult<()> {
        let mut conn = self.get().await?;
        let serialized = serde_json::to_string(value)?;
        conn.set::<_, _, ()>(key, &serialized).await?;
        Ok(())
    }

    /// Get a JSON value by key
    pub async fn get_value<V: DeserializeOwned>(&self, key: &str) -> RedisResult<Option<V>> {
        let mut conn = self.get().await?;
        let value: Option<String> = conn.get(key).await?;

        match value {
            Some(v) => Ok(Some(serde_json::from_str(&v)?)),
            None => Ok(None),
        }
    }

    // ------------------------------------------------------------------------
    // Hash values
    // ------------------------------------------------------------------------

    /// Store a JSON value in field `field` of hash `key`
    pub async fn hset<V: Serialize>(&self, key: &str, field: &str, value: &V) -> RedisResult<()> {
        let mut conn = self.get().await?;
        let serialized = serde_json::to_string(value)?;
        conn.hset::<_, _, _, ()>(key, field, &serialized).await?;
        Ok(())
    }

    /// Get one JSON field of a hash
    pub async fn hget<V: DeserializeOwned>(&self, key: &str, field: &str) -> RedisResult<Option<V>> {
        let mut conn = self.get().await?;
        let value: Option<String> = conn.hget(key, field).await?;

        match value {
            Some(v) => Ok(Some(serde_json::from_str(&v)?)),
            None => Ok(None),
        }
    }

    /// Get every JSON value of a hash
    pub async fn hvals<V: DeserializeOwned>(&self, key: &str) -> RedisResult<Vec<V>> {
        let mut conn = self.get().await?;
        let values: Vec<String> = conn.hvals(key).await?;

        values
            .iter()
            .map(|v| serde_json::from_str(v).map_err(RedisPoolError::from))
            .collect()
    }

    /// Remove one field of a hash
    pub async fn hdel(&self, key: &str, field: &str) -> RedisResult<bool> {
        let mut conn = self.get().await?;
        let deleted: i32 = conn.hdel(key, field).await?;
        Ok(deleted > 0)
    }

    // ------------------------------------------------------------------------
    // Pipelines
    // ------------------------------------------------------------------------

    /// Execute a pipeline, typically built with `atomic()` for `MULTI`/`EXEC`
    pub async fn execute(&self, pipe: &redis::Pipeline) -> RedisResult<()> {
        let mut conn = self.get().await?;
        pipe.query_async::<()>(&mut conn).await?;
        Ok(())
    }
}

//! # stanza-cache
//!
//! Redis-backed storage for cluster session state and key-value data.
//!
//! ## Features
//!
//! - **Connection Pool**: Managed Redis connection pool with deadpool
//! - **Resource Manager**: Bound resources of every user, shared cluster-wide
//! - **Repository**: Last activity and rosters stored as JSON values, with
//!   transactions committed as one atomic `MULTI`/`EXEC` pipeline
//!
//! Upload slots need generated ids and are not stored in Redis; those
//! operations report an unsupported error.
//!
//! ## Example
//!
//! ```ignore
//! use stanza_cache::{RedisPool, RedisPoolConfig, RedisRepository, RedisResourceManager};
//!
//! let pool = RedisPool::new(RedisPoolConfig::default())?;
//! let resources = RedisResourceManager::new(pool.clone());
//! let repository = RedisRepository::new(pool);
//!
//! let online = resources.get_resources("noelia").await?;
//! let last = repository.fetch_last("noelia").await?;
//! ```

pub mod pool;
pub mod repository;
pub mod resources;

// Re-export pool types
pub use pool::{RedisPool, RedisPoolConfig, RedisPoolError, RedisResult};

// Re-export stores
pub use repository::{RedisRepository, RedisTransaction};
pub use resources::RedisResourceManager;

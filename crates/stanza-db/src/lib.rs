//! # stanza-db
//!
//! Database layer implementing repository traits with PostgreSQL via SQLx.
//!
//! ## Overview
//!
//! This crate provides PostgreSQL implementations for the repository traits
//! defined in `stanza-core`. It handles:
//!
//! - Connection pool management and schema migration
//! - Database models with SQLx `FromRow` derives
//! - Entity ↔ Model mappers
//! - Repository implementations, including transactional execution
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stanza_db::{create_pool, run_migrations, DatabaseConfig, PgRepository};
//! use stanza_core::LastRepository;
//!
//! async fn example(config: &stanza_common::DatabaseConfig) -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::from(config);
//!     let pool = create_pool(&config).await?;
//!     run_migrations(&pool).await?;
//!     let repo = PgRepository::new(pool);
//!
//!     let last = repo.fetch_last("noelia").await?;
//!     Ok(())
//! }
//! ```

pub mod mappers;
pub mod models;
pub mod pool;
pub mod repositories;

// Re-export commonly used types
pub use pool::{create_pool, run_migrations, DatabaseConfig, PgPool};
pub use repositories::{
    PgLastRepository, PgRepository, PgRosterRepository, PgTransaction, PgUploadSlotRepository,
};

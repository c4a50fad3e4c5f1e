//! Storage backends owned by the service layer
//!
//! The relational and key-value backends live in `stanza-db` and
//! `stanza-cache`; this module adds the in-memory backend and the metrics
//! decorator any backend can be wrapped in.

mod measured;
mod memory;

pub use measured::{MeasuredRepository, StorageMetrics};
pub use memory::{MemoryRepository, MemoryResourceManager};

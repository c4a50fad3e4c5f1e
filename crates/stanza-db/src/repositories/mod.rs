//! Repository implementations
//!
//! PostgreSQL implementations of the repository traits defined in stanza-core.
//! Each entity repository owns the queries of one table; `PgRepository`
//! aggregates them and adds transactional execution.

mod error;
mod last;
mod repository;
mod roster;
mod upload_slot;

pub use last::PgLastRepository;
pub use repository::{PgRepository, PgTransaction};
pub use roster::PgRosterRepository;
pub use upload_slot::PgUploadSlotRepository;

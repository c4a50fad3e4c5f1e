//! Ports - interfaces the pipeline depends on, implemented by infrastructure crates

mod ports;
mod repositories;

pub use ports::{ResourceManager, Router};
pub use repositories::{
    tx_fn, LastRepository, RepoResult, Repository, RosterRepository, Transaction, TxFn,
    UploadSlotRepository,
};

//! Integration test utilities for the stanza server
//!
//! This crate provides helpers for running end-to-end scenarios through the
//! full pipeline: bound sessions, the dispatcher, modules, and the HTTP
//! listener.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;

pub use fixtures::*;
pub use helpers::*;

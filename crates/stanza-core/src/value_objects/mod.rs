//! Value objects - immutable addressing types

mod hosts;
mod jid;

pub use hosts::Hosts;
pub use jid::{Jid, JidError};

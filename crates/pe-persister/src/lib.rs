//! Writes collected [`pe_core::model::Item`]s into the relational schema,
//! two phases per run with confidence-gated field merging (§4.9).

pub mod cache;
mod handlers;
pub mod merge;
mod persister;
pub mod resolve;
pub mod stats;

pub use persister::Persister;
pub use stats::{Outcome, PersistStats};

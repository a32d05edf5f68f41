//! Core data models, database schema, and shared utilities for the PE
//! alternative-data collection pipeline. This crate is the foundation layer
//! that `pe-http`, `pe-collectors`, `pe-orchestrator`, and `pe-persister`
//! all depend on.

pub mod config;
pub mod database;
pub mod error;
pub mod model;
pub mod models;
pub mod schema;

pub mod test_utils;

// Re-export commonly used types
pub use config::Settings;
pub use database::{create_pool, run_migrations, DatabasePool};
pub use error::{AppError, AppResult};

// Re-export all models for convenience
pub use models::*;

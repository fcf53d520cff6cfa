//! Persistence layer for the catalog backend.
//!
//! This crate contains:
//! - Database connection management and migrations
//! - Entity definitions (database row mappings)
//! - The PostgreSQL-backed idempotency store

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;

pub use db::{create_pool, DatabaseConfig, MIGRATOR};
pub use repositories::PgIdempotencyStore;

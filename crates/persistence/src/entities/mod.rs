//! Entity definitions (database row mappings).

pub mod idempotency_key;

pub use idempotency_key::IdempotencyRecordEntity;

//! Domain layer for the catalog backend.
//!
//! This crate contains:
//! - Domain models (catalog item versions, pricing entries, idempotency records)
//! - Business logic services (versioning, pricing, idempotency, validation)
//! - Storage seams and their in-memory implementations
//! - Domain error types

pub mod error;
pub mod models;
pub mod services;

pub use error::{DomainError, FieldViolation};

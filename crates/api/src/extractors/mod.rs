//! Custom Axum extractors.
//!
//! Extractors for parsing and validating request data.

pub mod idempotency_key;

pub use idempotency_key::{
    OptionalIdempotencyKey, ALT_IDEMPOTENCY_KEY_HEADER, IDEMPOTENCY_KEY_HEADER,
};

//! Catalog API library.
//!
//! Configuration, logging, the signed remote-store client and the
//! [`services::CatalogService`] entry point. HTTP routing lives with the
//! embedding application; [`error::ApiError`] and the idempotency-key
//! extractor are its adapter surface.

pub mod app;
pub mod config;
pub mod error;
pub mod extractors;
pub mod jobs;
pub mod logging;
pub mod remote;
pub mod services;

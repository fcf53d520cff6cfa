//! Shared utilities and common types for the catalog backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Cryptographic utilities (hashing, request signing, token generation)
//! - Common field validation logic
//! - Page/limit pagination math

pub mod crypto;
pub mod pagination;
pub mod validation;

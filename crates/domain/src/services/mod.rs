//! Domain services for the catalog.
//!
//! Services contain business logic that operates on domain models.

pub mod idempotency;
pub mod memory_store;
pub mod pricing;
pub mod store;
pub mod type_cache;
pub mod validation;
pub mod versioning;

pub use idempotency::{
    IdempotencyCoordinator, IdempotencyPolicy, IdempotencyStore, InMemoryIdempotencyStore,
    MissingKeyPolicy, PayloadMismatchPolicy,
};
pub use memory_store::InMemoryCatalogStore;
pub use pricing::PricingManager;
pub use store::{CatalogStore, LineagePricing};
pub use type_cache::TypeLookupCache;
pub use versioning::VersioningEngine;

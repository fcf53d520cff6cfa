//! Persistence seam for catalog lineages and their pricing.
//!
//! The authoritative store is remote and transactional; the engine only
//! talks to it through [`CatalogStore`], so tests and single-process
//! deployments can swap in [`super::InMemoryCatalogStore`].

use uuid::Uuid;

use crate::error::DomainError;
use crate::models::{
    CatalogItemVersion, ItemPage, ItemType, ListItemsQuery, PriceType, PricingEntry,
    RequestContext,
};

/// Pricing set of one current version, used for tenant statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct LineagePricing {
    pub lineage_id: Uuid,
    pub version_id: Uuid,
    pub entries: Vec<PricingEntry>,
}

#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Current versions matching the filters, scoped to the caller's tenant and environment.
    async fn list_current(
        &self,
        ctx: &RequestContext,
        query: &ListItemsQuery,
    ) -> Result<ItemPage, DomainError>;

    /// The current version of a lineage, whether or not it is soft-deleted.
    async fn current_version(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
    ) -> Result<Option<CatalogItemVersion>, DomainError>;

    /// Every version of a lineage ordered by `version_number` ascending.
    async fn versions(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
    ) -> Result<Vec<CatalogItemVersion>, DomainError>;

    /// Persists version 1 of a new lineage.
    async fn insert_lineage(
        &self,
        ctx: &RequestContext,
        version: CatalogItemVersion,
    ) -> Result<CatalogItemVersion, DomainError>;

    /// Appends `version` as the new current version.
    ///
    /// Fails with a retryable conflict when the lineage's current version is no
    /// longer `expected_current`. On success the previous version is no longer
    /// current and its `replaced_by_id` points at the new one.
    async fn commit_version(
        &self,
        ctx: &RequestContext,
        expected_current: Uuid,
        version: CatalogItemVersion,
    ) -> Result<CatalogItemVersion, DomainError>;

    /// Flips the soft-delete flag of the current version in place.
    async fn set_active(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
        version_id: Uuid,
        is_active: bool,
    ) -> Result<CatalogItemVersion, DomainError>;

    /// Inserts or replaces entries by (currency, price_type); returns the full resulting set.
    async fn upsert_pricing(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
        owner_version_id: Uuid,
        entries: Vec<PricingEntry>,
    ) -> Result<Vec<PricingEntry>, DomainError>;

    /// Replaces one existing entry.
    async fn replace_pricing_entry(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
        entry: PricingEntry,
    ) -> Result<PricingEntry, DomainError>;

    /// Removes one entry. Returns `false` when it was already absent.
    async fn delete_pricing_entry(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
        owner_version_id: Uuid,
        currency: &str,
        price_type: PriceType,
    ) -> Result<bool, DomainError>;

    /// Pricing of every active current version in the tenant.
    async fn current_pricing(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<LineagePricing>, DomainError>;

    /// Item types the tenant is allowed to create.
    async fn allowed_item_types(&self, ctx: &RequestContext)
        -> Result<Vec<ItemType>, DomainError>;
}

//! Catalog service.
//!
//! Inbound entry point for catalog and pricing operations. Each mutation
//! runs as one pipeline: validate, claim the idempotency key, mutate through
//! the store, record the outcome.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::debug;
use uuid::Uuid;

use domain::models::{
    Ack, CatalogItemDraft, CatalogItemVersion, CurrencyPricingUpdate, ItemPage, ListItemsQuery,
    Mutation, OperationKind, PriceType, PricingEntry, PricingInput, PricingSummary,
    PricingUpsertResult, RequestContext, TenantCurrencies, UpdateItemRequest,
    UpsertPricingRequest, ValidationResult, VersionHistory,
};
use domain::services::{pricing, validation};
use domain::services::{
    CatalogStore, IdempotencyCoordinator, PricingManager, TypeLookupCache, VersioningEngine,
};
use domain::DomainError;

pub struct CatalogService {
    engine: VersioningEngine,
    pricing: PricingManager,
    idempotency: IdempotencyCoordinator,
}

/// Counts replays so operators can see how often callers retry.
fn track<T>(
    operation: OperationKind,
    result: Result<Mutation<T>, DomainError>,
) -> Result<Mutation<T>, DomainError> {
    if let Ok(mutation) = &result {
        if mutation.replayed {
            counter!("idempotency_replays_total", "operation" => operation.as_str()).increment(1);
            debug!(operation = %operation, "Served mutation from idempotency cache");
        }
    }
    result
}

impl CatalogService {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        idempotency: IdempotencyCoordinator,
        type_lookup_ttl: Duration,
    ) -> Self {
        let types = Arc::new(TypeLookupCache::new(store.clone(), type_lookup_ttl));
        Self {
            engine: VersioningEngine::new(store.clone(), types),
            pricing: PricingManager::new(store),
            idempotency,
        }
    }

    pub fn idempotency(&self) -> &IdempotencyCoordinator {
        &self.idempotency
    }

    // ---- Reads ----

    pub async fn list_items(
        &self,
        ctx: &RequestContext,
        query: &ListItemsQuery,
    ) -> Result<ItemPage, DomainError> {
        self.engine.list(ctx, query).await
    }

    pub async fn get_item(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
    ) -> Result<CatalogItemVersion, DomainError> {
        self.engine.get(ctx, lineage_id).await
    }

    pub async fn get_item_version(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
        version_number: i32,
    ) -> Result<CatalogItemVersion, DomainError> {
        self.engine.get_version(ctx, lineage_id, version_number).await
    }

    pub async fn get_history(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
    ) -> Result<VersionHistory, DomainError> {
        self.engine.history(ctx, lineage_id).await
    }

    pub async fn list_tenant_currencies(
        &self,
        ctx: &RequestContext,
    ) -> Result<TenantCurrencies, DomainError> {
        self.pricing.tenant_currencies(ctx).await
    }

    /// Summary of the current version's pricing.
    pub async fn item_pricing_summary(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
    ) -> Result<PricingSummary, DomainError> {
        let current = self.engine.get(ctx, lineage_id).await?;
        Ok(pricing::summarize(&current.pricing))
    }

    // ---- Pure helpers ----

    pub fn validate_pricing(&self, entries: &[PricingInput]) -> ValidationResult {
        pricing::validate(entries)
    }

    pub fn summarize_pricing(&self, entries: &[PricingEntry]) -> PricingSummary {
        pricing::summarize(entries)
    }

    // ---- Mutations ----

    pub async fn create_item(
        &self,
        ctx: &RequestContext,
        draft: &CatalogItemDraft,
    ) -> Result<Mutation<CatalogItemVersion>, DomainError> {
        self.engine.validate_draft(ctx, draft).await?;

        let result = self
            .idempotency
            .execute(ctx, OperationKind::CreateItem, draft, |bound| async move {
                self.engine.create(&bound, draft).await
            })
            .await;
        track(OperationKind::CreateItem, result)
    }

    pub async fn update_item(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
        request: &UpdateItemRequest,
    ) -> Result<Mutation<CatalogItemVersion>, DomainError> {
        validation::validate_update(request)?;

        let result = self
            .idempotency
            .execute(
                ctx,
                OperationKind::UpdateItem,
                &(lineage_id, request),
                |bound| async move { self.engine.update(&bound, lineage_id, request).await },
            )
            .await;
        track(OperationKind::UpdateItem, result)
    }

    pub async fn delete_item(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
    ) -> Result<Mutation<Ack>, DomainError> {
        let result = self
            .idempotency
            .execute(ctx, OperationKind::DeleteItem, &lineage_id, |bound| async move {
                self.engine.soft_delete(&bound, lineage_id).await
            })
            .await;
        track(OperationKind::DeleteItem, result)
    }

    pub async fn restore_item(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
    ) -> Result<Mutation<CatalogItemVersion>, DomainError> {
        let result = self
            .idempotency
            .execute(ctx, OperationKind::RestoreItem, &lineage_id, |bound| async move {
                self.engine.restore(&bound, lineage_id).await
            })
            .await;
        track(OperationKind::RestoreItem, result)
    }

    pub async fn upsert_pricing(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
        request: &UpsertPricingRequest,
    ) -> Result<Mutation<PricingUpsertResult>, DomainError> {
        let violations = pricing::pricing_violations(&request.to_inputs(), "currencies");
        if !violations.is_empty() {
            return Err(DomainError::Validation(violations));
        }

        let result = self
            .idempotency
            .execute(
                ctx,
                OperationKind::UpsertPricing,
                &(lineage_id, request),
                |bound| async move { self.pricing.upsert(&bound, lineage_id, request).await },
            )
            .await;
        track(OperationKind::UpsertPricing, result)
    }

    pub async fn update_currency_pricing(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
        currency: &str,
        update: &CurrencyPricingUpdate,
    ) -> Result<Mutation<PricingEntry>, DomainError> {
        let result = self
            .idempotency
            .execute(
                ctx,
                OperationKind::UpdatePricing,
                &(lineage_id, currency, update),
                |bound| async move {
                    self.pricing
                        .update_one(&bound, lineage_id, currency, update)
                        .await
                },
            )
            .await;
        track(OperationKind::UpdatePricing, result)
    }

    pub async fn delete_currency_pricing(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
        currency: &str,
        price_type: PriceType,
    ) -> Result<Mutation<Ack>, DomainError> {
        let result = self
            .idempotency
            .execute(
                ctx,
                OperationKind::DeletePricing,
                &(lineage_id, currency, price_type),
                |bound| async move {
                    self.pricing
                        .delete_one(&bound, lineage_id, currency, price_type)
                        .await
                },
            )
            .await;
        track(OperationKind::DeletePricing, result)
    }
}

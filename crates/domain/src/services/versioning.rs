//! Catalog versioning engine.
//!
//! Every content update appends a new immutable version to the lineage and
//! moves the current-version pointer; soft delete and restore toggle the
//! `is_active` flag of whichever version is current.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use super::store::CatalogStore;
use super::type_cache::TypeLookupCache;
use super::validation;
use crate::error::DomainError;
use crate::models::{
    Ack, CatalogItemDraft, CatalogItemVersion, ItemPage, ListItemsQuery, PricingEntry,
    RequestContext, UpdateItemRequest, VersionHistory,
};

pub struct VersioningEngine {
    store: Arc<dyn CatalogStore>,
    types: Arc<TypeLookupCache>,
}

fn not_found(lineage_id: Uuid) -> DomainError {
    DomainError::NotFound(format!("Catalog item {} not found", lineage_id))
}

impl VersioningEngine {
    pub fn new(store: Arc<dyn CatalogStore>, types: Arc<TypeLookupCache>) -> Self {
        Self { store, types }
    }

    pub async fn list(
        &self,
        ctx: &RequestContext,
        query: &ListItemsQuery,
    ) -> Result<ItemPage, DomainError> {
        self.store.list_current(ctx, query).await
    }

    /// Current version of a lineage.
    pub async fn get(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
    ) -> Result<CatalogItemVersion, DomainError> {
        self.store
            .current_version(ctx, lineage_id)
            .await?
            .ok_or_else(|| not_found(lineage_id))
    }

    /// Checks a draft against the field rules and the tenant's allowed item types.
    pub async fn validate_draft(
        &self,
        ctx: &RequestContext,
        draft: &CatalogItemDraft,
    ) -> Result<(), DomainError> {
        let allowed = self.types.allowed_types(ctx).await?;
        validation::validate_draft(draft, &allowed)
    }

    /// Allocates a new lineage with version 1.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        draft: &CatalogItemDraft,
    ) -> Result<CatalogItemVersion, DomainError> {
        self.validate_draft(ctx, draft).await?;

        let now = Utc::now();
        let id = Uuid::new_v4();
        let pricing = draft
            .pricing
            .iter()
            .map(|input| PricingEntry::from_input(id, input, now))
            .collect();

        let version = CatalogItemVersion {
            version_id: id,
            lineage_id: id,
            parent_version_id: None,
            tenant_id: ctx.tenant_id,
            version_number: 1,
            is_current_version: true,
            replaced_by_id: None,
            item_type: draft.item_type,
            name: draft.name.trim().to_string(),
            short_description: draft.short_description.clone(),
            description: draft.description.clone(),
            terms: draft.terms.clone(),
            service_parent_id: draft.service_parent_id,
            is_variant: draft.is_variant,
            variant_attributes: draft.variant_attributes.clone(),
            metadata: draft.metadata.clone(),
            specifications: draft.specifications.clone(),
            status: draft.status,
            is_active: true,
            is_live: ctx.is_live,
            version_reason: None,
            pricing,
            created_at: now,
            updated_at: now,
            created_by: ctx.actor_id,
            updated_by: ctx.actor_id,
        };

        let created = self.store.insert_lineage(ctx, version).await?;
        info!(
            tenant_id = %ctx.tenant_id,
            lineage_id = %created.lineage_id,
            item_type = %created.item_type,
            "Catalog item created"
        );
        Ok(created)
    }

    /// Appends a new version built from the current one plus `request.patch`.
    pub async fn update(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
        request: &UpdateItemRequest,
    ) -> Result<CatalogItemVersion, DomainError> {
        validation::validate_update(request)?;

        let current = self.get(ctx, lineage_id).await?;
        let next = next_version(ctx, &current, request);
        validation::validate_merged_variant(next.is_variant, next.service_parent_id.is_some())?;

        let committed = self
            .store
            .commit_version(ctx, current.version_id, next)
            .await?;

        info!(
            tenant_id = %ctx.tenant_id,
            lineage_id = %lineage_id,
            version_number = committed.version_number,
            "Catalog item version created"
        );
        Ok(committed)
    }

    /// Marks the current version inactive. Already-inactive items are left as they are.
    pub async fn soft_delete(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
    ) -> Result<Ack, DomainError> {
        let current = self.get(ctx, lineage_id).await?;
        if !current.is_active {
            debug!(lineage_id = %lineage_id, "Catalog item already inactive");
            return Ok(Ack::ok("Catalog item already deleted"));
        }

        self.store
            .set_active(ctx, lineage_id, current.version_id, false)
            .await?;
        info!(tenant_id = %ctx.tenant_id, lineage_id = %lineage_id, "Catalog item deleted");
        Ok(Ack::ok("Catalog item deleted"))
    }

    pub async fn restore(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
    ) -> Result<CatalogItemVersion, DomainError> {
        let current = self.get(ctx, lineage_id).await?;
        if current.is_active {
            return Err(DomainError::conflict("Catalog item is already active"));
        }

        let restored = self
            .store
            .set_active(ctx, lineage_id, current.version_id, true)
            .await?;
        info!(tenant_id = %ctx.tenant_id, lineage_id = %lineage_id, "Catalog item restored");
        Ok(restored)
    }

    /// All versions ordered by `version_number` ascending.
    pub async fn history(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
    ) -> Result<VersionHistory, DomainError> {
        let versions = self.store.versions(ctx, lineage_id).await?;
        if versions.is_empty() {
            return Err(not_found(lineage_id));
        }

        Ok(VersionHistory {
            lineage_id,
            current_version_id: versions
                .iter()
                .find(|v| v.is_current_version)
                .map(|v| v.version_id),
            versions,
        })
    }

    pub async fn get_version(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
        version_number: i32,
    ) -> Result<CatalogItemVersion, DomainError> {
        self.store
            .versions(ctx, lineage_id)
            .await?
            .into_iter()
            .find(|v| v.version_number == version_number)
            .ok_or_else(|| {
                DomainError::NotFound(format!(
                    "Version {} of catalog item {} not found",
                    version_number, lineage_id
                ))
            })
    }
}

/// Copy of `current` with the patch applied, numbered as its successor.
fn next_version(
    ctx: &RequestContext,
    current: &CatalogItemVersion,
    request: &UpdateItemRequest,
) -> CatalogItemVersion {
    let patch = &request.patch;
    let now = Utc::now();
    let version_id = Uuid::new_v4();

    let pricing = match &patch.pricing {
        Some(inputs) => inputs
            .iter()
            .map(|input| PricingEntry::from_input(version_id, input, now))
            .collect(),
        None => current
            .pricing
            .iter()
            .map(|entry| entry.carried_to(version_id, now))
            .collect(),
    };

    CatalogItemVersion {
        version_id,
        lineage_id: current.lineage_id,
        parent_version_id: Some(current.version_id),
        tenant_id: current.tenant_id,
        version_number: current.version_number + 1,
        is_current_version: true,
        replaced_by_id: None,
        item_type: current.item_type,
        name: patch
            .name
            .as_deref()
            .map(|n| n.trim().to_string())
            .unwrap_or_else(|| current.name.clone()),
        short_description: patch
            .short_description
            .clone()
            .or_else(|| current.short_description.clone()),
        description: patch.description.clone().or_else(|| current.description.clone()),
        terms: patch.terms.clone().or_else(|| current.terms.clone()),
        service_parent_id: patch.service_parent_id.or(current.service_parent_id),
        is_variant: patch.is_variant.unwrap_or(current.is_variant),
        variant_attributes: patch
            .variant_attributes
            .clone()
            .or_else(|| current.variant_attributes.clone()),
        metadata: patch
            .metadata
            .clone()
            .unwrap_or_else(|| current.metadata.clone()),
        specifications: patch
            .specifications
            .clone()
            .unwrap_or_else(|| current.specifications.clone()),
        status: patch.status.unwrap_or(current.status),
        is_active: current.is_active,
        is_live: current.is_live,
        version_reason: request.version_reason.as_deref().map(|r| r.trim().to_string()),
        pricing,
        created_at: now,
        updated_at: now,
        created_by: ctx.actor_id.or(current.created_by),
        updated_by: ctx.actor_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CatalogItemPatch, ItemStatus, ItemType, PricingInput};
    use crate::services::type_cache::DEFAULT_TYPE_LOOKUP_TTL;
    use crate::services::InMemoryCatalogStore;
    use rust_decimal::Decimal;

    fn engine() -> VersioningEngine {
        let store: Arc<dyn CatalogStore> = Arc::new(InMemoryCatalogStore::new());
        let types = Arc::new(TypeLookupCache::new(store.clone(), DEFAULT_TYPE_LOOKUP_TTL));
        VersioningEngine::new(store, types)
    }

    fn ctx() -> RequestContext {
        RequestContext::new(Uuid::new_v4(), "token").with_actor(Uuid::new_v4())
    }

    fn laptop_repair() -> CatalogItemDraft {
        CatalogItemDraft::new(ItemType::Service, "Laptop Repair")
            .with_pricing(vec![PricingInput::new("USD", Decimal::new(4999, 2)).base()])
    }

    fn reason(reason: &str, patch: CatalogItemPatch) -> UpdateItemRequest {
        UpdateItemRequest {
            version_reason: Some(reason.into()),
            patch,
        }
    }

    #[tokio::test]
    async fn test_create_starts_lineage_at_version_one() {
        let engine = engine();
        let ctx = ctx();
        let v1 = engine.create(&ctx, &laptop_repair()).await.unwrap();

        assert_eq!(v1.version_number, 1);
        assert!(v1.is_current_version);
        assert_eq!(v1.lineage_id, v1.version_id);
        assert_eq!(v1.pricing.len(), 1);
        assert!(v1.pricing[0].is_base_currency);
        assert_eq!(v1.pricing[0].owner_version_id, v1.version_id);
        assert_eq!(v1.created_by, ctx.actor_id);
    }

    #[tokio::test]
    async fn test_update_appends_successor() {
        let engine = engine();
        let ctx = ctx();
        let v1 = engine.create(&ctx, &laptop_repair()).await.unwrap();

        let v2 = engine
            .update(
                &ctx,
                v1.lineage_id,
                &reason(
                    "price change",
                    CatalogItemPatch {
                        pricing: Some(vec![PricingInput::new("USD", Decimal::new(5999, 2))]),
                        ..Default::default()
                    },
                ),
            )
            .await
            .unwrap();

        assert_eq!(v2.version_number, 2);
        assert_eq!(v2.parent_version_id, Some(v1.version_id));
        assert_eq!(v2.name, "Laptop Repair");
        assert_eq!(v2.pricing[0].price, Decimal::new(5999, 2));
        assert_eq!(v2.version_reason.as_deref(), Some("price change"));

        let history = engine.history(&ctx, v1.lineage_id).await.unwrap();
        assert_eq!(history.versions.len(), 2);
        assert!(!history.versions[0].is_current_version);
        assert_eq!(history.versions[0].replaced_by_id, Some(v2.version_id));
        assert_eq!(history.current_version_id, Some(v2.version_id));
    }

    #[tokio::test]
    async fn test_update_without_pricing_carries_entries() {
        let engine = engine();
        let ctx = ctx();
        let v1 = engine.create(&ctx, &laptop_repair()).await.unwrap();
        let v2 = engine
            .update(
                &ctx,
                v1.lineage_id,
                &reason(
                    "draft again",
                    CatalogItemPatch {
                        status: Some(ItemStatus::Draft),
                        ..Default::default()
                    },
                ),
            )
            .await
            .unwrap();

        assert_eq!(v2.status, ItemStatus::Draft);
        assert_eq!(v2.pricing.len(), 1);
        assert_eq!(v2.pricing[0].owner_version_id, v2.version_id);
        assert_eq!(v2.pricing[0].price, v1.pricing[0].price);
    }

    #[tokio::test]
    async fn test_update_missing_lineage_is_not_found() {
        let engine = engine();
        let err = engine
            .update(
                &ctx(),
                Uuid::new_v4(),
                &reason(
                    "rename",
                    CatalogItemPatch {
                        name: Some("x".into()),
                        ..Default::default()
                    },
                ),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[tokio::test]
    async fn test_update_cannot_orphan_a_variant() {
        let engine = engine();
        let ctx = ctx();
        let v1 = engine.create(&ctx, &laptop_repair()).await.unwrap();
        let err = engine
            .update(
                &ctx,
                v1.lineage_id,
                &reason(
                    "make variant",
                    CatalogItemPatch {
                        is_variant: Some(true),
                        ..Default::default()
                    },
                ),
            )
            .await
            .unwrap_err();
        assert_eq!(err.violations()[0].field, "service_parent_id");
    }

    #[tokio::test]
    async fn test_soft_delete_is_idempotent_and_restore_conflicts_when_active() {
        let engine = engine();
        let ctx = ctx();
        let v1 = engine.create(&ctx, &laptop_repair()).await.unwrap();

        let err = engine.restore(&ctx, v1.lineage_id).await.unwrap_err();
        assert_eq!(err.code(), "conflict");

        assert!(engine.soft_delete(&ctx, v1.lineage_id).await.unwrap().success);
        assert!(engine.soft_delete(&ctx, v1.lineage_id).await.unwrap().success);

        let history = engine.history(&ctx, v1.lineage_id).await.unwrap();
        assert_eq!(history.versions.len(), 1);

        let restored = engine.restore(&ctx, v1.lineage_id).await.unwrap();
        assert!(restored.is_active);
        assert_eq!(restored.version_id, v1.version_id);
    }

    #[tokio::test]
    async fn test_get_version_by_number() {
        let engine = engine();
        let ctx = ctx();
        let v1 = engine.create(&ctx, &laptop_repair()).await.unwrap();
        engine
            .update(
                &ctx,
                v1.lineage_id,
                &reason(
                    "rename",
                    CatalogItemPatch {
                        name: Some("Laptop Repair Plus".into()),
                        ..Default::default()
                    },
                ),
            )
            .await
            .unwrap();

        let first = engine.get_version(&ctx, v1.lineage_id, 1).await.unwrap();
        assert_eq!(first.name, "Laptop Repair");
        assert!(first.is_superseded());
        assert!(engine.get_version(&ctx, v1.lineage_id, 3).await.is_err());
    }
}

//! In-process [`CatalogStore`] for tests and single-process deployments.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use shared::pagination::{PageRequest, Pagination};

use super::pricing::check_pricing_set;
use super::store::{CatalogStore, LineagePricing};
use crate::error::DomainError;
use crate::models::{
    CatalogItemVersion, ItemPage, ItemType, ListItemsQuery, PriceType, PricingEntry,
    RequestContext, SortField, SortOrder,
};

/// Append-only version log of one lineage plus its current-version index.
#[derive(Debug)]
struct Lineage {
    tenant_id: Uuid,
    is_live: bool,
    versions: BTreeMap<i32, CatalogItemVersion>,
    current: Option<i32>,
}

impl Lineage {
    fn current(&self) -> Option<&CatalogItemVersion> {
        self.current.and_then(|n| self.versions.get(&n))
    }

    fn current_mut(&mut self) -> Option<&mut CatalogItemVersion> {
        match self.current {
            Some(n) => self.versions.get_mut(&n),
            None => None,
        }
    }

    fn visible_to(&self, ctx: &RequestContext) -> bool {
        self.tenant_id == ctx.tenant_id && self.is_live == ctx.is_live
    }
}

/// Versions keyed by `(lineage_id, version_number)` behind a single lock.
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    lineages: RwLock<HashMap<Uuid, Lineage>>,
    allowed_types: RwLock<HashMap<Uuid, Vec<ItemType>>>,
    type_lookups: AtomicUsize,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the item types a tenant may create. Tenants without an entry may create any type.
    pub async fn set_allowed_item_types(&self, tenant_id: Uuid, types: Vec<ItemType>) {
        self.allowed_types.write().await.insert(tenant_id, types);
    }

    /// Number of `allowed_item_types` lookups served so far.
    pub fn type_lookup_count(&self) -> usize {
        self.type_lookups.load(AtomicOrdering::Relaxed)
    }

    fn not_found(lineage_id: Uuid) -> DomainError {
        DomainError::NotFound(format!("Catalog item {} not found", lineage_id))
    }

    fn moved() -> DomainError {
        DomainError::retryable_conflict("Current version changed; reload the item and retry")
    }
}

fn matches_filters(version: &CatalogItemVersion, query: &ListItemsQuery) -> bool {
    if !query.include_inactive && !version.is_active {
        return false;
    }
    if let Some(item_type) = query.item_type {
        if version.item_type != item_type {
            return false;
        }
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let needle = search.to_lowercase();
        let in_name = version.name.to_lowercase().contains(&needle);
        let in_short = version
            .short_description
            .as_deref()
            .map(|s| s.to_lowercase().contains(&needle))
            .unwrap_or(false);
        if !in_name && !in_short {
            return false;
        }
    }
    true
}

fn compare(a: &CatalogItemVersion, b: &CatalogItemVersion, field: SortField) -> Ordering {
    match field {
        SortField::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortField::VersionNumber => a.version_number.cmp(&b.version_number),
    }
}

#[async_trait::async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn list_current(
        &self,
        ctx: &RequestContext,
        query: &ListItemsQuery,
    ) -> Result<ItemPage, DomainError> {
        let lineages = self.lineages.read().await;
        let mut items: Vec<CatalogItemVersion> = lineages
            .values()
            .filter(|l| l.visible_to(ctx))
            .filter_map(|l| l.current())
            .filter(|v| matches_filters(v, query))
            .cloned()
            .collect();

        items.sort_by(|a, b| {
            let ord = compare(a, b, query.sort_by).then_with(|| a.lineage_id.cmp(&b.lineage_id));
            match query.sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });

        let page = PageRequest::new(query.page, query.limit);
        let total = items.len() as u64;
        let items = items
            .into_iter()
            .skip(page.offset())
            .take(page.limit as usize)
            .collect();

        Ok(ItemPage {
            items,
            pagination: Pagination::new(page, total),
        })
    }

    async fn current_version(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
    ) -> Result<Option<CatalogItemVersion>, DomainError> {
        let lineages = self.lineages.read().await;
        Ok(lineages
            .get(&lineage_id)
            .filter(|l| l.visible_to(ctx))
            .and_then(|l| l.current())
            .cloned())
    }

    async fn versions(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
    ) -> Result<Vec<CatalogItemVersion>, DomainError> {
        let lineages = self.lineages.read().await;
        Ok(lineages
            .get(&lineage_id)
            .filter(|l| l.visible_to(ctx))
            .map(|l| l.versions.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn insert_lineage(
        &self,
        ctx: &RequestContext,
        version: CatalogItemVersion,
    ) -> Result<CatalogItemVersion, DomainError> {
        let mut lineages = self.lineages.write().await;
        if lineages.contains_key(&version.lineage_id) {
            return Err(DomainError::conflict(format!(
                "Catalog item {} already exists",
                version.lineage_id
            )));
        }

        let mut versions = BTreeMap::new();
        versions.insert(version.version_number, version.clone());
        lineages.insert(
            version.lineage_id,
            Lineage {
                tenant_id: ctx.tenant_id,
                is_live: ctx.is_live,
                versions,
                current: Some(version.version_number),
            },
        );
        Ok(version)
    }

    async fn commit_version(
        &self,
        ctx: &RequestContext,
        expected_current: Uuid,
        version: CatalogItemVersion,
    ) -> Result<CatalogItemVersion, DomainError> {
        let mut lineages = self.lineages.write().await;
        let lineage = lineages
            .get_mut(&version.lineage_id)
            .filter(|l| l.visible_to(ctx))
            .ok_or_else(|| Self::not_found(version.lineage_id))?;

        let previous = lineage
            .current_mut()
            .ok_or_else(|| Self::not_found(version.lineage_id))?;
        if previous.version_id != expected_current
            || previous.version_number + 1 != version.version_number
        {
            return Err(Self::moved());
        }

        previous.is_current_version = false;
        previous.replaced_by_id = Some(version.version_id);

        lineage.versions.insert(version.version_number, version.clone());
        lineage.current = Some(version.version_number);
        Ok(version)
    }

    async fn set_active(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
        version_id: Uuid,
        is_active: bool,
    ) -> Result<CatalogItemVersion, DomainError> {
        let mut lineages = self.lineages.write().await;
        let current = lineages
            .get_mut(&lineage_id)
            .filter(|l| l.visible_to(ctx))
            .and_then(|l| l.current_mut())
            .ok_or_else(|| Self::not_found(lineage_id))?;
        if current.version_id != version_id {
            return Err(Self::moved());
        }

        current.is_active = is_active;
        current.updated_at = Utc::now();
        current.updated_by = ctx.actor_id;
        Ok(current.clone())
    }

    async fn upsert_pricing(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
        owner_version_id: Uuid,
        entries: Vec<PricingEntry>,
    ) -> Result<Vec<PricingEntry>, DomainError> {
        let mut lineages = self.lineages.write().await;
        let current = lineages
            .get_mut(&lineage_id)
            .filter(|l| l.visible_to(ctx))
            .and_then(|l| l.current_mut())
            .ok_or_else(|| Self::not_found(lineage_id))?;
        if current.version_id != owner_version_id {
            return Err(Self::moved());
        }

        let mut pricing = current.pricing.clone();
        for entry in entries {
            match pricing
                .iter_mut()
                .find(|e| e.matches(&entry.currency, entry.price_type))
            {
                Some(existing) => *existing = entry,
                None => pricing.push(entry),
            }
        }
        check_pricing_set(&pricing)?;

        current.pricing = pricing;
        Ok(current.pricing.clone())
    }

    async fn replace_pricing_entry(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
        entry: PricingEntry,
    ) -> Result<PricingEntry, DomainError> {
        let mut lineages = self.lineages.write().await;
        let current = lineages
            .get_mut(&lineage_id)
            .filter(|l| l.visible_to(ctx))
            .and_then(|l| l.current_mut())
            .ok_or_else(|| Self::not_found(lineage_id))?;
        if current.version_id != entry.owner_version_id {
            return Err(Self::moved());
        }

        let mut pricing = current.pricing.clone();
        let slot = pricing
            .iter_mut()
            .find(|e| e.id == entry.id)
            .ok_or_else(|| {
                DomainError::NotFound(format!(
                    "Pricing for {} ({}) not found",
                    entry.currency, entry.price_type
                ))
            })?;
        *slot = entry.clone();
        check_pricing_set(&pricing)?;

        current.pricing = pricing;
        Ok(entry)
    }

    async fn delete_pricing_entry(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
        owner_version_id: Uuid,
        currency: &str,
        price_type: PriceType,
    ) -> Result<bool, DomainError> {
        let mut lineages = self.lineages.write().await;
        let current = lineages
            .get_mut(&lineage_id)
            .filter(|l| l.visible_to(ctx))
            .and_then(|l| l.current_mut())
            .ok_or_else(|| Self::not_found(lineage_id))?;
        if current.version_id != owner_version_id {
            return Err(Self::moved());
        }

        let before = current.pricing.len();
        current.pricing.retain(|e| !e.matches(currency, price_type));
        Ok(current.pricing.len() != before)
    }

    async fn current_pricing(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<LineagePricing>, DomainError> {
        let lineages = self.lineages.read().await;
        Ok(lineages
            .values()
            .filter(|l| l.visible_to(ctx))
            .filter_map(|l| l.current())
            .filter(|v| v.is_active)
            .map(|v| LineagePricing {
                lineage_id: v.lineage_id,
                version_id: v.version_id,
                entries: v.pricing.clone(),
            })
            .collect())
    }

    async fn allowed_item_types(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<ItemType>, DomainError> {
        self.type_lookups.fetch_add(1, AtomicOrdering::Relaxed);
        Ok(self
            .allowed_types
            .read()
            .await
            .get(&ctx.tenant_id)
            .cloned()
            .unwrap_or_else(|| ItemType::ALL.to_vec()))
    }
}

//! [`CatalogStore`] backed by the remote transactional store.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use domain::models::{
    CatalogItemVersion, ItemPage, ItemType, ListItemsQuery, PriceType, PricingEntry,
    RequestContext,
};
use domain::services::{CatalogStore, LineagePricing};
use domain::DomainError;
use shared::pagination::{PageRequest, Pagination};

use super::client::{decode_data, Method, SignedClient};
use super::mapping;
use super::wire::{
    CommitVersionRequest, PricingUpsertBody, StatusChangeBody, WireCatalogItem,
    WireLineagePricing, WirePricing, WireResourceType,
};

pub struct RemoteCatalogStore {
    client: SignedClient,
}

#[derive(Debug, Deserialize)]
struct DeleteOutcome {
    #[serde(default)]
    deleted: bool,
}

fn item_path(lineage_id: Uuid) -> String {
    format!("/items/{}", lineage_id)
}

fn list_params(query: &ListItemsQuery, page: PageRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("page".to_string(), page.page.to_string()),
        ("limit".to_string(), page.limit.to_string()),
        (
            "sort_by".to_string(),
            mapping::sort_field_to_wire(query.sort_by).to_string(),
        ),
        (
            "sort_order".to_string(),
            mapping::sort_order_to_wire(query.sort_order).to_string(),
        ),
        (
            "include_inactive".to_string(),
            query.include_inactive.to_string(),
        ),
    ];
    if let Some(item_type) = query.item_type {
        params.push((
            "resource_type_id".to_string(),
            mapping::item_type_to_wire(item_type).to_string(),
        ));
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        params.push(("search".to_string(), search.to_string()));
    }
    params
}

impl RemoteCatalogStore {
    pub fn new(client: SignedClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CatalogStore for RemoteCatalogStore {
    async fn list_current(
        &self,
        ctx: &RequestContext,
        query: &ListItemsQuery,
    ) -> Result<ItemPage, DomainError> {
        let page = PageRequest::new(query.page, query.limit);
        let envelope = self
            .client
            .call(ctx, Method::Get, "/items", list_params(query, page), None)
            .await?;

        let pagination = envelope.pagination;
        let items: Vec<WireCatalogItem> = decode_data(envelope)?;
        let pagination = match pagination {
            Some(p) => Pagination::from(p),
            None => Pagination::new(page, items.len() as u64),
        };

        Ok(ItemPage {
            items: items.into_iter().map(WireCatalogItem::into_domain).collect(),
            pagination,
        })
    }

    async fn current_version(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
    ) -> Result<Option<CatalogItemVersion>, DomainError> {
        match self
            .client
            .get::<WireCatalogItem>(ctx, &item_path(lineage_id), Vec::new())
            .await
        {
            Ok(item) => Ok(Some(item.into_domain())),
            Err(DomainError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn versions(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
    ) -> Result<Vec<CatalogItemVersion>, DomainError> {
        let path = format!("{}/history", item_path(lineage_id));
        let items = match self.client.get::<Vec<WireCatalogItem>>(ctx, &path, Vec::new()).await {
            Ok(items) => items,
            Err(DomainError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut versions: Vec<_> = items.into_iter().map(WireCatalogItem::into_domain).collect();
        versions.sort_by_key(|v| v.version_number);
        Ok(versions)
    }

    async fn insert_lineage(
        &self,
        ctx: &RequestContext,
        version: CatalogItemVersion,
    ) -> Result<CatalogItemVersion, DomainError> {
        let body = WireCatalogItem::from_domain(&version);
        let created: WireCatalogItem = self
            .client
            .send(ctx, Method::Post, "/items", Some(&body))
            .await?;
        Ok(created.into_domain())
    }

    async fn commit_version(
        &self,
        ctx: &RequestContext,
        expected_current: Uuid,
        version: CatalogItemVersion,
    ) -> Result<CatalogItemVersion, DomainError> {
        let body = CommitVersionRequest {
            expected_current_version_id: expected_current,
            version: WireCatalogItem::from_domain(&version),
        };
        let committed: WireCatalogItem = self
            .client
            .send(ctx, Method::Put, &item_path(version.lineage_id), Some(&body))
            .await?;
        Ok(committed.into_domain())
    }

    async fn set_active(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
        version_id: Uuid,
        is_active: bool,
    ) -> Result<CatalogItemVersion, DomainError> {
        let body = StatusChangeBody {
            version_id,
            is_active,
        };
        let (method, path) = if is_active {
            (Method::Post, format!("{}/restore", item_path(lineage_id)))
        } else {
            (Method::Delete, item_path(lineage_id))
        };
        let item: WireCatalogItem = self.client.send(ctx, method, &path, Some(&body)).await?;
        Ok(item.into_domain())
    }

    async fn upsert_pricing(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
        owner_version_id: Uuid,
        entries: Vec<PricingEntry>,
    ) -> Result<Vec<PricingEntry>, DomainError> {
        let body = PricingUpsertBody {
            catalog_item_id: owner_version_id,
            pricing: entries.iter().map(WirePricing::from_domain).collect(),
        };
        let path = format!("{}/pricing", item_path(lineage_id));
        let pricing: Vec<WirePricing> = self
            .client
            .send(ctx, Method::Post, &path, Some(&body))
            .await?;
        Ok(pricing.into_iter().map(WirePricing::into_domain).collect())
    }

    async fn replace_pricing_entry(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
        entry: PricingEntry,
    ) -> Result<PricingEntry, DomainError> {
        let path = format!("{}/pricing/{}", item_path(lineage_id), entry.id);
        let body = WirePricing::from_domain(&entry);
        let updated: WirePricing = self
            .client
            .send(ctx, Method::Put, &path, Some(&body))
            .await?;
        Ok(updated.into_domain())
    }

    async fn delete_pricing_entry(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
        owner_version_id: Uuid,
        currency: &str,
        price_type: PriceType,
    ) -> Result<bool, DomainError> {
        let path = format!("{}/pricing", item_path(lineage_id));
        let query = vec![
            ("catalog_item_id".to_string(), owner_version_id.to_string()),
            ("currency".to_string(), currency.to_string()),
            (
                "price_type".to_string(),
                mapping::price_type_to_wire(price_type).to_string(),
            ),
        ];

        match self.client.call(ctx, Method::Delete, &path, query, None).await {
            Ok(envelope) => {
                let outcome: Option<DeleteOutcome> = decode_data(envelope)?;
                Ok(outcome.map(|o| o.deleted).unwrap_or(true))
            }
            Err(DomainError::NotFound(_)) => {
                debug!(lineage_id = %lineage_id, currency = %currency, "Remote pricing entry already absent");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn current_pricing(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<LineagePricing>, DomainError> {
        let sets: Vec<WireLineagePricing> = self.client.get(ctx, "/pricing", Vec::new()).await?;
        Ok(sets
            .into_iter()
            .map(|set| LineagePricing {
                lineage_id: set.original_item_id,
                version_id: set.catalog_item_id,
                entries: set.pricing.into_iter().map(WirePricing::into_domain).collect(),
            })
            .collect())
    }

    async fn allowed_item_types(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<ItemType>, DomainError> {
        let types: Vec<WireResourceType> =
            self.client.get(ctx, "/resource-types", Vec::new()).await?;

        let mut allowed = Vec::new();
        for t in &types {
            match t.item_type() {
                Some(item_type) if !allowed.contains(&item_type) => allowed.push(item_type),
                Some(_) => {}
                None => debug!(resource_type_id = t.id, name = ?t.name, "Skipping unknown resource type"),
            }
        }
        Ok(allowed)
    }
}

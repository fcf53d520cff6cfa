//! Short-lived per-tenant cache of allowed item types.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

use super::store::CatalogStore;
use crate::error::DomainError;
use crate::models::{ItemType, RequestContext};

/// Default time-to-live for a cached lookup.
pub const DEFAULT_TYPE_LOOKUP_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct CachedTypes {
    types: Vec<ItemType>,
    loaded_at: Instant,
}

pub struct TypeLookupCache {
    store: Arc<dyn CatalogStore>,
    ttl: Duration,
    entries: RwLock<HashMap<Uuid, CachedTypes>>,
}

impl TypeLookupCache {
    pub fn new(store: Arc<dyn CatalogStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Allowed item types for the caller's tenant, loading from the store when stale.
    pub async fn allowed_types(&self, ctx: &RequestContext) -> Result<Vec<ItemType>, DomainError> {
        if let Some(cached) = self.entries.read().await.get(&ctx.tenant_id) {
            if cached.loaded_at.elapsed() < self.ttl {
                return Ok(cached.types.clone());
            }
        }

        let types = self.store.allowed_item_types(ctx).await?;
        tracing::debug!(tenant_id = %ctx.tenant_id, count = types.len(), "Loaded allowed item types");

        self.entries.write().await.insert(
            ctx.tenant_id,
            CachedTypes {
                types: types.clone(),
                loaded_at: Instant::now(),
            },
        );
        Ok(types)
    }

    pub async fn invalidate(&self, tenant_id: Uuid) {
        self.entries.write().await.remove(&tenant_id);
    }
}

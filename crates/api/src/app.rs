//! Wiring: configuration in, a ready [`CatalogService`] plus its background jobs out.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use domain::services::{CatalogStore, IdempotencyCoordinator, IdempotencyStore, InMemoryIdempotencyStore};
use persistence::PgIdempotencyStore;

use crate::config::{Config, IdempotencyBackend};
use crate::jobs::{IdempotencyPurgeJob, JobScheduler};
use crate::remote::{ClientSettings, RemoteCatalogStore, ReqwestTransport, SignedClient};
use crate::services::CatalogService;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub struct CatalogApp {
    pub service: Arc<CatalogService>,
    pub scheduler: JobScheduler,
}

/// Builds the service over the given stores and registers its maintenance jobs.
pub fn assemble(
    config: &Config,
    catalog_store: Arc<dyn CatalogStore>,
    idempotency_store: Arc<dyn IdempotencyStore>,
) -> CatalogApp {
    let coordinator = IdempotencyCoordinator::new(idempotency_store, config.idempotency.policy());

    let mut scheduler = JobScheduler::new();
    scheduler.register(IdempotencyPurgeJob::new(
        coordinator.clone(),
        config.idempotency.purge_interval_minutes,
    ));

    let service = CatalogService::new(
        catalog_store,
        coordinator,
        Duration::from_secs(config.cache.type_lookup_ttl_secs),
    );

    CatalogApp {
        service: Arc::new(service),
        scheduler,
    }
}

async fn idempotency_store(config: &Config) -> Result<Arc<dyn IdempotencyStore>, AppError> {
    match config.idempotency.backend {
        IdempotencyBackend::Memory => {
            info!("Using in-process idempotency store");
            Ok(Arc::new(InMemoryIdempotencyStore::new()))
        }
        IdempotencyBackend::Postgres => {
            let db = config.database.as_ref().ok_or_else(|| {
                AppError::Config("database section is required for the postgres backend".into())
            })?;
            let pool =
                persistence::db::connect_and_migrate(&persistence::DatabaseConfig::from(db))
                    .await?;
            info!("Using PostgreSQL idempotency store");
            Ok(Arc::new(PgIdempotencyStore::new(pool)))
        }
    }
}

/// Builds the production application: signed remote store plus the configured idempotency backend.
pub async fn build_app(config: &Config) -> Result<CatalogApp, AppError> {
    let transport = ReqwestTransport::new(config.remote.timeout())?;
    let client = SignedClient::new(Arc::new(transport), ClientSettings::from(&config.remote));
    let catalog_store = Arc::new(RemoteCatalogStore::new(client));

    if config.remote.signing_secret.is_empty() {
        tracing::warn!("remote.signing_secret is empty; writes will be sent unsigned");
    }

    let idempotency_store = idempotency_store(config).await?;
    Ok(assemble(config, catalog_store, idempotency_store))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_app_with_memory_backend() {
        let config = Config::load_for_test(&[]).unwrap();
        let app = build_app(&config).await.unwrap();
        assert_eq!(app.scheduler.job_names(), vec!["idempotency_purge"]);
    }

    #[tokio::test]
    async fn test_postgres_backend_without_database_section() {
        let config = Config::load_for_test(&[("idempotency.backend", "postgres")]).unwrap();
        let err = build_app(&config).await.err().unwrap();
        assert!(matches!(err, AppError::Config(_)));
    }
}

//! PostgreSQL-backed idempotency store.
//!
//! Shares dedup state across processes; the primary key on
//! (tenant_id, operation, key_hash) makes the claim atomic.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::error;

use domain::models::{ClaimOutcome, IdempotencyRecord, ScopedKey, StoredOutcome};
use domain::services::IdempotencyStore;
use domain::DomainError;

use crate::entities::IdempotencyRecordEntity;
use crate::metrics::{QueryTimer, StoreQuery};

fn store_error(query: StoreQuery, err: sqlx::Error) -> DomainError {
    error!(query = %query, error = %err, "Idempotency store query failed");
    DomainError::ServiceUnavailable("Idempotency store unavailable".to_string())
}

#[derive(Clone)]
pub struct PgIdempotencyStore {
    pool: PgPool,
}

impl PgIdempotencyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn find(&self, key: &ScopedKey) -> Result<Option<IdempotencyRecordEntity>, DomainError> {
        let timer = QueryTimer::start(StoreQuery::Find);
        let result = timer.finish(
            sqlx::query_as::<_, IdempotencyRecordEntity>(
                r#"
                SELECT tenant_id, operation, key_hash, request_fingerprint, outcome, created_at, expires_at
                FROM idempotency_records
                WHERE tenant_id = $1 AND operation = $2 AND key_hash = $3
                "#,
            )
            .bind(key.tenant_id)
            .bind(key.operation.as_str())
            .bind(&key.key_hash)
            .fetch_optional(&self.pool)
            .await,
        );

        result.map_err(|e| store_error(StoreQuery::Find, e))
    }
}

#[async_trait::async_trait]
impl IdempotencyStore for PgIdempotencyStore {
    async fn claim(
        &self,
        key: &ScopedKey,
        fingerprint: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<ClaimOutcome, DomainError> {
        // An expired row is taken over in place; a live one leaves the insert a no-op.
        let timer = QueryTimer::start(StoreQuery::Claim);
        let claimed = timer.finish(
            sqlx::query_scalar::<_, String>(
                r#"
                INSERT INTO idempotency_records
                    (tenant_id, operation, key_hash, request_fingerprint, outcome, created_at, expires_at)
                VALUES ($1, $2, $3, $4, NULL, $5, $6)
                ON CONFLICT (tenant_id, operation, key_hash) DO UPDATE SET
                    request_fingerprint = EXCLUDED.request_fingerprint,
                    outcome = NULL,
                    created_at = EXCLUDED.created_at,
                    expires_at = EXCLUDED.expires_at
                WHERE idempotency_records.expires_at <= EXCLUDED.created_at
                RETURNING key_hash
                "#,
            )
            .bind(key.tenant_id)
            .bind(key.operation.as_str())
            .bind(&key.key_hash)
            .bind(fingerprint)
            .bind(now)
            .bind(expires_at)
            .fetch_optional(&self.pool)
            .await,
        );

        if claimed
            .map_err(|e| store_error(StoreQuery::Claim, e))?
            .is_some()
        {
            return Ok(ClaimOutcome::Claimed);
        }

        match self.find(key).await? {
            Some(entity) => {
                let record = IdempotencyRecord::try_from(entity)?;
                Ok(if record.is_in_flight() {
                    ClaimOutcome::InFlight(record)
                } else {
                    ClaimOutcome::Completed(record)
                })
            }
            // Purged between the insert and the read; let the caller retry.
            None => Err(DomainError::retryable_conflict(
                "Idempotency key changed state concurrently; retry the request",
            )),
        }
    }

    async fn complete(&self, key: &ScopedKey, outcome: StoredOutcome) -> Result<(), DomainError> {
        let outcome = serde_json::to_value(&outcome)?;
        let timer = QueryTimer::start(StoreQuery::Complete);
        let result = timer.finish(
            sqlx::query(
                r#"
                UPDATE idempotency_records
                SET outcome = $4, created_at = NOW()
                WHERE tenant_id = $1 AND operation = $2 AND key_hash = $3
                "#,
            )
            .bind(key.tenant_id)
            .bind(key.operation.as_str())
            .bind(&key.key_hash)
            .bind(outcome)
            .execute(&self.pool)
            .await,
        );

        let result = result.map_err(|e| store_error(StoreQuery::Complete, e))?;
        if result.rows_affected() == 0 {
            return Err(DomainError::Internal(format!(
                "Idempotency claim for {} vanished before completion",
                key.operation
            )));
        }
        Ok(())
    }

    async fn release(&self, key: &ScopedKey) -> Result<(), DomainError> {
        let timer = QueryTimer::start(StoreQuery::Release);
        let result = timer.finish(
            sqlx::query(
                r#"
                DELETE FROM idempotency_records
                WHERE tenant_id = $1 AND operation = $2 AND key_hash = $3 AND outcome IS NULL
                "#,
            )
            .bind(key.tenant_id)
            .bind(key.operation.as_str())
            .bind(&key.key_hash)
            .execute(&self.pool)
            .await,
        );

        result
            .map(|_| ())
            .map_err(|e| store_error(StoreQuery::Release, e))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        let timer = QueryTimer::start(StoreQuery::Purge);
        let result = timer.finish(
            sqlx::query(
                r#"
                DELETE FROM idempotency_records
                WHERE expires_at <= $1
                "#,
            )
            .bind(now)
            .execute(&self.pool)
            .await,
        );

        result
            .map(|r| r.rows_affected())
            .map_err(|e| store_error(StoreQuery::Purge, e))
    }
}

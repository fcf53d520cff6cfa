//! Idempotency record entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::models::{IdempotencyRecord, OperationKind, StoredOutcome};
use domain::DomainError;

/// Database row mapping for the idempotency_records table.
#[derive(Debug, Clone, FromRow)]
pub struct IdempotencyRecordEntity {
    pub tenant_id: Uuid,
    pub operation: String,
    pub key_hash: String,
    pub request_fingerprint: String,
    pub outcome: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TryFrom<IdempotencyRecordEntity> for IdempotencyRecord {
    type Error = DomainError;

    fn try_from(entity: IdempotencyRecordEntity) -> Result<Self, Self::Error> {
        let operation: OperationKind = entity
            .operation
            .parse()
            .map_err(DomainError::Internal)?;
        let outcome = entity
            .outcome
            .map(serde_json::from_value::<StoredOutcome>)
            .transpose()?;

        Ok(IdempotencyRecord {
            tenant_id: entity.tenant_id,
            operation,
            key_hash: entity.key_hash,
            request_fingerprint: entity.request_fingerprint,
            outcome,
            recorded_at: entity.created_at,
            expires_at: entity.expires_at,
        })
    }
}

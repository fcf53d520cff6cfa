//! Idempotency key models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use shared::crypto::sha256_hex;

use crate::error::{DomainError, ErrorSnapshot};

/// Kind of mutating operation a key is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    CreateItem,
    UpdateItem,
    DeleteItem,
    RestoreItem,
    UpsertPricing,
    UpdatePricing,
    DeletePricing,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::CreateItem => "create_item",
            OperationKind::UpdateItem => "update_item",
            OperationKind::DeleteItem => "delete_item",
            OperationKind::RestoreItem => "restore_item",
            OperationKind::UpsertPricing => "upsert_pricing",
            OperationKind::UpdatePricing => "update_pricing",
            OperationKind::DeletePricing => "delete_pricing",
        }
    }
}

impl std::str::FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create_item" => Ok(OperationKind::CreateItem),
            "update_item" => Ok(OperationKind::UpdateItem),
            "delete_item" => Ok(OperationKind::DeleteItem),
            "restore_item" => Ok(OperationKind::RestoreItem),
            "upsert_pricing" => Ok(OperationKind::UpsertPricing),
            "update_pricing" => Ok(OperationKind::UpdatePricing),
            "delete_pricing" => Ok(OperationKind::DeletePricing),
            _ => Err(format!("Unknown operation kind: {}", s)),
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A key together with its (tenant, operation) scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopedKey {
    pub tenant_id: Uuid,
    pub operation: OperationKind,
    /// The key as supplied or generated.
    pub key: String,
    /// SHA-256 of the key, used for storage lookups.
    pub key_hash: String,
}

impl ScopedKey {
    pub fn new(tenant_id: Uuid, operation: OperationKind, key: impl Into<String>) -> Self {
        let key = key.into();
        let key_hash = sha256_hex(&key);
        Self {
            tenant_id,
            operation,
            key,
            key_hash,
        }
    }

    /// Generates a fresh key of the form `<operation>-<uuid>`.
    pub fn generate(tenant_id: Uuid, operation: OperationKind) -> Self {
        Self::new(
            tenant_id,
            operation,
            format!("{}-{}", operation.as_str(), Uuid::new_v4()),
        )
    }
}

/// Cached outcome of a completed operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StoredOutcome {
    Success(JsonValue),
    Failure(ErrorSnapshot),
}

impl StoredOutcome {
    pub fn from_error(err: &DomainError) -> Self {
        StoredOutcome::Failure(err.to_snapshot())
    }
}

/// Persisted dedup record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub tenant_id: Uuid,
    pub operation: OperationKind,
    pub key_hash: String,
    /// SHA-256 of the canonical request payload.
    pub request_fingerprint: String,
    /// `None` while the owning request is still executing.
    pub outcome: Option<StoredOutcome>,
    pub recorded_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_in_flight(&self) -> bool {
        self.outcome.is_none()
    }
}

/// Result of attempting to claim a key.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// Key was free (or expired); the caller now owns it.
    Claimed,
    /// Another request holds the key and has not finished.
    InFlight(IdempotencyRecord),
    /// A finished outcome is cached for this key.
    Completed(IdempotencyRecord),
}

/// Envelope returned by every mutating operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation<T> {
    pub idempotency_key: String,
    /// True when the result came from the cache rather than a fresh execution.
    pub replayed: bool,
    pub data: T,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_kind_parse() {
        assert_eq!(
            "upsert_pricing".parse::<OperationKind>().unwrap(),
            OperationKind::UpsertPricing
        );
        assert_eq!(OperationKind::DeleteItem.to_string(), "delete_item");
        assert!("drop_table".parse::<OperationKind>().is_err());
    }

    #[test]
    fn test_scoped_key_hash_is_deterministic() {
        let tenant = Uuid::new_v4();
        let a = ScopedKey::new(tenant, OperationKind::CreateItem, "abc");
        let b = ScopedKey::new(tenant, OperationKind::CreateItem, "abc");
        assert_eq!(a.key_hash, b.key_hash);
        assert_eq!(a.key_hash.len(), 64);
    }

    #[test]
    fn test_generated_key_prefix() {
        let key = ScopedKey::generate(Uuid::new_v4(), OperationKind::UpsertPricing);
        assert!(key.key.starts_with("upsert_pricing-"));
        let other = ScopedKey::generate(key.tenant_id, OperationKind::UpsertPricing);
        assert_ne!(key.key, other.key);
    }

    #[test]
    fn test_stored_outcome_serialization() {
        let success = StoredOutcome::Success(serde_json::json!({"version_number": 1}));
        let json = serde_json::to_value(&success).unwrap();
        assert_eq!(json["kind"], "success");
        assert_eq!(json["value"]["version_number"], 1);

        let failure = StoredOutcome::from_error(&DomainError::NotFound("gone".into()));
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "failure");
        assert_eq!(json["value"]["code"], "not_found");
    }

    #[test]
    fn test_record_expiry() {
        let now = Utc::now();
        let record = IdempotencyRecord {
            tenant_id: Uuid::new_v4(),
            operation: OperationKind::RestoreItem,
            key_hash: "h".into(),
            request_fingerprint: "f".into(),
            outcome: None,
            recorded_at: now,
            expires_at: now + chrono::Duration::hours(24),
        };
        assert!(!record.is_expired(now));
        assert!(record.is_expired(now + chrono::Duration::hours(25)));
        assert!(record.is_in_flight());
    }
}

//! Idempotency coordinator.
//!
//! Guarantees at most one applied side effect per (tenant, operation, key).
//! Terminal outcomes are cached for the retention window and replayed;
//! transient failures release the key so a retry runs the operation again.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared::crypto::sha256_hex;

use crate::error::DomainError;
use crate::models::{
    ClaimOutcome, IdempotencyRecord, Mutation, OperationKind, RequestContext, ScopedKey,
    StoredOutcome,
};

/// Longest key a caller may supply.
pub const MAX_KEY_LENGTH: usize = 255;

/// Storage seam for idempotency records.
#[async_trait::async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Claims `key` for a new execution unless a live record already exists.
    async fn claim(
        &self,
        key: &ScopedKey,
        fingerprint: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<ClaimOutcome, DomainError>;

    /// Stores the outcome of a claimed execution.
    async fn complete(&self, key: &ScopedKey, outcome: StoredOutcome) -> Result<(), DomainError>;

    /// Drops an in-flight claim so the key can be used again.
    async fn release(&self, key: &ScopedKey) -> Result<(), DomainError>;

    /// Deletes records whose retention window has elapsed. Returns the number removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, DomainError>;
}

type RecordKey = (Uuid, OperationKind, String);

fn record_key(key: &ScopedKey) -> RecordKey {
    (key.tenant_id, key.operation, key.key_hash.clone())
}

/// Single-process store: a map behind a mutex.
#[derive(Debug, Default)]
pub struct InMemoryIdempotencyStore {
    records: Mutex<HashMap<RecordKey, IdempotencyRecord>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait::async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn claim(
        &self,
        key: &ScopedKey,
        fingerprint: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<ClaimOutcome, DomainError> {
        let mut records = self.records.lock().await;
        let id = record_key(key);

        if let Some(existing) = records.get(&id).filter(|r| !r.is_expired(now)) {
            return Ok(if existing.is_in_flight() {
                ClaimOutcome::InFlight(existing.clone())
            } else {
                ClaimOutcome::Completed(existing.clone())
            });
        }

        records.insert(
            id,
            IdempotencyRecord {
                tenant_id: key.tenant_id,
                operation: key.operation,
                key_hash: key.key_hash.clone(),
                request_fingerprint: fingerprint.to_string(),
                outcome: None,
                recorded_at: now,
                expires_at,
            },
        );
        Ok(ClaimOutcome::Claimed)
    }

    async fn complete(&self, key: &ScopedKey, outcome: StoredOutcome) -> Result<(), DomainError> {
        let mut records = self.records.lock().await;
        match records.get_mut(&record_key(key)) {
            Some(record) => {
                record.outcome = Some(outcome);
                record.recorded_at = Utc::now();
                Ok(())
            }
            None => Err(DomainError::Internal(format!(
                "Idempotency claim for {} vanished before completion",
                key.operation
            ))),
        }
    }

    async fn release(&self, key: &ScopedKey) -> Result<(), DomainError> {
        let mut records = self.records.lock().await;
        let id = record_key(key);
        if records.get(&id).map(|r| r.is_in_flight()).unwrap_or(false) {
            records.remove(&id);
        }
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, r| !r.is_expired(now));
        Ok((before - records.len()) as u64)
    }
}

/// What to do when a mutation arrives without a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingKeyPolicy {
    /// Generate `<operation>-<uuid>` and hand it back to the caller.
    #[default]
    Generate,
    Reject,
}

/// What to do when a known key arrives with a different payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadMismatchPolicy {
    /// Replay the recorded outcome, keyed on the key alone.
    #[default]
    Replay,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdempotencyPolicy {
    pub retention: Duration,
    pub missing_key: MissingKeyPolicy,
    pub payload_mismatch: PayloadMismatchPolicy,
}

impl Default for IdempotencyPolicy {
    fn default() -> Self {
        Self {
            retention: Duration::hours(24),
            missing_key: MissingKeyPolicy::Generate,
            payload_mismatch: PayloadMismatchPolicy::Replay,
        }
    }
}

/// SHA-256 of the canonical JSON form of a request payload.
pub fn fingerprint<P: Serialize + ?Sized>(payload: &P) -> Result<String, DomainError> {
    Ok(sha256_hex(&serde_json::to_string(payload)?))
}

/// An in-flight claim that is released unless settled.
///
/// Dropping an unsettled guard, as happens when the caller's future is
/// cancelled mid-operation, releases the key on a spawned task.
struct ClaimGuard {
    store: Arc<dyn IdempotencyStore>,
    key: Option<ScopedKey>,
}

impl ClaimGuard {
    fn new(store: Arc<dyn IdempotencyStore>, key: ScopedKey) -> Self {
        Self {
            store,
            key: Some(key),
        }
    }

    /// The outcome is recorded; keep the claim.
    fn settle(mut self) {
        self.key = None;
    }

    async fn release(mut self) {
        if let Some(key) = self.key.clone() {
            if let Err(e) = self.store.release(&key).await {
                warn!(operation = %key.operation, error = %e, "Failed to release idempotency key");
            }
            self.key = None;
        }
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let store = Arc::clone(&self.store);
                handle.spawn(async move {
                    debug!(operation = %key.operation, "Releasing key of abandoned request");
                    if let Err(e) = store.release(&key).await {
                        warn!(operation = %key.operation, error = %e, "Failed to release abandoned idempotency key");
                    }
                });
            }
            Err(_) => {
                warn!(operation = %key.operation, "No runtime left to release abandoned idempotency key");
            }
        }
    }
}

#[derive(Clone)]
pub struct IdempotencyCoordinator {
    store: Arc<dyn IdempotencyStore>,
    policy: IdempotencyPolicy,
}

impl IdempotencyCoordinator {
    pub fn new(store: Arc<dyn IdempotencyStore>, policy: IdempotencyPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &IdempotencyPolicy {
        &self.policy
    }

    fn resolve_key(
        &self,
        ctx: &RequestContext,
        operation: OperationKind,
    ) -> Result<ScopedKey, DomainError> {
        match ctx.idempotency_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => {
                if key.len() > MAX_KEY_LENGTH {
                    return Err(DomainError::invalid(
                        "idempotency_key",
                        "length",
                        format!("Idempotency key must be at most {} characters", MAX_KEY_LENGTH),
                    ));
                }
                Ok(ScopedKey::new(ctx.tenant_id, operation, key))
            }
            _ => match self.policy.missing_key {
                MissingKeyPolicy::Generate => {
                    let key = ScopedKey::generate(ctx.tenant_id, operation);
                    warn!(
                        tenant_id = %ctx.tenant_id,
                        operation = %operation,
                        idempotency_key = %key.key,
                        "Mutation without idempotency key; generated one"
                    );
                    Ok(key)
                }
                MissingKeyPolicy::Reject => Err(DomainError::invalid(
                    "idempotency_key",
                    "required",
                    "Idempotency key is required",
                )),
            },
        }
    }

    /// Runs `op` at most once per key.
    ///
    /// `op` receives a copy of `ctx` bound to the resolved key so the key can
    /// be forwarded downstream.
    pub async fn execute<P, T, F, Fut>(
        &self,
        ctx: &RequestContext,
        operation: OperationKind,
        payload: &P,
        op: F,
    ) -> Result<Mutation<T>, DomainError>
    where
        P: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        F: FnOnce(RequestContext) -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        let key = self.resolve_key(ctx, operation)?;
        let fingerprint = fingerprint(payload)?;
        let now = Utc::now();

        match self
            .store
            .claim(&key, &fingerprint, now, now + self.policy.retention)
            .await?
        {
            ClaimOutcome::Claimed => {}
            ClaimOutcome::InFlight(_) => {
                return Err(DomainError::retryable_conflict(
                    "A request with this idempotency key is already in progress",
                ));
            }
            ClaimOutcome::Completed(record) => return self.replay(&key, &fingerprint, record),
        }

        let claim = ClaimGuard::new(Arc::clone(&self.store), key.clone());
        let result = op(ctx.with_idempotency_key(key.key.clone())).await;

        match result {
            Ok(data) => {
                let value = serde_json::to_value(&data)?;
                match self.store.complete(&key, StoredOutcome::Success(value)).await {
                    Ok(()) => claim.settle(),
                    Err(e) => {
                        warn!(operation = %operation, error = %e, "Failed to record idempotent outcome; releasing key");
                        claim.release().await;
                    }
                }
                Ok(Mutation {
                    idempotency_key: key.key,
                    replayed: false,
                    data,
                })
            }
            Err(err) if err.is_terminal() => {
                match self
                    .store
                    .complete(&key, StoredOutcome::from_error(&err))
                    .await
                {
                    Ok(()) => claim.settle(),
                    Err(e) => {
                        warn!(operation = %operation, error = %e, "Failed to record idempotent failure; releasing key");
                        claim.release().await;
                    }
                }
                Err(err)
            }
            Err(err) => {
                debug!(operation = %operation, code = err.code(), "Releasing key after transient failure");
                claim.release().await;
                Err(err)
            }
        }
    }

    fn replay<T: DeserializeOwned>(
        &self,
        key: &ScopedKey,
        fingerprint: &str,
        record: IdempotencyRecord,
    ) -> Result<Mutation<T>, DomainError> {
        if record.request_fingerprint != fingerprint
            && self.policy.payload_mismatch == PayloadMismatchPolicy::Reject
        {
            return Err(DomainError::conflict(
                "Idempotency key was already used with a different request payload",
            ));
        }

        info!(
            tenant_id = %key.tenant_id,
            operation = %key.operation,
            "Replaying recorded outcome for idempotency key"
        );

        match record.outcome {
            Some(StoredOutcome::Success(value)) => Ok(Mutation {
                idempotency_key: key.key.clone(),
                replayed: true,
                data: serde_json::from_value(value)?,
            }),
            Some(StoredOutcome::Failure(snapshot)) => Err(snapshot.into()),
            None => Err(DomainError::retryable_conflict(
                "A request with this idempotency key is already in progress",
            )),
        }
    }

    /// Removes expired records.
    pub async fn purge_expired(&self) -> Result<u64, DomainError> {
        self.store.purge_expired(Utc::now()).await
    }
}

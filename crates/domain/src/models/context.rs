//! Per-request caller context.

use uuid::Uuid;

/// Authenticated, tenant-scoped caller information carried through every operation.
///
/// Authentication and tenant-header extraction happen upstream; by the time a
/// context exists the caller is trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub tenant_id: Uuid,
    /// Bearer credential forwarded to the remote store.
    pub access_token: String,
    /// Live vs test environment partition.
    pub is_live: bool,
    /// User performing the call, recorded as `created_by` / `updated_by`.
    pub actor_id: Option<Uuid>,
    /// Key for the mutation currently in flight, forwarded to the remote store.
    pub idempotency_key: Option<String>,
}

impl RequestContext {
    pub fn new(tenant_id: Uuid, access_token: impl Into<String>) -> Self {
        Self {
            tenant_id,
            access_token: access_token.into(),
            is_live: true,
            actor_id: None,
            idempotency_key: None,
        }
    }

    pub fn with_actor(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn with_environment(mut self, is_live: bool) -> Self {
        self.is_live = is_live;
        self
    }

    /// Copy of this context bound to an idempotency key.
    pub fn with_idempotency_key(&self, key: impl Into<String>) -> Self {
        let mut ctx = self.clone();
        ctx.idempotency_key = Some(key.into());
        ctx
    }
}

//! Purges idempotency records whose retention window has elapsed.

use std::time::Duration;

use domain::services::IdempotencyCoordinator;
use domain::DomainError;

use super::scheduler::Job;

pub struct IdempotencyPurgeJob {
    coordinator: IdempotencyCoordinator,
    period: Duration,
}

impl IdempotencyPurgeJob {
    /// `interval_minutes` below one is raised to one.
    pub fn new(coordinator: IdempotencyCoordinator, interval_minutes: u64) -> Self {
        Self {
            coordinator,
            period: Duration::from_secs(interval_minutes.max(1) * 60),
        }
    }
}

#[async_trait::async_trait]
impl Job for IdempotencyPurgeJob {
    fn name(&self) -> &'static str {
        "idempotency_purge"
    }

    fn period(&self) -> Duration {
        self.period
    }

    async fn run(&self) -> Result<u64, DomainError> {
        self.coordinator.purge_expired().await
    }
}

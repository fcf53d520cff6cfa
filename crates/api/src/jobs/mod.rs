//! Background job scheduler and job implementations.

mod idempotency_cleanup;
mod scheduler;

pub use idempotency_cleanup::IdempotencyPurgeJob;
pub use scheduler::{Job, JobScheduler};

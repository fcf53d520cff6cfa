//! Query timing for the idempotency store.

use metrics::histogram;
use std::time::Instant;

/// Queries issued by [`crate::PgIdempotencyStore`], used as the `query` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreQuery {
    Find,
    Claim,
    Complete,
    Release,
    Purge,
}

impl StoreQuery {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreQuery::Find => "find_idempotency_record",
            StoreQuery::Claim => "claim_idempotency_key",
            StoreQuery::Complete => "complete_idempotency_key",
            StoreQuery::Release => "release_idempotency_key",
            StoreQuery::Purge => "purge_idempotency_records",
        }
    }
}

impl std::fmt::Display for StoreQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Started before a query; [`QueryTimer::finish`] records
/// `database_query_duration_seconds` and hands the query result back.
pub struct QueryTimer {
    query: StoreQuery,
    started: Instant,
}

impl QueryTimer {
    pub fn start(query: StoreQuery) -> Self {
        Self {
            query,
            started: Instant::now(),
        }
    }

    pub fn query(&self) -> StoreQuery {
        self.query
    }

    pub fn finish<T>(self, result: T) -> T {
        histogram!("database_query_duration_seconds", "query" => self.query.as_str())
            .record(self.started.elapsed().as_secs_f64());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_distinct() {
        let all = [
            StoreQuery::Find,
            StoreQuery::Claim,
            StoreQuery::Complete,
            StoreQuery::Release,
            StoreQuery::Purge,
        ];
        let mut labels: Vec<_> = all.iter().map(|q| q.as_str()).collect();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), all.len());
    }

    #[test]
    fn test_finish_passes_result_through() {
        let timer = QueryTimer::start(StoreQuery::Purge);
        assert_eq!(timer.query(), StoreQuery::Purge);
        let result: Result<u64, ()> = timer.finish(Ok(3));
        assert_eq!(result, Ok(3));
    }
}

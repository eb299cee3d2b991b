//! Snapshot fetcher backed by the `PostgreSQL` system of record.
//!
//! Bridges the feed crate's [`SnapshotFetcher`] seam onto the
//! persistence layer, converting store errors into fetch errors the
//! reconcile loop treats as transient.

use crowdwatch_db::{DbError, LogStore, PostgresPool, ZoneStore};
use crowdwatch_feed::{FeedError, SnapshotFetcher};
use crowdwatch_types::{LogEntry, RawZoneRecord};

/// Fetches zone and log snapshots from `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PostgresFetcher {
    pool: PostgresPool,
}

impl PostgresFetcher {
    /// Create a fetcher over a shared connection pool.
    pub const fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SnapshotFetcher for PostgresFetcher {
    async fn fetch_zones(&self) -> Result<Vec<RawZoneRecord>, FeedError> {
        ZoneStore::new(self.pool.pool())
            .fetch_all()
            .await
            .map_err(fetch_err)
    }

    async fn fetch_logs(&self, limit: u32) -> Result<Vec<LogEntry>, FeedError> {
        LogStore::new(self.pool.pool())
            .fetch_recent(limit)
            .await
            .map_err(fetch_err)
    }
}

/// A failed read is a transient fetch error; the subscriber keeps its
/// last-known-good snapshot and retries on the next notification.
fn fetch_err(err: DbError) -> FeedError {
    FeedError::Fetch(err.to_string())
}

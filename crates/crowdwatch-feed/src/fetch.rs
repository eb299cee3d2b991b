//! Read access to the upstream system of record.

use crowdwatch_types::{LogEntry, RawZoneRecord};

use crate::error::FeedError;

/// Full-snapshot reads from the upstream store.
///
/// Reconciliation never applies change payloads incrementally: a
/// notification only marks state dirty, and the current state is
/// re-fetched wholesale through this trait. That makes a missed or
/// duplicated notification harmless -- the next fetch converges on
/// whatever the upstream actually holds.
#[async_trait::async_trait]
pub trait SnapshotFetcher: Send + Sync {
    /// Fetch every zone row as the upstream currently stores it.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Fetch`] if the upstream read fails. The
    /// caller keeps serving its last-known-good snapshot.
    async fn fetch_zones(&self) -> Result<Vec<RawZoneRecord>, FeedError>;

    /// Fetch the most recent emergency log entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Fetch`] if the upstream read fails.
    async fn fetch_logs(&self, limit: u32) -> Result<Vec<LogEntry>, FeedError>;
}

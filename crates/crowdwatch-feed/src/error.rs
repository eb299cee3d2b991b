//! Error types for the change feed crate.

/// Errors raised by change feed subscription and snapshot fetching.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Transport-level failure: connection, subscription, or channel loss.
    #[error("change feed transport error: {0}")]
    Transport(String),

    /// Upstream snapshot fetch failure.
    #[error("snapshot fetch failed: {0}")]
    Fetch(String),
}

//! Change feed subscription and coalesced reconciliation for Crowdwatch.
//!
//! This crate connects the in-memory engine state to the upstream system
//! of record. Row-level change notifications arrive over NATS, carrying
//! no payload; each one marks a table dirty and the current snapshot is
//! re-fetched wholesale and swapped in. See [`subscriber`] for the
//! coalescing and reconnect behavior.
//!
//! # Modules
//!
//! - [`source`] -- The notification stream ([`ChangeFeedSource`], NATS impl)
//! - [`fetch`] -- Full-snapshot reads ([`SnapshotFetcher`])
//! - [`subscriber`] -- The reconcile loop and its lifecycle handle
//! - [`error`] -- Feed error types

pub mod error;
pub mod fetch;
pub mod source;
pub mod subscriber;

pub use error::FeedError;
pub use fetch::SnapshotFetcher;
pub use source::{ChangeFeedSource, NatsFeedSource};
pub use subscriber::{ChangeFeedSubscriber, SubscriptionHandle};

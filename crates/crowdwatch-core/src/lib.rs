//! Zone state reconciliation and alerting engine core for Crowdwatch.
//!
//! This crate holds every part of the engine with non-trivial invariants:
//! derived-field consistency, alert deduplication, and validated atomic
//! mutations. I/O lives elsewhere -- the change feed subscriber, the
//! persistence layer, and the observer API all build on the primitives
//! here.
//!
//! # Modules
//!
//! - [`classify`] -- Pure occupancy-to-band classification
//! - [`store`] -- Canonical zone snapshot with atomic, validated mutations
//! - [`alert`] -- Critical-transition detection and deduplication
//! - [`log`] -- Append-only emergency action log (in-memory view)
//! - [`admin`] -- Validating façade for administrator edits
//! - [`config`] -- Typed YAML configuration with env overrides

pub mod admin;
pub mod alert;
pub mod classify;
pub mod config;
pub mod log;
pub mod store;

// Re-export primary types for convenience.
pub use admin::CapacityAdminMutator;
pub use alert::{AlertDeduplicator, AlertSink, CriticalAlert};
pub use classify::{classify, display_percent, occupancy_percent};
pub use config::{ConfigError, CrowdwatchConfig, FeedConfig, InfrastructureConfig, IngestionConfig};
pub use log::{DispatchConfirmation, EmergencyActionLog};
pub use store::{
    AdminEdit, DEFAULT_FALLBACK_CAPACITY, MissingCapacityPolicy, ReplaceOutcome, StoreError,
    ZoneStateStore,
};

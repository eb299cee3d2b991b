//! Shared type definitions for the Crowdwatch monitoring engine.
//!
//! This crate is the single source of truth for all types used across the
//! Crowdwatch workspace. Types defined here flow downstream to `TypeScript`
//! via `ts-rs` for the operator dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for all entity identifiers
//! - [`enums`] -- Enumeration types (density bands, status, change feed)
//! - [`structs`] -- Core entity structs (zones, log entries, change events)

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{ChangeKind, ChangeTable, CrowdLevel, ZoneStatus};
pub use ids::{LogEntryId, UserId, ZoneId};
pub use structs::{
    ChangeEvent, LOG_STATUS_ACTIVE, LOG_STATUS_RESOLVED, LogEntry, RawZoneRecord, Zone,
    action_types,
};

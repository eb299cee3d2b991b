//! Core entity structs for the Crowdwatch monitoring engine.
//!
//! Covers the canonical [`Zone`] record, the append-only emergency action
//! [`LogEntry`], the normalized upstream ingestion record
//! [`RawZoneRecord`], and the [`ChangeEvent`] notification shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{ChangeKind, ChangeTable, CrowdLevel, ZoneStatus};
use crate::ids::{LogEntryId, UserId, ZoneId};

// ---------------------------------------------------------------------------
// Zone
// ---------------------------------------------------------------------------

/// A monitored physical area with a capacity and a live occupancy count.
///
/// # Invariants
///
/// - `capacity` is greater than zero (validated before every mutation).
/// - `crowd_level` is always exactly `classify(current_count, capacity)`.
///   It is carried on the struct for queryability but recomputed on every
///   write path; a value read back from persistence is never trusted.
/// - `current_count` has no upper bound -- a count exceeding capacity is
///   valid and is exactly the critical signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Zone {
    /// Opaque unique identifier, immutable after creation.
    pub id: ZoneId,
    /// Non-empty display label.
    pub name: String,
    /// Maximum safe occupancy. Always greater than zero.
    pub capacity: u32,
    /// Live occupancy count. May exceed `capacity`.
    pub current_count: u32,
    /// Derived density band. See the struct-level invariants.
    pub crowd_level: CrowdLevel,
    /// Operational flag, orthogonal to occupancy.
    pub status: ZoneStatus,
    /// Set by the store on every mutation.
    pub last_updated: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Upstream ingestion record
// ---------------------------------------------------------------------------

/// A zone record as received from the upstream occupancy source, before
/// validation and classification.
///
/// The upstream source has produced inconsistent field names for the same
/// logical column (`Capacity` vs `capacity`, `zone` vs `name`); the serde
/// aliases here absorb that variance so raw field names never propagate
/// past the ingestion boundary. Optional fields model rows observed in
/// the wild with missing values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawZoneRecord {
    /// Row identifier.
    pub id: ZoneId,
    /// Display label. The upstream schema calls this column `zone`.
    #[serde(alias = "zone", alias = "Zone", alias = "Name")]
    pub name: String,
    /// Declared capacity; `None` or non-positive values are a
    /// data-quality condition resolved by the store's missing-capacity
    /// policy.
    #[serde(default, alias = "Capacity")]
    pub capacity: Option<i64>,
    /// Occupancy count; missing means zero, negative is clamped to zero.
    #[serde(default, alias = "count", alias = "Count")]
    pub current_count: Option<i64>,
    /// Externally supplied band. Ignored: the store recomputes it.
    #[serde(default, alias = "CrowdLevel")]
    pub crowd_level: Option<String>,
    /// Operational status label; missing defaults to active.
    #[serde(default, alias = "Status")]
    pub status: Option<String>,
    /// Upstream modification timestamp, if present.
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl RawZoneRecord {
    /// Occupancy count with missing and negative values normalized to zero.
    pub fn normalized_count(&self) -> u32 {
        self.current_count
            .and_then(|c| u32::try_from(c).ok())
            .unwrap_or(0)
    }

    /// Declared capacity if it is usable (present and positive).
    pub fn usable_capacity(&self) -> Option<u32> {
        self.capacity
            .filter(|&c| c > 0)
            .and_then(|c| u32::try_from(c).ok())
    }
}

// ---------------------------------------------------------------------------
// Emergency action log
// ---------------------------------------------------------------------------

/// Status label for a freshly dispatched emergency action.
pub const LOG_STATUS_ACTIVE: &str = "active";

/// Status label for a resolved emergency action.
pub const LOG_STATUS_RESOLVED: &str = "resolved";

/// An append-only record of a dispatched emergency response.
///
/// `action_type`, `zone_id`, and `created_at` never change after creation;
/// only the `status` / `resolved_at` lifecycle fields are mutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LogEntry {
    /// Unique, immutable identifier.
    pub id: LogEntryId,
    /// Referenced zone, or `None` for a global/all-zones action.
    pub zone_id: Option<ZoneId>,
    /// Short label naming the dispatched response.
    pub action_type: String,
    /// Free-text context.
    pub description: Option<String>,
    /// Identifier of the authenticated caller, if any.
    pub user_id: Option<UserId>,
    /// Server-assigned timestamp, non-decreasing across entries from a
    /// given writer.
    pub created_at: DateTime<Utc>,
    /// Lifecycle status label.
    pub status: Option<String>,
    /// When the action was marked resolved, if it has been.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl LogEntry {
    /// Build a new entry with a fresh time-ordered id, the current
    /// timestamp, and an `active` status.
    ///
    /// Repeated calls with identical arguments produce distinct entries;
    /// the log deliberately does not deduplicate.
    pub fn new(
        zone_id: Option<ZoneId>,
        action_type: &str,
        description: Option<String>,
        user_id: Option<UserId>,
    ) -> Self {
        Self {
            id: LogEntryId::new(),
            zone_id,
            action_type: action_type.to_owned(),
            description,
            user_id,
            created_at: Utc::now(),
            status: Some(LOG_STATUS_ACTIVE.to_owned()),
            resolved_at: None,
        }
    }
}

/// Well-known `action_type` labels offered by the dispatch panel.
///
/// Free-form labels are still accepted; these constants exist so the
/// engine and the dashboard agree on the standard services.
pub mod action_types {
    /// Police units for crowd control and security.
    pub const POLICE: &str = "Police Force";
    /// Medical emergency response and first aid.
    pub const AMBULANCE: &str = "Ambulance Services";
    /// Fire safety and emergency evacuation assistance.
    pub const FIRE: &str = "Fire Department";
    /// Specialized rescue operations and crowd extraction.
    pub const RESCUE: &str = "Rescue Teams";
    /// Coordinated disaster response and resource allocation.
    pub const DISASTER: &str = "Disaster Management";
    /// Systematic evacuation procedures.
    pub const EVACUATION: &str = "Evacuation Protocol";
}

// ---------------------------------------------------------------------------
// Change feed notification
// ---------------------------------------------------------------------------

/// A row-level change notification from the upstream source.
///
/// Deliberately carries no row payload: the engine reconciles by
/// re-fetching full truth, never by merging partial deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ChangeEvent {
    /// What happened to the row.
    pub kind: ChangeKind,
    /// Which logical table it happened to.
    pub table: ChangeTable,
}

//! Enumeration types for the Crowdwatch monitoring engine.
//!
//! Covers the crowd density bands, zone operational status, and the
//! change-notification vocabulary emitted by the upstream feed.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Crowd density bands
// ---------------------------------------------------------------------------

/// Derived classification of a zone's occupancy ratio.
///
/// The band is always computed from `current_count / capacity` -- it is
/// persisted for queryability but never treated as an independent source
/// of truth. Variants are ordered so that a higher occupancy ratio maps
/// to a strictly greater band, which lets callers compare bands directly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum CrowdLevel {
    /// Below 50% of capacity.
    Low,
    /// At least 50% of capacity.
    Medium,
    /// At least 80% of capacity.
    High,
    /// At least 95% of capacity -- the alerting threshold.
    Critical,
}

impl CrowdLevel {
    /// Stable lowercase label, matching the persisted representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Parse a persisted label back into a band.
    ///
    /// Returns `None` for unknown labels; callers must recompute the band
    /// from count and capacity rather than guess.
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Zone operational status
// ---------------------------------------------------------------------------

/// Operational flag for a zone, orthogonal to occupancy.
///
/// Zones are never deleted in normal operation; they are soft-deactivated
/// by flipping this flag.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum ZoneStatus {
    /// The zone is live and monitored.
    Active,
    /// The zone has been soft-deactivated.
    Inactive,
}

impl ZoneStatus {
    /// Stable lowercase label, matching the persisted representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    /// Parse a persisted label. Unknown labels default to `Active` --
    /// upstream rows have been observed with missing or free-form status
    /// values and a zone must not vanish from monitoring because of one.
    pub fn parse_lossy(label: &str) -> Self {
        match label {
            "inactive" => Self::Inactive,
            _ => Self::Active,
        }
    }
}

// ---------------------------------------------------------------------------
// Change feed vocabulary
// ---------------------------------------------------------------------------

/// The kind of row-level change the upstream source observed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum ChangeKind {
    /// A new row was inserted.
    Insert,
    /// An existing row was updated.
    Update,
    /// A row was deleted.
    Delete,
}

impl ChangeKind {
    /// Stable lowercase label, used as the trailing change-feed subject token.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Parse a subject token back into a change kind.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "insert" => Some(Self::Insert),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// The logical table a change notification refers to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum ChangeTable {
    /// The zone occupancy table.
    Zones,
    /// The emergency action log table.
    Logs,
}

impl ChangeTable {
    /// Stable lowercase label, used as the change-feed subject token.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Zones => "zones",
            Self::Logs => "logs",
        }
    }

    /// Parse a subject token back into a table reference.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "zones" => Some(Self::Zones),
            "logs" => Some(Self::Logs),
            _ => None,
        }
    }
}

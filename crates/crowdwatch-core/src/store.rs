//! The canonical in-memory zone snapshot and its single mutation entry point.
//!
//! All zone mutations -- upstream reconciliation, administrator edits, and
//! creation -- pass through [`ZoneStateStore`]. The store enforces the
//! derived-field invariant (`crowd_level == classify(count, capacity)`)
//! on every write path and hands out immutable [`Arc`] snapshots so
//! readers never observe a torn state.
//!
//! # Design
//!
//! - **Single writer**: callers serialize mutations behind one lock
//!   (the engine wraps the store in a `tokio::sync::RwLock`).
//! - **Whole-value commits**: an admin edit computes capacity, count,
//!   and classification together and commits them as one write.
//! - **Recompute, never trust**: any externally supplied `crowd_level`
//!   is discarded and recomputed at the ingestion boundary.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use crowdwatch_types::{RawZoneRecord, Zone, ZoneId, ZoneStatus};
use serde::{Deserialize, Serialize};

use crate::classify::classify;

/// Fallback capacity applied by [`MissingCapacityPolicy::Default`] when
/// the policy is itself defaulted. Matches the constant the upstream
/// system historically assumed for capacity-less rows.
pub const DEFAULT_FALLBACK_CAPACITY: u32 = 1000;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced by zone mutations.
///
/// Validation errors (`InvalidName`, `InvalidCapacity`, `InvalidCount`)
/// are local and non-retryable: the input must change. `NotFound` is
/// reported distinctly so callers refresh their view instead of retrying
/// the same edit.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The zone name was empty or whitespace-only.
    #[error("invalid zone name: name must be non-empty")]
    InvalidName,

    /// The capacity was zero, negative, or out of range.
    #[error("invalid capacity {value}: capacity must be greater than zero")]
    InvalidCapacity {
        /// The rejected value as supplied by the caller.
        value: i64,
    },

    /// The occupancy count was negative or out of range.
    #[error("invalid count {value}: count must be non-negative")]
    InvalidCount {
        /// The rejected value as supplied by the caller.
        value: i64,
    },

    /// The referenced zone does not exist in the current snapshot.
    #[error("zone {0} not found")]
    NotFound(ZoneId),
}

impl StoreError {
    /// Whether this error is a validation failure (as opposed to a stale
    /// reference). Validation failures need changed input, not a refresh.
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidName | Self::InvalidCapacity { .. } | Self::InvalidCount { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Missing-capacity policy
// ---------------------------------------------------------------------------

/// What to do with an upstream record whose capacity is missing or
/// non-positive.
///
/// A missing capacity is a data-quality condition, not a normal state:
/// the policy makes the resolution explicit instead of burying a magic
/// number in the ingestion path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "lowercase")]
pub enum MissingCapacityPolicy {
    /// Substitute a documented fallback capacity and keep the record.
    Default {
        /// The substitute capacity. Must be positive to be meaningful.
        value: u32,
    },
    /// Drop the record from the snapshot; it is counted and logged.
    Reject,
}

impl Default for MissingCapacityPolicy {
    fn default() -> Self {
        Self::Default {
            value: DEFAULT_FALLBACK_CAPACITY,
        }
    }
}

// ---------------------------------------------------------------------------
// Admin edit
// ---------------------------------------------------------------------------

/// A validated administrator edit: both fields optional, both already
/// range-checked by the caller ([`crate::admin::CapacityAdminMutator`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdminEdit {
    /// New capacity, if the edit changes it.
    pub capacity: Option<u32>,
    /// New occupancy count, if the edit changes it.
    pub current_count: Option<u32>,
}

/// Outcome of a full snapshot replacement from upstream records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceOutcome {
    /// Records accepted into the snapshot.
    pub applied: usize,
    /// Records dropped by [`MissingCapacityPolicy::Reject`].
    pub rejected: usize,
}

// ---------------------------------------------------------------------------
// ZoneStateStore
// ---------------------------------------------------------------------------

/// Canonical in-memory snapshot of all zones.
///
/// Readers share one immutable [`Arc`] snapshot per committed state;
/// the snapshot is rebuilt after every mutation so consumers holding an
/// older `Arc` simply see the previous consistent state, never a torn one.
#[derive(Debug)]
pub struct ZoneStateStore {
    /// Canonical rows keyed by id.
    zones: BTreeMap<ZoneId, Zone>,
    /// Cached ordered snapshot, rebuilt on every mutation.
    snapshot: Arc<[Zone]>,
    /// Resolution for capacity-less upstream records.
    missing_capacity: MissingCapacityPolicy,
}

impl ZoneStateStore {
    /// Create an empty store with the given missing-capacity policy.
    pub fn new(missing_capacity: MissingCapacityPolicy) -> Self {
        Self {
            zones: BTreeMap::new(),
            snapshot: Arc::from(Vec::new()),
            missing_capacity,
        }
    }

    /// Number of zones in the current snapshot.
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// The current immutable snapshot, ordered by name (ties broken by
    /// id so duplicate names -- which the store tolerates -- keep the
    /// ordering stable).
    ///
    /// The returned slice never changes after this call; later mutations
    /// produce a fresh snapshot instead.
    pub fn list(&self) -> Arc<[Zone]> {
        Arc::clone(&self.snapshot)
    }

    /// Look up a single zone by id in the current snapshot.
    pub fn get(&self, id: ZoneId) -> Option<&Zone> {
        self.zones.get(&id)
    }

    /// Create a new zone with a zero count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] for an empty or whitespace
    /// name, [`StoreError::InvalidCapacity`] for a zero capacity. Both
    /// are rejected before the mutation reaches any persistence layer.
    pub fn create(&mut self, name: &str, capacity: u32) -> Result<Zone, StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidName);
        }
        if capacity == 0 {
            return Err(StoreError::InvalidCapacity { value: 0 });
        }

        let zone = Zone {
            id: ZoneId::new(),
            name: name.to_owned(),
            capacity,
            current_count: 0,
            crowd_level: classify(0, capacity),
            status: ZoneStatus::Active,
            last_updated: Utc::now(),
        };
        self.zones.insert(zone.id, zone.clone());
        self.rebuild_snapshot();

        tracing::info!(zone_id = %zone.id, name = zone.name, capacity, "zone created");
        Ok(zone)
    }

    /// Apply a validated administrator edit atomically.
    ///
    /// The new classification is computed from the *combined* resulting
    /// capacity and count -- never from a stale partial state -- and
    /// capacity, count, classification, and `last_updated` are committed
    /// as one write. No reader ever observes a state where capacity and
    /// classification disagree.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the zone id is not in the
    /// snapshot, [`StoreError::InvalidCapacity`] for a zero capacity.
    pub fn apply_admin_edit(&mut self, id: ZoneId, edit: AdminEdit) -> Result<Zone, StoreError> {
        if edit.capacity == Some(0) {
            return Err(StoreError::InvalidCapacity { value: 0 });
        }

        let Some(existing) = self.zones.get(&id) else {
            return Err(StoreError::NotFound(id));
        };

        let capacity = edit.capacity.unwrap_or(existing.capacity);
        let current_count = edit.current_count.unwrap_or(existing.current_count);

        let updated = Zone {
            id: existing.id,
            name: existing.name.clone(),
            capacity,
            current_count,
            crowd_level: classify(current_count, capacity),
            status: existing.status,
            last_updated: Utc::now(),
        };
        self.zones.insert(id, updated.clone());
        self.rebuild_snapshot();

        tracing::info!(
            zone_id = %id,
            capacity,
            current_count,
            crowd_level = updated.crowd_level.as_str(),
            "admin edit applied"
        );
        Ok(updated)
    }

    /// Normalize and upsert a single upstream record.
    ///
    /// Returns the stored zone, or `None` if the record was dropped by
    /// [`MissingCapacityPolicy::Reject`]. Any upstream-supplied
    /// `crowd_level` is discarded and recomputed.
    pub fn upsert_from_upstream(&mut self, record: &RawZoneRecord) -> Option<Zone> {
        let zone = self.normalize(record)?;
        self.zones.insert(zone.id, zone.clone());
        self.rebuild_snapshot();
        Some(zone)
    }

    /// Replace the whole snapshot from a full upstream fetch.
    ///
    /// This is the reconciliation path: correctness under concurrent
    /// writers comes from always re-reading full truth, so the previous
    /// snapshot is discarded wholesale rather than merged.
    pub fn replace_from_upstream(&mut self, records: &[RawZoneRecord]) -> ReplaceOutcome {
        let mut next = BTreeMap::new();
        let mut outcome = ReplaceOutcome::default();

        for record in records {
            match self.normalize(record) {
                Some(zone) => {
                    next.insert(zone.id, zone);
                    outcome.applied = outcome.applied.saturating_add(1);
                }
                None => {
                    outcome.rejected = outcome.rejected.saturating_add(1);
                }
            }
        }

        self.zones = next;
        self.rebuild_snapshot();

        if outcome.rejected > 0 {
            tracing::warn!(
                applied = outcome.applied,
                rejected = outcome.rejected,
                "upstream records dropped by missing-capacity policy"
            );
        }
        outcome
    }

    /// Normalize an upstream record into a canonical [`Zone`].
    ///
    /// Field-name variance is already absorbed by [`RawZoneRecord`]; this
    /// step resolves missing capacity via the policy, clamps the count,
    /// recomputes the band, and fills defaults for status and timestamp.
    fn normalize(&self, record: &RawZoneRecord) -> Option<Zone> {
        let capacity = match record.usable_capacity() {
            Some(c) => c,
            None => match self.missing_capacity {
                MissingCapacityPolicy::Default { value } => {
                    tracing::debug!(
                        zone_id = %record.id,
                        fallback = value,
                        "upstream record missing capacity, applying default"
                    );
                    value
                }
                MissingCapacityPolicy::Reject => {
                    tracing::debug!(zone_id = %record.id, "upstream record missing capacity, rejected");
                    return None;
                }
            },
        };

        let current_count = record.normalized_count();
        Some(Zone {
            id: record.id,
            name: record.name.clone(),
            capacity,
            current_count,
            crowd_level: classify(current_count, capacity),
            status: record
                .status
                .as_deref()
                .map_or(ZoneStatus::Active, ZoneStatus::parse_lossy),
            last_updated: record.last_updated.unwrap_or_else(Utc::now),
        })
    }

    /// Rebuild the cached ordered snapshot after a mutation.
    fn rebuild_snapshot(&mut self) {
        let mut zones: Vec<Zone> = self.zones.values().cloned().collect();
        zones.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        self.snapshot = Arc::from(zones);
    }
}

impl Default for ZoneStateStore {
    fn default() -> Self {
        Self::new(MissingCapacityPolicy::default())
    }
}

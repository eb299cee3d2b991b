//! Critical-transition detection and alert deduplication.
//!
//! Every reconciliation produces a full zone snapshot; this module turns
//! "the set of zones is now critical" into "this zone just *became*
//! critical" events for a human-facing sink, without re-alerting on every
//! periodic reconciliation.
//!
//! # Dedup rule
//!
//! One alert fires when a zone enters the critical band having not been
//! critical in the immediately preceding snapshot. A zone that leaves
//! critical is simply dropped from the tracked set, so a later re-entry
//! fires a fresh alert -- there is no suppression beyond one cycle.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use crowdwatch_types::{CrowdLevel, Zone, ZoneId};
use serde::{Deserialize, Serialize};

/// A single critical-entry notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalAlert {
    /// The zone that just entered the critical band.
    pub zone_id: ZoneId,
    /// Display name at the time of the transition.
    pub zone_name: String,
    /// When the transition was observed.
    pub raised_at: DateTime<Utc>,
}

/// Consumer of critical-entry notifications.
///
/// The engine makes no assumption about rendering: the observer's
/// implementation fans alerts out to `WebSocket` clients, tests collect
/// them into a vector.
pub trait AlertSink: Send + Sync {
    /// Called exactly once per critical transition.
    fn on_critical_entered(&self, alert: &CriticalAlert);
}

/// Tracks critical-set membership across reconciliations and emits
/// transition-only alerts.
#[derive(Debug, Default)]
pub struct AlertDeduplicator {
    /// Zone ids that were critical in the previous snapshot.
    previous_critical: BTreeSet<ZoneId>,
}

impl AlertDeduplicator {
    /// Create a deduplicator with an empty previous set, so the first
    /// reconciliation alerts for every zone already critical at startup.
    pub const fn new() -> Self {
        Self {
            previous_critical: BTreeSet::new(),
        }
    }

    /// Diff the snapshot's critical set against the previous one.
    ///
    /// Returns one [`CriticalAlert`] per zone that entered critical, and
    /// advances the tracked set. Transitions among `low`/`medium`/`high`
    /// never alert here; escalation display for those bands is a
    /// presentation concern.
    pub fn observe(&mut self, zones: &[Zone]) -> Vec<CriticalAlert> {
        let current: BTreeSet<ZoneId> = zones
            .iter()
            .filter(|z| z.crowd_level == CrowdLevel::Critical)
            .map(|z| z.id)
            .collect();

        let raised_at = Utc::now();
        let alerts: Vec<CriticalAlert> = zones
            .iter()
            .filter(|z| current.contains(&z.id) && !self.previous_critical.contains(&z.id))
            .map(|z| CriticalAlert {
                zone_id: z.id,
                zone_name: z.name.clone(),
                raised_at,
            })
            .collect();

        self.previous_critical = current;
        alerts
    }

    /// Diff the snapshot and deliver each alert to the sink.
    pub fn observe_and_notify(&mut self, zones: &[Zone], sink: &dyn AlertSink) {
        for alert in self.observe(zones) {
            tracing::warn!(
                zone_id = %alert.zone_id,
                zone_name = alert.zone_name,
                "zone entered critical"
            );
            sink.on_critical_entered(&alert);
        }
    }

    /// Number of zones tracked as critical after the last observation.
    pub fn critical_count(&self) -> usize {
        self.previous_critical.len()
    }
}

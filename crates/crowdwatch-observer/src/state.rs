//! Shared application state for the Observer API server.
//!
//! [`AppState`] holds the broadcast channel for critical alerts and the
//! shared in-memory engine state the REST endpoints serve. Reads never
//! touch the database; writes go through the validating admin mutator
//! and are persisted when a pool is attached.

use std::sync::Arc;

use crowdwatch_core::{
    AlertSink, CapacityAdminMutator, CriticalAlert, EmergencyActionLog, ZoneStateStore,
};
use crowdwatch_db::PostgresPool;
use tokio::sync::{RwLock, broadcast};

/// Capacity of the broadcast channel for critical alerts.
///
/// If a subscriber falls behind by more than this many messages it will
/// receive a [`broadcast::error::RecvError::Lagged`] and skip to the
/// newest alert.
const BROADCAST_CAPACITY: usize = 256;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor. The
/// store and action log are the same shared handles the change feed
/// subscriber reconciles into, so REST reads always see the latest
/// committed snapshot.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast sender for critical-entry alerts.
    pub alerts_tx: broadcast::Sender<CriticalAlert>,
    /// The canonical zone snapshot.
    pub store: Arc<RwLock<ZoneStateStore>>,
    /// The newest-first emergency action log view.
    pub action_log: Arc<RwLock<EmergencyActionLog>>,
    /// Validating mutator for administrator zone edits.
    pub admin: CapacityAdminMutator,
    /// Persistence pool; `None` runs the API purely in memory (tests).
    pub db: Option<PostgresPool>,
}

impl AppState {
    /// Create application state over shared engine handles, without
    /// persistence.
    pub fn new(
        store: Arc<RwLock<ZoneStateStore>>,
        action_log: Arc<RwLock<EmergencyActionLog>>,
    ) -> Self {
        let (alerts_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let admin = CapacityAdminMutator::new(Arc::clone(&store));
        Self {
            alerts_tx,
            store,
            action_log,
            admin,
            db: None,
        }
    }

    /// Attach a persistence pool so admin mutations are written through.
    #[must_use]
    pub fn with_db(mut self, db: PostgresPool) -> Self {
        self.db = Some(db);
        self
    }

    /// Subscribe to the critical alert broadcast.
    pub fn subscribe(&self) -> broadcast::Receiver<CriticalAlert> {
        self.alerts_tx.subscribe()
    }

    /// An [`AlertSink`] that fans alerts out to all connected
    /// `WebSocket` clients.
    pub fn alert_sink(&self) -> BroadcastAlertSink {
        BroadcastAlertSink {
            tx: self.alerts_tx.clone(),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("persistent", &self.db.is_some())
            .finish_non_exhaustive()
    }
}

/// Bridges the deduplicator's sink seam onto the broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastAlertSink {
    tx: broadcast::Sender<CriticalAlert>,
}

impl AlertSink for BroadcastAlertSink {
    fn on_critical_entered(&self, alert: &CriticalAlert) {
        // send errs only with zero receivers, which is normal when no
        // dashboard is connected.
        let _ = self.tx.send(alert.clone());
    }
}

//! Coalesced reconciliation driven by change notifications.
//!
//! The subscriber owns three tasks:
//!
//! 1. An event pump that holds the notification stream, routes each
//!    event to the dirty channel for its table, and re-subscribes after
//!    channel loss.
//! 2. A zone worker that re-fetches the full zone snapshot whenever the
//!    zone table is dirty, replaces the in-memory store, and runs alert
//!    deduplication over the committed snapshot.
//! 3. A log worker doing the same for the emergency action log.
//!
//! Dirty channels have capacity one and are written with `try_send`, so
//! a burst of notifications arriving while a fetch is in flight
//! coalesces into exactly one trailing fetch. A failed fetch is logged
//! and the last-known-good snapshot keeps serving; the next
//! notification (or re-subscription) retries.

use std::sync::Arc;
use std::time::Duration;

use crowdwatch_core::{AlertDeduplicator, AlertSink, EmergencyActionLog, ZoneStateStore};
use crowdwatch_types::ChangeTable;
use futures::StreamExt;
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::fetch::SnapshotFetcher;
use crate::source::ChangeFeedSource;

// ---------------------------------------------------------------------------
// Subscriber
// ---------------------------------------------------------------------------

/// Drives the in-memory zone store and action log from change
/// notifications.
pub struct ChangeFeedSubscriber {
    source: Arc<dyn ChangeFeedSource>,
    fetcher: Arc<dyn SnapshotFetcher>,
    store: Arc<RwLock<ZoneStateStore>>,
    action_log: Arc<RwLock<EmergencyActionLog>>,
    sink: Arc<dyn AlertSink>,
    reconnect_delay: Duration,
    log_fetch_limit: u32,
}

impl ChangeFeedSubscriber {
    /// Assemble a subscriber over injected source, fetcher, and state.
    pub fn new(
        source: Arc<dyn ChangeFeedSource>,
        fetcher: Arc<dyn SnapshotFetcher>,
        store: Arc<RwLock<ZoneStateStore>>,
        action_log: Arc<RwLock<EmergencyActionLog>>,
        sink: Arc<dyn AlertSink>,
        reconnect_delay: Duration,
        log_fetch_limit: u32,
    ) -> Self {
        Self {
            source,
            fetcher,
            store,
            action_log,
            sink,
            reconnect_delay,
            log_fetch_limit,
        }
    }

    /// Spawn the pump and worker tasks and return a handle that stops
    /// them.
    ///
    /// Subscribing marks both tables dirty, so the first reconciliation
    /// runs immediately without waiting for a notification.
    pub fn start(self) -> SubscriptionHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (zones_tx, zones_rx) = mpsc::channel::<()>(1);
        let (logs_tx, logs_rx) = mpsc::channel::<()>(1);

        let pump = tokio::spawn(event_pump(
            self.source,
            zones_tx,
            logs_tx,
            shutdown_rx.clone(),
            self.reconnect_delay,
        ));
        let zones = tokio::spawn(zone_worker(
            Arc::clone(&self.fetcher),
            self.store,
            self.sink,
            zones_rx,
            shutdown_rx.clone(),
        ));
        let logs = tokio::spawn(log_worker(
            self.fetcher,
            self.action_log,
            self.log_fetch_limit,
            logs_rx,
            shutdown_rx,
        ));

        SubscriptionHandle {
            shutdown: shutdown_tx,
            tasks: Mutex::new(vec![pump, zones, logs]),
        }
    }
}

impl std::fmt::Debug for ChangeFeedSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeedSubscriber")
            .field("reconnect_delay", &self.reconnect_delay)
            .field("log_fetch_limit", &self.log_fetch_limit)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to a running subscription.
///
/// Dropping the handle without calling [`stop`](Self::stop) leaves the
/// tasks running for the life of the runtime.
#[derive(Debug)]
pub struct SubscriptionHandle {
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SubscriptionHandle {
    /// Stop the subscription and wait for all tasks to exit.
    ///
    /// Idempotent: a second call finds nothing left to join and returns
    /// immediately. No store mutation or alert callback happens after
    /// this returns.
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        let tasks: Vec<JoinHandle<()>> = {
            let mut guard = self.tasks.lock().await;
            guard.drain(..).collect()
        };
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "feed task ended abnormally");
            }
        }
        info!("change feed subscription stopped");
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Queue a re-fetch for one table.
///
/// The channel has capacity one; if a mark is already queued the new one
/// is dropped, which is exactly the coalescing we want.
fn mark_dirty(tx: &mpsc::Sender<()>) {
    let _ = tx.try_send(());
}

async fn event_pump(
    source: Arc<dyn ChangeFeedSource>,
    zones_tx: mpsc::Sender<()>,
    logs_tx: mpsc::Sender<()>,
    mut shutdown: watch::Receiver<bool>,
    reconnect_delay: Duration,
) {
    loop {
        let subscribed = tokio::select! {
            _ = shutdown.changed() => return,
            result = source.subscribe() => result,
        };
        match subscribed {
            Ok(mut events) => {
                // A fresh subscription may have missed notifications;
                // reconcile both tables unconditionally.
                mark_dirty(&zones_tx);
                mark_dirty(&logs_tx);
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => return,
                        event = events.next() => match event {
                            Some(event) => {
                                debug!(
                                    table = event.table.as_str(),
                                    kind = event.kind.as_str(),
                                    "change notification"
                                );
                                match event.table {
                                    ChangeTable::Zones => mark_dirty(&zones_tx),
                                    ChangeTable::Logs => mark_dirty(&logs_tx),
                                }
                            }
                            None => {
                                warn!("change feed stream ended, re-subscribing");
                                break;
                            }
                        },
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "change feed subscription failed, retrying");
            }
        }
        tokio::select! {
            _ = shutdown.changed() => return,
            () = tokio::time::sleep(reconnect_delay) => {}
        }
    }
}

async fn zone_worker(
    fetcher: Arc<dyn SnapshotFetcher>,
    store: Arc<RwLock<ZoneStateStore>>,
    sink: Arc<dyn AlertSink>,
    mut marks: mpsc::Receiver<()>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut dedup = AlertDeduplicator::new();
    loop {
        tokio::select! {
            _ = shutdown.changed() => return,
            mark = marks.recv() => {
                if mark.is_none() {
                    return;
                }
            }
        }
        tokio::select! {
            _ = shutdown.changed() => return,
            () = reconcile_zones(fetcher.as_ref(), &store, sink.as_ref(), &mut dedup) => {}
        }
    }
}

async fn reconcile_zones(
    fetcher: &dyn SnapshotFetcher,
    store: &RwLock<ZoneStateStore>,
    sink: &dyn AlertSink,
    dedup: &mut AlertDeduplicator,
) {
    match fetcher.fetch_zones().await {
        Ok(records) => {
            let snapshot = {
                let mut guard = store.write().await;
                let outcome = guard.replace_from_upstream(&records);
                if outcome.rejected > 0 {
                    warn!(
                        rejected = outcome.rejected,
                        "dropped upstream zone rows with unusable capacity"
                    );
                }
                debug!(applied = outcome.applied, "zone snapshot replaced");
                guard.list()
            };
            dedup.observe_and_notify(&snapshot, sink);
        }
        Err(e) => {
            // Keep serving the last-known-good snapshot.
            warn!(error = %e, "zone snapshot fetch failed");
        }
    }
}

async fn log_worker(
    fetcher: Arc<dyn SnapshotFetcher>,
    action_log: Arc<RwLock<EmergencyActionLog>>,
    limit: u32,
    mut marks: mpsc::Receiver<()>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => return,
            mark = marks.recv() => {
                if mark.is_none() {
                    return;
                }
            }
        }
        tokio::select! {
            _ = shutdown.changed() => return,
            () = reconcile_logs(fetcher.as_ref(), &action_log, limit) => {}
        }
    }
}

async fn reconcile_logs(
    fetcher: &dyn SnapshotFetcher,
    action_log: &RwLock<EmergencyActionLog>,
    limit: u32,
) {
    match fetcher.fetch_logs(limit).await {
        Ok(entries) => {
            debug!(count = entries.len(), "action log refreshed");
            action_log.write().await.replace_all(entries);
        }
        Err(e) => {
            warn!(error = %e, "action log fetch failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crowdwatch_core::{CriticalAlert, MissingCapacityPolicy};
    use crowdwatch_types::{
        ChangeEvent, ChangeKind, ChangeTable, LogEntry, RawZoneRecord, ZoneId,
    };
    use futures::stream::BoxStream;
    use tokio_stream::wrappers::ReceiverStream;

    use crate::error::FeedError;

    use super::*;

    // -- test doubles -------------------------------------------------------

    /// Hands out pre-built event streams, one per `subscribe` call.
    struct ScriptedSource {
        streams: std::sync::Mutex<VecDeque<mpsc::Receiver<ChangeEvent>>>,
        subscribe_count: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(streams: Vec<mpsc::Receiver<ChangeEvent>>) -> Self {
            Self {
                streams: std::sync::Mutex::new(streams.into_iter().collect()),
                subscribe_count: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl ChangeFeedSource for ScriptedSource {
        async fn subscribe(&self) -> Result<BoxStream<'static, ChangeEvent>, FeedError> {
            self.subscribe_count.fetch_add(1, Ordering::SeqCst);
            let receiver = self.streams.lock().ok().and_then(|mut s| s.pop_front());
            receiver
                .map(|r| ReceiverStream::new(r).boxed())
                .ok_or_else(|| FeedError::Transport(String::from("no stream scripted")))
        }
    }

    /// Returns a fixed zone snapshot, counting and optionally delaying
    /// each fetch.
    struct CountingFetcher {
        zones: Vec<RawZoneRecord>,
        delay: Duration,
        zone_fetches: AtomicUsize,
        log_fetches: AtomicUsize,
    }

    impl CountingFetcher {
        fn new(zones: Vec<RawZoneRecord>, delay: Duration) -> Self {
            Self {
                zones,
                delay,
                zone_fetches: AtomicUsize::new(0),
                log_fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl SnapshotFetcher for CountingFetcher {
        async fn fetch_zones(&self) -> Result<Vec<RawZoneRecord>, FeedError> {
            self.zone_fetches.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self.zones.clone())
        }

        async fn fetch_logs(&self, _limit: u32) -> Result<Vec<LogEntry>, FeedError> {
            self.log_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    struct RecordingSink {
        alerts: std::sync::Mutex<Vec<CriticalAlert>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                alerts: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn count(&self) -> usize {
            self.alerts.lock().map_or(0, |a| a.len())
        }
    }

    impl AlertSink for RecordingSink {
        fn on_critical_entered(&self, alert: &CriticalAlert) {
            if let Ok(mut alerts) = self.alerts.lock() {
                alerts.push(alert.clone());
            }
        }
    }

    // -- helpers ------------------------------------------------------------

    fn record(name: &str, capacity: i64, count: i64) -> RawZoneRecord {
        RawZoneRecord {
            id: ZoneId::new(),
            name: name.to_owned(),
            capacity: Some(capacity),
            current_count: Some(count),
            crowd_level: None,
            status: None,
            last_updated: None,
        }
    }

    fn zone_event() -> ChangeEvent {
        ChangeEvent {
            kind: ChangeKind::Update,
            table: ChangeTable::Zones,
        }
    }

    struct Harness {
        store: Arc<RwLock<ZoneStateStore>>,
        sink: Arc<RecordingSink>,
        fetcher: Arc<CountingFetcher>,
        handle: SubscriptionHandle,
    }

    fn start(source: ScriptedSource, fetcher: CountingFetcher) -> Harness {
        let store = Arc::new(RwLock::new(ZoneStateStore::new(
            MissingCapacityPolicy::default(),
        )));
        let action_log = Arc::new(RwLock::new(EmergencyActionLog::new()));
        let sink = Arc::new(RecordingSink::new());
        let fetcher = Arc::new(fetcher);
        let subscriber = ChangeFeedSubscriber::new(
            Arc::new(source),
            Arc::clone(&fetcher) as Arc<dyn SnapshotFetcher>,
            Arc::clone(&store),
            action_log,
            Arc::clone(&sink) as Arc<dyn AlertSink>,
            Duration::from_millis(20),
            50,
        );
        let handle = subscriber.start();
        Harness {
            store,
            sink,
            fetcher,
            handle,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(80)).await;
    }

    // -- tests --------------------------------------------------------------

    #[tokio::test]
    async fn subscribing_reconciles_immediately() {
        let (tx, rx) = mpsc::channel(16);
        let source = ScriptedSource::new(vec![rx]);
        let fetcher = CountingFetcher::new(
            vec![record("Main Hall", 100, 97)],
            Duration::ZERO,
        );
        let harness = start(source, fetcher);
        settle().await;

        let zones = harness.store.read().await.list();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones.first().map(|z| z.name.as_str()), Some("Main Hall"));
        assert!(harness.fetcher.log_fetches.load(Ordering::SeqCst) >= 1);
        // 97/100 is critical, and startup counts as an entry transition.
        assert_eq!(harness.sink.count(), 1);

        harness.handle.stop().await;
        drop(tx);
    }

    #[tokio::test]
    async fn notification_bursts_coalesce() {
        let (tx, rx) = mpsc::channel(16);
        let source = ScriptedSource::new(vec![rx]);
        let fetcher =
            CountingFetcher::new(vec![record("Plaza", 200, 10)], Duration::from_millis(40));
        let harness = start(source, fetcher);

        for _ in 0..6 {
            let _ = tx.send(zone_event()).await;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;

        // Initial fetch plus at most: one in-flight when the burst landed
        // and one trailing mark. Six notifications must not mean six
        // fetches.
        let fetches = harness.fetcher.zone_fetches.load(Ordering::SeqCst);
        assert!((1..=3).contains(&fetches), "got {fetches} fetches");

        harness.handle.stop().await;
    }

    #[tokio::test]
    async fn resubscribes_after_stream_loss() {
        let (first_tx, first_rx) = mpsc::channel(16);
        let (second_tx, second_rx) = mpsc::channel(16);
        let source = ScriptedSource::new(vec![first_rx, second_rx]);
        let fetcher = CountingFetcher::new(vec![record("Plaza", 200, 10)], Duration::ZERO);
        let harness = start(source, fetcher);
        settle().await;

        let before = harness.fetcher.zone_fetches.load(Ordering::SeqCst);
        // Losing the channel ends the stream; the pump re-subscribes and
        // reconciles again.
        drop(first_tx);
        settle().await;

        let after = harness.fetcher.zone_fetches.load(Ordering::SeqCst);
        assert!(after > before, "expected a fetch after re-subscribe");

        harness.handle.stop().await;
        drop(second_tx);
    }

    #[tokio::test]
    async fn stop_halts_reconciliation_and_is_idempotent() {
        let (tx, rx) = mpsc::channel(16);
        let source = ScriptedSource::new(vec![rx]);
        let fetcher = CountingFetcher::new(vec![record("Plaza", 200, 10)], Duration::ZERO);
        let harness = start(source, fetcher);
        settle().await;

        harness.handle.stop().await;
        harness.handle.stop().await;

        let frozen = harness.fetcher.zone_fetches.load(Ordering::SeqCst);
        let _ = tx.send(zone_event()).await;
        settle().await;
        assert_eq!(
            harness.fetcher.zone_fetches.load(Ordering::SeqCst),
            frozen,
            "no fetches after stop"
        );
    }

    #[tokio::test]
    async fn critical_zone_alerts_once_across_reconciliations() {
        let (tx, rx) = mpsc::channel(16);
        let source = ScriptedSource::new(vec![rx]);
        let fetcher = CountingFetcher::new(vec![record("Gate A", 100, 98)], Duration::ZERO);
        let harness = start(source, fetcher);
        settle().await;

        let _ = tx.send(zone_event()).await;
        settle().await;
        let _ = tx.send(zone_event()).await;
        settle().await;

        assert!(harness.fetcher.zone_fetches.load(Ordering::SeqCst) >= 3);
        // Still critical in every snapshot, so only the entry transition
        // alerted.
        assert_eq!(harness.sink.count(), 1);

        harness.handle.stop().await;
    }
}

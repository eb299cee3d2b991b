//! The emergency action log: an append-only record of dispatched responses.
//!
//! Entries are never modified or removed once appended; only the
//! `status` / `resolved_at` lifecycle fields may change. The log holds
//! the newest-first in-memory view served to operators; durable storage
//! is the persistence layer's concern, and reconciliation refreshes this
//! view from it via [`EmergencyActionLog::replace_all`].
//!
//! Two rapid appends with identical arguments produce two distinct
//! entries -- the log deliberately does not deduplicate.

use crowdwatch_types::{LOG_STATUS_RESOLVED, LogEntry, LogEntryId, UserId, ZoneId};
use chrono::Utc;

/// Maximum entries retained in the in-memory view.
const MAX_ENTRIES: usize = 500;

/// Result of an explicit dispatch confirmation step.
///
/// The confirmation is a value consumed by the caller before any append
/// happens -- there is no blocking prompt inside the engine. A declined
/// confirmation leaves no trace in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchConfirmation {
    /// The operator confirmed the dispatch.
    Confirmed,
    /// The operator declined; nothing is logged.
    Declined,
}

/// In-memory, newest-first emergency action log.
#[derive(Debug, Clone, Default)]
pub struct EmergencyActionLog {
    /// All entries, newest first.
    entries: Vec<LogEntry>,
}

impl EmergencyActionLog {
    /// Create a new empty log.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Number of retained entries.
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log has no entries.
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a pre-built entry (e.g. one just persisted durably).
    ///
    /// If the log exceeds [`MAX_ENTRIES`], the oldest entry is dropped
    /// from the in-memory view (it remains in durable storage).
    pub fn append(&mut self, entry: LogEntry) {
        self.entries.insert(0, entry);
        if self.entries.len() > MAX_ENTRIES {
            self.entries.truncate(MAX_ENTRIES);
        }
    }

    /// Build, append, and return a new entry with a server-assigned
    /// timestamp.
    ///
    /// Identical rapid calls produce distinct entries with distinct ids
    /// and non-decreasing `created_at` values.
    pub fn record(
        &mut self,
        zone_id: Option<ZoneId>,
        action_type: &str,
        description: Option<String>,
        user_id: Option<UserId>,
    ) -> LogEntry {
        let entry = LogEntry::new(zone_id, action_type, description, user_id);
        tracing::info!(
            entry_id = %entry.id,
            zone_id = ?zone_id.map(|z| z.to_string()),
            action_type,
            "emergency action logged"
        );
        self.append(entry.clone());
        entry
    }

    /// Build the entry for a confirmed dispatch without committing it.
    ///
    /// Returns `None` when declined. Callers that write durable storage
    /// persist the entry first and commit it to the view with
    /// [`EmergencyActionLog::append`] only on success, so a failed write
    /// never leaves a ghost entry.
    #[must_use]
    pub fn prepare_dispatch(
        confirmation: DispatchConfirmation,
        zone_id: Option<ZoneId>,
        action_type: &str,
        description: Option<String>,
        user_id: Option<UserId>,
    ) -> Option<LogEntry> {
        match confirmation {
            DispatchConfirmation::Confirmed => {
                Some(LogEntry::new(zone_id, action_type, description, user_id))
            }
            DispatchConfirmation::Declined => {
                tracing::debug!(action_type, "dispatch declined, nothing logged");
                None
            }
        }
    }

    /// Newest-first view, capped at `limit` entries.
    pub fn list(&self, limit: usize) -> &[LogEntry] {
        self.entries.get(..limit.min(self.entries.len())).unwrap_or(&[])
    }

    /// All retained entries, newest first.
    pub fn all(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Mark an entry resolved, setting `status` and `resolved_at`.
    ///
    /// Returns `false` if the id is unknown. These are the only mutable
    /// fields of an entry.
    pub fn resolve(&mut self, id: LogEntryId) -> bool {
        for entry in &mut self.entries {
            if entry.id == id {
                entry.status = Some(LOG_STATUS_RESOLVED.to_owned());
                entry.resolved_at = Some(Utc::now());
                return true;
            }
        }
        false
    }

    /// Replace the in-memory view from a fresh persistence fetch.
    ///
    /// Entries are re-sorted newest first regardless of input order, so
    /// a fetch path cannot corrupt the view's ordering contract.
    pub fn replace_all(&mut self, mut entries: Vec<LogEntry>) {
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        entries.truncate(MAX_ENTRIES);
        self.entries = entries;
    }
}

#[cfg(test)]
mod tests {
    use crowdwatch_types::{LOG_STATUS_ACTIVE, action_types};

    use super::*;

    #[test]
    fn new_log_is_empty() {
        let log = EmergencyActionLog::new();
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
    }

    #[test]
    fn rapid_identical_records_produce_distinct_entries() {
        let mut log = EmergencyActionLog::new();
        let zone = ZoneId::new();
        let a = log.record(Some(zone), action_types::AMBULANCE, None, None);
        let b = log.record(Some(zone), action_types::AMBULANCE, None, None);

        assert_eq!(log.len(), 2);
        assert_ne!(a.id, b.id);
        assert!(a.created_at <= b.created_at);
    }

    #[test]
    fn list_is_newest_first() {
        let mut log = EmergencyActionLog::new();
        let first = log.record(None, action_types::POLICE, None, None);
        let second = log.record(None, action_types::FIRE, None, None);

        let listed = log.list(10);
        assert_eq!(listed.first().map(|e| e.id), Some(second.id));
        assert_eq!(listed.get(1).map(|e| e.id), Some(first.id));
    }

    #[test]
    fn list_respects_limit() {
        let mut log = EmergencyActionLog::new();
        for _ in 0..5 {
            let _ = log.record(None, action_types::RESCUE, None, None);
        }
        assert_eq!(log.list(3).len(), 3);
        assert_eq!(log.list(50).len(), 5);
    }

    #[test]
    fn capped_at_max_entries() {
        let mut log = EmergencyActionLog::new();
        for i in 0..600usize {
            let _ = log.record(None, &format!("Action {i}"), None, None);
        }
        assert_eq!(log.len(), MAX_ENTRIES);
        // Newest entry survives the cap.
        assert_eq!(
            log.all().first().map(|e| e.action_type.clone()),
            Some(String::from("Action 599"))
        );
    }

    #[test]
    fn resolve_sets_lifecycle_fields_only() {
        let mut log = EmergencyActionLog::new();
        let entry = log.record(None, action_types::EVACUATION, None, None);
        assert_eq!(entry.status.as_deref(), Some(LOG_STATUS_ACTIVE));

        assert!(log.resolve(entry.id));
        let resolved = log.all().first().cloned();
        assert_eq!(
            resolved.as_ref().and_then(|e| e.status.as_deref()),
            Some(LOG_STATUS_RESOLVED)
        );
        assert!(resolved.as_ref().is_some_and(|e| e.resolved_at.is_some()));
        // Immutable fields untouched.
        assert_eq!(
            resolved.map(|e| (e.id, e.action_type, e.created_at)),
            Some((entry.id, entry.action_type, entry.created_at))
        );
    }

    #[test]
    fn resolve_unknown_id_returns_false() {
        let mut log = EmergencyActionLog::new();
        assert!(!log.resolve(LogEntryId::new()));
    }

    #[test]
    fn prepare_dispatch_builds_without_committing() {
        let log = EmergencyActionLog::new();
        let entry = EmergencyActionLog::prepare_dispatch(
            DispatchConfirmation::Confirmed,
            None,
            action_types::POLICE,
            None,
            None,
        );
        // The entry exists but the view is untouched until append.
        assert!(entry.is_some());
        assert!(log.is_empty());

        let declined = EmergencyActionLog::prepare_dispatch(
            DispatchConfirmation::Declined,
            None,
            action_types::POLICE,
            None,
            None,
        );
        assert!(declined.is_none());
    }

    #[test]
    fn confirmed_dispatch_commits_via_append() {
        let mut log = EmergencyActionLog::new();
        let entry = EmergencyActionLog::prepare_dispatch(
            DispatchConfirmation::Confirmed,
            None,
            action_types::DISASTER,
            Some(String::from("coordination requested")),
            None,
        );
        if let Some(entry) = entry {
            log.append(entry);
        }
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn replace_all_restores_newest_first_order() {
        let mut log = EmergencyActionLog::new();
        let older = LogEntry::new(None, action_types::POLICE, None, None);
        let newer = LogEntry::new(None, action_types::FIRE, None, None);

        // Deliberately oldest-first input.
        log.replace_all(vec![older.clone(), newer.clone()]);
        assert_eq!(log.all().first().map(|e| e.id), Some(newer.id));
        assert_eq!(log.all().get(1).map(|e| e.id), Some(older.id));
    }
}

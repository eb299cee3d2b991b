//! CSV export of the emergency action log.

use std::collections::BTreeMap;

use crowdwatch_types::{LOG_STATUS_ACTIVE, LogEntry, ZoneId};

/// Header row of the exported file.
const CSV_HEADER: &str = "Timestamp,Zone,Action,Status,Description";

/// Label used when an entry references no zone.
const GLOBAL_ZONE_LABEL: &str = "All Zones";

/// Render log entries to CSV, newest first, one line per entry.
///
/// Fields are joined verbatim without quoting or escaping; the action
/// labels and zone names this system produces contain no commas, and
/// the consumers are spreadsheets. Entries referencing a zone missing
/// from the lookup fall back to the raw id so no row is dropped.
pub fn logs_to_csv(entries: &[LogEntry], zone_names: &BTreeMap<ZoneId, String>) -> String {
    let mut csv = String::from(CSV_HEADER);
    csv.push('\n');

    for entry in entries {
        let zone = entry.zone_id.map_or_else(
            || String::from(GLOBAL_ZONE_LABEL),
            |id| zone_names.get(&id).cloned().unwrap_or_else(|| id.to_string()),
        );
        let status = entry.status.as_deref().unwrap_or(LOG_STATUS_ACTIVE);
        let description = entry.description.as_deref().unwrap_or("");
        csv.push_str(&format!(
            "{},{zone},{},{status},{description}\n",
            entry.created_at.to_rfc3339(),
            entry.action_type,
        ));
    }

    csv
}

//! REST API endpoint handlers for the Observer server.
//!
//! All reads come from the shared in-memory engine state; the database
//! is only touched to persist administrator mutations.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/zones` | List all zones with occupancy |
//! | `POST` | `/api/zones` | Create a zone |
//! | `PATCH` | `/api/zones/{id}` | Edit capacity and/or count |
//! | `GET` | `/api/logs` | List emergency log entries |
//! | `POST` | `/api/logs` | Dispatch an emergency action |
//! | `POST` | `/api/logs/{id}/resolve` | Mark an entry resolved |
//! | `GET` | `/api/logs/export` | Download the log as CSV |

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use chrono::Utc;
use crowdwatch_core::{DispatchConfirmation, EmergencyActionLog, display_percent};
use crowdwatch_db::{LogStore, ZoneStore};
use crowdwatch_types::{LogEntry, LogEntryId, UserId, Zone, ZoneId};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ObserverError;
use crate::export;
use crate::state::AppState;

/// Default number of log entries returned by `GET /api/logs`.
const DEFAULT_LOG_LIMIT: usize = 50;

// ---------------------------------------------------------------------------
// Request / query structs
// ---------------------------------------------------------------------------

/// Body for `POST /api/zones`.
#[derive(Debug, serde::Deserialize)]
pub struct CreateZoneRequest {
    /// Display name for the new zone.
    pub name: String,
    /// Maximum capacity; must be positive.
    pub capacity: i64,
}

/// Body for `PATCH /api/zones/{id}`.
///
/// Both fields optional; when both are present they commit atomically,
/// so the classification reflects the combined result.
#[derive(Debug, serde::Deserialize)]
pub struct EditZoneRequest {
    /// New capacity, if changing.
    pub capacity: Option<i64>,
    /// New occupancy count, if changing.
    pub current_count: Option<i64>,
}

/// Body for `POST /api/logs`.
#[derive(Debug, serde::Deserialize)]
pub struct CreateLogRequest {
    /// Referenced zone, or absent for a global action.
    pub zone_id: Option<ZoneId>,
    /// Label of the dispatched response.
    pub action_type: String,
    /// Free-text context.
    pub description: Option<String>,
    /// Authenticated caller, if any.
    pub user_id: Option<UserId>,
    /// Explicit dispatch confirmation; a declined dispatch logs nothing.
    pub confirmation: DispatchConfirmation,
}

/// Query parameters for `GET /api/logs`.
#[derive(Debug, serde::Deserialize)]
pub struct LogsQuery {
    /// Maximum entries to return (default 50).
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing engine status and API links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let zones = state.store.read().await.list();
    let zone_count = zones.len();
    let critical_count = zones
        .iter()
        .filter(|z| z.crowd_level == crowdwatch_types::CrowdLevel::Critical)
        .count();
    let log_count = state.action_log.read().await.len();

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Crowdwatch Observer</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 720px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        .metric .critical {{ color: #f85149; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
        .status {{ color: #3fb950; font-weight: bold; }}
        hr {{ border: none; border-top: 1px solid #30363d; margin: 1.5rem 0; }}
    </style>
</head>
<body>
    <h1>Crowdwatch Observer</h1>
    <p>Status: <span class="status">RUNNING</span></p>

    <div>
        <div class="metric">
            <div class="label">Zones</div>
            <div class="value">{zone_count}</div>
        </div>
        <div class="metric">
            <div class="label">Critical</div>
            <div class="value critical">{critical_count}</div>
        </div>
        <div class="metric">
            <div class="label">Log entries</div>
            <div class="value">{log_count}</div>
        </div>
    </div>

    <hr>

    <h2>API Endpoints</h2>
    <ul>
        <li><a href="/api/zones">GET /api/zones</a> -- Zone occupancy snapshot</li>
        <li>POST /api/zones -- Create a zone</li>
        <li>PATCH /api/zones/:id -- Edit capacity / count</li>
        <li><a href="/api/logs">GET /api/logs</a> -- Emergency action log</li>
        <li>POST /api/logs -- Dispatch an emergency action</li>
        <li>POST /api/logs/:id/resolve -- Resolve an entry</li>
        <li><a href="/api/logs/export">GET /api/logs/export</a> -- CSV export</li>
    </ul>

    <h2>WebSocket</h2>
    <ul>
        <li><code>ws://host:port/ws/alerts</code> -- Live critical alert stream</li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /api/zones -- occupancy snapshot
// ---------------------------------------------------------------------------

/// List every zone with its derived occupancy percentage.
///
/// Ordered by name (ties broken by id) for a stable dashboard layout.
pub async fn list_zones(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ObserverError> {
    let zones = state.store.read().await.list();

    let body: Vec<serde_json::Value> = zones.iter().map(zone_json).collect();

    Ok(Json(serde_json::json!({
        "count": body.len(),
        "zones": body,
    })))
}

// ---------------------------------------------------------------------------
// POST /api/zones -- create a zone
// ---------------------------------------------------------------------------

/// Create a zone with an empty count.
///
/// Returns `201` with the canonical zone, or `400` for an empty name or
/// non-positive capacity.
pub async fn create_zone(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateZoneRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    let zone = state.admin.create_zone(&req.name, req.capacity).await?;

    if let Some(db) = &state.db {
        ZoneStore::new(db.pool()).insert(&zone).await?;
    }

    Ok((StatusCode::CREATED, Json(zone_json(&zone))))
}

// ---------------------------------------------------------------------------
// PATCH /api/zones/{id} -- edit capacity and/or count
// ---------------------------------------------------------------------------

/// Apply an administrator edit to one zone.
///
/// The classification in the response reflects the combined edit; a
/// capacity cut below the current count yields `critical` immediately.
pub async fn edit_zone(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
    Json(req): Json<EditZoneRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    let id = ZoneId::from(parse_uuid(&id_str)?);
    let zone = state
        .admin
        .edit_zone(id, req.capacity, req.current_count)
        .await?;

    if let Some(db) = &state.db {
        let stored = ZoneStore::new(db.pool()).update(&zone).await?;
        if !stored {
            // The snapshot knows a zone the database lost; reconciliation
            // will settle which side is right.
            warn!(zone_id = %zone.id, "edited zone missing from database");
        }
    }

    Ok(Json(zone_json(&zone)))
}

// ---------------------------------------------------------------------------
// GET /api/logs -- list emergency log entries
// ---------------------------------------------------------------------------

/// List the most recent emergency actions, newest first, with zone
/// names joined from the current snapshot.
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LogsQuery>,
) -> Result<impl IntoResponse, ObserverError> {
    let limit = params.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    let names = zone_names(&state).await;

    let log = state.action_log.read().await;
    let entries: Vec<serde_json::Value> = log
        .list(limit)
        .iter()
        .map(|entry| log_json(entry, &names))
        .collect();

    Ok(Json(serde_json::json!({
        "count": entries.len(),
        "logs": entries,
    })))
}

// ---------------------------------------------------------------------------
// POST /api/logs -- dispatch an emergency action
// ---------------------------------------------------------------------------

/// Record a dispatched emergency action.
///
/// A declined confirmation returns `204` and leaves no trace. Identical
/// rapid dispatches are deliberately all recorded. The durable write
/// happens before the in-memory view sees the entry, so a `503` never
/// leaves an unpersisted entry behind.
pub async fn create_log(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateLogRequest>,
) -> Result<Response, ObserverError> {
    if req.action_type.trim().is_empty() {
        return Err(ObserverError::Validation(String::from(
            "action_type must not be empty",
        )));
    }

    let Some(entry) = EmergencyActionLog::prepare_dispatch(
        req.confirmation,
        req.zone_id,
        &req.action_type,
        req.description,
        req.user_id,
    ) else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    if let Some(db) = &state.db {
        LogStore::new(db.pool()).insert(&entry).await?;
    }
    state.action_log.write().await.append(entry.clone());
    info!(
        entry_id = %entry.id,
        action_type = %entry.action_type,
        "emergency action logged"
    );

    let names = zone_names(&state).await;
    Ok((StatusCode::CREATED, Json(log_json(&entry, &names))).into_response())
}

// ---------------------------------------------------------------------------
// POST /api/logs/{id}/resolve -- resolve an entry
// ---------------------------------------------------------------------------

/// Mark a log entry resolved.
///
/// Only the lifecycle fields change; `404` for an unknown id. The
/// durable resolve happens before the in-memory one, so a `503` leaves
/// the entry visibly unresolved rather than locally resolved.
pub async fn resolve_log(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let id = LogEntryId::from(parse_uuid(&id_str)?);

    let known = state.action_log.read().await.all().iter().any(|e| e.id == id);
    if !known {
        return Err(ObserverError::NotFound(format!("log entry {id}")));
    }

    if let Some(db) = &state.db {
        let stored = LogStore::new(db.pool()).resolve(id, Utc::now()).await?;
        if !stored {
            warn!(entry_id = %id, "resolved entry missing from database");
        }
    }

    if !state.action_log.write().await.resolve(id) {
        // The entry left the view between the check and the write
        // (reconciliation replaced it); durable state already holds the
        // resolution.
        warn!(entry_id = %id, "resolved entry no longer in view");
    }

    let names = zone_names(&state).await;
    let log = state.action_log.read().await;
    let entry = log
        .all()
        .iter()
        .find(|e| e.id == id)
        .ok_or_else(|| ObserverError::NotFound(format!("log entry {id}")))?;

    Ok(Json(log_json(entry, &names)))
}

// ---------------------------------------------------------------------------
// GET /api/logs/export -- CSV download
// ---------------------------------------------------------------------------

/// Download the retained log as a CSV attachment.
pub async fn export_logs(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ObserverError> {
    let names = zone_names(&state).await;
    let log = state.action_log.read().await;
    let csv = export::logs_to_csv(log.all(), &names);

    let filename = format!("emergency_logs_{}.csv", Utc::now().format("%Y-%m-%d"));
    let headers = [
        ("content-type", String::from("text/csv; charset=utf-8")),
        (
            "content-disposition",
            format!("attachment; filename=\"{filename}\""),
        ),
    ];
    Ok((headers, csv))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse a UUID from a request path segment.
fn parse_uuid(s: &str) -> Result<Uuid, ObserverError> {
    s.parse()
        .map_err(|_| ObserverError::InvalidUuid(format!("'{s}' is not a valid UUID")))
}

/// Zone id -> name lookup from the current snapshot.
async fn zone_names(state: &AppState) -> BTreeMap<ZoneId, String> {
    state
        .store
        .read()
        .await
        .list()
        .iter()
        .map(|z| (z.id, z.name.clone()))
        .collect()
}

/// Serialize a zone with its derived occupancy percentage.
fn zone_json(zone: &Zone) -> serde_json::Value {
    serde_json::json!({
        "id": zone.id,
        "name": zone.name,
        "capacity": zone.capacity,
        "current_count": zone.current_count,
        "crowd_level": zone.crowd_level,
        "status": zone.status,
        "occupancy_percent": display_percent(zone.current_count, zone.capacity),
        "last_updated": zone.last_updated,
    })
}

/// Serialize a log entry with its zone name joined in.
fn log_json(entry: &LogEntry, names: &BTreeMap<ZoneId, String>) -> serde_json::Value {
    let zone_name = entry
        .zone_id
        .and_then(|id| names.get(&id).cloned());
    serde_json::json!({
        "id": entry.id,
        "zone_id": entry.zone_id,
        "zone_name": zone_name,
        "action_type": entry.action_type,
        "description": entry.description,
        "user_id": entry.user_id,
        "created_at": entry.created_at,
        "status": entry.status,
        "resolved_at": entry.resolved_at,
    })
}

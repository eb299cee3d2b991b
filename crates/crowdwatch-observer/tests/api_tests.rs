//! Integration tests for the Observer API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. Persistence is left unattached, so handler
//! logic and routing are validated against the in-memory engine state
//! alone.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use crowdwatch_core::{EmergencyActionLog, MissingCapacityPolicy, ZoneStateStore};
use crowdwatch_observer::router::build_router;
use crowdwatch_observer::state::AppState;
use crowdwatch_types::action_types;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tower::ServiceExt;

fn make_state() -> Arc<AppState> {
    Arc::new(AppState::new(
        Arc::new(RwLock::new(ZoneStateStore::new(
            MissingCapacityPolicy::default(),
        ))),
        Arc::new(RwLock::new(EmergencyActionLog::new())),
    ))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Create a zone through the API and return its id as a string.
async fn create_zone(state: &Arc<AppState>, name: &str, capacity: i64) -> String {
    let response = build_router(Arc::clone(state))
        .oneshot(json_request(
            "POST",
            "/api/zones",
            json!({ "name": name, "capacity": capacity }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_to_json(response.into_body()).await;
    body["id"].as_str().unwrap().to_owned()
}

// =========================================================================
// Status page
// =========================================================================

#[tokio::test]
async fn index_returns_html_status_page() {
    let state = make_state();
    let response = build_router(state)
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_to_string(response.into_body()).await;
    assert!(html.contains("Crowdwatch Observer"));
}

// =========================================================================
// Zones
// =========================================================================

#[tokio::test]
async fn created_zone_appears_in_listing_with_occupancy() {
    let state = make_state();
    create_zone(&state, "Main Hall", 200).await;

    let response = build_router(state)
        .oneshot(Request::get("/api/zones").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["count"], 1);
    let zone = &body["zones"][0];
    assert_eq!(zone["name"], "Main Hall");
    assert_eq!(zone["capacity"], 200);
    assert_eq!(zone["current_count"], 0);
    assert_eq!(zone["crowd_level"], "low");
    assert_eq!(zone["occupancy_percent"], 0);
}

#[tokio::test]
async fn zone_listing_is_sorted_by_name() {
    let state = make_state();
    create_zone(&state, "West Stand", 100).await;
    create_zone(&state, "East Stand", 100).await;

    let response = build_router(state)
        .oneshot(Request::get("/api/zones").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["zones"][0]["name"], "East Stand");
    assert_eq!(body["zones"][1]["name"], "West Stand");
}

#[tokio::test]
async fn create_zone_rejects_bad_capacity() {
    let state = make_state();
    let response = build_router(state)
        .oneshot(json_request(
            "POST",
            "/api/zones",
            json!({ "name": "Pit", "capacity": 0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_zone_rejects_empty_name() {
    let state = make_state();
    let response = build_router(state)
        .oneshot(json_request(
            "POST",
            "/api/zones",
            json!({ "name": "   ", "capacity": 100 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn combined_edit_classifies_atomically() {
    let state = make_state();
    let id = create_zone(&state, "Floor", 100).await;

    // Count to 60 of 100 -- medium.
    let response = build_router(Arc::clone(&state))
        .oneshot(json_request(
            "PATCH",
            &format!("/api/zones/{id}"),
            json!({ "current_count": 60 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["crowd_level"], "medium");

    // Cutting capacity under the count flips straight to critical.
    let response = build_router(state)
        .oneshot(json_request(
            "PATCH",
            &format!("/api/zones/{id}"),
            json!({ "capacity": 50 }),
        ))
        .await
        .unwrap();
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["crowd_level"], "critical");
    assert_eq!(body["occupancy_percent"], 120);
}

#[tokio::test]
async fn edit_unknown_zone_is_not_found() {
    let state = make_state();
    let response = build_router(state)
        .oneshot(json_request(
            "PATCH",
            &format!("/api/zones/{}", uuid::Uuid::now_v7()),
            json!({ "capacity": 10 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn edit_with_malformed_uuid_is_bad_request() {
    let state = make_state();
    let response = build_router(state)
        .oneshot(json_request(
            "PATCH",
            "/api/zones/not-a-uuid",
            json!({ "capacity": 10 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =========================================================================
// Emergency action log
// =========================================================================

#[tokio::test]
async fn confirmed_dispatch_is_logged_with_zone_name() {
    let state = make_state();
    let zone_id = create_zone(&state, "Gate A", 100).await;

    let response = build_router(Arc::clone(&state))
        .oneshot(json_request(
            "POST",
            "/api/logs",
            json!({
                "zone_id": zone_id,
                "action_type": action_types::POLICE,
                "description": "crowd control requested",
                "confirmation": "confirmed",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["zone_name"], "Gate A");
    assert_eq!(body["status"], "active");

    let response = build_router(state)
        .oneshot(Request::get("/api/logs").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn declined_dispatch_leaves_no_trace() {
    let state = make_state();
    let response = build_router(Arc::clone(&state))
        .oneshot(json_request(
            "POST",
            "/api/logs",
            json!({
                "action_type": action_types::EVACUATION,
                "confirmation": "declined",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = build_router(state)
        .oneshot(Request::get("/api/logs").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn identical_dispatches_are_both_logged() {
    let state = make_state();
    let request = json!({
        "action_type": action_types::FIRE,
        "confirmation": "confirmed",
    });
    for _ in 0..2 {
        let response = build_router(Arc::clone(&state))
            .oneshot(json_request("POST", "/api/logs", request.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = build_router(state)
        .oneshot(Request::get("/api/logs").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["count"], 2);
}

#[tokio::test]
async fn empty_action_type_is_rejected() {
    let state = make_state();
    let response = build_router(state)
        .oneshot(json_request(
            "POST",
            "/api/logs",
            json!({ "action_type": "", "confirmation": "confirmed" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn logs_listing_is_newest_first_and_limited() {
    let state = make_state();
    for action in [action_types::POLICE, action_types::AMBULANCE, action_types::RESCUE] {
        let response = build_router(Arc::clone(&state))
            .oneshot(json_request(
                "POST",
                "/api/logs",
                json!({ "action_type": action, "confirmation": "confirmed" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = build_router(state)
        .oneshot(
            Request::get("/api/logs?limit=2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["logs"][0]["action_type"], action_types::RESCUE);
    assert_eq!(body["logs"][1]["action_type"], action_types::AMBULANCE);
}

#[tokio::test]
async fn resolve_sets_lifecycle_fields() {
    let state = make_state();
    let response = build_router(Arc::clone(&state))
        .oneshot(json_request(
            "POST",
            "/api/logs",
            json!({ "action_type": action_types::DISASTER, "confirmation": "confirmed" }),
        ))
        .await
        .unwrap();
    let created = body_to_json(response.into_body()).await;
    let id = created["id"].as_str().unwrap();

    let response = build_router(Arc::clone(&state))
        .oneshot(json_request(
            "POST",
            &format!("/api/logs/{id}/resolve"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["status"], "resolved");
    assert!(!body["resolved_at"].is_null());
    assert_eq!(body["action_type"], action_types::DISASTER);
}

#[tokio::test]
async fn resolve_unknown_entry_is_not_found() {
    let state = make_state();
    let response = build_router(state)
        .oneshot(json_request(
            "POST",
            &format!("/api/logs/{}/resolve", uuid::Uuid::now_v7()),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn failed_resolve_mutates_nothing() {
    // The existence check runs before any write, so a 404 resolve must
    // leave existing entries untouched.
    let state = make_state();
    let response = build_router(Arc::clone(&state))
        .oneshot(json_request(
            "POST",
            "/api/logs",
            json!({ "action_type": action_types::RESCUE, "confirmation": "confirmed" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = build_router(Arc::clone(&state))
        .oneshot(json_request(
            "POST",
            &format!("/api/logs/{}/resolve", uuid::Uuid::now_v7()),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = build_router(state)
        .oneshot(Request::get("/api/logs").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["logs"][0]["status"], "active");
    assert!(body["logs"][0]["resolved_at"].is_null());
}

// =========================================================================
// CSV export
// =========================================================================

#[tokio::test]
async fn export_returns_csv_attachment() {
    let state = make_state();
    let zone_id = create_zone(&state, "Main Hall", 100).await;
    let response = build_router(Arc::clone(&state))
        .oneshot(json_request(
            "POST",
            "/api/logs",
            json!({
                "zone_id": zone_id,
                "action_type": action_types::AMBULANCE,
                "confirmation": "confirmed",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = build_router(state)
        .oneshot(
            Request::get("/api/logs/export")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    assert!(content_type.starts_with("text/csv"));

    let csv = body_to_string(response.into_body()).await;
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("Timestamp,Zone,Action,Status,Description"));
    let row = lines.next().unwrap();
    assert!(row.contains("Main Hall"));
    assert!(row.contains(action_types::AMBULANCE));
}

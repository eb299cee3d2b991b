//! Observer API server for the Crowdwatch engine.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws/alerts`) streaming critical-entry
//!   alerts via [`tokio::sync::broadcast`]
//! - **REST endpoints** for the zone occupancy snapshot, administrator
//!   zone edits, and the emergency action log
//! - **CSV export** of the action log for incident reports
//! - **Minimal HTML status page** (`GET /`) with live counts and links
//!
//! # Architecture
//!
//! Reads are served from the shared in-memory engine state (the same
//! handles the change feed subscriber reconciles into), so no request
//! waits on the database. Administrator writes validate first, then
//! persist, then update the snapshot; the change feed settles any
//! disagreement between the two.
//!
//! [`AppState`]: state::AppState

pub mod error;
pub mod export;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::ObserverError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use startup::{StartupError, spawn_observer};
pub use state::{AppState, BroadcastAlertSink};

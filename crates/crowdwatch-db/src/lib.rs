//! `PostgreSQL` persistence layer for the Crowdwatch engine.
//!
//! The database is the system of record; the engine's in-memory
//! snapshot is a cache over it, kept current by re-fetching on change
//! notifications. Reads therefore return unvalidated rows and writes
//! persist validated canonical state:
//!
//! ```text
//! Change notification --> ZoneStore::fetch_all --> normalize --> snapshot
//! Admin mutation --> validate --> snapshot --> ZoneStore::insert/update
//! ```
//!
//! # Modules
//!
//! - [`postgres`] -- Connection pool and configuration
//! - [`zone_store`] -- The `zones` table
//! - [`log_store`] -- The `emergency_logs` table
//! - [`error`] -- Shared error types

pub mod error;
pub mod log_store;
pub mod postgres;
pub mod zone_store;

// Re-export primary types for convenience.
pub use error::DbError;
pub use log_store::LogStore;
pub use postgres::{PostgresConfig, PostgresPool};
pub use zone_store::ZoneStore;

//! Emergency action log persistence.
//!
//! Entries are built application-side ([`LogEntry::new`]) so ids and
//! timestamps are assigned once, before the insert; the database stores
//! them verbatim. The table is append-only apart from the
//! `status`/`resolved_at` lifecycle columns.

use chrono::{DateTime, Utc};
use crowdwatch_types::{LogEntry, LogEntryId, UserId, ZoneId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;

/// Operations on the `emergency_logs` table.
pub struct LogStore<'a> {
    pool: &'a PgPool,
}

impl<'a> LogStore<'a> {
    /// Create a new log store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a log entry.
    ///
    /// No deduplication: two identical dispatches are two rows.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn insert(&self, entry: &LogEntry) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO emergency_logs (id, zone_id, action_type, description, user_id, created_at, status, resolved_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(entry.id.into_inner())
        .bind(entry.zone_id.map(ZoneId::into_inner))
        .bind(&entry.action_type)
        .bind(&entry.description)
        .bind(entry.user_id.map(UserId::into_inner))
        .bind(entry.created_at)
        .bind(&entry.status)
        .bind(entry.resolved_at)
        .execute(self.pool)
        .await?;

        tracing::debug!(
            entry_id = %entry.id,
            action_type = entry.action_type,
            "Inserted emergency log entry"
        );
        Ok(())
    }

    /// Fetch the most recent entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn fetch_recent(&self, limit: u32) -> Result<Vec<LogEntry>, DbError> {
        let rows = sqlx::query_as::<_, LogRow>(
            r"SELECT id, zone_id, action_type, description, user_id, created_at, status, resolved_at
              FROM emergency_logs
              ORDER BY created_at DESC, id DESC
              LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(LogRow::into_entry).collect())
    }

    /// Mark an entry resolved.
    ///
    /// Only the lifecycle columns change; returns `false` if no row with
    /// that id exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn resolve(
        &self,
        id: LogEntryId,
        resolved_at: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            r"UPDATE emergency_logs
              SET status = 'resolved', resolved_at = $2
              WHERE id = $1",
        )
        .bind(id.into_inner())
        .bind(resolved_at)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// A row from the `emergency_logs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct LogRow {
    id: Uuid,
    zone_id: Option<Uuid>,
    action_type: String,
    description: Option<String>,
    user_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    status: Option<String>,
    resolved_at: Option<DateTime<Utc>>,
}

impl LogRow {
    fn into_entry(self) -> LogEntry {
        LogEntry {
            id: LogEntryId::from(self.id),
            zone_id: self.zone_id.map(ZoneId::from),
            action_type: self.action_type,
            description: self.description,
            user_id: self.user_id.map(UserId::from),
            created_at: self.created_at,
            status: self.status,
            resolved_at: self.resolved_at,
        }
    }
}

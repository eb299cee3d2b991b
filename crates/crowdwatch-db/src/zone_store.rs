//! Zone row persistence.
//!
//! Reads deliberately return [`RawZoneRecord`], not [`Zone`]: columns
//! written by other producers have shown missing capacities and
//! free-form status labels, so every row read from the database goes
//! back through the store's normalization and classification path
//! before it is served. Writes come from the validated admin path and
//! persist canonical [`Zone`] values.

use crowdwatch_types::{RawZoneRecord, Zone, ZoneId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;

/// Operations on the `zones` table.
pub struct ZoneStore<'a> {
    pool: &'a PgPool,
}

impl<'a> ZoneStore<'a> {
    /// Create a new zone store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Fetch every zone row, unvalidated.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn fetch_all(&self) -> Result<Vec<RawZoneRecord>, DbError> {
        let rows = sqlx::query_as::<_, ZoneRow>(
            r"SELECT id, name, capacity, current_count, crowd_level, status, last_updated
              FROM zones
              ORDER BY name, id",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(ZoneRow::into_record).collect())
    }

    /// Insert a newly created zone.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn insert(&self, zone: &Zone) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO zones (id, name, capacity, current_count, crowd_level, status, last_updated)
              VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(zone.id.into_inner())
        .bind(&zone.name)
        .bind(i64::from(zone.capacity))
        .bind(i64::from(zone.current_count))
        .bind(zone.crowd_level.as_str())
        .bind(zone.status.as_str())
        .bind(zone.last_updated)
        .execute(self.pool)
        .await?;

        tracing::debug!(zone_id = %zone.id, name = zone.name, "Inserted zone");
        Ok(())
    }

    /// Write back an edited zone's mutable columns.
    ///
    /// Returns `false` if no row with that id exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn update(&self, zone: &Zone) -> Result<bool, DbError> {
        let result = sqlx::query(
            r"UPDATE zones
              SET capacity = $2,
                  current_count = $3,
                  crowd_level = $4,
                  status = $5,
                  last_updated = $6
              WHERE id = $1",
        )
        .bind(zone.id.into_inner())
        .bind(i64::from(zone.capacity))
        .bind(i64::from(zone.current_count))
        .bind(zone.crowd_level.as_str())
        .bind(zone.status.as_str())
        .bind(zone.last_updated)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// A row from the `zones` table, before normalization.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ZoneRow {
    id: Uuid,
    name: String,
    capacity: Option<i64>,
    current_count: Option<i64>,
    crowd_level: Option<String>,
    status: Option<String>,
    last_updated: Option<chrono::DateTime<chrono::Utc>>,
}

impl ZoneRow {
    fn into_record(self) -> RawZoneRecord {
        RawZoneRecord {
            id: ZoneId::from(self.id),
            name: self.name,
            capacity: self.capacity,
            current_count: self.current_count,
            crowd_level: self.crowd_level,
            status: self.status,
            last_updated: self.last_updated,
        }
    }
}

//! # Dining Table Repository
//!
//! Row-level access to `dining_tables`. Tables are never deleted.

use bistro_core::query::TableFilter;
use bistro_core::table::TableUpdate;
use bistro_core::{DiningTable, TableState};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteExecutor;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

const COLUMNS: &str = "id, number, capacity, location, state, reservation_ref, maintenance_reason, \
                       last_cleaned_at, state_changed_at, is_active, created_at";

/// Loads one table.
pub async fn find<'e>(exec: impl SqliteExecutor<'e>, id: i64) -> DbResult<Option<DiningTable>> {
    let table = sqlx::query_as::<_, DiningTable>(&format!(
        "SELECT {COLUMNS} FROM dining_tables WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(exec)
    .await?;
    Ok(table)
}

pub async fn find_by_number<'e>(
    exec: impl SqliteExecutor<'e>,
    number: i64,
) -> DbResult<Option<DiningTable>> {
    let table = sqlx::query_as::<_, DiningTable>(&format!(
        "SELECT {COLUMNS} FROM dining_tables WHERE number = ?1"
    ))
    .bind(number)
    .fetch_optional(exec)
    .await?;
    Ok(table)
}

/// Inserts a Free, active table and returns its id.
pub async fn insert<'e>(
    exec: impl SqliteExecutor<'e>,
    number: i64,
    capacity: i64,
    location: &str,
    now: DateTime<Utc>,
) -> DbResult<i64> {
    debug!(number, capacity, location, "Inserting dining table");

    let result = sqlx::query(
        r#"
        INSERT INTO dining_tables (number, capacity, location, state, state_changed_at, is_active, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, 1, ?5)
        "#,
    )
    .bind(number)
    .bind(capacity)
    .bind(location)
    .bind(TableState::Free)
    .bind(now)
    .execute(exec)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Persists a transition, guarded on the state it was decided from.
///
/// Returns the number of rows changed: 0 means the table moved underneath.
pub async fn apply_update<'e>(
    exec: impl SqliteExecutor<'e>,
    id: i64,
    expected: TableState,
    update: &TableUpdate,
    now: DateTime<Utc>,
) -> DbResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE dining_tables SET
            state = ?3,
            reservation_ref = ?4,
            maintenance_reason = ?5,
            state_changed_at = ?6
        WHERE id = ?1 AND state = ?2
        "#,
    )
    .bind(id)
    .bind(expected)
    .bind(update.state)
    .bind(&update.reservation_ref)
    .bind(&update.maintenance_reason)
    .bind(now)
    .execute(exec)
    .await?;

    Ok(result.rows_affected())
}

/// Stamps `last_cleaned_at`. State is untouched.
pub async fn mark_cleaned<'e>(
    exec: impl SqliteExecutor<'e>,
    id: i64,
    now: DateTime<Utc>,
) -> DbResult<u64> {
    let result = sqlx::query("UPDATE dining_tables SET last_cleaned_at = ?2 WHERE id = ?1")
        .bind(id)
        .bind(now)
        .execute(exec)
        .await?;
    Ok(result.rows_affected())
}

/// Soft-enables or soft-disables a table.
pub async fn set_active<'e>(exec: impl SqliteExecutor<'e>, id: i64, active: bool) -> DbResult<u64> {
    let result = sqlx::query("UPDATE dining_tables SET is_active = ?2 WHERE id = ?1")
        .bind(id)
        .bind(active)
        .execute(exec)
        .await?;
    Ok(result.rows_affected())
}

// =============================================================================
// Read Repository
// =============================================================================

/// Repository for dining table reads.
#[derive(Debug, Clone)]
pub struct TableRepository {
    pool: SqlitePool,
}

impl TableRepository {
    /// Creates a new TableRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TableRepository { pool }
    }

    /// Gets a table by ID.
    pub async fn get(&self, id: i64) -> DbResult<Option<DiningTable>> {
        find(&self.pool, id).await
    }

    /// Gets a table by its floor-plan number.
    pub async fn get_by_number(&self, number: i64) -> DbResult<Option<DiningTable>> {
        find_by_number(&self.pool, number).await
    }

    /// Lists tables matching `filter`, ordered by number.
    pub async fn list(&self, filter: &TableFilter) -> DbResult<Vec<DiningTable>> {
        let mut qb: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM dining_tables WHERE 1 = 1"));

        if !filter.include_inactive {
            qb.push(" AND is_active = 1");
        }
        if let Some(state) = filter.state {
            qb.push(" AND state = ").push_bind(state);
        }
        if let Some(capacity) = filter.min_capacity {
            qb.push(" AND capacity >= ").push_bind(capacity);
        }
        if let Some(location) = &filter.location {
            qb.push(" AND location = ").push_bind(location.clone());
        }
        qb.push(" ORDER BY number");

        let tables = qb.build_query_as::<DiningTable>().fetch_all(&self.pool).await?;
        Ok(tables)
    }

    /// Counts tables (active and inactive).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dining_tables")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

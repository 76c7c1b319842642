//! # Table Service
//!
//! Floor-plan administration, the table state machine, and the attention view.

use std::collections::HashMap;

use bistro_core::query::{attention_reasons, AttentionThresholds, TableAttention, TableFilter};
use bistro_core::table::TableCommand;
use bistro_core::validation::{validate_capacity, validate_label, validate_location, validate_table_number};
use bistro_core::{CoreError, DiningTable, ValidationError};
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{ensure_affected, PosResult};
use crate::pool::begin_write;
use crate::repository::{order, table, OrderRepository, TableRepository};
use crate::service::apply_table_command;

#[derive(Debug, Clone)]
pub struct TableService {
    pool: SqlitePool,
    thresholds: AttentionThresholds,
}

impl TableService {
    pub fn new(pool: SqlitePool, thresholds: AttentionThresholds) -> Self {
        TableService { pool, thresholds }
    }

    // =========================================================================
    // Administration
    // =========================================================================

    /// Adds a Free, active table to the floor plan.
    pub async fn create_table(
        &self,
        number: i64,
        capacity: i64,
        location: &str,
    ) -> PosResult<DiningTable> {
        validate_table_number(number)?;
        validate_capacity(capacity)?;
        let location = location.trim();
        validate_location(location)?;

        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;

        if table::find_by_number(&mut *tx, number).await?.is_some() {
            return Err(ValidationError::NotAllowed {
                field: "number".to_string(),
                reason: format!("table {number} already exists"),
            }
            .into());
        }

        let id = table::insert(&mut *tx, number, capacity, location, now).await?;
        let created = load(&mut tx, id).await?;
        tx.commit().await?;

        info!(table_id = id, number, capacity, location, "Table created");
        Ok(created)
    }

    /// Soft-enables or soft-disables a table.
    ///
    /// Disabling is refused while an active order references the table.
    pub async fn set_active(&self, table_id: i64, active: bool) -> PosResult<DiningTable> {
        let mut tx = begin_write(&self.pool).await?;
        let current = load(&mut tx, table_id).await?;

        if !active {
            if let Some(open) = order::find_active_for_table(&mut *tx, table_id).await? {
                return Err(CoreError::invalid_state(
                    "Table",
                    table_id,
                    format!("serving order {}", open.order_number),
                    "deactivate",
                )
                .into());
            }
        }

        if current.is_active != active {
            let rows = table::set_active(&mut *tx, table_id, active).await?;
            ensure_affected(rows, "Table", table_id)?;
        }
        let updated = load(&mut tx, table_id).await?;
        tx.commit().await?;

        info!(table_id, active, "Table activation changed");
        Ok(updated)
    }

    // =========================================================================
    // State Machine
    // =========================================================================

    /// `Free | Reserved → Occupied`.
    pub async fn occupy(&self, table_id: i64) -> PosResult<DiningTable> {
        self.run(table_id, TableCommand::Occupy).await
    }

    /// `Free → Reserved`, holding `reservation_ref`.
    pub async fn reserve(&self, table_id: i64, reservation_ref: &str) -> PosResult<DiningTable> {
        let reservation_ref = reservation_ref.trim();
        validate_label("reservation", reservation_ref)?;
        self.run(
            table_id,
            TableCommand::Reserve {
                reservation_ref: reservation_ref.to_string(),
            },
        )
        .await
    }

    /// Any state → Free. A no-op on a Free table.
    pub async fn free(&self, table_id: i64) -> PosResult<DiningTable> {
        self.run(table_id, TableCommand::Free).await
    }

    /// Any state → Maintenance. The reason is advisory.
    pub async fn set_maintenance(
        &self,
        table_id: i64,
        reason: Option<String>,
    ) -> PosResult<DiningTable> {
        self.run(table_id, TableCommand::SetMaintenance { reason }).await
    }

    /// Stamps the cleaning time. The state is left alone.
    pub async fn record_cleaning(&self, table_id: i64) -> PosResult<DiningTable> {
        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;
        load(&mut tx, table_id).await?;

        let rows = table::mark_cleaned(&mut *tx, table_id, now).await?;
        ensure_affected(rows, "Table", table_id)?;
        let updated = load(&mut tx, table_id).await?;
        tx.commit().await?;

        info!(table_id, "Table cleaned");
        Ok(updated)
    }

    async fn run(&self, table_id: i64, command: TableCommand) -> PosResult<DiningTable> {
        debug!(table_id, ?command, "Table command");
        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;

        apply_table_command(&mut tx, table_id, &command, now).await?;
        let updated = load(&mut tx, table_id).await?;
        tx.commit().await?;

        Ok(updated)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get(&self, table_id: i64) -> PosResult<DiningTable> {
        TableRepository::new(self.pool.clone())
            .get(table_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Table", table_id).into())
    }

    pub async fn list(&self, filter: &TableFilter) -> PosResult<Vec<DiningTable>> {
        Ok(TableRepository::new(self.pool.clone()).list(filter).await?)
    }

    /// Active tables that need someone's attention at `now`.
    ///
    /// A table is flagged when it is Occupied with no active order, when its
    /// active order has not moved within the follow-up window, or when it has
    /// not been cleaned within the cleaning window.
    pub async fn needs_attention(&self, now: DateTime<Utc>) -> PosResult<Vec<TableAttention>> {
        let tables = TableRepository::new(self.pool.clone())
            .list(&TableFilter::default())
            .await?;
        let by_table: HashMap<i64, _> = OrderRepository::new(self.pool.clone())
            .active()
            .await?
            .into_iter()
            .filter_map(|o| o.table_id.map(|t| (t, o)))
            .collect();

        Ok(tables
            .into_iter()
            .filter_map(|table| {
                let reasons = attention_reasons(&table, by_table.get(&table.id), now, &self.thresholds);
                (!reasons.is_empty()).then_some(TableAttention { table, reasons })
            })
            .collect())
    }
}

async fn load(conn: &mut SqliteConnection, table_id: i64) -> PosResult<DiningTable> {
    table::find(conn, table_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Table", table_id).into())
}

// =============================================================================
// Unit Tests
// =============================================================================

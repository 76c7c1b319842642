//! # Order Repository
//!
//! Orders, their line items and their notes.
//!
//! ## Line Item Snapshot
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  catalog price today: 12.50 ──► order_items.unit_price_cents = 1250     │
//! │  catalog price tomorrow: 14.00    (row unchanged, bill unchanged)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use bistro_core::query::OrderFilter;
use bistro_core::{ItemRef, LineItem, Money, NewOrder, Order, OrderNote, OrderStatus};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteExecutor;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

const ORDER_COLUMNS: &str = "id, order_number, order_type, table_id, customer_id, staff_id, status, \
                             created_at, updated_at, closed_at";

const ITEM_COLUMNS: &str =
    "id, order_id, product_id, combo_id, quantity, unit_price_cents, note, created_at";

const ACTIVE_STATUSES: &str = "('pending', 'preparing', 'ready')";

// =============================================================================
// Orders
// =============================================================================

pub async fn find<'e>(exec: impl SqliteExecutor<'e>, id: i64) -> DbResult<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(exec)
    .await?;
    Ok(order)
}

/// The table's active (non-terminal) order. At most one exists.
pub async fn find_active_for_table<'e>(
    exec: impl SqliteExecutor<'e>,
    table_id: i64,
) -> DbResult<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE table_id = ?1 AND status IN {ACTIVE_STATUSES}"
    ))
    .bind(table_id)
    .fetch_optional(exec)
    .await?;
    Ok(order)
}

/// Every order number issued under `day_prefix` (e.g. `ORD-20261019-`).
pub async fn numbers_with_prefix<'e>(
    exec: impl SqliteExecutor<'e>,
    day_prefix: &str,
) -> DbResult<Vec<String>> {
    let numbers = sqlx::query_scalar::<_, String>(
        "SELECT order_number FROM orders WHERE order_number LIKE ?1 || '%'",
    )
    .bind(day_prefix)
    .fetch_all(exec)
    .await?;
    Ok(numbers)
}

/// Inserts a Pending order and returns its id.
pub async fn insert<'e>(
    exec: impl SqliteExecutor<'e>,
    order_number: &str,
    input: &NewOrder,
    now: DateTime<Utc>,
) -> DbResult<i64> {
    debug!(order_number, order_type = %input.order_type, "Inserting order");

    let result = sqlx::query(
        r#"
        INSERT INTO orders (order_number, order_type, table_id, customer_id, staff_id, status, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
        "#,
    )
    .bind(order_number)
    .bind(input.order_type)
    .bind(input.table_id)
    .bind(input.customer_id)
    .bind(input.staff_id)
    .bind(OrderStatus::Pending)
    .bind(now)
    .execute(exec)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Moves `from → to`. Returns 0 when the order is no longer in `from`.
pub async fn update_status<'e>(
    exec: impl SqliteExecutor<'e>,
    id: i64,
    from: OrderStatus,
    to: OrderStatus,
    now: DateTime<Utc>,
) -> DbResult<u64> {
    let closed_at = to.is_terminal().then_some(now);
    let result = sqlx::query(
        r#"
        UPDATE orders SET status = ?3, updated_at = ?4, closed_at = ?5
        WHERE id = ?1 AND status = ?2
        "#,
    )
    .bind(id)
    .bind(from)
    .bind(to)
    .bind(now)
    .bind(closed_at)
    .execute(exec)
    .await?;
    Ok(result.rows_affected())
}

/// Bumps `updated_at`, guarded on the status the caller decided from.
pub async fn touch<'e>(
    exec: impl SqliteExecutor<'e>,
    id: i64,
    status: OrderStatus,
    now: DateTime<Utc>,
) -> DbResult<u64> {
    let result = sqlx::query("UPDATE orders SET updated_at = ?3 WHERE id = ?1 AND status = ?2")
        .bind(id)
        .bind(status)
        .bind(now)
        .execute(exec)
        .await?;
    Ok(result.rows_affected())
}

// =============================================================================
// Line Items
// =============================================================================

pub async fn items<'e>(exec: impl SqliteExecutor<'e>, order_id: i64) -> DbResult<Vec<LineItem>> {
    let items = sqlx::query_as::<_, LineItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ?1 ORDER BY id"
    ))
    .bind(order_id)
    .fetch_all(exec)
    .await?;
    Ok(items)
}

/// Loads a line item only if it belongs to `order_id`.
pub async fn find_item<'e>(
    exec: impl SqliteExecutor<'e>,
    order_id: i64,
    item_id: i64,
) -> DbResult<Option<LineItem>> {
    let item = sqlx::query_as::<_, LineItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM order_items WHERE id = ?1 AND order_id = ?2"
    ))
    .bind(item_id)
    .bind(order_id)
    .fetch_optional(exec)
    .await?;
    Ok(item)
}

/// Inserts a line item with its frozen unit price and returns its id.
pub async fn insert_item<'e>(
    exec: impl SqliteExecutor<'e>,
    order_id: i64,
    item: ItemRef,
    quantity: i64,
    unit_price: Money,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> DbResult<i64> {
    let (product_id, combo_id) = item.columns();
    let result = sqlx::query(
        r#"
        INSERT INTO order_items (order_id, product_id, combo_id, quantity, unit_price_cents, note, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(order_id)
    .bind(product_id)
    .bind(combo_id)
    .bind(quantity)
    .bind(unit_price.cents())
    .bind(note)
    .bind(now)
    .execute(exec)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn delete_item<'e>(
    exec: impl SqliteExecutor<'e>,
    order_id: i64,
    item_id: i64,
) -> DbResult<u64> {
    let result = sqlx::query("DELETE FROM order_items WHERE id = ?1 AND order_id = ?2")
        .bind(item_id)
        .bind(order_id)
        .execute(exec)
        .await?;
    Ok(result.rows_affected())
}

/// Rewrites quantity and note. The unit price never changes.
pub async fn update_item<'e>(
    exec: impl SqliteExecutor<'e>,
    order_id: i64,
    item_id: i64,
    quantity: i64,
    note: Option<&str>,
) -> DbResult<u64> {
    let result = sqlx::query(
        "UPDATE order_items SET quantity = ?3, note = ?4 WHERE id = ?1 AND order_id = ?2",
    )
    .bind(item_id)
    .bind(order_id)
    .bind(quantity)
    .bind(note)
    .execute(exec)
    .await?;
    Ok(result.rows_affected())
}

// =============================================================================
// Notes
// =============================================================================

pub async fn insert_note<'e>(
    exec: impl SqliteExecutor<'e>,
    order_id: i64,
    body: &str,
    now: DateTime<Utc>,
) -> DbResult<i64> {
    let result =
        sqlx::query("INSERT INTO order_notes (order_id, body, created_at) VALUES (?1, ?2, ?3)")
            .bind(order_id)
            .bind(body)
            .bind(now)
            .execute(exec)
            .await?;
    Ok(result.last_insert_rowid())
}

pub async fn notes<'e>(exec: impl SqliteExecutor<'e>, order_id: i64) -> DbResult<Vec<OrderNote>> {
    let notes = sqlx::query_as::<_, OrderNote>(
        "SELECT id, order_id, body, created_at FROM order_notes WHERE order_id = ?1 ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(exec)
    .await?;
    Ok(notes)
}

// =============================================================================
// Read Repository
// =============================================================================

/// Repository for order reads.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    pub async fn get(&self, id: i64) -> DbResult<Option<Order>> {
        find(&self.pool, id).await
    }

    pub async fn get_by_number(&self, order_number: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = ?1"
        ))
        .bind(order_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(order)
    }

    /// Lists orders matching `filter`, oldest first.
    pub async fn list(&self, filter: &OrderFilter) -> DbResult<Vec<Order>> {
        let mut qb: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM orders WHERE 1 = 1"));

        if filter.active_only {
            qb.push(" AND status IN ").push(ACTIVE_STATUSES);
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(table_id) = filter.table_id {
            qb.push(" AND table_id = ").push_bind(table_id);
        }
        if let Some(order_type) = filter.order_type {
            qb.push(" AND order_type = ").push_bind(order_type);
        }
        qb.push(" ORDER BY created_at, id");

        let orders = qb.build_query_as::<Order>().fetch_all(&self.pool).await?;
        Ok(orders)
    }

    /// Every non-terminal order.
    pub async fn active(&self) -> DbResult<Vec<Order>> {
        self.list(&OrderFilter::active()).await
    }

    pub async fn active_for_table(&self, table_id: i64) -> DbResult<Option<Order>> {
        find_active_for_table(&self.pool, table_id).await
    }

    pub async fn items(&self, order_id: i64) -> DbResult<Vec<LineItem>> {
        items(&self.pool, order_id).await
    }

    pub async fn notes(&self, order_id: i64) -> DbResult<Vec<OrderNote>> {
        notes(&self.pool, order_id).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

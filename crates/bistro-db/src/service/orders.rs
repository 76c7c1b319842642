//! # Order Service
//!
//! The order state machine with its side effects on tables.
//!
//! ## Lifecycle
//! ```text
//! create ──► Pending ──► Preparing ──► Ready ──► Delivered
//!  (occupies    │            │
//!   the table)  └────────────┴──► Cancelled (frees an Occupied table)
//!
//! add / remove / update line items: Pending or Preparing, not yet invoiced
//! ```

use std::sync::Arc;

use bistro_core::order::{check_advance, check_cancel, ensure_editable, validate_new_order, OrderTotals};
use bistro_core::query::{is_overdue, AttentionThresholds, OrderFilter};
use bistro_core::table::TableCommand;
use bistro_core::validation::{validate_note, validate_quantity, validate_reason, validate_staff_id};
use bistro_core::{CoreError, ItemRef, LineItem, NewOrder, Order, OrderNote, OrderStatus, TableState};
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::catalog::{price_of, CatalogLookup};
use crate::error::{ensure_affected, PosResult};
use crate::pool::begin_write;
use crate::repository::{invoice, order, table, OrderRepository};
use crate::service::invoices::release_table_if_settled;
use crate::service::{apply_table_command, next_order_number};

/// Reason recorded when cancellation arrives through [`OrderService::advance_status`].
const STATUS_CANCEL_REASON: &str = "Status set to cancelled";

#[derive(Clone)]
pub struct OrderService {
    pool: SqlitePool,
    catalog: Arc<dyn CatalogLookup>,
    thresholds: AttentionThresholds,
}

impl OrderService {
    pub fn new(
        pool: SqlitePool,
        catalog: Arc<dyn CatalogLookup>,
        thresholds: AttentionThresholds,
    ) -> Self {
        OrderService {
            pool,
            catalog,
            thresholds,
        }
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Opens an order.
    ///
    /// ## Steps (one transaction)
    /// 1. DineIn: the table must exist, be active, Free or Reserved, and not
    ///    already serve an active order; it becomes Occupied
    /// 2. The day's next order number is computed
    /// 3. The order is inserted as Pending
    pub async fn create(&self, input: NewOrder) -> PosResult<Order> {
        validate_new_order(&input)?;
        validate_staff_id(input.staff_id)?;

        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;

        if let Some(table_id) = input.table_id {
            if let Some(open) = order::find_active_for_table(&mut *tx, table_id).await? {
                return Err(CoreError::invalid_state(
                    "Table",
                    table_id,
                    format!("serving order {}", open.order_number),
                    "open another order",
                )
                .into());
            }
            apply_table_command(&mut tx, table_id, &TableCommand::Occupy, now).await?;
        }

        let order_number = next_order_number(&mut tx, now).await?;
        let id = order::insert(&mut *tx, &order_number, &input, now).await?;
        let created = load(&mut tx, id).await?;
        tx.commit().await?;

        info!(
            order_id = id,
            order_number = %created.order_number,
            order_type = %created.order_type,
            table_id = ?created.table_id,
            "Order created"
        );
        Ok(created)
    }

    // =========================================================================
    // Line Items
    // =========================================================================

    /// Adds a line item at the current catalog price.
    pub async fn add_line_item(
        &self,
        order_id: i64,
        item: ItemRef,
        quantity: i64,
        note: Option<&str>,
    ) -> PosResult<LineItem> {
        validate_quantity(quantity)?;
        let note = normalize_note(note)?;
        let unit_price = price_of(self.catalog.as_ref(), item).await?;

        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;
        let current = load_editable(&mut tx, order_id, "add line item").await?;

        let item_id =
            order::insert_item(&mut *tx, order_id, item, quantity, unit_price, note, now).await?;
        let rows = order::touch(&mut *tx, order_id, current.status, now).await?;
        ensure_affected(rows, "Order", order_id)?;

        let added = load_item(&mut tx, order_id, item_id).await?;
        tx.commit().await?;

        debug!(order_id, item_id, ?item, quantity, unit_price = %unit_price, "Line item added");
        Ok(added)
    }

    pub async fn remove_line_item(&self, order_id: i64, item_id: i64) -> PosResult<()> {
        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;
        let current = load_editable(&mut tx, order_id, "remove line item").await?;
        // Voided invoices keep their coverage as history
        if invoice::is_item_billed(&mut *tx, item_id).await? {
            return Err(
                CoreError::invalid_state("LineItem", item_id, "billed", "remove line item").into(),
            );
        }

        if order::delete_item(&mut *tx, order_id, item_id).await? == 0 {
            return Err(CoreError::not_found("LineItem", item_id).into());
        }
        let rows = order::touch(&mut *tx, order_id, current.status, now).await?;
        ensure_affected(rows, "Order", order_id)?;
        tx.commit().await?;

        debug!(order_id, item_id, "Line item removed");
        Ok(())
    }

    /// Changes quantity and note. The captured unit price is kept.
    pub async fn update_line_item(
        &self,
        order_id: i64,
        item_id: i64,
        quantity: i64,
        note: Option<&str>,
    ) -> PosResult<LineItem> {
        validate_quantity(quantity)?;
        let note = normalize_note(note)?;

        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;
        let current = load_editable(&mut tx, order_id, "update line item").await?;

        if order::update_item(&mut *tx, order_id, item_id, quantity, note).await? == 0 {
            return Err(CoreError::not_found("LineItem", item_id).into());
        }
        let rows = order::touch(&mut *tx, order_id, current.status, now).await?;
        ensure_affected(rows, "Order", order_id)?;

        let updated = load_item(&mut tx, order_id, item_id).await?;
        tx.commit().await?;

        debug!(order_id, item_id, quantity, "Line item updated");
        Ok(updated)
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Moves the order one step forward.
    ///
    /// A `Cancelled` target goes through [`Self::cancel`]; anything but the
    /// adjacent forward step fails with `InvalidTransition`.
    /// Reaching `Delivered` frees the table if every invoice is already paid.
    pub async fn advance_status(&self, order_id: i64, target: OrderStatus) -> PosResult<Order> {
        if target == OrderStatus::Cancelled {
            return self.cancel(order_id, STATUS_CANCEL_REASON).await;
        }

        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;
        let current = load(&mut tx, order_id).await?;
        check_advance(&current, target)?;

        let rows = order::update_status(&mut *tx, order_id, current.status, target, now).await?;
        ensure_affected(rows, "Order", order_id)?;
        if target == OrderStatus::Delivered {
            release_table_if_settled(&mut tx, order_id, now).await?;
        }
        let updated = load(&mut tx, order_id).await?;
        tx.commit().await?;

        info!(order_id, from = %current.status, to = %target, "Order status changed");
        Ok(updated)
    }

    /// Cancels a Pending or Preparing order.
    ///
    /// The reason is appended to the notes and an Occupied table is freed.
    /// Refused while the order has a non-voided invoice.
    pub async fn cancel(&self, order_id: i64, reason: &str) -> PosResult<Order> {
        let reason = reason.trim();
        validate_reason(reason)?;

        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;
        let current = load(&mut tx, order_id).await?;
        check_cancel(&current)?;
        ensure_not_invoiced(&mut tx, &current, "cancel").await?;

        let rows =
            order::update_status(&mut *tx, order_id, current.status, OrderStatus::Cancelled, now)
                .await?;
        ensure_affected(rows, "Order", order_id)?;
        order::insert_note(&mut *tx, order_id, &format!("Cancelled: {reason}"), now).await?;

        if let Some(table_id) = current.table_id {
            let occupied = table::find(&mut *tx, table_id)
                .await?
                .is_some_and(|t| t.state == TableState::Occupied);
            if occupied {
                apply_table_command(&mut tx, table_id, &TableCommand::Free, now).await?;
            }
        }

        let updated = load(&mut tx, order_id).await?;
        tx.commit().await?;

        info!(order_id, from = %current.status, reason, "Order cancelled");
        Ok(updated)
    }

    /// Appends a timestamped note. Notes are never edited or removed.
    pub async fn add_note(&self, order_id: i64, body: &str) -> PosResult<OrderNote> {
        let body = body.trim();
        validate_note(body)?;

        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;
        let current = load(&mut tx, order_id).await?;

        let id = order::insert_note(&mut *tx, order_id, body, now).await?;
        let rows = order::touch(&mut *tx, order_id, current.status, now).await?;
        ensure_affected(rows, "Order", order_id)?;
        tx.commit().await?;

        Ok(OrderNote {
            id,
            order_id,
            body: body.to_string(),
            created_at: now,
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Σ line item subtotals. No discount or tax at order level.
    pub async fn compute_totals(&self, order_id: i64) -> PosResult<OrderTotals> {
        self.get(order_id).await?;
        let items = order::items(&self.pool, order_id).await?;
        Ok(OrderTotals::from_items(&items))
    }

    pub async fn get(&self, order_id: i64) -> PosResult<Order> {
        self.repo()
            .get(order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order", order_id).into())
    }

    pub async fn list(&self, filter: &OrderFilter) -> PosResult<Vec<Order>> {
        Ok(self.repo().list(filter).await?)
    }

    /// Every non-terminal order.
    pub async fn active(&self) -> PosResult<Vec<Order>> {
        Ok(self.repo().active().await?)
    }

    /// Pending or Preparing orders older than the follow-up SLA at `now`.
    pub async fn overdue(&self, now: DateTime<Utc>) -> PosResult<Vec<Order>> {
        let sla = self.thresholds.follow_up();
        Ok(self
            .repo()
            .active()
            .await?
            .into_iter()
            .filter(|o| is_overdue(o, now, sla))
            .collect())
    }

    pub async fn line_items(&self, order_id: i64) -> PosResult<Vec<LineItem>> {
        Ok(self.repo().items(order_id).await?)
    }

    pub async fn notes(&self, order_id: i64) -> PosResult<Vec<OrderNote>> {
        Ok(self.repo().notes(order_id).await?)
    }

    fn repo(&self) -> OrderRepository {
        OrderRepository::new(self.pool.clone())
    }
}

impl std::fmt::Debug for OrderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderService")
            .field("thresholds", &self.thresholds)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn normalize_note(note: Option<&str>) -> PosResult<Option<&str>> {
    match note.map(str::trim) {
        Some("") | None => Ok(None),
        Some(note) => {
            validate_note(note)?;
            Ok(Some(note))
        }
    }
}

async fn load(conn: &mut SqliteConnection, order_id: i64) -> PosResult<Order> {
    order::find(conn, order_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Order", order_id).into())
}

async fn load_item(conn: &mut SqliteConnection, order_id: i64, item_id: i64) -> PosResult<LineItem> {
    order::find_item(conn, order_id, item_id)
        .await?
        .ok_or_else(|| CoreError::not_found("LineItem", item_id).into())
}

/// Loads the order and checks that its line items may still change.
async fn load_editable(
    conn: &mut SqliteConnection,
    order_id: i64,
    operation: &'static str,
) -> PosResult<Order> {
    let current = load(&mut *conn, order_id).await?;
    ensure_editable(&current, operation)?;
    ensure_not_invoiced(conn, &current, operation).await?;
    Ok(current)
}

/// An invoice freezes the billed line items until it is voided.
async fn ensure_not_invoiced(
    conn: &mut SqliteConnection,
    current: &Order,
    operation: &'static str,
) -> PosResult<()> {
    if invoice::has_open(conn, current.id).await? {
        return Err(CoreError::invalid_state("Order", current.id, "invoiced", operation).into());
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

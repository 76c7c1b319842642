//! # Services
//!
//! Every mutating operation of the POS core. Each one is a single writer
//! transaction that re-reads what it decides on.
//!
//! ## Transaction Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  external lookups (catalog price, customer name)   ← before the lock    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN IMMEDIATE                                   ← write lock taken    │
//! │       │                                                                 │
//! │  read row(s) ──► bistro-core rule ──► Err? return (tx dropped = rollback)│
//! │       │                                                                 │
//! │  guarded UPDATE ... WHERE id = ? AND status = ?    ← 0 rows = Conflict   │
//! │       │                                                                 │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The order and invoice services drive table transitions through
//! [`apply_table_command`] on their own connection, so the table change
//! commits together with the order change or not at all.

pub mod invoices;
pub mod orders;
pub mod split;
pub mod tables;

pub use invoices::InvoiceService;
pub use orders::OrderService;
pub use split::SplitService;
pub use tables::TableService;

use bistro_core::numbering::{day_prefix, format_number, next_sequence, INVOICE_PREFIX, ORDER_PREFIX};
use bistro_core::table::{transition, TableCommand, TableUpdate};
use bistro_core::validation::validate_label;
use bistro_core::{CoreError, Payer};
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

use crate::catalog::CustomerDirectory;
use crate::error::{ensure_affected, PosResult};
use crate::repository::{invoice, order, table};

/// Runs one table transition on `conn`.
///
/// Returns `None` for the legal no-op (`free` on a Free table).
pub(crate) async fn apply_table_command(
    conn: &mut SqliteConnection,
    table_id: i64,
    command: &TableCommand,
    now: DateTime<Utc>,
) -> PosResult<Option<TableUpdate>> {
    let current = table::find(&mut *conn, table_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Table", table_id))?;

    let Some(update) = transition(&current, command)? else {
        debug!(table_id, "Table already free");
        return Ok(None);
    };

    let rows = table::apply_update(&mut *conn, table_id, current.state, &update, now).await?;
    ensure_affected(rows, "Table", table_id)?;

    if let Some(reservation) = &update.released_reservation {
        warn!(
            table_id,
            reservation = %reservation,
            "Reserved table occupied; reservation released without an explicit consumption step"
        );
    }
    info!(table_id, from = %current.state, to = %update.state, "Table state changed");

    Ok(Some(update))
}

/// Next `ORD-YYYYMMDD-NNNN` for the UTC day of `now`.
pub(crate) async fn next_order_number(
    conn: &mut SqliteConnection,
    now: DateTime<Utc>,
) -> PosResult<String> {
    let date = now.date_naive();
    let prefix = day_prefix(ORDER_PREFIX, date);
    let existing = order::numbers_with_prefix(&mut *conn, &prefix).await?;
    let seq = next_sequence(existing.iter().map(String::as_str), &prefix);
    Ok(format_number(ORDER_PREFIX, date, seq))
}

/// Next `INV-YYYYMMDD-NNNN` for the UTC day of `now`.
///
/// Sees rows inserted earlier in the same transaction, so a split can number
/// its siblings one after another.
pub(crate) async fn next_invoice_number(
    conn: &mut SqliteConnection,
    now: DateTime<Utc>,
) -> PosResult<String> {
    let date = now.date_naive();
    let prefix = day_prefix(INVOICE_PREFIX, date);
    let existing = invoice::numbers_with_prefix(&mut *conn, &prefix).await?;
    let seq = next_sequence(existing.iter().map(String::as_str), &prefix);
    Ok(format_number(INVOICE_PREFIX, date, seq))
}

/// Resolves a payer into `(customer id, display label)`.
///
/// ## Rules
/// - registered customer → directory name; unknown id → `NotFound`
/// - walk-in → the given name, or "Walk-in" when blank
pub(crate) async fn resolve_payer(
    customers: &dyn CustomerDirectory,
    payer: &Payer,
) -> PosResult<(Option<i64>, String)> {
    match payer {
        Payer::Customer { customer_id } => {
            let name = customers
                .display_name(*customer_id)
                .await?
                .ok_or_else(|| CoreError::not_found("Customer", *customer_id))?;
            Ok((Some(*customer_id), name))
        }
        Payer::WalkIn { name } => {
            let name = name.trim();
            if name.is_empty() {
                return Ok((None, Payer::DEFAULT_WALK_IN.to_string()));
            }
            validate_label("payer", name)?;
            Ok((None, name.to_string()))
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

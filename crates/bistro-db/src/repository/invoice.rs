//! # Invoice Repository
//!
//! Invoices, the line items each one covers, and period queries.

use bistro_core::invoice::InvoiceDraft;
use bistro_core::query::{InvoiceFilter, InvoiceSummary};
use bistro_core::{Invoice, InvoiceStatus, PaymentMethod};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sqlx::sqlite::SqliteExecutor;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

const COLUMNS: &str = "id, invoice_number, order_id, split_group, subtotal_cents, discount_cents, \
                       tip_cents, tax_cents, total_cents, tax_rate_bps, payment_method, status, \
                       payer_customer_id, payer_name, created_at, paid_at, voided_at, void_reason";

pub async fn find<'e>(exec: impl SqliteExecutor<'e>, id: i64) -> DbResult<Option<Invoice>> {
    let invoice = sqlx::query_as::<_, Invoice>(&format!(
        "SELECT {COLUMNS} FROM invoices WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(exec)
    .await?;
    Ok(invoice)
}

pub async fn for_order<'e>(exec: impl SqliteExecutor<'e>, order_id: i64) -> DbResult<Vec<Invoice>> {
    let invoices = sqlx::query_as::<_, Invoice>(&format!(
        "SELECT {COLUMNS} FROM invoices WHERE order_id = ?1 ORDER BY id"
    ))
    .bind(order_id)
    .fetch_all(exec)
    .await?;
    Ok(invoices)
}

/// Whether any non-voided invoice (split or not) bills the order.
pub async fn has_open<'e>(exec: impl SqliteExecutor<'e>, order_id: i64) -> DbResult<bool> {
    let open: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM invoices WHERE order_id = ?1 AND status <> 'voided')",
    )
    .bind(order_id)
    .fetch_one(exec)
    .await?;
    Ok(open)
}

/// Whether at least one invoice of the order has been paid.
pub async fn has_paid<'e>(exec: impl SqliteExecutor<'e>, order_id: i64) -> DbResult<bool> {
    let paid: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM invoices WHERE order_id = ?1 AND status = 'paid')",
    )
    .bind(order_id)
    .fetch_one(exec)
    .await?;
    Ok(paid)
}

/// Whether any invoice, voided ones included, lists the line item.
pub async fn is_item_billed<'e>(exec: impl SqliteExecutor<'e>, line_item_id: i64) -> DbResult<bool> {
    let billed: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM invoice_items WHERE line_item_id = ?1)")
            .bind(line_item_id)
            .fetch_one(exec)
            .await?;
    Ok(billed)
}

/// Number of invoices of the order still waiting for payment.
pub async fn count_pending<'e>(exec: impl SqliteExecutor<'e>, order_id: i64) -> DbResult<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM invoices WHERE order_id = ?1 AND status = 'pending'")
            .bind(order_id)
            .fetch_one(exec)
            .await?;
    Ok(count)
}

/// Every invoice number issued under `day_prefix` (e.g. `INV-20261019-`).
pub async fn numbers_with_prefix<'e>(
    exec: impl SqliteExecutor<'e>,
    day_prefix: &str,
) -> DbResult<Vec<String>> {
    let numbers = sqlx::query_scalar::<_, String>(
        "SELECT invoice_number FROM invoices WHERE invoice_number LIKE ?1 || '%'",
    )
    .bind(day_prefix)
    .fetch_all(exec)
    .await?;
    Ok(numbers)
}

/// Inserts a Pending invoice from a draft and returns its id.
///
/// The covered line items are written separately with [`insert_items`].
pub async fn insert<'e>(
    exec: impl SqliteExecutor<'e>,
    invoice_number: &str,
    draft: &InvoiceDraft,
    now: DateTime<Utc>,
) -> DbResult<i64> {
    debug!(
        invoice_number,
        order_id = draft.order_id,
        total_cents = draft.amounts.total.cents(),
        "Inserting invoice"
    );

    let result = sqlx::query(
        r#"
        INSERT INTO invoices (
            invoice_number, order_id, split_group,
            subtotal_cents, discount_cents, tip_cents, tax_cents, total_cents, tax_rate_bps,
            payment_method, status, payer_customer_id, payer_name, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
    )
    .bind(invoice_number)
    .bind(draft.order_id)
    .bind(&draft.split_group)
    .bind(draft.amounts.subtotal.cents())
    .bind(draft.amounts.discount.cents())
    .bind(draft.amounts.tip.cents())
    .bind(draft.amounts.tax.cents())
    .bind(draft.amounts.total.cents())
    .bind(draft.tax_rate.bps() as i64)
    .bind(draft.payment_method)
    .bind(InvoiceStatus::Pending)
    .bind(draft.payer_customer_id)
    .bind(&draft.payer_name)
    .bind(now)
    .execute(exec)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Records which line items an invoice covers.
pub async fn insert_items(
    conn: &mut SqliteConnection,
    invoice_id: i64,
    line_item_ids: &[i64],
) -> DbResult<()> {
    for line_item_id in line_item_ids {
        sqlx::query("INSERT INTO invoice_items (invoice_id, line_item_id) VALUES (?1, ?2)")
            .bind(invoice_id)
            .bind(line_item_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn covered_items<'e>(exec: impl SqliteExecutor<'e>, invoice_id: i64) -> DbResult<Vec<i64>> {
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT line_item_id FROM invoice_items WHERE invoice_id = ?1 ORDER BY line_item_id",
    )
    .bind(invoice_id)
    .fetch_all(exec)
    .await?;
    Ok(ids)
}

/// `Pending → Paid`. Returns 0 when the invoice is no longer Pending.
pub async fn mark_paid<'e>(
    exec: impl SqliteExecutor<'e>,
    id: i64,
    payment_method: PaymentMethod,
    now: DateTime<Utc>,
) -> DbResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE invoices SET status = 'paid', payment_method = ?2, paid_at = ?3
        WHERE id = ?1 AND status = 'pending'
        "#,
    )
    .bind(id)
    .bind(payment_method)
    .bind(now)
    .execute(exec)
    .await?;
    Ok(result.rows_affected())
}

/// `expected → Voided`. Returns 0 when the invoice moved underneath.
pub async fn void<'e>(
    exec: impl SqliteExecutor<'e>,
    id: i64,
    expected: InvoiceStatus,
    reason: &str,
    now: DateTime<Utc>,
) -> DbResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE invoices SET status = 'voided', voided_at = ?3, void_reason = ?4
        WHERE id = ?1 AND status = ?2
        "#,
    )
    .bind(id)
    .bind(expected)
    .bind(now)
    .bind(reason)
    .execute(exec)
    .await?;
    Ok(result.rows_affected())
}

/// `[00:00, next 00:00)` of `date` in UTC.
pub(crate) fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

// =============================================================================
// Read Repository
// =============================================================================

/// Repository for invoice reads and period queries.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    pub async fn get(&self, id: i64) -> DbResult<Option<Invoice>> {
        find(&self.pool, id).await
    }

    /// Every invoice of the order, voided ones included.
    pub async fn by_order(&self, order_id: i64) -> DbResult<Vec<Invoice>> {
        for_order(&self.pool, order_id).await
    }

    /// The sibling invoices of one bill split.
    pub async fn by_split_group(&self, split_group: &str) -> DbResult<Vec<Invoice>> {
        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {COLUMNS} FROM invoices WHERE split_group = ?1 ORDER BY id"
        ))
        .bind(split_group)
        .fetch_all(&self.pool)
        .await?;
        Ok(invoices)
    }

    pub async fn covered_items(&self, invoice_id: i64) -> DbResult<Vec<i64>> {
        covered_items(&self.pool, invoice_id).await
    }

    /// Lists invoices matching `filter` in creation order.
    pub async fn list(&self, filter: &InvoiceFilter) -> DbResult<Vec<Invoice>> {
        let mut qb: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM invoices WHERE 1 = 1"));

        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(from) = filter.from {
            qb.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND created_at < ").push_bind(to);
        }
        qb.push(" ORDER BY created_at, id");

        let invoices = qb.build_query_as::<Invoice>().fetch_all(&self.pool).await?;
        Ok(invoices)
    }

    /// Invoices created on `date` (UTC business day).
    pub async fn for_day(&self, date: NaiveDate) -> DbResult<Vec<Invoice>> {
        let (from, to) = day_bounds(date);
        self.list(&InvoiceFilter::default().between(from, to)).await
    }

    /// Totals over the non-voided invoices created in `[from, to)`.
    pub async fn summary(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> DbResult<InvoiceSummary> {
        let invoices = self.list(&InvoiceFilter::default().between(from, to)).await?;
        Ok(InvoiceSummary::from_invoices(&invoices))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::order;
    use crate::{Database, DbConfig};
    use bistro_core::{InvoiceAmounts, Money, NewOrder, OrderType, TaxRate};
    use chrono::TimeZone;

    async fn db_with_order() -> (Database, i64) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let order_id = order::insert(
            db.pool(),
            "ORD-20261019-0001",
            &NewOrder {
                order_type: OrderType::TakeOut,
                table_id: None,
                customer_id: None,
                staff_id: 1,
            },
            Utc::now(),
        )
        .await
        .unwrap();
        (db, order_id)
    }

    fn draft(order_id: i64, split_group: Option<&str>, subtotal: i64) -> InvoiceDraft {
        InvoiceDraft {
            order_id,
            split_group: split_group.map(str::to_string),
            amounts: InvoiceAmounts::compute(
                Money::from_cents(subtotal),
                Money::zero(),
                Money::zero(),
                TaxRate::default(),
            ),
            tax_rate: TaxRate::default(),
            payment_method: PaymentMethod::Cash,
            payer_customer_id: None,
            payer_name: "Walk-in".to_string(),
            line_item_ids: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_single_open_invoice_per_order() {
        let (db, order_id) = db_with_order().await;
        let now = Utc::now();

        let first = insert(db.pool(), "INV-20261019-0001", &draft(order_id, None, 1000), now)
            .await
            .unwrap();
        let err = insert(db.pool(), "INV-20261019-0002", &draft(order_id, None, 1000), now)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::DbError::UniqueViolation { .. }));
        assert!(has_open(db.pool(), order_id).await.unwrap());

        // Once voided, the order can be billed again
        assert_eq!(void(db.pool(), first, InvoiceStatus::Pending, "typo", now).await.unwrap(), 1);
        assert!(!has_open(db.pool(), order_id).await.unwrap());
        insert(db.pool(), "INV-20261019-0002", &draft(order_id, None, 1000), now)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_split_siblings_share_a_group() {
        let (db, order_id) = db_with_order().await;
        let now = Utc::now();
        insert(db.pool(), "INV-20261019-0001", &draft(order_id, Some("g1"), 300), now)
            .await
            .unwrap();
        insert(db.pool(), "INV-20261019-0002", &draft(order_id, Some("g1"), 700), now)
            .await
            .unwrap();

        let siblings = db.invoices().by_split_group("g1").await.unwrap();
        assert_eq!(siblings.len(), 2);
        assert_eq!(count_pending(db.pool(), order_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_paid_guard_and_reconciling_rows() {
        let (db, order_id) = db_with_order().await;
        let now = Utc::now();
        let id = insert(db.pool(), "INV-20261019-0001", &draft(order_id, None, 1000), now)
            .await
            .unwrap();

        assert_eq!(mark_paid(db.pool(), id, PaymentMethod::Card, now).await.unwrap(), 1);
        assert_eq!(mark_paid(db.pool(), id, PaymentMethod::Card, now).await.unwrap(), 0);

        let invoice = db.invoices().get(id).await.unwrap().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(invoice.payment_method, PaymentMethod::Card);
        assert!(invoice.amounts().reconciles());
        assert_eq!(invoice.total_cents, 1180);
    }

    #[tokio::test]
    async fn test_covered_items() {
        let (db, order_id) = db_with_order().await;
        let now = Utc::now();
        let mut line_ids = Vec::new();
        for product in [1, 2] {
            line_ids.push(
                order::insert_item(
                    db.pool(),
                    order_id,
                    bistro_core::ItemRef::Product(product),
                    1,
                    Money::from_cents(500),
                    None,
                    now,
                )
                .await
                .unwrap(),
            );
        }

        let id = insert(db.pool(), "INV-20261019-0001", &draft(order_id, None, 1000), now)
            .await
            .unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        insert_items(&mut conn, id, &line_ids).await.unwrap();
        drop(conn);

        assert_eq!(db.invoices().covered_items(id).await.unwrap(), line_ids);
    }

    #[tokio::test]
    async fn test_for_day_and_summary() {
        let (db, order_id) = db_with_order().await;
        let day = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let before = Utc.with_ymd_and_hms(2026, 10, 18, 23, 59, 59).unwrap();

        let voided = insert(db.pool(), "INV-20261019-0001", &draft(order_id, Some("g"), 1000), day)
            .await
            .unwrap();
        void(db.pool(), voided, InvoiceStatus::Pending, "wrong table", day)
            .await
            .unwrap();
        let paid = insert(db.pool(), "INV-20261019-0002", &draft(order_id, Some("g"), 2000), day)
            .await
            .unwrap();
        mark_paid(db.pool(), paid, PaymentMethod::Cash, day).await.unwrap();
        insert(db.pool(), "INV-20261018-0001", &draft(order_id, Some("g"), 500), before)
            .await
            .unwrap();

        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(db.invoices().for_day(date).await.unwrap().len(), 2);

        let (from, to) = day_bounds(date);
        let summary = db.invoices().summary(from, to).await.unwrap();
        assert_eq!(summary.invoice_count, 1);
        assert_eq!(summary.subtotal.cents(), 2000);
        assert_eq!(summary.tax.cents(), 360);
        assert_eq!(summary.paid_total.cents(), 2360);
    }
}

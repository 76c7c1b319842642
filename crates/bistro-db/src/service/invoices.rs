//! # Invoice Service
//!
//! Turns an order into a single invoice, and moves invoices through
//! payment and voiding.
//!
//! ## Invoice Status
//! ```text
//! Pending ──mark_paid──► Paid
//!    │                     │
//!    └───────void──────────┴──► Voided (irrevocable)
//! ```
//!
//! A DineIn order's table is freed once the order is Delivered and no
//! invoice of it is still Pending, whichever of the two happens last.

use std::sync::Arc;

use bistro_core::invoice::{check_pay, check_void, draft_invoice, ensure_invoiceable, CreateInvoice};
use bistro_core::query::{InvoiceFilter, InvoiceSummary};
use bistro_core::table::TableCommand;
use bistro_core::validation::validate_reason;
use bistro_core::{
    CoreError, Invoice, OrderStatus, OrderType, Payer, PaymentMethod, TableState, TaxRate,
    ValidationError,
};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::catalog::CustomerDirectory;
use crate::error::{ensure_affected, PosResult};
use crate::pool::begin_write;
use crate::repository::{invoice, order, table, InvoiceRepository};
use crate::service::{apply_table_command, next_invoice_number, resolve_payer};

#[derive(Clone)]
pub struct InvoiceService {
    pool: SqlitePool,
    tax_rate: TaxRate,
    customers: Arc<dyn CustomerDirectory>,
}

impl InvoiceService {
    pub fn new(pool: SqlitePool, tax_rate: TaxRate, customers: Arc<dyn CustomerDirectory>) -> Self {
        InvoiceService {
            pool,
            tax_rate,
            customers,
        }
    }

    /// Bills every line item of the order in one Pending invoice.
    ///
    /// ## Errors
    /// - unknown order → `NotFound`
    /// - Cancelled order → `InvalidState`
    /// - a non-voided invoice already bills the order → `AlreadyInvoiced`
    /// - negative discount or tip → `InvalidAmount`
    /// - no line items → `Validation`
    ///
    /// Without an explicit payer, the order's customer pays when it has one.
    pub async fn create_invoice(&self, order_id: i64, request: &CreateInvoice) -> PosResult<Invoice> {
        let payer = match &request.payer {
            Some(payer) => payer.clone(),
            None => default_payer(&self.pool, order_id).await?,
        };
        let (payer_customer_id, payer_name) = resolve_payer(self.customers.as_ref(), &payer).await?;

        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;

        let current = order::find(&mut *tx, order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order", order_id))?;
        ensure_invoiceable(&current)?;
        if invoice::has_open(&mut *tx, order_id).await? {
            return Err(CoreError::AlreadyInvoiced { order_id }.into());
        }

        let items = order::items(&mut *tx, order_id).await?;
        if items.is_empty() {
            return Err(ValidationError::Required {
                field: "line_items".to_string(),
            }
            .into());
        }
        let draft = draft_invoice(
            &current,
            &items,
            request,
            self.tax_rate,
            payer_customer_id,
            payer_name,
        )?;

        let number = next_invoice_number(&mut tx, now).await?;
        let id = invoice::insert(&mut *tx, &number, &draft, now).await?;
        invoice::insert_items(&mut tx, id, &draft.line_item_ids).await?;
        let created = load(&mut tx, id).await?;
        tx.commit().await?;

        info!(
            invoice_id = id,
            invoice_number = %number,
            order_id,
            total_cents = created.total_cents,
            "Invoice created"
        );
        Ok(created)
    }

    /// Voids a Pending or Paid invoice. The order is not reopened.
    pub async fn void_invoice(&self, invoice_id: i64, reason: &str) -> PosResult<Invoice> {
        let reason = reason.trim();
        validate_reason(reason)?;

        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;
        let current = load(&mut tx, invoice_id).await?;
        check_void(&current)?;

        let rows = invoice::void(&mut *tx, invoice_id, current.status, reason, now).await?;
        ensure_affected(rows, "Invoice", invoice_id)?;
        let voided = load(&mut tx, invoice_id).await?;
        tx.commit().await?;

        info!(invoice_id, from = %current.status, reason, "Invoice voided");
        Ok(voided)
    }

    /// Records payment of a Pending invoice.
    ///
    /// When the order is Delivered and no Pending invoice remains, its
    /// Occupied table is freed unless another active order already holds it.
    pub async fn mark_paid(&self, invoice_id: i64, payment_method: PaymentMethod) -> PosResult<Invoice> {
        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;
        let current = load(&mut tx, invoice_id).await?;
        check_pay(&current)?;

        let rows = invoice::mark_paid(&mut *tx, invoice_id, payment_method, now).await?;
        ensure_affected(rows, "Invoice", invoice_id)?;
        release_table_if_settled(&mut tx, current.order_id, now).await?;

        let paid = load(&mut tx, invoice_id).await?;
        tx.commit().await?;

        info!(invoice_id, order_id = paid.order_id, ?payment_method, "Invoice paid");
        Ok(paid)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get(&self, invoice_id: i64) -> PosResult<Invoice> {
        self.repo()
            .get(invoice_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Invoice", invoice_id).into())
    }

    pub async fn by_order(&self, order_id: i64) -> PosResult<Vec<Invoice>> {
        Ok(self.repo().by_order(order_id).await?)
    }

    pub async fn list(&self, filter: &InvoiceFilter) -> PosResult<Vec<Invoice>> {
        Ok(self.repo().list(filter).await?)
    }

    /// Invoices created on a UTC business day.
    pub async fn for_day(&self, date: NaiveDate) -> PosResult<Vec<Invoice>> {
        Ok(self.repo().for_day(date).await?)
    }

    /// Aggregate totals over `[from, to)`, voided invoices excluded.
    pub async fn summary(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> PosResult<InvoiceSummary> {
        Ok(self.repo().summary(from, to).await?)
    }

    /// Line item ids billed by the invoice.
    pub async fn covered_items(&self, invoice_id: i64) -> PosResult<Vec<i64>> {
        Ok(self.repo().covered_items(invoice_id).await?)
    }

    fn repo(&self) -> InvoiceRepository {
        InvoiceRepository::new(self.pool.clone())
    }
}

impl std::fmt::Debug for InvoiceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvoiceService")
            .field("tax_rate", &self.tax_rate)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// The order's customer, or an anonymous walk-in.
async fn default_payer(pool: &SqlitePool, order_id: i64) -> PosResult<Payer> {
    let customer_id = order::find(pool, order_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Order", order_id))?
        .customer_id;
    Ok(customer_id.map_or_else(Payer::default, |customer_id| Payer::Customer { customer_id }))
}

async fn load(conn: &mut SqliteConnection, invoice_id: i64) -> PosResult<Invoice> {
    invoice::find(conn, invoice_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Invoice", invoice_id).into())
}

/// Frees the table of a delivered and fully paid DineIn order.
///
/// Called after a payment and after delivery; a Pending order keeps its
/// table even when already paid.
pub(crate) async fn release_table_if_settled(
    conn: &mut SqliteConnection,
    order_id: i64,
    now: DateTime<Utc>,
) -> PosResult<()> {
    let Some(settled) = order::find(&mut *conn, order_id).await? else {
        return Ok(());
    };
    let Some(table_id) = settled.table_id else {
        return Ok(());
    };
    if settled.order_type != OrderType::DineIn {
        return Ok(());
    }
    if settled.status != OrderStatus::Delivered {
        debug!(order_id, status = %settled.status, "Order not delivered, table stays occupied");
        return Ok(());
    }

    if invoice::count_pending(&mut *conn, order_id).await? > 0 {
        debug!(order_id, "Invoices still pending, table stays occupied");
        return Ok(());
    }
    if !invoice::has_paid(&mut *conn, order_id).await? {
        return Ok(());
    }
    if let Some(active) = order::find_active_for_table(&mut *conn, table_id).await? {
        if active.id != order_id {
            debug!(order_id, table_id, holder = active.id, "Table already serves another order");
            return Ok(());
        }
    }
    let occupied = table::find(&mut *conn, table_id)
        .await?
        .is_some_and(|t| t.state == TableState::Occupied);
    if occupied {
        apply_table_command(conn, table_id, &TableCommand::Free, now).await?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryCatalog, InMemoryCustomers};
    use crate::error::PosError;
    use crate::service::{OrderService, TableService};
    use crate::{Database, DbConfig};
    use bistro_core::query::AttentionThresholds;
    use bistro_core::{InvoiceStatus, ItemRef, Money, NewOrder, Order, OrderStatus};

    struct Fixture {
        tables: TableService,
        orders: OrderService,
        invoices: InvoiceService,
    }

    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = Arc::new(
            InMemoryCatalog::new()
                .with_product(1, Money::from_cents(60_000))
                .with_product(2, Money::from_cents(40_000)),
        );
        let customers = Arc::new(InMemoryCustomers::new().with_customer(5, "Lucía Ramos"));
        Fixture {
            tables: TableService::new(db.pool().clone(), AttentionThresholds::default()),
            orders: OrderService::new(db.pool().clone(), catalog, AttentionThresholds::default()),
            invoices: InvoiceService::new(db.pool().clone(), TaxRate::default(), customers),
        }
    }

    /// A DineIn order worth 1000.00 at a fresh table.
    async fn seated_order(f: &Fixture, number: i64) -> (i64, Order) {
        let table = f.tables.create_table(number, 4, "Main").await.unwrap();
        let order = f
            .orders
            .create(NewOrder {
                order_type: OrderType::DineIn,
                table_id: Some(table.id),
                customer_id: None,
                staff_id: 1,
            })
            .await
            .unwrap();
        f.orders
            .add_line_item(order.id, ItemRef::Product(1), 1, None)
            .await
            .unwrap();
        f.orders
            .add_line_item(order.id, ItemRef::Product(2), 1, None)
            .await
            .unwrap();
        (table.id, order)
    }

    #[tokio::test]
    async fn test_invoice_totals() {
        let f = fixture().await;
        let (_, order) = seated_order(&f, 1).await;

        let invoice = f
            .invoices
            .create_invoice(
                order.id,
                &CreateInvoice::new(PaymentMethod::Card)
                    .discount(Money::from_cents(10_000))
                    .tip(Money::from_cents(5_000)),
            )
            .await
            .unwrap();

        assert_eq!(invoice.subtotal_cents, 100_000);
        assert_eq!(invoice.tax_cents, 16_200);
        assert_eq!(invoice.total_cents, 111_200);
        assert_eq!(invoice.status, InvoiceStatus::Pending);
        assert_eq!(invoice.payer_name, "Walk-in");
        assert!(invoice.invoice_number.starts_with("INV-"));
        assert_eq!(f.invoices.covered_items(invoice.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_already_invoiced_until_voided() {
        let f = fixture().await;
        let (_, order) = seated_order(&f, 1).await;
        let request = CreateInvoice::new(PaymentMethod::Cash);

        let first = f.invoices.create_invoice(order.id, &request).await.unwrap();
        let err = f.invoices.create_invoice(order.id, &request).await.unwrap_err();
        assert!(matches!(
            err,
            PosError::Domain(CoreError::AlreadyInvoiced { .. })
        ));

        f.invoices.void_invoice(first.id, "wrong discount").await.unwrap();
        let second = f.invoices.create_invoice(order.id, &request).await.unwrap();
        assert_ne!(second.invoice_number, first.invoice_number);
    }

    #[tokio::test]
    async fn test_rejected_requests() {
        let f = fixture().await;
        let (_, order) = seated_order(&f, 1).await;

        let err = f
            .invoices
            .create_invoice(
                order.id,
                &CreateInvoice::new(PaymentMethod::Cash).tip(Money::from_cents(-1)),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PosError::Domain(CoreError::InvalidAmount { field: "tip", .. })
        ));

        let err = f
            .invoices
            .create_invoice(404, &CreateInvoice::new(PaymentMethod::Cash))
            .await
            .unwrap_err();
        assert!(matches!(err, PosError::Domain(CoreError::NotFound { .. })));

        f.orders.cancel(order.id, "kitchen closed").await.unwrap();
        let err = f
            .invoices
            .create_invoice(order.id, &CreateInvoice::new(PaymentMethod::Cash))
            .await
            .unwrap_err();
        assert!(matches!(err, PosError::Domain(CoreError::InvalidState { .. })));
        assert!(f.invoices.by_order(order.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invoice_freezes_line_items() {
        let f = fixture().await;
        let (_, order) = seated_order(&f, 1).await;
        let invoice = f
            .invoices
            .create_invoice(order.id, &CreateInvoice::new(PaymentMethod::Cash))
            .await
            .unwrap();

        let err = f
            .orders
            .add_line_item(order.id, ItemRef::Product(1), 1, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PosError::Domain(CoreError::InvalidState { .. })));
        assert!(f.orders.cancel(order.id, "oops").await.is_err());

        f.invoices.void_invoice(invoice.id, "reopen").await.unwrap();
        assert!(f
            .orders
            .add_line_item(order.id, ItemRef::Product(1), 1, None)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_voided_invoice_keeps_its_items() {
        let f = fixture().await;
        let (_, order) = seated_order(&f, 1).await;
        let invoice = f
            .invoices
            .create_invoice(order.id, &CreateInvoice::new(PaymentMethod::Cash))
            .await
            .unwrap();
        let covered = f.invoices.covered_items(invoice.id).await.unwrap();
        assert_eq!(covered.len(), 2);

        f.invoices.void_invoice(invoice.id, "wrong table").await.unwrap();
        let err = f
            .orders
            .remove_line_item(order.id, covered[0])
            .await
            .unwrap_err();
        assert!(matches!(err, PosError::Domain(CoreError::InvalidState { .. })));
        assert_eq!(f.invoices.covered_items(invoice.id).await.unwrap(), covered);

        // Items added after the void are still removable
        let extra = f
            .orders
            .add_line_item(order.id, ItemRef::Product(2), 1, None)
            .await
            .unwrap();
        f.orders.remove_line_item(order.id, extra.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_payment_frees_table() {
        let f = fixture().await;
        let (table_id, order) = seated_order(&f, 1).await;
        for target in [OrderStatus::Preparing, OrderStatus::Ready, OrderStatus::Delivered] {
            f.orders.advance_status(order.id, target).await.unwrap();
        }

        let invoice = f
            .invoices
            .create_invoice(order.id, &CreateInvoice::new(PaymentMethod::Cash))
            .await
            .unwrap();
        assert_eq!(f.tables.get(table_id).await.unwrap().state, TableState::Occupied);

        let paid = f.invoices.mark_paid(invoice.id, PaymentMethod::Card).await.unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert_eq!(paid.payment_method, PaymentMethod::Card);
        assert!(paid.paid_at.is_some());
        assert_eq!(f.tables.get(table_id).await.unwrap().state, TableState::Free);

        let err = f.invoices.mark_paid(invoice.id, PaymentMethod::Cash).await.unwrap_err();
        assert!(matches!(err, PosError::Domain(CoreError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_void_is_terminal() {
        let f = fixture().await;
        let (table_id, order) = seated_order(&f, 1).await;
        let invoice = f
            .invoices
            .create_invoice(order.id, &CreateInvoice::new(PaymentMethod::Cash))
            .await
            .unwrap();
        f.invoices.mark_paid(invoice.id, PaymentMethod::Cash).await.unwrap();

        let voided = f.invoices.void_invoice(invoice.id, "refund").await.unwrap();
        assert_eq!(voided.status, InvoiceStatus::Voided);
        assert_eq!(voided.void_reason.as_deref(), Some("refund"));

        assert!(f.invoices.void_invoice(invoice.id, "again").await.is_err());
        assert!(f.invoices.mark_paid(invoice.id, PaymentMethod::Cash).await.is_err());
        // Voiding does not touch the table
        assert_eq!(f.tables.get(table_id).await.unwrap().state, TableState::Occupied);
    }

    #[tokio::test]
    async fn test_paid_before_delivery_frees_on_delivery() {
        let f = fixture().await;
        let (table_id, order) = seated_order(&f, 1).await;
        let invoice = f
            .invoices
            .create_invoice(order.id, &CreateInvoice::new(PaymentMethod::Card))
            .await
            .unwrap();
        f.invoices.mark_paid(invoice.id, PaymentMethod::Card).await.unwrap();
        assert_eq!(f.tables.get(table_id).await.unwrap().state, TableState::Occupied);

        f.orders.advance_status(order.id, OrderStatus::Preparing).await.unwrap();
        f.orders.advance_status(order.id, OrderStatus::Ready).await.unwrap();
        assert_eq!(f.tables.get(table_id).await.unwrap().state, TableState::Occupied);

        f.orders.advance_status(order.id, OrderStatus::Delivered).await.unwrap();
        assert_eq!(f.tables.get(table_id).await.unwrap().state, TableState::Free);
    }

    #[tokio::test]
    async fn test_delivery_without_payment_keeps_table() {
        let f = fixture().await;
        let (table_id, order) = seated_order(&f, 1).await;
        for target in [OrderStatus::Preparing, OrderStatus::Ready, OrderStatus::Delivered] {
            f.orders.advance_status(order.id, target).await.unwrap();
        }
        assert_eq!(f.tables.get(table_id).await.unwrap().state, TableState::Occupied);

        // A voided invoice does not count as payment
        let invoice = f
            .invoices
            .create_invoice(order.id, &CreateInvoice::new(PaymentMethod::Cash))
            .await
            .unwrap();
        f.invoices.void_invoice(invoice.id, "wrong payer").await.unwrap();
        assert_eq!(f.tables.get(table_id).await.unwrap().state, TableState::Occupied);
    }

    #[tokio::test]
    async fn test_payer_resolution() {
        let f = fixture().await;
        let order = f
            .orders
            .create(NewOrder {
                order_type: OrderType::TakeOut,
                table_id: None,
                customer_id: Some(5),
                staff_id: 1,
            })
            .await
            .unwrap();
        f.orders
            .add_line_item(order.id, ItemRef::Product(2), 1, None)
            .await
            .unwrap();

        let invoice = f
            .invoices
            .create_invoice(order.id, &CreateInvoice::new(PaymentMethod::Cash))
            .await
            .unwrap();
        assert_eq!(invoice.payer_customer_id, Some(5));
        assert_eq!(invoice.payer_name, "Lucía Ramos");

        f.invoices.void_invoice(invoice.id, "wrong payer").await.unwrap();
        let invoice = f
            .invoices
            .create_invoice(
                order.id,
                &CreateInvoice::new(PaymentMethod::Cash).payer(Payer::walk_in("Table 4 guest")),
            )
            .await
            .unwrap();
        assert_eq!(invoice.payer_customer_id, None);
        assert_eq!(invoice.payer_name, "Table 4 guest");
    }

    #[tokio::test]
    async fn test_empty_order_cannot_be_invoiced() {
        let f = fixture().await;
        let order = f
            .orders
            .create(NewOrder {
                order_type: OrderType::Delivery,
                table_id: None,
                customer_id: None,
                staff_id: 1,
            })
            .await
            .unwrap();
        let err = f
            .invoices
            .create_invoice(order.id, &CreateInvoice::new(PaymentMethod::Cash))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PosError::Domain(CoreError::Validation(ValidationError::Required { .. }))
        ));
    }

    #[tokio::test]
    async fn test_summary_and_for_day() {
        let f = fixture().await;
        let (_, first) = seated_order(&f, 1).await;
        let (_, second) = seated_order(&f, 2).await;
        let request = CreateInvoice::new(PaymentMethod::Cash);

        let paid = f.invoices.create_invoice(first.id, &request).await.unwrap();
        f.invoices.mark_paid(paid.id, PaymentMethod::Cash).await.unwrap();
        let voided = f.invoices.create_invoice(second.id, &request).await.unwrap();
        f.invoices.void_invoice(voided.id, "test").await.unwrap();

        let today = Utc::now().date_naive();
        assert_eq!(f.invoices.for_day(today).await.unwrap().len(), 2);

        let from = Utc::now() - chrono::Duration::hours(1);
        let to = Utc::now() + chrono::Duration::hours(1);
        let summary = f.invoices.summary(from, to).await.unwrap();
        assert_eq!(summary.invoice_count, 1);
        assert_eq!(summary.total.cents(), 118_000);
        assert_eq!(summary.paid_total.cents(), 118_000);

        let listed = f
            .invoices
            .list(&InvoiceFilter::default().status(InvoiceStatus::Voided))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_invoicing_bills_once() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("pos.db")))
            .await
            .unwrap();
        let catalog = Arc::new(InMemoryCatalog::new().with_product(1, Money::from_cents(2_500)));
        let orders = OrderService::new(db.pool().clone(), catalog, AttentionThresholds::default());
        let invoices = InvoiceService::new(
            db.pool().clone(),
            TaxRate::default(),
            Arc::new(InMemoryCustomers::new()),
        );

        let order = orders
            .create(NewOrder {
                order_type: OrderType::TakeOut,
                table_id: None,
                customer_id: None,
                staff_id: 1,
            })
            .await
            .unwrap();
        orders
            .add_line_item(order.id, ItemRef::Product(1), 2, None)
            .await
            .unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let invoices = invoices.clone();
                tokio::spawn(async move {
                    invoices
                        .create_invoice(order.id, &CreateInvoice::new(PaymentMethod::Cash))
                        .await
                })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(PosError::Domain(CoreError::AlreadyInvoiced { .. }))
                | Err(PosError::Conflict { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(invoices.by_order(order.id).await.unwrap().len(), 1);
    }
}

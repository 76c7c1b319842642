//! # Invoice Generator Rules
//!
//! Turns an order (or a share of it) into an [`InvoiceDraft`] and guards the
//! invoice status machine.
//!
//! ## Invoice Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_invoice()  ──► Pending                                          │
//! │                          │                                              │
//! │  mark_paid()             ├──► Paid ──┐                                  │
//! │                          │           │                                  │
//! │  void_invoice()          └───────────┴──► Voided  (irrevocable)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::{InvoiceAmounts, Money, TaxRate};
use crate::types::{Invoice, InvoiceStatus, LineItem, Order, OrderStatus, PaymentMethod, Payer};

/// Request to bill a whole order with one invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoice {
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub discount: Money,
    #[serde(default)]
    pub tip: Money,
    /// Defaults to the order's customer, else a walk-in.
    #[serde(default)]
    pub payer: Option<Payer>,
}

impl CreateInvoice {
    pub fn new(payment_method: PaymentMethod) -> Self {
        CreateInvoice {
            payment_method,
            discount: Money::zero(),
            tip: Money::zero(),
            payer: None,
        }
    }

    pub fn discount(mut self, discount: Money) -> Self {
        self.discount = discount;
        self
    }

    pub fn tip(mut self, tip: Money) -> Self {
        self.tip = tip;
        self
    }

    pub fn payer(mut self, payer: Payer) -> Self {
        self.payer = Some(payer);
        self
    }
}

/// Everything needed to insert one invoice row and its covered items.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceDraft {
    pub order_id: i64,
    pub split_group: Option<String>,
    pub amounts: InvoiceAmounts,
    pub tax_rate: TaxRate,
    pub payment_method: PaymentMethod,
    pub payer_customer_id: Option<i64>,
    pub payer_name: String,
    /// Line items this invoice covers.
    pub line_item_ids: Vec<i64>,
}

/// Rejects negative discount or tip.
pub fn validate_adjustments(discount: Money, tip: Money) -> CoreResult<()> {
    if discount.is_negative() {
        return Err(CoreError::InvalidAmount {
            field: "discount",
            cents: discount.cents(),
        });
    }
    if tip.is_negative() {
        return Err(CoreError::InvalidAmount {
            field: "tip",
            cents: tip.cents(),
        });
    }
    Ok(())
}

/// A Cancelled order can never be billed.
pub fn ensure_invoiceable(order: &Order) -> CoreResult<()> {
    if order.status == OrderStatus::Cancelled {
        return Err(CoreError::invalid_state("Order", order.id, order.status, "invoice"));
    }
    Ok(())
}

/// Builds the single (non-split) invoice covering every line item.
///
/// ## Rules
/// - Cancelled order → `InvalidState`
/// - discount or tip < 0 → `InvalidAmount`
/// - subtotal = order subtotal; tax and total per [`InvoiceAmounts::compute`]
pub fn draft_invoice(
    order: &Order,
    items: &[LineItem],
    request: &CreateInvoice,
    rate: TaxRate,
    payer_customer_id: Option<i64>,
    payer_name: String,
) -> CoreResult<InvoiceDraft> {
    ensure_invoiceable(order)?;
    validate_adjustments(request.discount, request.tip)?;

    let subtotal: Money = items.iter().map(LineItem::subtotal).sum();
    Ok(InvoiceDraft {
        order_id: order.id,
        split_group: None,
        amounts: InvoiceAmounts::compute(subtotal, request.discount, request.tip, rate),
        tax_rate: rate,
        payment_method: request.payment_method,
        payer_customer_id,
        payer_name,
        line_item_ids: items.iter().map(|i| i.id).collect(),
    })
}

/// `Pending → Paid` only.
pub fn check_pay(invoice: &Invoice) -> CoreResult<()> {
    match invoice.status {
        InvoiceStatus::Pending => Ok(()),
        status => Err(CoreError::invalid_transition(
            "Invoice",
            invoice.id,
            status,
            InvoiceStatus::Paid,
        )),
    }
}

/// `Pending | Paid → Voided`; a Voided invoice stays voided.
pub fn check_void(invoice: &Invoice) -> CoreResult<()> {
    match invoice.status {
        InvoiceStatus::Pending | InvoiceStatus::Paid => Ok(()),
        InvoiceStatus::Voided => Err(CoreError::invalid_transition(
            "Invoice",
            invoice.id,
            InvoiceStatus::Voided,
            InvoiceStatus::Voided,
        )),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OrderType;
    use chrono::Utc;

    fn order(status: OrderStatus) -> Order {
        Order {
            id: 10,
            order_number: "ORD-20261019-0003".to_string(),
            order_type: OrderType::DineIn,
            table_id: Some(2),
            customer_id: None,
            staff_id: 1,
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            closed_at: None,
        }
    }

    fn item(id: i64, cents: i64) -> LineItem {
        LineItem {
            id,
            order_id: 10,
            product_id: Some(id),
            combo_id: None,
            quantity: 1,
            unit_price_cents: cents,
            note: None,
            created_at: Utc::now(),
        }
    }

    fn invoice(status: InvoiceStatus) -> Invoice {
        Invoice {
            id: 5,
            invoice_number: "INV-20261019-0001".to_string(),
            order_id: 10,
            split_group: None,
            subtotal_cents: 0,
            discount_cents: 0,
            tip_cents: 0,
            tax_cents: 0,
            total_cents: 0,
            tax_rate_bps: 1800,
            payment_method: PaymentMethod::Cash,
            status,
            payer_customer_id: None,
            payer_name: Payer::DEFAULT_WALK_IN.to_string(),
            created_at: Utc::now(),
            paid_at: None,
            voided_at: None,
            void_reason: None,
        }
    }

    #[test]
    fn test_draft_reference_scenario() {
        let items = [item(1, 60_000), item(2, 40_000)];
        let request = CreateInvoice::new(PaymentMethod::Card)
            .discount(Money::from_cents(10_000))
            .tip(Money::from_cents(5_000));
        let draft = draft_invoice(
            &order(OrderStatus::Delivered),
            &items,
            &request,
            TaxRate::from_bps(1800),
            None,
            "Walk-in".to_string(),
        )
        .unwrap();

        assert_eq!(draft.amounts.subtotal.cents(), 100_000);
        assert_eq!(draft.amounts.tax.cents(), 16_200);
        assert_eq!(draft.amounts.total.cents(), 111_200);
        assert_eq!(draft.line_item_ids, vec![1, 2]);
        assert_eq!(draft.split_group, None);
    }

    #[test]
    fn test_cancelled_order_cannot_be_invoiced() {
        let err = draft_invoice(
            &order(OrderStatus::Cancelled),
            &[item(1, 100)],
            &CreateInvoice::new(PaymentMethod::Cash),
            TaxRate::default(),
            None,
            String::new(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState { .. }));
    }

    #[test]
    fn test_negative_adjustments_rejected() {
        assert_eq!(
            validate_adjustments(Money::from_cents(-1), Money::zero()),
            Err(CoreError::InvalidAmount {
                field: "discount",
                cents: -1
            })
        );
        assert!(matches!(
            validate_adjustments(Money::zero(), Money::from_cents(-50)),
            Err(CoreError::InvalidAmount { field: "tip", .. })
        ));
    }

    #[test]
    fn test_invoice_status_rules() {
        assert!(check_pay(&invoice(InvoiceStatus::Pending)).is_ok());
        assert!(check_pay(&invoice(InvoiceStatus::Paid)).is_err());
        assert!(check_pay(&invoice(InvoiceStatus::Voided)).is_err());

        assert!(check_void(&invoice(InvoiceStatus::Pending)).is_ok());
        assert!(check_void(&invoice(InvoiceStatus::Paid)).is_ok());
        assert!(matches!(
            check_void(&invoice(InvoiceStatus::Voided)),
            Err(CoreError::InvalidTransition { .. })
        ));
    }
}

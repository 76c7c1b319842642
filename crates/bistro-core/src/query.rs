//! # Query Objects
//!
//! Typed filters for the list operations, the invoice summary aggregate, and
//! the time-based predicates behind "needs attention" and "overdue".

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{DiningTable, Invoice, InvoiceStatus, Order, OrderStatus, OrderType, TableState};
use crate::{CLEANING_THRESHOLD_HOURS, ORDER_FOLLOW_UP_MINUTES};

// =============================================================================
// Filters
// =============================================================================

/// Filter for listing tables. Empty filter = every active table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase", default)]
pub struct TableFilter {
    pub state: Option<TableState>,
    pub min_capacity: Option<i64>,
    pub location: Option<String>,
    /// Include soft-disabled tables.
    pub include_inactive: bool,
}

impl TableFilter {
    pub fn state(mut self, state: TableState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn min_capacity(mut self, capacity: i64) -> Self {
        self.min_capacity = Some(capacity);
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn include_inactive(mut self) -> Self {
        self.include_inactive = true;
        self
    }
}

/// Filter for listing orders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub table_id: Option<i64>,
    pub order_type: Option<OrderType>,
    /// Only Pending, Preparing and Ready orders.
    pub active_only: bool,
}

impl OrderFilter {
    pub fn active() -> Self {
        OrderFilter {
            active_only: true,
            ..Default::default()
        }
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn table(mut self, table_id: i64) -> Self {
        self.table_id = Some(table_id);
        self
    }

    pub fn order_type(mut self, order_type: OrderType) -> Self {
        self.order_type = Some(order_type);
        self
    }
}

/// Filter for listing invoices. `from` is inclusive, `to` exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase", default)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    #[ts(as = "Option<String>")]
    pub from: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub to: Option<DateTime<Utc>>,
}

impl InvoiceFilter {
    pub fn status(mut self, status: InvoiceStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }
}

// =============================================================================
// Invoice Summary
// =============================================================================

/// Aggregate over the non-voided invoices of a period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceSummary {
    pub invoice_count: usize,
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub tip: Money,
    pub total: Money,
    /// Σ total of the Paid invoices only.
    pub paid_total: Money,
}

impl InvoiceSummary {
    /// Folds invoices into a summary, skipping voided ones.
    pub fn from_invoices<'a>(invoices: impl IntoIterator<Item = &'a Invoice>) -> Self {
        invoices
            .into_iter()
            .filter(|inv| inv.status != InvoiceStatus::Voided)
            .fold(InvoiceSummary::default(), |mut acc, inv| {
                let amounts = inv.amounts();
                acc.invoice_count += 1;
                acc.subtotal += amounts.subtotal;
                acc.discount += amounts.discount;
                acc.tax += amounts.tax;
                acc.tip += amounts.tip;
                acc.total += amounts.total;
                if inv.status == InvoiceStatus::Paid {
                    acc.paid_total += amounts.total;
                }
                acc
            })
    }
}

// =============================================================================
// Attention Predicates
// =============================================================================

/// Time limits behind the attention and overdue views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AttentionThresholds {
    /// An open order untouched for longer needs a follow-up.
    pub order_follow_up_minutes: i64,
    /// A table not cleaned for longer is due for cleaning.
    pub cleaning_hours: i64,
}

impl AttentionThresholds {
    pub fn follow_up(&self) -> Duration {
        Duration::minutes(self.order_follow_up_minutes)
    }

    pub fn cleaning(&self) -> Duration {
        Duration::hours(self.cleaning_hours)
    }
}

impl Default for AttentionThresholds {
    fn default() -> Self {
        AttentionThresholds {
            order_follow_up_minutes: ORDER_FOLLOW_UP_MINUTES,
            cleaning_hours: CLEANING_THRESHOLD_HOURS,
        }
    }
}

/// Why a table shows up in the attention list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AttentionReason {
    /// Marked Occupied but no active order references it.
    OccupiedWithoutOrder,
    /// Its active order has not moved within the follow-up window.
    StaleOrder { order_id: i64 },
    /// Never cleaned, or not cleaned within the cleaning window.
    CleaningOverdue,
}

/// A table flagged by the attention view, with every reason that applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TableAttention {
    pub table: DiningTable,
    pub reasons: Vec<AttentionReason>,
}

/// An open order (Pending or Preparing) older than `sla`.
pub fn is_overdue(order: &Order, now: DateTime<Utc>, sla: Duration) -> bool {
    matches!(order.status, OrderStatus::Pending | OrderStatus::Preparing)
        && now - order.created_at > sla
}

/// Lists the reasons `table` needs attention; empty when it does not.
///
/// `active_order` is the table's active order, if any. Soft-disabled tables
/// and tables in Maintenance are never flagged.
pub fn attention_reasons(
    table: &DiningTable,
    active_order: Option<&Order>,
    now: DateTime<Utc>,
    thresholds: &AttentionThresholds,
) -> Vec<AttentionReason> {
    let mut reasons = Vec::new();
    if !table.is_active || table.state == TableState::Maintenance {
        return reasons;
    }

    if table.state == TableState::Occupied {
        match active_order {
            None => reasons.push(AttentionReason::OccupiedWithoutOrder),
            Some(order) if now - order.updated_at > thresholds.follow_up() => {
                reasons.push(AttentionReason::StaleOrder { order_id: order.id })
            }
            Some(_) => {}
        }
    }

    let cleaning_due = match table.last_cleaned_at {
        None => true,
        Some(cleaned) => now - cleaned > thresholds.cleaning(),
    };
    if cleaning_due {
        reasons.push(AttentionReason::CleaningOverdue);
    }

    reasons
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PaymentMethod;

    fn table(state: TableState, cleaned_ago: Option<Duration>, now: DateTime<Utc>) -> DiningTable {
        DiningTable {
            id: 1,
            number: 1,
            capacity: 2,
            location: "Main".to_string(),
            state,
            reservation_ref: None,
            maintenance_reason: None,
            last_cleaned_at: cleaned_ago.map(|ago| now - ago),
            state_changed_at: now,
            is_active: true,
            created_at: now,
        }
    }

    fn order(status: OrderStatus, age: Duration, now: DateTime<Utc>) -> Order {
        Order {
            id: 5,
            order_number: "ORD-20261019-0001".to_string(),
            order_type: OrderType::DineIn,
            table_id: Some(1),
            customer_id: None,
            staff_id: 1,
            status,
            created_at: now - age,
            updated_at: now - age,
            closed_at: None,
        }
    }

    fn invoice(status: InvoiceStatus, total: i64) -> Invoice {
        Invoice {
            id: 1,
            invoice_number: "INV-20261019-0001".to_string(),
            order_id: 1,
            split_group: None,
            subtotal_cents: total,
            discount_cents: 0,
            tip_cents: 0,
            tax_cents: 0,
            total_cents: total,
            tax_rate_bps: 0,
            payment_method: PaymentMethod::Cash,
            status,
            payer_customer_id: None,
            payer_name: "Walk-in".to_string(),
            created_at: Utc::now(),
            paid_at: None,
            voided_at: None,
            void_reason: None,
        }
    }

    #[test]
    fn test_overdue_uses_thirty_minute_sla() {
        let now = Utc::now();
        let sla = AttentionThresholds::default().follow_up();
        assert!(is_overdue(&order(OrderStatus::Pending, Duration::minutes(31), now), now, sla));
        assert!(!is_overdue(&order(OrderStatus::Pending, Duration::minutes(29), now), now, sla));
        // Ready orders are waiting on the floor, not the kitchen
        assert!(!is_overdue(&order(OrderStatus::Ready, Duration::hours(2), now), now, sla));
    }

    #[test]
    fn test_never_cleaned_table_is_overdue() {
        let now = Utc::now();
        let reasons = attention_reasons(
            &table(TableState::Free, None, now),
            None,
            now,
            &AttentionThresholds::default(),
        );
        assert_eq!(reasons, vec![AttentionReason::CleaningOverdue]);

        let fresh = table(TableState::Free, Some(Duration::hours(1)), now);
        assert!(attention_reasons(&fresh, None, now, &AttentionThresholds::default()).is_empty());
    }

    #[test]
    fn test_occupied_table_reasons() {
        let now = Utc::now();
        let thresholds = AttentionThresholds::default();
        let occupied = table(TableState::Occupied, Some(Duration::minutes(10)), now);

        assert_eq!(
            attention_reasons(&occupied, None, now, &thresholds),
            vec![AttentionReason::OccupiedWithoutOrder]
        );

        let stale = order(OrderStatus::Preparing, Duration::minutes(45), now);
        assert_eq!(
            attention_reasons(&occupied, Some(&stale), now, &thresholds),
            vec![AttentionReason::StaleOrder { order_id: 5 }]
        );

        let fresh = order(OrderStatus::Preparing, Duration::minutes(5), now);
        assert!(attention_reasons(&occupied, Some(&fresh), now, &thresholds).is_empty());
    }

    #[test]
    fn test_maintenance_tables_are_not_flagged() {
        let now = Utc::now();
        let t = table(TableState::Maintenance, None, now);
        assert!(attention_reasons(&t, None, now, &AttentionThresholds::default()).is_empty());
    }

    #[test]
    fn test_summary_skips_voided() {
        let invoices = [
            invoice(InvoiceStatus::Paid, 1_000),
            invoice(InvoiceStatus::Pending, 500),
            invoice(InvoiceStatus::Voided, 9_999),
        ];
        let summary = InvoiceSummary::from_invoices(&invoices);
        assert_eq!(summary.invoice_count, 2);
        assert_eq!(summary.total.cents(), 1_500);
        assert_eq!(summary.paid_total.cents(), 1_000);
    }

    #[test]
    fn test_filter_builders() {
        let filter = OrderFilter::active().table(3);
        assert!(filter.active_only);
        assert_eq!(filter.table_id, Some(3));

        let filter = TableFilter::default().min_capacity(4).location("Terrace");
        assert_eq!(filter.min_capacity, Some(4));
        assert!(!filter.include_inactive);
    }
}

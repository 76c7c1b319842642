//! # Domain Types
//!
//! Core domain types used throughout Bistro POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  DiningTable    │   │     Order       │   │    Invoice      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │◄──│  table_id       │◄──│  order_id       │       │
//! │  │  number         │   │  order_number   │   │  invoice_number │       │
//! │  │  state          │   │  status         │   │  split_group    │       │
//! │  └─────────────────┘   └────────┬────────┘   │  status         │       │
//! │                                 │ 1..n        └────────┬────────┘       │
//! │                        ┌────────▼────────┐             │ 1..n           │
//! │                        │   LineItem      │◄────────────┘ (covers)       │
//! │                        │  product|combo  │                              │
//! │                        │  unit_price     │  (frozen at addition)        │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: numeric primary key, used for relations
//! - Business ID: (table number, order number, invoice number) - human-readable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::{InvoiceAmounts, Money, TaxRate};

// =============================================================================
// Table State
// =============================================================================

/// Occupancy state of a dining table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TableState {
    /// Available for seating.
    #[default]
    Free,
    /// Guests seated, an order is (or is about to be) open.
    Occupied,
    /// Held for a reservation.
    Reserved,
    /// Out of service.
    Maintenance,
}

impl TableState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TableState::Free => "free",
            TableState::Occupied => "occupied",
            TableState::Reserved => "reserved",
            TableState::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for TableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Dining Table
// =============================================================================

/// A dining table on the floor plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DiningTable {
    pub id: i64,
    /// Human-facing table number (unique).
    pub number: i64,
    /// Seating capacity.
    pub capacity: i64,
    /// Free-text zone ("Terrace", "Bar", ...).
    pub location: String,
    pub state: TableState,
    /// Reservation holding the table while `Reserved`.
    pub reservation_ref: Option<String>,
    /// Advisory reason while in `Maintenance`.
    pub maintenance_reason: Option<String>,
    #[ts(as = "Option<String>")]
    pub last_cleaned_at: Option<DateTime<Utc>>,
    /// When `state` last changed.
    #[ts(as = "String")]
    pub state_changed_at: DateTime<Utc>,
    /// Soft-disable flag. Tables are never deleted.
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Order Type / Status
// =============================================================================

/// How the order is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Served at a table; requires a table reference.
    DineIn,
    TakeOut,
    Delivery,
}

impl OrderType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderType::DineIn => "dine_in",
            OrderType::TakeOut => "take_out",
            OrderType::Delivery => "delivery",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kitchen workflow status of an order.
///
/// ```text
/// Pending ──► Preparing ──► Ready ──► Delivered
///    │            │
///    └────────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Preparing,
    Ready,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Order
// =============================================================================

/// A customer order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    /// `ORD-YYYYMMDD-NNNN`, unique.
    pub order_number: String,
    pub order_type: OrderType,
    /// Set iff `order_type` is `DineIn`.
    pub table_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub staff_id: i64,
    pub status: OrderStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    /// Last mutation (status change, item change, note).
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    /// When the order reached a terminal status.
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
}

/// Input for order creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub order_type: OrderType,
    pub table_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub staff_id: i64,
}

/// A timestamped, append-only order note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderNote {
    pub id: i64,
    pub order_id: i64,
    pub body: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Line Item
// =============================================================================

/// What a line item sells: exactly one catalog product or one combo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ItemRef {
    Product(i64),
    Combo(i64),
}

impl ItemRef {
    /// Splits into the `(product_id, combo_id)` column pair.
    pub const fn columns(&self) -> (Option<i64>, Option<i64>) {
        match *self {
            ItemRef::Product(id) => (Some(id), None),
            ItemRef::Combo(id) => (None, Some(id)),
        }
    }
}

/// A line item in an order.
/// Uses snapshot pattern to freeze the catalog price at time of addition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: Option<i64>,
    pub combo_id: Option<i64>,
    pub quantity: i64,
    /// Unit price in cents at time of addition (frozen).
    pub unit_price_cents: i64,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl LineItem {
    /// Returns what this line sells.
    ///
    /// `None` only for a row violating the product-xor-combo constraint,
    /// which the schema rejects.
    pub fn item_ref(&self) -> Option<ItemRef> {
        match (self.product_id, self.combo_id) {
            (Some(id), None) => Some(ItemRef::Product(id)),
            (None, Some(id)) => Some(ItemRef::Combo(id)),
            _ => None,
        }
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Quantity × unit price.
    #[inline]
    pub fn subtotal(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Invoice Status / Payment Method
// =============================================================================

/// Status of an invoice.
///
/// ```text
/// Pending ──► Paid
///    │          │
///    └──────────┴──► Voided (terminal, irrevocable)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    Pending,
    Paid,
    Voided,
}

impl InvoiceStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Voided => "voided",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
}

// =============================================================================
// Payer
// =============================================================================

/// Who pays an invoice: a registered customer or a free-text walk-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payer {
    Customer { customer_id: i64 },
    WalkIn { name: String },
}

impl Payer {
    /// Label used when no name is given.
    pub const DEFAULT_WALK_IN: &'static str = "Walk-in";

    pub fn walk_in(name: impl Into<String>) -> Self {
        Payer::WalkIn { name: name.into() }
    }

    pub fn customer_id(&self) -> Option<i64> {
        match self {
            Payer::Customer { customer_id } => Some(*customer_id),
            Payer::WalkIn { .. } => None,
        }
    }
}

impl Default for Payer {
    fn default() -> Self {
        Payer::walk_in(Payer::DEFAULT_WALK_IN)
    }
}

// =============================================================================
// Invoice
// =============================================================================

/// An invoice billing an order, or one share of a split order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: i64,
    /// `INV-YYYYMMDD-NNNN`, unique.
    pub invoice_number: String,
    pub order_id: i64,
    /// Shared by sibling invoices of one bill split.
    pub split_group: Option<String>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tip_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    /// Rate applied when the invoice was generated.
    pub tax_rate_bps: i64,
    pub payment_method: PaymentMethod,
    pub status: InvoiceStatus,
    /// Registered customer paying, if any.
    pub payer_customer_id: Option<i64>,
    /// Display label: customer name or walk-in name.
    pub payer_name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub voided_at: Option<DateTime<Utc>>,
    pub void_reason: Option<String>,
}

impl Invoice {
    /// Returns the monetary figures as a checked bundle.
    pub fn amounts(&self) -> InvoiceAmounts {
        InvoiceAmounts {
            subtotal: Money::from_cents(self.subtotal_cents),
            discount: Money::from_cents(self.discount_cents),
            tip: Money::from_cents(self.tip_cents),
            tax: Money::from_cents(self.tax_cents),
            total: Money::from_cents(self.total_cents),
        }
    }

    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps as u32)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    pub fn is_split(&self) -> bool {
        self.split_group.is_some()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product_id: Option<i64>, combo_id: Option<i64>) -> LineItem {
        LineItem {
            id: 1,
            order_id: 1,
            product_id,
            combo_id,
            quantity: 3,
            unit_price_cents: 1250,
            note: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_line_item_subtotal() {
        assert_eq!(line(Some(7), None).subtotal().cents(), 3750);
    }

    #[test]
    fn test_line_item_ref_is_exclusive() {
        assert_eq!(line(Some(7), None).item_ref(), Some(ItemRef::Product(7)));
        assert_eq!(line(None, Some(2)).item_ref(), Some(ItemRef::Combo(2)));
        assert_eq!(line(Some(7), Some(2)).item_ref(), None);
        assert_eq!(line(None, None).item_ref(), None);
    }

    #[test]
    fn test_item_ref_columns() {
        assert_eq!(ItemRef::Combo(5).columns(), (None, Some(5)));
    }

    #[test]
    fn test_payer_json_shape() {
        let json = serde_json::to_string(&Payer::Customer { customer_id: 12 }).unwrap();
        assert_eq!(json, r#"{"kind":"customer","customer_id":12}"#);

        let payer: Payer = serde_json::from_str(r#"{"kind":"walk_in","name":"Ana"}"#).unwrap();
        assert_eq!(payer, Payer::walk_in("Ana"));
        assert_eq!(payer.customer_id(), None);
    }

    #[test]
    fn test_status_defaults() {
        assert_eq!(TableState::default(), TableState::Free);
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
        assert_eq!(InvoiceStatus::default(), InvoiceStatus::Pending);
    }
}

//! # Order State Machine
//!
//! Pure rules for the order lifecycle: status transitions, the editability
//! guard for line items, creation-input checks and order totals.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Lifecycle                                   │
//! │                                                                         │
//! │  1. CREATE          status = Pending, table occupied (DineIn)          │
//! │  2. ADD ITEMS       allowed while Pending | Preparing                  │
//! │  3. KITCHEN         Pending → Preparing → Ready → Delivered             │
//! │  4. (OPTIONAL)      Pending | Preparing → Cancelled (table freed)      │
//! │                                                                         │
//! │  Delivered and Cancelled are terminal.                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{LineItem, NewOrder, Order, OrderStatus, OrderType};

// =============================================================================
// Status Rules
// =============================================================================

impl OrderStatus {
    /// Every status that still counts as an open order.
    pub const ACTIVE: [OrderStatus; 3] = [
        OrderStatus::Pending,
        OrderStatus::Preparing,
        OrderStatus::Ready,
    ];

    /// Delivered or Cancelled.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Not terminal. At most one active order may reference a table.
    pub const fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Line items may be added, removed or edited.
    pub const fn is_editable(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Preparing)
    }

    /// The single forward step, if any.
    pub const fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Preparing),
            OrderStatus::Preparing => Some(OrderStatus::Ready),
            OrderStatus::Ready => Some(OrderStatus::Delivered),
            OrderStatus::Delivered | OrderStatus::Cancelled => None,
        }
    }

    /// Checks the full transition table, cancellation included.
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        match target {
            OrderStatus::Cancelled => self.is_editable(),
            _ => self.next() == Some(target),
        }
    }
}

/// Validates a forward status step (`Pending → Preparing → Ready → Delivered`).
///
/// Cancellation goes through [`check_cancel`]; asking for anything other than
/// the adjacent next status fails with `InvalidTransition` carrying the
/// current and attempted status.
pub fn check_advance(order: &Order, target: OrderStatus) -> CoreResult<()> {
    if target != OrderStatus::Cancelled && order.status.can_transition_to(target) {
        Ok(())
    } else {
        Err(CoreError::invalid_transition("Order", order.id, order.status, target))
    }
}

/// Validates cancellation: legal only from Pending or Preparing.
pub fn check_cancel(order: &Order) -> CoreResult<()> {
    if order.status.can_transition_to(OrderStatus::Cancelled) {
        Ok(())
    } else {
        Err(CoreError::invalid_state("Order", order.id, order.status, "cancel"))
    }
}

/// Guards every line-item mutation.
pub fn ensure_editable(order: &Order, operation: &'static str) -> CoreResult<()> {
    if order.status.is_editable() {
        Ok(())
    } else {
        Err(CoreError::invalid_state("Order", order.id, order.status, operation))
    }
}

/// Checks the table reference against the order type.
///
/// ## Rules
/// - `DineIn` requires a table
/// - `TakeOut` / `Delivery` must not carry one
pub fn validate_new_order(input: &NewOrder) -> CoreResult<()> {
    match (input.order_type, input.table_id) {
        (OrderType::DineIn, None) => Err(ValidationError::Required {
            field: "table".to_string(),
        }
        .into()),
        (OrderType::TakeOut | OrderType::Delivery, Some(_)) => Err(ValidationError::NotAllowed {
            field: "table".to_string(),
            reason: format!("{} orders are not served at a table", input.order_type),
        }
        .into()),
        _ => Ok(()),
    }
}

// =============================================================================
// Totals
// =============================================================================

/// Order-level totals. Discount and tax are invoice-level concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub item_count: usize,
    pub total_quantity: i64,
    pub subtotal: Money,
}

impl OrderTotals {
    /// Σ line item subtotals.
    pub fn from_items(items: &[LineItem]) -> Self {
        OrderTotals {
            item_count: items.len(),
            total_quantity: items.iter().map(|i| i.quantity).sum(),
            subtotal: items.iter().map(LineItem::subtotal).sum(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

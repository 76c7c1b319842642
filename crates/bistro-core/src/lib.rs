//! # bistro-core: Pure Business Logic for Bistro POS
//!
//! The rules of the restaurant floor as pure functions with zero I/O:
//! table occupancy, the order lifecycle, invoice generation and bill
//! splitting. Storage and transactions live in `bistro-db`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bistro POS Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Callers (floor UI, kitchen display)             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          bistro-db services (one writer transaction each)       │   │
//! │  │   TableService  OrderService  InvoiceService  SplitService      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ asks "is this legal?"                  │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ bistro-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   money ──► table ──► order ──► invoice ──► split               │   │
//! │  │   numbering   query   validation   types   error                │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (DiningTable, Order, LineItem, Invoice, ...)
//! - [`money`] - Integer-cent Money, TaxRate and the invoice totals formula
//! - [`table`] - Table state machine
//! - [`order`] - Order state machine and totals
//! - [`numbering`] - `ORD-`/`INV-` daily sequence numbers
//! - [`invoice`] - Invoice drafts and invoice status rules
//! - [`split`] - Bill-splitting allocator
//! - [`query`] - Filters, summaries and attention predicates
//! - [`validation`] - Field-level input checks
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use bistro_core::money::{InvoiceAmounts, Money, TaxRate};
//!
//! let amounts = InvoiceAmounts::compute(
//!     Money::from_cents(100_000), // subtotal 1000.00
//!     Money::from_cents(10_000),  // discount  100.00
//!     Money::from_cents(5_000),   // tip        50.00
//!     TaxRate::default(),         // 18%
//! );
//! assert_eq!(amounts.total.to_string(), "1112.00");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod invoice;
pub mod money;
pub mod numbering;
pub mod order;
pub mod query;
pub mod split;
pub mod table;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{InvoiceAmounts, Money, TaxRate};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Value-added tax applied when nothing is configured: 18%.
pub const DEFAULT_TAX_RATE_BPS: u32 = 1800;

/// Minutes an open order may sit untouched before it needs a follow-up.
pub const ORDER_FOLLOW_UP_MINUTES: i64 = 30;

/// Hours after which a table is due for cleaning.
pub const CLEANING_THRESHOLD_HOURS: i64 = 4;

/// Maximum quantity of a single line item
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10)
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum length of notes and reasons, in characters.
pub const MAX_NOTE_LENGTH: usize = 500;

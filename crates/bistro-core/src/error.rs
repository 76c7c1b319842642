//! # Error Types
//!
//! Domain-specific error types for bistro-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bistro-core errors (this file)                                        │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  bistro-db errors (separate crate)                                     │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── PosError         - What service callers see                       │
//! │                         (Domain | Conflict | Storage)                  │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → PosError → caller                 │
//! │                          DbError   ↗                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (ids, current and attempted state)
//! 3. Errors are enum variants, never String
//! 4. Domain violations are returned, never coerced or auto-corrected

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Domain rule violations.
///
/// Every variant carries enough context for the caller to render an accurate
/// message: the entity, its id and, for state errors, the current state and
/// the attempted target or operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Unknown id (table, order, line item, invoice, product, combo).
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// The operation is not allowed in the entity's current state.
    ///
    /// ## When This Occurs
    /// - Adding a line item to a Delivered or Cancelled order
    /// - Cancelling a Delivered order
    /// - Invoicing a Cancelled order
    /// - Occupying a soft-disabled table
    #[error("{entity} {id} is {state}, cannot {operation}")]
    InvalidState {
        entity: &'static str,
        id: i64,
        state: String,
        operation: &'static str,
    },

    /// The requested state transition is not in the transition table.
    ///
    /// ## When This Occurs
    /// - `occupy` on an Occupied or Maintenance table
    /// - `reserve` on a table that is not Free
    /// - Skipping or reversing an order status step
    /// - Paying a Voided invoice
    #[error("{entity} {id} cannot move from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        id: i64,
        from: String,
        to: String,
    },

    /// Negative or otherwise malformed monetary input.
    #[error("Invalid amount for {field}: {cents} cents")]
    InvalidAmount { field: &'static str, cents: i64 },

    /// The split partitions do not cover the order's line items exactly once.
    #[error(
        "Split does not partition the order: missing {missing:?}, duplicated {duplicated:?}, unknown {unknown:?}"
    )]
    IncompletePartition {
        missing: Vec<i64>,
        duplicated: Vec<i64>,
        unknown: Vec<i64>,
    },

    /// A split partition was given no line items.
    #[error("Split partition {index} has no line items")]
    EmptyPartition { index: usize },

    /// A non-voided invoice already exists for the order.
    #[error("Order {order_id} already has an outstanding invoice")]
    AlreadyInvoiced { order_id: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error.
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        CoreError::NotFound { entity, id }
    }

    /// Creates an InvalidState error from any displayable state.
    pub fn invalid_state(
        entity: &'static str,
        id: i64,
        state: impl ToString,
        operation: &'static str,
    ) -> Self {
        CoreError::InvalidState {
            entity,
            id,
            state: state.to_string(),
            operation,
        }
    }

    /// Creates an InvalidTransition error from any displayable pair of states.
    pub fn invalid_transition(
        entity: &'static str,
        id: i64,
        from: impl ToString,
        to: impl ToString,
    ) -> Self {
        CoreError::InvalidTransition {
            entity,
            id,
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// A field that must be absent for this kind of record was supplied.
    #[error("{field} is not allowed: {reason}")]
    NotAllowed { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

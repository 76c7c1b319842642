//! # Validation Module
//!
//! Field-level input checks run before any business rule or transaction.
//!
//! ## Where Validation Happens
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: THIS MODULE     field shape (ranges, lengths, required)      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: state machines  table / order / invoice rules (CoreError)    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite          CHECK, UNIQUE and partial unique indexes     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bistro_core::validation::{validate_quantity, validate_note};
//!
//! validate_quantity(2).unwrap();
//! validate_note("no onions").unwrap();
//! ```

use crate::error::ValidationError;
use crate::{MAX_ITEM_QUANTITY, MAX_NOTE_LENGTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line-item quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Table numbers are positive.
pub fn validate_table_number(number: i64) -> ValidationResult<()> {
    if number <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "table number".to_string(),
        });
    }
    Ok(())
}

/// Seating capacity between 1 and 50.
pub fn validate_capacity(capacity: i64) -> ValidationResult<()> {
    if !(1..=50).contains(&capacity) {
        return Err(ValidationError::OutOfRange {
            field: "capacity".to_string(),
            min: 1,
            max: 50,
        });
    }
    Ok(())
}

/// Validates a staff member reference.
pub fn validate_staff_id(staff_id: i64) -> ValidationResult<()> {
    if staff_id <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "staff".to_string(),
        });
    }
    Ok(())
}

/// Validates a tax rate in basis points.
///
/// ## Rules
/// - Must be between 0 and 10000 (0% to 100%)
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

fn required_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

/// Table location ("Terrace", "Bar", ...): required, at most 100 characters.
pub fn validate_location(location: &str) -> ValidationResult<()> {
    required_text("location", location, 100)
}

/// Order notes and line-item notes.
///
/// ## Example
/// ```rust
/// use bistro_core::validation::validate_note;
///
/// assert!(validate_note("extra spicy").is_ok());
/// assert!(validate_note("   ").is_err());
/// assert!(validate_note(&"x".repeat(501)).is_err());
/// ```
pub fn validate_note(note: &str) -> ValidationResult<()> {
    required_text("note", note, MAX_NOTE_LENGTH)
}

/// Reasons given when voiding an invoice or cancelling an order.
pub fn validate_reason(reason: &str) -> ValidationResult<()> {
    required_text("reason", reason, MAX_NOTE_LENGTH)
}

/// Walk-in payer names and reservation references.
pub fn validate_label(field: &str, label: &str) -> ValidationResult<()> {
    required_text(field, label, 100)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_table_fields() {
        assert!(validate_table_number(12).is_ok());
        assert!(validate_table_number(0).is_err());
        assert!(validate_capacity(4).is_ok());
        assert!(validate_capacity(0).is_err());
        assert!(validate_capacity(51).is_err());
        assert!(validate_location("Terrace").is_ok());
        assert!(validate_location("").is_err());
    }

    #[test]
    fn test_note_length_counts_characters() {
        assert!(validate_note(&"ñ".repeat(MAX_NOTE_LENGTH)).is_ok());
        assert!(matches!(
            validate_note(&"ñ".repeat(MAX_NOTE_LENGTH + 1)),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_validate_tax_rate_bps() {
        assert!(validate_tax_rate_bps(0).is_ok());
        assert!(validate_tax_rate_bps(1800).is_ok());
        assert!(validate_tax_rate_bps(10000).is_ok());
        assert!(validate_tax_rate_bps(10001).is_err());
    }

    #[test]
    fn test_validate_labels() {
        assert!(validate_label("payer name", "Ana").is_ok());
        assert!(validate_label("payer name", " ").is_err());
        assert!(validate_reason("customer left").is_ok());
        assert!(validate_staff_id(0).is_err());
    }
}

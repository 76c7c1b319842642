//! # Document Numbering
//!
//! Human-readable, per-day sequential numbers for orders and invoices.
//!
//! ## Format
//! `{PREFIX}-{yyyyMMdd}-{seq:04}`, e.g. `ORD-20261019-0007`.
//!
//! The sequence restarts at 1 every calendar day: the next number is the
//! largest sequence already issued under the day's prefix plus one. This module
//! only formats and parses; the storage layer runs the read-max-and-insert
//! inside one writer transaction so concurrent creations never collide.

use chrono::NaiveDate;

/// Prefix of order numbers.
pub const ORDER_PREFIX: &str = "ORD";

/// Prefix of invoice numbers.
pub const INVOICE_PREFIX: &str = "INV";

/// Returns the shared prefix of every number issued on `date`,
/// including the trailing dash (`ORD-20261019-`).
pub fn day_prefix(prefix: &str, date: NaiveDate) -> String {
    format!("{}-{}-", prefix, date.format("%Y%m%d"))
}

/// Formats a document number.
///
/// ## Example
/// ```rust
/// use bistro_core::numbering::{format_number, ORDER_PREFIX};
/// use chrono::NaiveDate;
///
/// let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
/// assert_eq!(format_number(ORDER_PREFIX, date, 7), "ORD-20261019-0007");
/// ```
pub fn format_number(prefix: &str, date: NaiveDate, seq: u32) -> String {
    format!("{}{:04}", day_prefix(prefix, date), seq)
}

/// Extracts the sequence from `number` if it was issued under `day_prefix`.
pub fn parse_sequence(number: &str, day_prefix: &str) -> Option<u32> {
    let seq = number.strip_prefix(day_prefix)?;
    if seq.is_empty() || !seq.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    seq.parse().ok()
}

/// Next sequence for the day: max existing + 1, or 1 when none exist.
///
/// Numbers from other days or with malformed suffixes are ignored.
pub fn next_sequence<'a, I>(existing: I, day_prefix: &str) -> u32
where
    I: IntoIterator<Item = &'a str>,
{
    existing
        .into_iter()
        .filter_map(|n| parse_sequence(n, day_prefix))
        .max()
        .map_or(1, |max| max + 1)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn test_format_is_zero_padded() {
        assert_eq!(format_number(ORDER_PREFIX, day(), 1), "ORD-20261019-0001");
        assert_eq!(format_number(INVOICE_PREFIX, day(), 42), "INV-20261019-0042");
    }

    #[test]
    fn test_first_number_of_the_day() {
        let prefix = day_prefix(ORDER_PREFIX, day());
        assert_eq!(next_sequence(Vec::<&str>::new(), &prefix), 1);
        // Yesterday's numbers do not count
        assert_eq!(next_sequence(["ORD-20261018-0031"], &prefix), 1);
    }

    #[test]
    fn test_next_is_max_plus_one() {
        let prefix = day_prefix(ORDER_PREFIX, day());
        let existing = ["ORD-20261019-0002", "ORD-20261019-0009", "ORD-20261019-0004"];
        assert_eq!(next_sequence(existing, &prefix), 10);
    }

    #[test]
    fn test_parse_rejects_foreign_suffixes() {
        let prefix = day_prefix(ORDER_PREFIX, day());
        assert_eq!(parse_sequence("ORD-20261019-0012", &prefix), Some(12));
        assert_eq!(parse_sequence("ORD-20261019-", &prefix), None);
        assert_eq!(parse_sequence("ORD-20261019-12a", &prefix), None);
        assert_eq!(parse_sequence("INV-20261019-0012", &prefix), None);
    }

    #[test]
    fn test_sequence_past_four_digits() {
        let prefix = day_prefix(ORDER_PREFIX, day());
        assert_eq!(next_sequence(["ORD-20261019-9999"], &prefix), 10_000);
        assert_eq!(format_number(ORDER_PREFIX, day(), 10_000), "ORD-20261019-10000");
    }
}

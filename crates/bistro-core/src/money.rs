//! # Money Module
//!
//! Provides the `Money` and `TaxRate` types plus the single tax policy used by
//! every invoice: value-added tax applied to the subtotal after discount.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Splitting a bill three ways:                                           │
//! │    10.00 / 3 = 3.33 (×3 = 9.99)  → Lost 0.01!                          │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    1000 cents / 3 = 333 cents (×3 = 999 cents)                         │
//! │    We KNOW we lost 1 cent, and the split allocator hands it to the     │
//! │    remainder holder explicitly                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bistro_core::money::{Money, TaxRate};
//!
//! let subtotal = Money::from_cents(100_000); // 1000.00
//! let discount = Money::from_cents(10_000);  //  100.00
//! let tax = (subtotal - discount).calculate_tax(TaxRate::from_bps(1800));
//! assert_eq!(tax.cents(), 16_200);           //  162.00
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative intermediate values (e.g. remainders)
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **No currency symbol**: the symbol is injected configuration, see
///   `PosConfig::format_currency` in bistro-db
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use bistro_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // Represents 10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// ## Example
    /// ```rust
    /// use bistro_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(333, 33).cents(), 33_333);
    /// assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    /// ```
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Clamps negative values to zero.
    ///
    /// Used for the taxable base: a discount larger than the subtotal never
    /// produces negative tax.
    #[inline]
    pub const fn max_zero(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            Money(self.0)
        }
    }

    /// Calculates tax, rounding half-up to the nearest cent.
    ///
    /// ## Implementation
    /// Integer math on basis points: `(amount * bps + 5000) / 10000`.
    /// The +5000 provides rounding (5000/10000 = 0.5). Callers only pass a
    /// non-negative taxable base, see [`InvoiceAmounts::compute`].
    ///
    /// ## Example
    /// ```rust
    /// use bistro_core::money::{Money, TaxRate};
    ///
    /// let base = Money::from_cents(90_000);      // 900.00
    /// let tax = base.calculate_tax(TaxRate::from_bps(1800));
    /// assert_eq!(tax.cents(), 16_200);           // 162.00
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        // i128 keeps large tickets from overflowing
        let tax_cents = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_cents(tax_cents as i64)
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use bistro_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Returns `self × numerator / denominator`, rounded half-up to the cent.
    ///
    /// This is the proportional-share primitive of the bill-split allocator:
    /// `discount.share(partition_subtotal, order_subtotal)`.
    ///
    /// Returns zero when `denominator` is not positive; the allocator hands
    /// the whole amount to the remainder holder in that case.
    ///
    /// ## Example
    /// ```rust
    /// use bistro_core::money::Money;
    ///
    /// let discount = Money::from_cents(1000); // 10.00
    /// // 333.33 of 999.99 → 3.333... → 3.33
    /// assert_eq!(discount.share(33_333, 99_999).cents(), 333);
    /// ```
    pub fn share(&self, numerator: i64, denominator: i64) -> Money {
        if denominator <= 0 {
            return Money::zero();
        }
        let num = self.0 as i128 * numerator as i128;
        let den = denominator as i128;
        // Half-up on the absolute value, sign restored afterwards
        let rounded = (num.abs() * 2 + den) / (den * 2);
        let cents = if num < 0 { -rounded } else { rounded };
        Money::from_cents(cents as i64)
    }
}

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1800 bps = 18% (the value-added tax default)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage (for configuration input).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round() as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    /// 18% value-added tax.
    fn default() -> Self {
        TaxRate(crate::DEFAULT_TAX_RATE_BPS)
    }
}

// =============================================================================
// Invoice Amounts
// =============================================================================

/// The five monetary figures of one invoice.
///
/// ## Formula
/// ```text
/// tax   = round(max(subtotal − discount, 0) × rate, 2)
/// total = subtotal − discount + tax + tip
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceAmounts {
    pub subtotal: Money,
    pub discount: Money,
    pub tip: Money,
    pub tax: Money,
    pub total: Money,
}

impl InvoiceAmounts {
    /// Applies the tax policy to a subtotal, discount and tip.
    ///
    /// ## Example
    /// ```rust
    /// use bistro_core::money::{InvoiceAmounts, Money, TaxRate};
    ///
    /// let amounts = InvoiceAmounts::compute(
    ///     Money::from_cents(100_000),
    ///     Money::from_cents(10_000),
    ///     Money::from_cents(5_000),
    ///     TaxRate::from_bps(1800),
    /// );
    /// assert_eq!(amounts.tax.cents(), 16_200);
    /// assert_eq!(amounts.total.cents(), 111_200);
    /// ```
    pub fn compute(subtotal: Money, discount: Money, tip: Money, rate: TaxRate) -> Self {
        let taxable = (subtotal - discount).max_zero();
        let tax = taxable.calculate_tax(rate);
        InvoiceAmounts {
            subtotal,
            discount,
            tip,
            tax,
            total: subtotal - discount + tax + tip,
        }
    }

    /// Checks the round-trip identity `total = subtotal − discount + tax + tip`.
    pub fn reconciles(&self) -> bool {
        self.total == self.subtotal - self.discount + self.tax + self.tip
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal rendering; the currency symbol is added by configuration.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # Bill-Splitting Allocator
//!
//! Partitions an order's line items across N payers and shares the order-level
//! discount and tip between them so that every cent is accounted for.
//!
//! ## Allocation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  order subtotal S (computed once)                                       │
//! │                                                                         │
//! │  partition i:  subtotal_i = Σ assigned line items                       │
//! │                                                                         │
//! │  per amount A (discount, then tip, independently):                      │
//! │    overridden partitions   take their override                          │
//! │    pool                  = A − Σ overrides          (must be ≥ 0)       │
//! │    free partitions         share_i = round(pool × subtotal_i / S_free)  │
//! │    remainder holder        pool − Σ other free shares                   │
//! │                            (first free partition in input order)        │
//! │                                                                         │
//! │  Σ share_i == A  to the cent, always.                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! With `proportional = false` the order-level amounts are not distributed:
//! each partition gets its override or zero.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::invoice::InvoiceDraft;
use crate::money::{InvoiceAmounts, Money, TaxRate};
use crate::types::{LineItem, PaymentMethod, Payer};

// =============================================================================
// Request Types
// =============================================================================

/// One payer's slice of the bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SplitPartition {
    pub payer: Payer,
    pub line_item_ids: Vec<i64>,
    /// Explicit discount for this partition, bypassing proportional allocation.
    #[serde(default)]
    pub discount_override: Option<Money>,
    /// Explicit tip for this partition, bypassing proportional allocation.
    #[serde(default)]
    pub tip_override: Option<Money>,
}

impl SplitPartition {
    pub fn new(payer: Payer, line_item_ids: Vec<i64>) -> Self {
        SplitPartition {
            payer,
            line_item_ids,
            discount_override: None,
            tip_override: None,
        }
    }

    pub fn with_discount(mut self, discount: Money) -> Self {
        self.discount_override = Some(discount);
        self
    }

    pub fn with_tip(mut self, tip: Money) -> Self {
        self.tip_override = Some(tip);
        self
    }
}

/// Request to split an order into sibling invoices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SplitRequest {
    pub payment_method: PaymentMethod,
    /// Order-level discount to distribute.
    #[serde(default)]
    pub discount: Money,
    /// Order-level tip to distribute.
    #[serde(default)]
    pub tip: Money,
    pub proportional: bool,
    pub partitions: Vec<SplitPartition>,
}

/// The computed share of one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionShare {
    /// Position in the request.
    pub index: usize,
    pub payer: Payer,
    pub line_item_ids: Vec<i64>,
    pub subtotal: Money,
    pub discount: Money,
    pub tip: Money,
}

impl PartitionShare {
    /// Applies the per-invoice tax formula to this share.
    pub fn amounts(&self, rate: TaxRate) -> InvoiceAmounts {
        InvoiceAmounts::compute(self.subtotal, self.discount, self.tip, rate)
    }

    /// Turns the share into an insertable invoice of `split_group`.
    pub fn into_draft(
        self,
        order_id: i64,
        split_group: &str,
        rate: TaxRate,
        payment_method: PaymentMethod,
        payer_name: String,
    ) -> InvoiceDraft {
        InvoiceDraft {
            order_id,
            split_group: Some(split_group.to_string()),
            amounts: self.amounts(rate),
            tax_rate: rate,
            payment_method,
            payer_customer_id: self.payer.customer_id(),
            payer_name,
            line_item_ids: self.line_item_ids,
        }
    }
}

// =============================================================================
// Partition Validation
// =============================================================================

/// Checks that the partitions cover the order's line items exactly once.
///
/// ## Errors
/// - no partitions at all → `Validation(Required)`
/// - a partition with no ids → `EmptyPartition { index }`
/// - ids missing, repeated or foreign → `IncompletePartition` listing each set
pub fn validate_partitions(items: &[LineItem], partitions: &[SplitPartition]) -> CoreResult<()> {
    if partitions.is_empty() {
        return Err(ValidationError::Required {
            field: "partitions".to_string(),
        }
        .into());
    }
    if let Some(index) = partitions.iter().position(|p| p.line_item_ids.is_empty()) {
        return Err(CoreError::EmptyPartition { index });
    }

    let order_ids: BTreeSet<i64> = items.iter().map(|i| i.id).collect();
    let mut seen = BTreeSet::new();
    let mut duplicated = BTreeSet::new();
    let mut unknown = BTreeSet::new();

    for id in partitions.iter().flat_map(|p| p.line_item_ids.iter().copied()) {
        if !order_ids.contains(&id) {
            unknown.insert(id);
        } else if !seen.insert(id) {
            duplicated.insert(id);
        }
    }
    let missing: Vec<i64> = order_ids.difference(&seen).copied().collect();

    if missing.is_empty() && duplicated.is_empty() && unknown.is_empty() {
        Ok(())
    } else {
        Err(CoreError::IncompletePartition {
            missing,
            duplicated: duplicated.into_iter().collect(),
            unknown: unknown.into_iter().collect(),
        })
    }
}

// =============================================================================
// Allocation
// =============================================================================

/// Validates the request and computes every partition's share.
///
/// ## Example
/// ```rust,ignore
/// // items 300.00 and 700.00, discount 100.00
/// let shares = allocate(&items, &request)?;
/// assert_eq!(shares[0].discount, Money::from_cents(3_000));
/// assert_eq!(shares[1].discount, Money::from_cents(7_000));
/// ```
pub fn allocate(items: &[LineItem], request: &SplitRequest) -> CoreResult<Vec<PartitionShare>> {
    validate_partitions(items, &request.partitions)?;

    let prices: BTreeMap<i64, Money> = items.iter().map(|i| (i.id, i.subtotal())).collect();
    let subtotals: Vec<Money> = request
        .partitions
        .iter()
        .map(|p| {
            p.line_item_ids
                .iter()
                .filter_map(|id| prices.get(id))
                .sum()
        })
        .collect();

    let discounts = distribute(
        "discount",
        request.discount,
        &subtotals,
        &request
            .partitions
            .iter()
            .map(|p| p.discount_override)
            .collect::<Vec<_>>(),
        request.proportional,
    )?;
    let tips = distribute(
        "tip",
        request.tip,
        &subtotals,
        &request
            .partitions
            .iter()
            .map(|p| p.tip_override)
            .collect::<Vec<_>>(),
        request.proportional,
    )?;

    Ok(request
        .partitions
        .iter()
        .enumerate()
        .map(|(index, p)| PartitionShare {
            index,
            payer: p.payer.clone(),
            line_item_ids: p.line_item_ids.clone(),
            subtotal: subtotals[index],
            discount: discounts[index],
            tip: tips[index],
        })
        .collect())
}

/// Shares one order-level amount between partitions.
fn distribute(
    field: &'static str,
    amount: Money,
    subtotals: &[Money],
    overrides: &[Option<Money>],
    proportional: bool,
) -> CoreResult<Vec<Money>> {
    if amount.is_negative() {
        return Err(CoreError::InvalidAmount {
            field,
            cents: amount.cents(),
        });
    }
    if let Some(negative) = overrides.iter().flatten().find(|m| m.is_negative()) {
        return Err(CoreError::InvalidAmount {
            field,
            cents: negative.cents(),
        });
    }

    let mut shares: Vec<Money> = overrides.iter().map(|o| o.unwrap_or_default()).collect();
    if !proportional {
        return Ok(shares);
    }

    let pool = amount - overrides.iter().flatten().sum::<Money>();
    if pool.is_negative() {
        return Err(CoreError::InvalidAmount {
            field,
            cents: pool.cents(),
        });
    }

    let free: Vec<usize> = (0..subtotals.len()).filter(|&i| overrides[i].is_none()).collect();
    let Some((&holder, others)) = free.split_first() else {
        // Everything overridden: the overrides must account for the whole amount
        return if pool.is_zero() {
            Ok(shares)
        } else {
            Err(CoreError::InvalidAmount {
                field,
                cents: pool.cents(),
            })
        };
    };

    let free_subtotal: Money = free.iter().map(|&i| subtotals[i]).sum();
    let mut allocated = Money::zero();
    for &i in others {
        // Half-up rounding may run past the pool; later shares are capped
        let share = pool
            .share(subtotals[i].cents(), free_subtotal.cents())
            .min(pool - allocated);
        shares[i] = share;
        allocated += share;
    }
    shares[holder] = pool - allocated;

    Ok(shares)
}

// =============================================================================
// Unit Tests
// =============================================================================

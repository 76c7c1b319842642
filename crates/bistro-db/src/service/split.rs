//! # Split Service
//!
//! Bills one order as N sibling invoices sharing a split group.
//!
//! ## Flow
//! ```text
//! resolve payers ──► BEGIN IMMEDIATE ──► order invoiceable? ──► no open invoice?
//!                                                                   │
//!        COMMIT ◄── insert N invoices + covered items ◄── allocate ◄┘
//! ```
//!
//! All siblings are written in one transaction. If any step fails none of
//! them exist afterwards.

use std::sync::Arc;

use bistro_core::invoice::ensure_invoiceable;
use bistro_core::split::{allocate, SplitRequest};
use bistro_core::{CoreError, Invoice, TaxRate};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::CustomerDirectory;
use crate::error::PosResult;
use crate::pool::begin_write;
use crate::repository::{invoice, order, InvoiceRepository};
use crate::service::{next_invoice_number, resolve_payer};

#[derive(Clone)]
pub struct SplitService {
    pool: SqlitePool,
    tax_rate: TaxRate,
    customers: Arc<dyn CustomerDirectory>,
}

impl SplitService {
    pub fn new(pool: SqlitePool, tax_rate: TaxRate, customers: Arc<dyn CustomerDirectory>) -> Self {
        SplitService {
            pool,
            tax_rate,
            customers,
        }
    }

    /// Splits the order into one Pending invoice per partition.
    ///
    /// Invoices come back in partition order. Their subtotals, discounts and
    /// tips add up to the order's subtotal, discount and tip exactly.
    ///
    /// ## Errors
    /// - unknown order → `NotFound`
    /// - Cancelled order → `InvalidState`
    /// - a non-voided invoice already bills the order → `AlreadyInvoiced`
    /// - partitions that miss, repeat or invent line items → `IncompletePartition`
    /// - a partition with no items → `EmptyPartition`
    /// - negative amounts, or overrides larger than the amount → `InvalidAmount`
    pub async fn split(&self, order_id: i64, request: &SplitRequest) -> PosResult<Vec<Invoice>> {
        let mut payer_names = Vec::with_capacity(request.partitions.len());
        for partition in &request.partitions {
            let (_, name) = resolve_payer(self.customers.as_ref(), &partition.payer).await?;
            payer_names.push(name);
        }

        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;

        let current = order::find(&mut *tx, order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order", order_id))?;
        ensure_invoiceable(&current)?;
        if invoice::has_open(&mut *tx, order_id).await? {
            return Err(CoreError::AlreadyInvoiced { order_id }.into());
        }

        let items = order::items(&mut *tx, order_id).await?;
        let shares = allocate(&items, request)?;

        let group = Uuid::new_v4().to_string();
        let mut ids = Vec::with_capacity(shares.len());
        for (share, payer_name) in shares.into_iter().zip(payer_names) {
            let index = share.index;
            let draft = share.into_draft(
                order_id,
                &group,
                self.tax_rate,
                request.payment_method,
                payer_name,
            );
            let number = next_invoice_number(&mut tx, now).await?;
            let id = invoice::insert(&mut *tx, &number, &draft, now).await?;
            invoice::insert_items(&mut tx, id, &draft.line_item_ids).await?;
            debug!(invoice_id = id, invoice_number = %number, index, "Split share written");
            ids.push(id);
        }

        let mut invoices = Vec::with_capacity(ids.len());
        for id in ids {
            let created = invoice::find(&mut *tx, id)
                .await?
                .ok_or_else(|| CoreError::not_found("Invoice", id))?;
            invoices.push(created);
        }
        tx.commit().await?;

        info!(
            order_id,
            split_group = %group,
            invoices = invoices.len(),
            "Order split"
        );
        Ok(invoices)
    }

    /// Sibling invoices of a split group, in number order.
    pub async fn group(&self, split_group: &str) -> PosResult<Vec<Invoice>> {
        Ok(InvoiceRepository::new(self.pool.clone())
            .by_split_group(split_group)
            .await?)
    }
}

impl std::fmt::Debug for SplitService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplitService")
            .field("tax_rate", &self.tax_rate)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # bistro-db: Storage and Services for Bistro POS
//!
//! Owns every SQLite transaction of the restaurant core. Business rules come
//! from `bistro-core`; this crate reads rows, asks the rules, and writes the
//! outcome atomically.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bistro POS Data Flow                             │
//! │                                                                         │
//! │  Caller (till, kitchen screen, back office)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    bistro-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐   │   │
//! │  │   │   Services    │    │  Repositories │    │  Migrations  │   │   │
//! │  │   │ (service/)    │───►│ (repository/) │    │  (embedded)  │   │   │
//! │  │   │               │    │               │    │              │   │   │
//! │  │   │ TableService  │    │ table.rs      │    │ 001_init.sql │   │   │
//! │  │   │ OrderService  │    │ order.rs      │    │              │   │   │
//! │  │   │ InvoiceService│    │ invoice.rs    │    │              │   │   │
//! │  │   │ SplitService  │    │               │    │              │   │   │
//! │  │   └───────┬───────┘    └───────────────┘    └──────────────┘   │   │
//! │  │           │ catalog prices, customer names                     │   │
//! │  │           ▼                                                    │   │
//! │  │   CatalogLookup / CustomerDirectory (injected)                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL, single writer via BEGIN IMMEDIATE)                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Storage and service error types
//! - [`config`] - Tax, currency, thresholds and database settings
//! - [`catalog`] - Injected product prices and customer names
//! - [`repository`] - Row access for tables, orders and invoices
//! - [`service`] - Transactional operations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bistro_db::{BistroPos, Database, InMemoryCatalog, InMemoryCustomers, PosConfig};
//!
//! let config = PosConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?;
//! let pos = BistroPos::new(
//!     &db,
//!     &config,
//!     Arc::new(InMemoryCatalog::new()),
//!     Arc::new(InMemoryCustomers::new()),
//! );
//!
//! let table = pos.tables.create_table(1, 4, "Terrace").await?;
//! let order = pos
//!     .orders
//!     .create(NewOrder {
//!         order_type: OrderType::DineIn,
//!         table_id: Some(table.id),
//!         customer_id: None,
//!         staff_id,
//!     })
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

use std::sync::Arc;

// =============================================================================
// Re-exports
// =============================================================================

pub use catalog::{CatalogLookup, CustomerDirectory, InMemoryCatalog, InMemoryCustomers};
pub use config::PosConfig;
pub use error::{ConfigError, DbError, DbResult, PosError, PosResult};
pub use pool::{Database, DbConfig};

// Repository and service re-exports for convenience
pub use repository::{InvoiceRepository, OrderRepository, TableRepository};
pub use service::{InvoiceService, OrderService, SplitService, TableService};

// =============================================================================
// Facade
// =============================================================================

/// All services wired to one database and one configuration.
#[derive(Debug, Clone)]
pub struct BistroPos {
    pub tables: TableService,
    pub orders: OrderService,
    pub invoices: InvoiceService,
    pub splits: SplitService,
}

impl BistroPos {
    pub fn new(
        db: &Database,
        config: &PosConfig,
        catalog: Arc<dyn CatalogLookup>,
        customers: Arc<dyn CustomerDirectory>,
    ) -> Self {
        let pool = db.pool().clone();
        let thresholds = config.thresholds();
        let tax_rate = config.tax_rate();

        BistroPos {
            tables: TableService::new(pool.clone(), thresholds),
            orders: OrderService::new(pool.clone(), catalog, thresholds),
            invoices: InvoiceService::new(pool.clone(), tax_rate, customers.clone()),
            splits: SplitService::new(pool, tax_rate, customers),
        }
    }
}

// =============================================================================
// Integration Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bistro_core::invoice::CreateInvoice;
    use bistro_core::{ItemRef, Money, NewOrder, OrderStatus, OrderType, PaymentMethod, TableState};

    async fn pos() -> BistroPos {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = InMemoryCatalog::new()
            .with_product(1, Money::from_cents(1_250))
            .with_combo(1, Money::from_cents(3_400));
        BistroPos::new(
            &db,
            &PosConfig::default(),
            Arc::new(catalog),
            Arc::new(InMemoryCustomers::new()),
        )
    }

    #[tokio::test]
    async fn test_full_service_cycle() {
        let pos = pos().await;
        let table = pos.tables.create_table(3, 2, "Window").await.unwrap();

        let order = pos
            .orders
            .create(NewOrder {
                order_type: OrderType::DineIn,
                table_id: Some(table.id),
                customer_id: None,
                staff_id: 11,
            })
            .await
            .unwrap();
        pos.orders
            .add_line_item(order.id, ItemRef::Product(1), 2, None)
            .await
            .unwrap();
        pos.orders
            .add_line_item(order.id, ItemRef::Combo(1), 1, Some("no onions"))
            .await
            .unwrap();

        let totals = pos.orders.compute_totals(order.id).await.unwrap();
        assert_eq!(totals.subtotal.cents(), 5_900);

        for status in [OrderStatus::Preparing, OrderStatus::Ready, OrderStatus::Delivered] {
            pos.orders.advance_status(order.id, status).await.unwrap();
        }
        let invoice = pos
            .invoices
            .create_invoice(order.id, &CreateInvoice::new(PaymentMethod::Card))
            .await
            .unwrap();
        assert_eq!(invoice.tax_cents, 1_062);
        assert_eq!(invoice.total_cents, 6_962);

        pos.invoices.mark_paid(invoice.id, PaymentMethod::Card).await.unwrap();
        let table = pos.tables.get(table.id).await.unwrap();
        assert_eq!(table.state, TableState::Free);
        assert!(pos.orders.active().await.unwrap().is_empty());
    }
}

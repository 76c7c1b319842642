//! # Repository Module
//!
//! All SQL of the crate lives here.
//!
//! ## Two Access Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Reads (views, lists, summaries)                                        │
//! │     db.orders().list(&filter)  ──► pool, any connection                 │
//! │                                                                         │
//! │  Decisions + writes (services)                                          │
//! │     let mut tx = begin_write(&pool).await?;                             │
//! │     order::find(&mut *tx, id)        ◄─ same connection, same snapshot   │
//! │     order::update_status(&mut *tx, …)                                   │
//! │     tx.commit().await?;                                                 │
//! │                                                                         │
//! │  The module-level functions are generic over `SqliteExecutor`, so the  │
//! │  repositories and the services share one copy of every statement.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`TableRepository`] - Dining tables
//! - [`OrderRepository`] - Orders, line items and notes
//! - [`InvoiceRepository`] - Invoices, covered items and summaries

pub mod invoice;
pub mod order;
pub mod table;

pub use invoice::InvoiceRepository;
pub use order::OrderRepository;
pub use table::TableRepository;

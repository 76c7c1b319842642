//! # External Lookups
//!
//! The catalog and the customer directory are owned by other systems. The
//! services only need a price and a display name, so both are narrow traits.
//!
//! ```text
//! OrderService::add_line_item ──► CatalogLookup::product_price / combo_price
//! InvoiceService / SplitService ──► CustomerDirectory::display_name
//! ```
//!
//! Lookups run before the writer transaction opens and are never cached.

use std::collections::HashMap;

use async_trait::async_trait;
use bistro_core::{CoreError, ItemRef, Money};
use tokio::sync::RwLock;

use crate::error::PosResult;

/// Current catalog prices.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Current price of a product, `None` if unknown.
    async fn product_price(&self, product_id: i64) -> PosResult<Option<Money>>;

    /// Current price of a combo, `None` if unknown.
    async fn combo_price(&self, combo_id: i64) -> PosResult<Option<Money>>;
}

/// Registered customers.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// Display name of a customer, `None` if unknown.
    async fn display_name(&self, customer_id: i64) -> PosResult<Option<String>>;
}

/// Resolves the price of `item`, failing with `NotFound` for unknown ids.
pub async fn price_of(catalog: &dyn CatalogLookup, item: ItemRef) -> PosResult<Money> {
    let (price, entity, id) = match item {
        ItemRef::Product(id) => (catalog.product_price(id).await?, "Product", id),
        ItemRef::Combo(id) => (catalog.combo_price(id).await?, "Combo", id),
    };
    price.ok_or_else(|| CoreError::not_found(entity, id).into())
}

// =============================================================================
// In-Memory Implementations
// =============================================================================

/// Price list held in memory. Used by tests and the seed binary.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<i64, Money>>,
    combos: RwLock<HashMap<i64, Money>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(mut self, product_id: i64, price: Money) -> Self {
        self.products.get_mut().insert(product_id, price);
        self
    }

    pub fn with_combo(mut self, combo_id: i64, price: Money) -> Self {
        self.combos.get_mut().insert(combo_id, price);
        self
    }

    /// Changes a product's price. Already-added line items keep theirs.
    pub async fn set_product_price(&self, product_id: i64, price: Money) {
        self.products.write().await.insert(product_id, price);
    }
}

#[async_trait]
impl CatalogLookup for InMemoryCatalog {
    async fn product_price(&self, product_id: i64) -> PosResult<Option<Money>> {
        Ok(self.products.read().await.get(&product_id).copied())
    }

    async fn combo_price(&self, combo_id: i64) -> PosResult<Option<Money>> {
        Ok(self.combos.read().await.get(&combo_id).copied())
    }
}

/// Customer names held in memory.
#[derive(Debug, Default)]
pub struct InMemoryCustomers {
    names: RwLock<HashMap<i64, String>>,
}

impl InMemoryCustomers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_customer(mut self, customer_id: i64, name: impl Into<String>) -> Self {
        self.names.get_mut().insert(customer_id, name.into());
        self
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryCustomers {
    async fn display_name(&self, customer_id: i64) -> PosResult<Option<String>> {
        Ok(self.names.read().await.get(&customer_id).cloned())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PosError;

    #[tokio::test]
    async fn test_price_of() {
        let catalog = InMemoryCatalog::new()
            .with_product(1, Money::from_cents(1250))
            .with_combo(9, Money::from_cents(2000));

        assert_eq!(price_of(&catalog, ItemRef::Product(1)).await.unwrap().cents(), 1250);
        assert_eq!(price_of(&catalog, ItemRef::Combo(9)).await.unwrap().cents(), 2000);

        let err = price_of(&catalog, ItemRef::Combo(1)).await.unwrap_err();
        assert!(matches!(
            err,
            PosError::Domain(CoreError::NotFound { entity: "Combo", id: 1 })
        ));
    }

    #[tokio::test]
    async fn test_price_change() {
        let catalog = InMemoryCatalog::new().with_product(1, Money::from_cents(100));
        catalog.set_product_price(1, Money::from_cents(150)).await;
        assert_eq!(
            catalog.product_price(1).await.unwrap(),
            Some(Money::from_cents(150))
        );
    }

    #[tokio::test]
    async fn test_customers() {
        let customers = InMemoryCustomers::new().with_customer(4, "Ana Pérez");
        assert_eq!(
            customers.display_name(4).await.unwrap().as_deref(),
            Some("Ana Pérez")
        );
        assert_eq!(customers.display_name(5).await.unwrap(), None);
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use stockroom_catalog::Product;
use stockroom_core::{OrderId, ProductId, VersionToken};
use stockroom_orders::Order;

use super::query::{OrderPage, OrderQuery, Pagination};
use super::r#trait::{InventoryStore, StoreError, StoreTransaction};

#[derive(Debug, Default)]
struct Tables {
    products: HashMap<ProductId, Product>,
    orders: Vec<Order>,
}

/// In-memory transactional store.
///
/// Intended for tests/dev. A transaction holds the store-wide lock from
/// `begin` until commit, rollback or drop, which makes transactions fully
/// serial. Writes are staged and only become visible on commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert products directly, bypassing engines and audit.
    pub async fn seed(&self, products: impl IntoIterator<Item = Product>) {
        let mut tables = self.tables.lock().await;
        for product in products {
            tables.products.insert(product.id_typed(), product);
        }
    }
}

#[async_trait]
impl InventoryStore for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let guard = self.tables.clone().lock_owned().await;
        Ok(InMemoryTransaction {
            tables: guard,
            staged_products: HashMap::new(),
            staged_orders: Vec::new(),
        })
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.tables.lock().await.products.get(&id).cloned())
    }

    async fn products(&self) -> Result<Vec<Product>, StoreError> {
        let tables = self.tables.lock().await;
        let mut products: Vec<_> = tables.products.values().cloned().collect();
        products.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id_typed().cmp(&b.id_typed()))
        });
        Ok(products)
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.orders.iter().find(|o| o.id_typed() == id).cloned())
    }

    async fn orders(&self, query: &OrderQuery, page: Pagination) -> Result<OrderPage, StoreError> {
        let tables = self.tables.lock().await;
        let mut matching: Vec<&Order> = tables.orders.iter().filter(|o| query.matches(o)).collect();
        matching.sort_by(|a, b| b.placed_at().cmp(&a.placed_at()));

        let total = matching.len() as u64;
        let orders = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect();
        Ok(OrderPage::new(orders, total, page))
    }
}

/// Transaction over an [`InMemoryStore`].
///
/// `None` in `staged_products` marks a staged delete.
pub struct InMemoryTransaction {
    tables: OwnedMutexGuard<Tables>,
    staged_products: HashMap<ProductId, Option<Product>>,
    staged_orders: Vec<Order>,
}

impl InMemoryTransaction {
    fn current(&self, id: ProductId) -> Option<&Product> {
        match self.staged_products.get(&id) {
            Some(staged) => staged.as_ref(),
            None => self.tables.products.get(&id),
        }
    }
}

fn check_stock(product: &Product) -> Result<(), StoreError> {
    if product.stock_quantity() < 0 {
        return Err(StoreError::Constraint(format!(
            "product {} stock_quantity {} < 0",
            product.id_typed(),
            product.stock_quantity()
        )));
    }
    Ok(())
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn product_for_update(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.current(id).cloned())
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        check_stock(product)?;
        let id = product.id_typed();
        if self.current(id).is_some() {
            return Err(StoreError::Conflict(format!("product {id} already exists")));
        }
        self.staged_products.insert(id, Some(product.clone()));
        Ok(())
    }

    async fn update_product(
        &mut self,
        product: &Product,
        expected: &VersionToken,
    ) -> Result<bool, StoreError> {
        check_stock(product)?;
        let id = product.id_typed();
        let matches = self
            .current(id)
            .is_some_and(|stored| stored.version() == expected);
        if !matches {
            return Ok(false);
        }
        self.staged_products.insert(id, Some(product.clone()));
        Ok(true)
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<bool, StoreError> {
        if self.current(id).is_none() {
            return Ok(false);
        }
        self.staged_products.insert(id, None);
        Ok(true)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        let id = order.id_typed();
        let exists = self.tables.orders.iter().any(|o| o.id_typed() == id)
            || self.staged_orders.iter().any(|o| o.id_typed() == id);
        if exists {
            return Err(StoreError::Conflict(format!("order {id} already exists")));
        }
        self.staged_orders.push(order.clone());
        Ok(())
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        let staged = std::mem::take(&mut self.staged_products);
        for (id, product) in staged {
            match product {
                Some(product) => {
                    self.tables.products.insert(id, product);
                }
                None => {
                    self.tables.products.remove(&id);
                }
            }
        }
        let orders = std::mem::take(&mut self.staged_orders);
        self.tables.orders.extend(orders);
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}

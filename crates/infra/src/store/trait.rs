use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use stockroom_catalog::Product;
use stockroom_core::{OrderId, ProductId, VersionToken};
use stockroom_orders::Order;

use super::query::{OrderPage, OrderQuery, Pagination};

/// Store operation error.
///
/// These are **infrastructure errors** as opposed to domain errors: the
/// engines never surface them verbatim to callers.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or the connection failed mid-flight.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The backend aborted the transaction because of a concurrent writer
    /// (serialization failure, deadlock, duplicate key).
    #[error("write conflict: {0}")]
    Conflict(String),

    /// A storage-level constraint rejected the write (e.g. negative stock).
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),

    /// A stored row could not be turned back into a domain value.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// One unit of work against the store.
///
/// Products read through [`StoreTransaction::product_for_update`] stay locked
/// against other transactions until commit or rollback, so a
/// read-check-write sequence inside one transaction cannot interleave with
/// another writer of the same row.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Load a product and lock its row for the rest of the transaction.
    ///
    /// Sees this transaction's own earlier writes.
    async fn product_for_update(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError>;

    /// Overwrite the row for `product.id` if it still carries `expected`.
    ///
    /// Returns `false` when no row matched (missing, or token moved on).
    async fn update_product(
        &mut self,
        product: &Product,
        expected: &VersionToken,
    ) -> Result<bool, StoreError>;

    /// Returns `false` when no such product exists.
    async fn delete_product(&mut self, id: ProductId) -> Result<bool, StoreError>;

    /// Persist an order with all of its lines.
    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

/// Durable products + order ledger.
///
/// Implementations must provide at least read-committed isolation with
/// row-level locking on products touched through a transaction.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    type Tx: StoreTransaction;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;

    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    async fn products(&self) -> Result<Vec<Product>, StoreError>;

    async fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Orders matching `query`, newest first.
    async fn orders(&self, query: &OrderQuery, page: Pagination) -> Result<OrderPage, StoreError>;
}

#[async_trait]
impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    type Tx = S::Tx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        (**self).begin().await
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).product(id).await
    }

    async fn products(&self) -> Result<Vec<Product>, StoreError> {
        (**self).products().await
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        (**self).order(id).await
    }

    async fn orders(&self, query: &OrderQuery, page: Pagination) -> Result<OrderPage, StoreError> {
        (**self).orders(query, page).await
    }
}

//! Catalog maintenance: create, full-record update, delete and replenishment.
//!
//! Every write is a single-row transaction. Full-record updates are guarded by
//! the product's version token: the caller passes the token it last observed
//! and the write is refused with `ConcurrencyConflict` when the row has moved
//! on since. Replenishment is an atomic add under the row lock and ignores the
//! token, so concurrent restocks never lose an increment.
//!
//! Every successful write issues a fresh version token and, after commit,
//! records one audit event attributed to the acting user (or `"system"`).

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::instrument;

use stockroom_audit::{AuditEvent, AuditKind, AuditSink};
use stockroom_catalog::{CatalogError, NewProduct, Product, ProductChanges};
use stockroom_core::{Actor, Money, ProductId, VersionToken};

use crate::store::{InventoryStore, StoreError, StoreTransaction, settle};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProductError {
    #[error("product {0} not found")]
    NotFound(ProductId),

    #[error("product {product_id} was modified concurrently (expected {expected}, actual {actual})")]
    ConcurrencyConflict {
        product_id: ProductId,
        expected: VersionToken,
        actual: VersionToken,
    },

    #[error("invalid quantity: {0}")]
    InvalidQuantity(i64),

    #[error("invalid price: {0}")]
    InvalidPrice(Money),

    #[error("validation failed: {0}")]
    Validation(String),

    /// Infrastructure failure; details are logged, not returned.
    #[error("product operation failed")]
    Failed,
}

impl From<CatalogError> for ProductError {
    fn from(value: CatalogError) -> Self {
        match value {
            CatalogError::Validation(msg) => ProductError::Validation(msg),
            CatalogError::InvalidPrice(price) => ProductError::InvalidPrice(price),
            CatalogError::InvalidQuantity(qty) => ProductError::InvalidQuantity(qty),
            CatalogError::ConcurrencyConflict {
                product_id,
                expected,
                actual,
            } => ProductError::ConcurrencyConflict {
                product_id,
                expected,
                actual,
            },
            CatalogError::InsufficientStock { product_id, .. } => {
                tracing::error!(%product_id, "stock reservation reached the catalog write path");
                ProductError::Failed
            }
        }
    }
}

/// Applies catalog changes against an [`InventoryStore`].
pub struct ProductMutationEngine<S> {
    store: S,
    audit: Arc<dyn AuditSink>,
}

impl<S> ProductMutationEngine<S> {
    pub fn new(store: S, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn emit(&self, kind: AuditKind, actor: &Actor, detail: String) {
        self.audit.record(AuditEvent::new(kind, actor.name(), detail));
    }
}

impl<S> ProductMutationEngine<S>
where
    S: InventoryStore,
{
    #[instrument(skip(self, input), fields(actor = %actor, name = %input.name))]
    pub async fn create_product(&self, actor: &Actor, input: NewProduct) -> Result<Product, ProductError> {
        let product = Product::create(input, Utc::now())?;

        let mut tx = self.store.begin().await.map_err(|e| failed("begin", actor, None, e))?;
        let outcome = tx
            .insert_product(&product)
            .await
            .map_err(|e| failed("insert_product", actor, Some(product.id_typed()), e));
        settle(tx, outcome)
            .await
            .map_err(|e| failed("commit", actor, Some(product.id_typed()), e))??;

        tracing::info!(product_id = %product.id_typed(), "product created");
        self.emit(
            AuditKind::ProductCreated,
            actor,
            format!("Product created. Id: {}, Name: {}", product.id_typed(), product.name()),
        );
        Ok(product)
    }

    /// Overwrite every mutable field of product `id`.
    ///
    /// `expected` must be the version token the caller last observed. A stale
    /// token is refused even if `changes` would leave the record as it is.
    #[instrument(skip(self, changes, expected), fields(actor = %actor, product_id = %id))]
    pub async fn update_product(
        &self,
        actor: &Actor,
        id: ProductId,
        changes: ProductChanges,
        expected: &VersionToken,
    ) -> Result<Product, ProductError> {
        let mut tx = self.store.begin().await.map_err(|e| failed("begin", actor, Some(id), e))?;
        let outcome = Self::overwrite(&mut tx, actor, id, changes, expected).await;
        let product = settle(tx, outcome)
            .await
            .map_err(|e| failed("commit", actor, Some(id), e))??;

        tracing::info!("product updated");
        self.emit(
            AuditKind::ProductUpdated,
            actor,
            format!("Product updated. Id: {}, Name: {}", id, product.name()),
        );
        Ok(product)
    }

    async fn overwrite(
        tx: &mut S::Tx,
        actor: &Actor,
        id: ProductId,
        changes: ProductChanges,
        expected: &VersionToken,
    ) -> Result<Product, ProductError> {
        let mut product = tx
            .product_for_update(id)
            .await
            .map_err(|e| failed("lock_product", actor, Some(id), e))?
            .ok_or(ProductError::NotFound(id))?;

        let observed = product.version().clone();
        if let Err(err) = product.apply_changes(changes, expected) {
            if matches!(err, CatalogError::ConcurrencyConflict { .. }) {
                tracing::warn!(expected = %expected, actual = %observed, "stale version token");
            }
            return Err(err.into());
        }

        let written = tx
            .update_product(&product, &observed)
            .await
            .map_err(|e| failed("update_product", actor, Some(id), e))?;
        if !written {
            return Err(ProductError::ConcurrencyConflict {
                product_id: id,
                expected: expected.clone(),
                actual: observed,
            });
        }
        Ok(product)
    }

    #[instrument(skip(self), fields(actor = %actor, product_id = %id))]
    pub async fn delete_product(&self, actor: &Actor, id: ProductId) -> Result<(), ProductError> {
        let mut tx = self.store.begin().await.map_err(|e| failed("begin", actor, Some(id), e))?;
        let outcome = match tx.delete_product(id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(ProductError::NotFound(id)),
            Err(e) => Err(failed("delete_product", actor, Some(id), e)),
        };
        settle(tx, outcome)
            .await
            .map_err(|e| failed("commit", actor, Some(id), e))??;

        tracing::info!("product deleted");
        self.emit(AuditKind::ProductDeleted, actor, format!("Product deleted. Id: {id}"));
        Ok(())
    }

    /// Add `delta` units to the stock of product `id`.
    ///
    /// The increment is applied to whatever quantity is committed when the
    /// row lock is acquired; no version token is required. A missing product
    /// is reported before a non-positive `delta`.
    #[instrument(skip(self), fields(actor = %actor, product_id = %id))]
    pub async fn add_stock(&self, actor: &Actor, id: ProductId, delta: i64) -> Result<Product, ProductError> {
        let mut tx = self.store.begin().await.map_err(|e| failed("begin", actor, Some(id), e))?;
        let outcome = Self::replenish(&mut tx, actor, id, delta).await;
        let product = settle(tx, outcome)
            .await
            .map_err(|e| failed("commit", actor, Some(id), e))??;

        let total = product.stock_quantity();
        tracing::info!(delta, total, "stock replenished");
        self.emit(
            AuditKind::StockUpdated,
            actor,
            format!("Stock updated. ProductId: {id}, Added: {delta}, NewStock: {total}"),
        );
        Ok(product)
    }

    async fn replenish(
        tx: &mut S::Tx,
        actor: &Actor,
        id: ProductId,
        delta: i64,
    ) -> Result<Product, ProductError> {
        let mut product = tx
            .product_for_update(id)
            .await
            .map_err(|e| failed("lock_product", actor, Some(id), e))?
            .ok_or(ProductError::NotFound(id))?;

        let observed = product.version().clone();
        product.replenish(delta)?;

        let written = tx
            .update_product(&product, &observed)
            .await
            .map_err(|e| failed("update_product", actor, Some(id), e))?;
        if !written {
            tracing::error!(%actor, product_id = %id, "locked product row changed before replenishment");
            return Err(ProductError::Failed);
        }
        Ok(product)
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product, ProductError> {
        self.store
            .product(id)
            .await
            .map_err(|e| failed("get_product", &Actor::system(), Some(id), e))?
            .ok_or(ProductError::NotFound(id))
    }

    /// All products, oldest first.
    pub async fn list_products(&self) -> Result<Vec<Product>, ProductError> {
        self.store
            .products()
            .await
            .map_err(|e| failed("list_products", &Actor::system(), None, e))
    }
}

fn failed(operation: &'static str, actor: &Actor, product_id: Option<ProductId>, err: StoreError) -> ProductError {
    match product_id {
        Some(product_id) => {
            tracing::error!(operation, %actor, %product_id, error = %err, "product operation failed; rolled back")
        }
        None => tracing::error!(operation, %actor, error = %err, "product operation failed; rolled back"),
    }
    ProductError::Failed
}

#[cfg(test)]
mod tests {
    use stockroom_audit::InMemoryAuditSink;
    use stockroom_core::UserId;

    use super::*;
    use crate::store::InMemoryStore;

    fn laptop() -> NewProduct {
        NewProduct {
            name: "Laptop".into(),
            description: "High-end gaming laptop".into(),
            price: "1500.00".parse().unwrap(),
            stock_quantity: 10,
        }
    }

    fn engine() -> (ProductMutationEngine<InMemoryStore>, Arc<InMemoryAuditSink>) {
        let audit = Arc::new(InMemoryAuditSink::new());
        (ProductMutationEngine::new(InMemoryStore::new(), audit.clone()), audit)
    }

    fn admin() -> Actor {
        Actor::user(UserId::new(), "admin")
    }

    #[tokio::test]
    async fn create_persists_and_audits() {
        let (engine, audit) = engine();

        let product = engine.create_product(&admin(), laptop()).await.unwrap();

        assert_eq!(engine.get_product(product.id_typed()).await.unwrap(), product);
        let events = audit.of_kind(&AuditKind::ProductCreated);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].actor, "admin");
        assert_eq!(
            events[0].detail,
            format!("Product created. Id: {}, Name: Laptop", product.id_typed())
        );
    }

    #[tokio::test]
    async fn create_rejects_invalid_fields_without_writing() {
        let (engine, audit) = engine();
        let mut input = laptop();
        input.name = String::new();

        assert!(matches!(
            engine.create_product(&admin(), input).await,
            Err(ProductError::Validation(_))
        ));
        assert!(engine.list_products().await.unwrap().is_empty());
        assert!(audit.events().is_empty());
    }

    #[tokio::test]
    async fn stale_token_leaves_record_unchanged() {
        let (engine, audit) = engine();
        let product = engine.create_product(&admin(), laptop()).await.unwrap();
        let id = product.id_typed();
        let first_token = product.version().clone();

        engine.add_stock(&Actor::system(), id, 5).await.unwrap();
        let before = engine.get_product(id).await.unwrap();

        let err = engine
            .update_product(
                &admin(),
                id,
                ProductChanges {
                    name: "Laptop Pro".into(),
                    description: String::new(),
                    price: "1700".parse().unwrap(),
                    stock_quantity: 1,
                },
                &first_token,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ProductError::ConcurrencyConflict { product_id, .. } if product_id == id));
        assert_eq!(engine.get_product(id).await.unwrap(), before);
        assert!(audit.of_kind(&AuditKind::ProductUpdated).is_empty());
    }

    #[tokio::test]
    async fn matching_token_updates_and_rotates() {
        let (engine, audit) = engine();
        let product = engine.create_product(&admin(), laptop()).await.unwrap();
        let id = product.id_typed();

        let updated = engine
            .update_product(
                &admin(),
                id,
                ProductChanges {
                    name: "Laptop Pro".into(),
                    description: "Updated model".into(),
                    price: "1700".parse().unwrap(),
                    stock_quantity: 15,
                },
                product.version(),
            )
            .await
            .unwrap();

        assert_eq!(updated.name(), "Laptop Pro");
        assert_ne!(updated.version(), product.version());
        assert_eq!(engine.get_product(id).await.unwrap(), updated);
        assert_eq!(
            audit.of_kind(&AuditKind::ProductUpdated)[0].detail,
            format!("Product updated. Id: {id}, Name: Laptop Pro")
        );
    }

    #[tokio::test]
    async fn update_of_missing_product_is_not_found() {
        let (engine, _) = engine();
        let id = ProductId::new();
        let changes = ProductChanges {
            name: "Ghost".into(),
            description: String::new(),
            price: Money::ZERO,
            stock_quantity: 0,
        };

        assert_eq!(
            engine
                .update_product(&admin(), id, changes, &VersionToken::fresh())
                .await,
            Err(ProductError::NotFound(id))
        );
    }

    #[tokio::test]
    async fn delete_removes_then_reports_not_found() {
        let (engine, audit) = engine();
        let product = engine.create_product(&admin(), laptop()).await.unwrap();
        let id = product.id_typed();

        engine.delete_product(&Actor::system(), id).await.unwrap();

        assert_eq!(engine.get_product(id).await, Err(ProductError::NotFound(id)));
        assert_eq!(
            engine.delete_product(&Actor::system(), id).await,
            Err(ProductError::NotFound(id))
        );
        let deleted = audit.of_kind(&AuditKind::ProductDeleted);
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].actor, "system");
        assert_eq!(deleted[0].detail, format!("Product deleted. Id: {id}"));
    }

    #[tokio::test]
    async fn add_stock_requires_positive_delta() {
        let (engine, audit) = engine();
        let product = engine.create_product(&admin(), laptop()).await.unwrap();

        for delta in [0, -3] {
            assert_eq!(
                engine.add_stock(&admin(), product.id_typed(), delta).await,
                Err(ProductError::InvalidQuantity(delta))
            );
        }
        let stored = engine.get_product(product.id_typed()).await.unwrap();
        assert_eq!(stored.stock_quantity(), 10);
        assert_eq!(stored.version(), product.version());
        assert!(audit.of_kind(&AuditKind::StockUpdated).is_empty());
    }

    #[tokio::test]
    async fn add_stock_ignores_token_and_reports_total() {
        let (engine, audit) = engine();
        let product = engine.create_product(&admin(), laptop()).await.unwrap();
        let id = product.id_typed();

        let restocked = engine.add_stock(&admin(), id, 7).await.unwrap();

        assert_eq!(restocked.stock_quantity(), 17);
        assert_ne!(restocked.version(), product.version());
        assert_eq!(
            audit.of_kind(&AuditKind::StockUpdated)[0].detail,
            format!("Stock updated. ProductId: {id}, Added: 7, NewStock: 17")
        );
    }

    #[tokio::test]
    async fn add_stock_to_missing_product_is_not_found() {
        let (engine, _) = engine();
        let id = ProductId::new();
        assert_eq!(
            engine.add_stock(&admin(), id, 1).await,
            Err(ProductError::NotFound(id))
        );
    }

    #[tokio::test]
    async fn missing_product_is_reported_before_bad_delta() {
        let (engine, audit) = engine();
        let id = ProductId::new();
        for delta in [0, -3] {
            assert_eq!(
                engine.add_stock(&admin(), id, delta).await,
                Err(ProductError::NotFound(id))
            );
        }
        assert!(audit.events().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_restocks_never_lose_increments() {
        let (engine, _) = engine();
        let engine = Arc::new(engine);
        let product = engine.create_product(&admin(), laptop()).await.unwrap();
        let id = product.id_typed();

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.add_stock(&Actor::system(), id, 3).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(engine.get_product(id).await.unwrap().stock_quantity(), 10 + 20 * 3);
    }
}

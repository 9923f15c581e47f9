//! Order placement: validation, stock reservation and order persistence as
//! one atomic unit.
//!
//! ## Placement Flow
//!
//! ```text
//! place_order(user, lines)
//!   ↓
//! 1. Validate request shape (non-empty, every quantity > 0)
//!   ↓
//! 2. Open one store transaction
//!   ↓
//! 3. For each line, in request order:
//!      lock product row → check stock → decrement → copy unit price
//!   ↓
//! 4. Persist the order with all of its lines
//!   ↓
//! 5. Commit (any failure before this point rolls everything back)
//!   ↓
//! 6. Emit one `OrderPlaced` audit event
//! ```
//!
//! The engine performs no locking of its own. Two placements racing for the
//! same product are serialized by the row lock taken in step 3; the later one
//! re-reads the committed quantity and fails with `InsufficientStock` if it
//! no longer fits. Placements are never retried internally.
//!
//! Dropping the `place_order` future before commit drops the transaction,
//! which rolls it back; no audit event is emitted in that case.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{Span, instrument};

use stockroom_audit::{AuditEvent, AuditKind, AuditSink};
use stockroom_catalog::CatalogError;
use stockroom_core::{OrderId, ProductId, UserId};
use stockroom_orders::{Order, OrderError, OrderLine, OrderLineRequest, validate_request};

use crate::store::{
    InventoryStore, OrderPage, OrderQuery, Pagination, StoreError, StoreTransaction, settle,
};

/// Why an order was not placed.
///
/// Every variant means nothing was persisted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlacementError {
    #[error("order must contain at least one line")]
    EmptyOrder,

    /// `line` is the zero-based position in the request.
    #[error("line {line}: quantity must be positive, got {quantity}")]
    InvalidQuantity { line: usize, quantity: i64 },

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    /// Infrastructure failure; details are logged, not returned.
    #[error("order placement failed")]
    PlacementFailed,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderLookupError {
    #[error("order {0} not found")]
    NotFound(OrderId),

    #[error("order lookup failed")]
    Failed,
}

/// Places orders against an [`InventoryStore`].
pub struct OrderPlacementEngine<S> {
    store: S,
    audit: Arc<dyn AuditSink>,
}

impl<S> OrderPlacementEngine<S> {
    pub fn new(store: S, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S> OrderPlacementEngine<S>
where
    S: InventoryStore,
{
    /// Place one order for `user_id` with one line per request entry.
    ///
    /// On success the returned order is committed and the stock of every
    /// referenced product has been decremented. On any error nothing changed.
    /// The first failing line in request order is the one reported.
    #[instrument(
        skip(self, lines),
        fields(user_id = %user_id, line_count = lines.len(), order_id = tracing::field::Empty)
    )]
    pub async fn place_order(
        &self,
        user_id: UserId,
        lines: &[OrderLineRequest],
    ) -> Result<Order, PlacementError> {
        validate_request(lines).map_err(order_error)?;

        let mut tx = self
            .store
            .begin()
            .await
            .map_err(|e| infrastructure("begin", user_id, e))?;

        let outcome = self.reserve_and_record(&mut tx, user_id, lines).await;
        let order = settle(tx, outcome)
            .await
            .map_err(|e| infrastructure("commit", user_id, e))??;

        Span::current().record("order_id", tracing::field::display(order.id_typed()));
        tracing::info!(total = %order.total(), "order placed");

        self.audit.record(AuditEvent::new(
            AuditKind::OrderPlaced,
            user_id.to_string(),
            format!("Order {} placed with {} items", order.id_typed(), order.lines().len()),
        ));

        Ok(order)
    }

    async fn reserve_and_record(
        &self,
        tx: &mut S::Tx,
        user_id: UserId,
        lines: &[OrderLineRequest],
    ) -> Result<Order, PlacementError> {
        let mut priced = Vec::with_capacity(lines.len());

        for (line, request) in lines.iter().enumerate() {
            let product_id = request.product_id;
            let mut product = tx
                .product_for_update(product_id)
                .await
                .map_err(|e| infrastructure("lock_product", user_id, e))?
                .ok_or(PlacementError::ProductNotFound(product_id))?;

            let observed = product.version().clone();
            product.reserve(request.quantity).map_err(|e| match e {
                CatalogError::InsufficientStock {
                    product_id,
                    requested,
                    available,
                } => PlacementError::InsufficientStock {
                    product_id,
                    requested,
                    available,
                },
                CatalogError::InvalidQuantity(quantity) => {
                    PlacementError::InvalidQuantity { line, quantity }
                }
                other => {
                    tracing::error!(%user_id, %product_id, error = %other, "unexpected reservation failure");
                    PlacementError::PlacementFailed
                }
            })?;

            let written = tx
                .update_product(&product, &observed)
                .await
                .map_err(|e| infrastructure("update_product", user_id, e))?;
            if !written {
                tracing::error!(%user_id, %product_id, "locked product row changed before decrement");
                return Err(PlacementError::PlacementFailed);
            }

            let priced_line = OrderLine::priced(product_id, request.quantity, product.price())
                .map_err(order_error)?;
            priced.push(priced_line);
        }

        let order = Order::place(user_id, priced, Utc::now()).map_err(order_error)?;
        tx.insert_order(&order)
            .await
            .map_err(|e| infrastructure("insert_order", user_id, e))?;
        Ok(order)
    }

    #[instrument(skip(self), err)]
    pub async fn get_order(&self, id: OrderId) -> Result<Order, OrderLookupError> {
        self.store
            .order(id)
            .await
            .map_err(|e| {
                tracing::error!(order_id = %id, error = %e, "failed to load order");
                OrderLookupError::Failed
            })?
            .ok_or(OrderLookupError::NotFound(id))
    }

    /// Orders matching `query`, newest first.
    pub async fn list_orders(
        &self,
        query: &OrderQuery,
        page: Pagination,
    ) -> Result<OrderPage, OrderLookupError> {
        self.store.orders(query, page).await.map_err(|e| {
            tracing::error!(?query, error = %e, "failed to list orders");
            OrderLookupError::Failed
        })
    }
}

fn order_error(err: OrderError) -> PlacementError {
    match err {
        OrderError::EmptyOrder => PlacementError::EmptyOrder,
        OrderError::InvalidQuantity { line, quantity } => {
            PlacementError::InvalidQuantity { line, quantity }
        }
        OrderError::Amount(e) => {
            tracing::error!(error = %e, "order total could not be computed");
            PlacementError::PlacementFailed
        }
    }
}

fn infrastructure(operation: &'static str, user_id: UserId, err: StoreError) -> PlacementError {
    tracing::error!(operation, %user_id, error = %err, "order placement failed; rolled back");
    PlacementError::PlacementFailed
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockroom_core::{Entity, Money, ProductId, VersionToken};

/// Catalog rule violations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid price: {0}")]
    InvalidPrice(Money),

    #[error("invalid quantity: {0}")]
    InvalidQuantity(i64),

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    #[error("product {product_id} was modified concurrently (expected {expected}, actual {actual})")]
    ConcurrencyConflict {
        product_id: ProductId,
        expected: VersionToken,
        actual: VersionToken,
    },
}

/// Input for creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock_quantity: i64,
}

/// Full replacement of a product's mutable fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductChanges {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock_quantity: i64,
}

/// Entity: Product.
///
/// Invariant: `stock_quantity >= 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    name: String,
    description: String,
    price: Money,
    stock_quantity: i64,
    version: VersionToken,
    created_at: DateTime<Utc>,
}

impl Product {
    /// Validate input and build a product with a new identity and version token.
    pub fn create(input: NewProduct, created_at: DateTime<Utc>) -> Result<Self, CatalogError> {
        validate_fields(&input.name, input.price, input.stock_quantity)?;
        Ok(Self {
            id: ProductId::new(),
            name: input.name,
            description: input.description,
            price: input.price,
            stock_quantity: input.stock_quantity,
            version: VersionToken::fresh(),
            created_at,
        })
    }

    /// Rebuild a product from storage. No validation is applied.
    pub fn rehydrate(
        id: ProductId,
        name: String,
        description: String,
        price: Money,
        stock_quantity: i64,
        version: VersionToken,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            description,
            price,
            stock_quantity,
            version,
            created_at,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn stock_quantity(&self) -> i64 {
        self.stock_quantity
    }

    pub fn version(&self) -> &VersionToken {
        &self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Take `quantity` units out of stock for an order line.
    pub fn reserve(&mut self, quantity: i64) -> Result<(), CatalogError> {
        if quantity <= 0 {
            return Err(CatalogError::InvalidQuantity(quantity));
        }
        if quantity > self.stock_quantity {
            return Err(CatalogError::InsufficientStock {
                product_id: self.id,
                requested: quantity,
                available: self.stock_quantity,
            });
        }
        self.stock_quantity -= quantity;
        self.version = VersionToken::fresh();
        Ok(())
    }

    /// Add `delta` units to stock; returns the new total.
    ///
    /// Does not consult the version token.
    pub fn replenish(&mut self, delta: i64) -> Result<i64, CatalogError> {
        if delta <= 0 {
            return Err(CatalogError::InvalidQuantity(delta));
        }
        let total = self.stock_quantity.checked_add(delta).ok_or_else(|| {
            CatalogError::Validation(format!("stock overflow adding {delta} to {}", self.stock_quantity))
        })?;
        self.stock_quantity = total;
        self.version = VersionToken::fresh();
        Ok(total)
    }

    /// Overwrite all mutable fields, provided `expected` is the current token.
    ///
    /// A stale token is rejected even when `changes` equals the current state.
    pub fn apply_changes(
        &mut self,
        changes: ProductChanges,
        expected: &VersionToken,
    ) -> Result<(), CatalogError> {
        if expected.check(&self.version).is_err() {
            return Err(CatalogError::ConcurrencyConflict {
                product_id: self.id,
                expected: expected.clone(),
                actual: self.version.clone(),
            });
        }
        validate_fields(&changes.name, changes.price, changes.stock_quantity)?;

        self.name = changes.name;
        self.description = changes.description;
        self.price = changes.price;
        self.stock_quantity = changes.stock_quantity;
        self.version = VersionToken::fresh();
        Ok(())
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn validate_fields(name: &str, price: Money, stock_quantity: i64) -> Result<(), CatalogError> {
    if name.trim().is_empty() {
        return Err(CatalogError::Validation("name cannot be empty".to_string()));
    }
    if price.is_negative() {
        return Err(CatalogError::InvalidPrice(price));
    }
    if stock_quantity < 0 {
        return Err(CatalogError::InvalidQuantity(stock_quantity));
    }
    Ok(())
}

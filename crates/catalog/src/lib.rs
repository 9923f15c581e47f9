//! Product catalog domain module.
//!
//! Business rules for products and their stock, implemented as deterministic
//! domain logic (no IO, no storage). Every successful mutation issues a fresh
//! [`stockroom_core::VersionToken`].

pub mod product;

pub use product::{CatalogError, NewProduct, Product, ProductChanges};

//! Infrastructure layer: stores, engines, configuration.
//!
//! The two engines ([`order_placement::OrderPlacementEngine`] and
//! [`product_mutation::ProductMutationEngine`]) are generic over an
//! [`store::InventoryStore`]. The store owns every serialization decision;
//! the engines hold no locks and cache no rows.

pub mod audit_log;
pub mod config;
pub mod order_placement;
pub mod product_mutation;
pub mod store;


pub use config::{ConfigError, StockroomConfig};
pub use order_placement::{OrderLookupError, OrderPlacementEngine, PlacementError};
pub use product_mutation::{ProductError, ProductMutationEngine};

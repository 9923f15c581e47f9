//! Order ledger domain module.
//!
//! Orders are written once, by order placement, and never change afterwards.
//! Each line carries the unit price that was charged, copied from the product
//! at reservation time.

pub mod order;

pub use order::{Order, OrderError, OrderLine, OrderLineRequest, validate_request};

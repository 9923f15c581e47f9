//! `stockroom-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, money, version tokens and the acting principal.

pub mod actor;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;
pub mod version;

pub use actor::Actor;
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AuditEventId, OrderId, OrderLineId, ProductId, UserId};
pub use money::Money;
pub use value_object::ValueObject;
pub use version::VersionToken;

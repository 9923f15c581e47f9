//! Transactional inventory store boundary.
//!
//! Products, orders and their lines live behind [`InventoryStore`]. Every
//! write goes through a [`StoreTransaction`]; dropping a transaction without
//! committing it discards its writes.

pub mod in_memory;
pub mod postgres;
pub mod query;
pub mod r#trait;

pub use in_memory::{InMemoryStore, InMemoryTransaction};
pub use postgres::{PostgresStore, PostgresTransaction};
pub use query::{OrderPage, OrderQuery, Pagination};
pub use r#trait::{InventoryStore, StoreError, StoreTransaction};

/// Commit `tx` when `outcome` is `Ok`, roll it back otherwise.
///
/// The outer `Err` reports a failed commit; the inner result is `outcome`
/// itself. A failed rollback is only logged: the transaction is gone either way.
pub async fn settle<Tx, T, E>(tx: Tx, outcome: Result<T, E>) -> Result<Result<T, E>, StoreError>
where
    Tx: StoreTransaction,
{
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(Ok(value))
        }
        Err(err) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!(error = %rollback, "rollback failed");
            }
            Ok(Err(err))
        }
    }
}

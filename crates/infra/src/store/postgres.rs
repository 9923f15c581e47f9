//! Postgres-backed inventory store.
//!
//! Concurrency relies on two database mechanisms:
//!
//! - `SELECT ... FOR UPDATE` in [`StoreTransaction::product_for_update`] holds a
//!   row lock until commit, so two placements touching the same product are
//!   serialized and the second one re-reads the committed stock.
//! - `UPDATE ... WHERE row_version = $expected` makes every product write a
//!   compare-and-swap on the version token.
//!
//! `CHECK (stock_quantity >= 0)` backs the stock invariant at commit.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (serialization failure / deadlock) | `40001` / `40P01` | `Conflict` |
//! | Database (check / foreign key violation) | `23514` / `23503` | `Constraint` |
//! | Database (other) | Any other | `Backend` |
//! | Io, Tls, PoolClosed, PoolTimedOut | N/A | `Unavailable` |
//! | Decode, ColumnDecode, ColumnNotFound | N/A | `Corrupt` |

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use stockroom_catalog::Product;
use stockroom_core::{Money, OrderId, OrderLineId, ProductId, UserId, VersionToken};
use stockroom_orders::{Order, OrderLine};

use super::query::{OrderPage, OrderQuery, Pagination};
use super::r#trait::{InventoryStore, StoreError, StoreTransaction};
use crate::config::StockroomConfig;

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, stock_quantity, row_version, created_at";

/// Postgres-backed store.
///
/// `Send + Sync`; all operations go through the SQLx connection pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool using `DATABASE_URL` from `config`.
    pub async fn connect(config: &StockroomConfig) -> Result<Self, StoreError> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| StoreError::Unavailable("DATABASE_URL is not set".to_string()))?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load_lines(&self, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderLine>>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, quantity, unit_price
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, line_no ASC
            "#,
        )
        .bind(order_ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_lines", e))?;

        let mut lines: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
        for row in rows {
            let order_id: Uuid = row.try_get("order_id").map_err(corrupt)?;
            lines.entry(order_id).or_default().push(line_from_row(&row)?);
        }
        Ok(lines)
    }

    async fn assemble(&self, rows: Vec<PgRow>) -> Result<Vec<Order>, StoreError> {
        let ids = rows
            .iter()
            .map(|r| r.try_get::<Uuid, _>("id"))
            .collect::<Result<Vec<_>, _>>()
            .map_err(corrupt)?;
        let mut lines = self.load_lines(&ids).await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let id: Uuid = row.try_get("id").map_err(corrupt)?;
            let user_id: Uuid = row.try_get("user_id").map_err(corrupt)?;
            let placed_at: DateTime<Utc> = row.try_get("placed_at").map_err(corrupt)?;
            let order = Order::rehydrate(
                OrderId::from_uuid(id),
                UserId::from_uuid(user_id),
                placed_at,
                lines.remove(&id).unwrap_or_default(),
            )
            .map_err(|e| StoreError::Corrupt(format!("order {id}: {e}")))?;
            orders.push(order);
        }
        Ok(orders)
    }
}

#[async_trait]
impl InventoryStore for PostgresStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(PostgresTransaction { tx })
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;
        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query("SELECT id, user_id, placed_at FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_order", e))?;

        match row {
            Some(row) => Ok(self.assemble(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), err)]
    async fn orders(&self, query: &OrderQuery, page: Pagination) -> Result<OrderPage, StoreError> {
        let user_id = query.user_id.map(Uuid::from);

        let count_row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total
            FROM orders
            WHERE ($1::uuid IS NULL OR user_id = $1)
                AND ($2::timestamptz IS NULL OR placed_at >= $2)
                AND ($3::timestamptz IS NULL OR placed_at <= $3)
            "#,
        )
        .bind(user_id)
        .bind(query.placed_after)
        .bind(query.placed_before)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_orders", e))?;
        let total: i64 = count_row.try_get("total").map_err(corrupt)?;

        let rows = sqlx::query(
            r#"
            SELECT id, user_id, placed_at
            FROM orders
            WHERE ($1::uuid IS NULL OR user_id = $1)
                AND ($2::timestamptz IS NULL OR placed_at >= $2)
                AND ($3::timestamptz IS NULL OR placed_at <= $3)
            ORDER BY placed_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(user_id)
        .bind(query.placed_after)
        .bind(query.placed_before)
        .bind(i64::from(page.limit()))
        .bind(i64::from(page.offset()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("query_orders", e))?;

        let orders = self.assemble(rows).await?;
        Ok(OrderPage::new(orders, total.max(0) as u64, page))
    }
}

/// Transaction over a [`PostgresStore`].
///
/// Dropping it without `commit` rolls back (SQLx issues the rollback when
/// the connection returns to the pool).
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn product_for_update(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_product", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price, stock_quantity, row_version, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(product.id_typed().as_uuid())
        .bind(product.name())
        .bind(product.description())
        .bind(product.price().amount())
        .bind(product.stock_quantity())
        .bind(product.version().as_bytes())
        .bind(product.created_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    async fn update_product(
        &mut self,
        product: &Product,
        expected: &VersionToken,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = $2,
                description = $3,
                price = $4,
                stock_quantity = $5,
                row_version = $6
            WHERE id = $1 AND row_version = $7
            "#,
        )
        .bind(product.id_typed().as_uuid())
        .bind(product.name())
        .bind(product.description())
        .bind(product.price().amount())
        .bind(product.stock_quantity())
        .bind(product.version().as_bytes())
        .bind(expected.as_bytes())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_product", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO orders (id, user_id, placed_at) VALUES ($1, $2, $3)")
            .bind(order.id_typed().as_uuid())
            .bind(order.user_id().as_uuid())
            .bind(order.placed_at())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order", e))?;

        for (line_no, line) in order.lines().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, line_no, product_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(line.id().as_uuid())
            .bind(order.id_typed().as_uuid())
            .bind(line_no as i32)
            .bind(line.product_id().as_uuid())
            .bind(line.quantity())
            .bind(line.unit_price().amount())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order_item", e))?;
        }
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let id: Uuid = row.try_get("id").map_err(corrupt)?;
    let price: Decimal = row.try_get("price").map_err(corrupt)?;
    let version: Vec<u8> = row.try_get("row_version").map_err(corrupt)?;
    Ok(Product::rehydrate(
        ProductId::from_uuid(id),
        row.try_get("name").map_err(corrupt)?,
        row.try_get("description").map_err(corrupt)?,
        Money::new(price),
        row.try_get("stock_quantity").map_err(corrupt)?,
        VersionToken::from_bytes(version),
        row.try_get("created_at").map_err(corrupt)?,
    ))
}

fn line_from_row(row: &PgRow) -> Result<OrderLine, StoreError> {
    let id: Uuid = row.try_get("id").map_err(corrupt)?;
    let product_id: Uuid = row.try_get("product_id").map_err(corrupt)?;
    let quantity: i64 = row.try_get("quantity").map_err(corrupt)?;
    let unit_price: Decimal = row.try_get("unit_price").map_err(corrupt)?;
    OrderLine::rehydrate(
        OrderLineId::from_uuid(id),
        ProductId::from_uuid(product_id),
        quantity,
        Money::new(unit_price),
    )
    .map_err(|e| StoreError::Corrupt(format!("order line {id}: {e}")))
}

fn corrupt(err: sqlx::Error) -> StoreError {
    StoreError::Corrupt(err.to_string())
}

/// Map SQLx errors to StoreError.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("40001") | Some("40P01") => StoreError::Conflict(msg),
                Some("23514") | Some("23503") => StoreError::Constraint(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolClosed
        | sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("{operation}: {err}"))
        }
        sqlx::Error::Decode(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_) => StoreError::Corrupt(format!("{operation}: {err}")),
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

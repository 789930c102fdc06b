//! `PostgreSQL` order store for the bookstore order subsystem.
//!
//! Orders are kept in a shared `documents` table: the full order is a JSONB
//! body tagged with its `kind`, and the fields used for filtering are copied
//! into indexed columns.
//!
//! # Optimistic Concurrency
//!
//! [`OrderStore::replace`] is a single conditional
//! `UPDATE ... WHERE id = $1 AND updated_at = $expected`. Zero affected rows
//! means the order is missing or has moved on.
//!
//! # Example
//!
//! ```no_run
//! use bookstore_postgres::{PoolConfig, PostgresOrderStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PostgresOrderStore::connect("postgres://localhost/bookstore", &PoolConfig::default()).await?;
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

use bookstore_core::{
    DateTime, Order, OrderFilter, OrderId, OrderStore, StoreError, StoreFuture, StoredDocument,
    Utc,
};
use chrono::SubsecRound;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

const ORDER_KIND: &str = "Order";

/// Connection pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Upper bound on open connections.
    pub max_connections: u32,
    /// How long to wait for a connection.
    pub connect_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Order store backed by `PostgreSQL`.
#[derive(Clone, Debug)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the database cannot be reached.
    pub async fn connect(database_url: &str, config: &PoolConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect: {e}")))?;

        Ok(Self::new(pool))
    }

    /// Create the `documents` table and its indexes if missing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn current_version(&self, id: OrderId) -> Result<Option<DateTime<Utc>>, StoreError> {
        let row: Option<(DateTime<Utc>,)> =
            sqlx::query_as("SELECT updated_at FROM documents WHERE id = $1 AND kind = $2")
                .bind(id.as_uuid())
                .bind(ORDER_KIND)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(row.map(|(updated_at,)| updated_at))
    }
}

fn encode(order: &Order) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(StoredDocument::Order(order.clone()))
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode(body: serde_json::Value) -> Result<Order, StoreError> {
    serde_json::from_value::<StoredDocument>(body)
        .map(StoredDocument::into_order)
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

fn version(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp.trunc_subsecs(6)
}

impl OrderStore for PostgresOrderStore {
    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;
            Ok(())
        })
    }

    fn create(&self, order: Order) -> StoreFuture<'_, OrderId> {
        Box::pin(async move {
            let body = encode(&order)?;

            let result = sqlx::query(
                r"
                INSERT INTO documents (
                    id, kind, shop_id, client_id, user_id, is_deleted, body, created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ",
            )
            .bind(order.id.as_uuid())
            .bind(ORDER_KIND)
            .bind(order.shop_id.as_str())
            .bind(order.client_id.as_str())
            .bind(order.user_id.as_str())
            .bind(order.is_deleted)
            .bind(body)
            .bind(version(order.created_at))
            .bind(version(order.updated_at))
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => {
                    metrics::counter!("order_store_writes_total", "operation" => "create")
                        .increment(1);
                    Ok(order.id)
                }
                Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                    Err(StoreError::Duplicate(order.id))
                }
                Err(e) => Err(StoreError::Database(e.to_string())),
            }
        })
    }

    fn get(&self, id: OrderId) -> StoreFuture<'_, Order> {
        Box::pin(async move {
            let row: Option<(serde_json::Value,)> =
                sqlx::query_as("SELECT body FROM documents WHERE id = $1 AND kind = $2")
                    .bind(id.as_uuid())
                    .bind(ORDER_KIND)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| StoreError::Database(e.to_string()))?;

            let (body,) = row.ok_or(StoreError::NotFound(id))?;
            decode(body)
        })
    }

    fn find(&self, filter: OrderFilter) -> StoreFuture<'_, Vec<Order>> {
        Box::pin(async move {
            let rows: Vec<(serde_json::Value,)> = sqlx::query_as(
                r"
                SELECT body FROM documents
                WHERE kind = $1
                  AND ($2::TEXT IS NULL OR shop_id = $2)
                  AND ($3::TEXT IS NULL OR client_id = $3)
                  AND ($4::TEXT IS NULL OR user_id = $4)
                  AND ($5 OR NOT is_deleted)
                ORDER BY created_at ASC, id ASC
                ",
            )
            .bind(ORDER_KIND)
            .bind(filter.shop_id.as_ref().map(|id| id.as_str()))
            .bind(filter.client_id.as_ref().map(|id| id.as_str()))
            .bind(filter.user_id.as_ref().map(|id| id.as_str()))
            .bind(filter.include_deleted)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

            rows.into_iter().map(|(body,)| decode(body)).collect()
        })
    }

    fn replace(
        &self,
        order: Order,
        expected_updated_at: DateTime<Utc>,
    ) -> StoreFuture<'_, Order> {
        Box::pin(async move {
            let body = encode(&order)?;

            let result = sqlx::query(
                r"
                UPDATE documents
                SET shop_id = $3, client_id = $4, user_id = $5, is_deleted = $6,
                    body = $7, updated_at = $8
                WHERE id = $1 AND kind = $2 AND updated_at = $9
                ",
            )
            .bind(order.id.as_uuid())
            .bind(ORDER_KIND)
            .bind(order.shop_id.as_str())
            .bind(order.client_id.as_str())
            .bind(order.user_id.as_str())
            .bind(order.is_deleted)
            .bind(body)
            .bind(version(order.updated_at))
            .bind(version(expected_updated_at))
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

            if result.rows_affected() == 1 {
                metrics::counter!("order_store_writes_total", "operation" => "replace")
                    .increment(1);
                return Ok(order);
            }

            match self.current_version(order.id).await? {
                None => Err(StoreError::NotFound(order.id)),
                Some(actual) => {
                    metrics::counter!("order_store_conflicts_total").increment(1);
                    tracing::warn!(
                        order_id = %order.id,
                        expected = %expected_updated_at,
                        actual = %actual,
                        "Optimistic concurrency conflict"
                    );
                    Err(StoreError::Conflict {
                        id: order.id,
                        expected: expected_updated_at,
                        actual,
                    })
                }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use bookstore_core::{BookId, ClientId, Money, OrderLine, ShopId, UserId};

    fn order() -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::generate(),
            user_id: UserId::new("u1"),
            client_id: ClientId::new("c1"),
            shop_id: ShopId::new("s1"),
            order_lines: vec![OrderLine {
                book_id: BookId::new(4),
                quantity: 1,
                price: Money::from_minor(999),
                total: Money::from_minor(999),
            }],
            total: Money::from_minor(999),
            total_books: 1,
            created_at: now,
            updated_at: now,
            is_deleted: false,
        }
    }

    #[test]
    fn body_is_tagged_with_kind() {
        let order = order();
        let body = encode(&order).unwrap();

        assert_eq!(body["kind"], ORDER_KIND);
        assert_eq!(decode(body).unwrap(), order);
    }

    #[test]
    fn undecodable_body_is_a_serialization_error() {
        let result = decode(serde_json::json!({"kind": "Order", "id": 7}));

        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[test]
    fn versions_have_microsecond_precision() {
        let t = DateTime::parse_from_rfc3339("2025-01-01T00:00:00.123456789Z")
            .unwrap()
            .with_timezone(&Utc);

        assert_eq!(version(t).to_rfc3339(), "2025-01-01T00:00:00.123456+00:00");
    }
}

//! In-memory [`OrderStore`] backed by a lock-guarded map.

use bookstore_core::{
    DateTime, Order, OrderFilter, OrderId, OrderStore, StoreError, StoreFuture, Utc,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory order store for fast, deterministic tests and local runs.
///
/// Writes take the lock exclusively, so the version check in
/// [`OrderStore::replace`] and the write itself happen atomically.
///
/// Cloning shares the underlying map.
#[derive(Clone, Debug, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored orders, deleted ones included.
    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Whether the store holds no orders.
    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

impl OrderStore for InMemoryOrderStore {
    fn create(&self, order: Order) -> StoreFuture<'_, OrderId> {
        Box::pin(async move {
            let mut orders = self.orders.write().await;
            let id = order.id;
            if orders.contains_key(&id) {
                return Err(StoreError::Duplicate(id));
            }
            orders.insert(id, order);
            Ok(id)
        })
    }

    fn get(&self, id: OrderId) -> StoreFuture<'_, Order> {
        Box::pin(async move {
            self.orders
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or(StoreError::NotFound(id))
        })
    }

    fn find(&self, filter: OrderFilter) -> StoreFuture<'_, Vec<Order>> {
        Box::pin(async move {
            let mut found: Vec<Order> = self
                .orders
                .read()
                .await
                .values()
                .filter(|order| filter.matches(order))
                .cloned()
                .collect();
            found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            Ok(found)
        })
    }

    fn replace(
        &self,
        order: Order,
        expected_updated_at: DateTime<Utc>,
    ) -> StoreFuture<'_, Order> {
        Box::pin(async move {
            let mut orders = self.orders.write().await;
            let stored = orders.get_mut(&order.id).ok_or(StoreError::NotFound(order.id))?;

            if stored.updated_at != expected_updated_at {
                return Err(StoreError::Conflict {
                    id: order.id,
                    expected: expected_updated_at,
                    actual: stored.updated_at,
                });
            }

            *stored = order.clone();
            Ok(order)
        })
    }
}

//! Read-through order cache.
//!
//! [`CachedOrderStore`] wraps any [`OrderStore`] and keeps recently seen
//! orders in memory, keyed by id:
//!
//! - `get` is served from the cache while the entry is fresh, otherwise it
//!   reads the store and caches the result
//! - `create` and a successful `replace` write the new document through
//! - a `replace` refused with `Conflict` or `NotFound` evicts the entry, so
//!   the retry reads the store
//!
//! Listings always go to the store. Entries expire after the configured
//! time-to-live, which bounds how stale a cached order can be when another
//! process writes to the same database.

use crate::metrics::CacheMetrics;
use bookstore_core::{
    DateTime, Order, OrderFilter, OrderId, OrderStore, StoreError, StoreFuture, Utc,
};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Thread-safe map of orders with a fixed time-to-live.
///
/// Expired entries are evicted lazily when they are read.
#[derive(Clone, Debug)]
pub struct OrderCache {
    entries: Arc<DashMap<OrderId, (Order, Instant)>>,
    ttl: Duration,
}

impl OrderCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// The cached order, if present and not expired.
    #[must_use]
    pub fn get(&self, id: &OrderId) -> Option<Order> {
        if let Some(entry) = self.entries.get(id) {
            let (order, inserted) = entry.value();
            if inserted.elapsed() < self.ttl {
                return Some(order.clone());
            }
            drop(entry);
            self.entries.remove(id);
        }
        None
    }

    /// Inserts or refreshes an order.
    pub fn insert(&self, order: Order) {
        self.entries.insert(order.id, (order, Instant::now()));
    }

    /// Drops one order.
    pub fn remove(&self, id: &OrderId) {
        self.entries.remove(id);
    }

    /// Number of entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// [`OrderStore`] decorator that caches single-order reads.
#[derive(Clone)]
pub struct CachedOrderStore {
    inner: Arc<dyn OrderStore>,
    cache: OrderCache,
}

impl CachedOrderStore {
    /// Wraps `inner` with a cache whose entries live for `ttl`.
    #[must_use]
    pub fn new(inner: Arc<dyn OrderStore>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: OrderCache::new(ttl),
        }
    }

    /// The underlying cache.
    #[must_use]
    pub const fn cache(&self) -> &OrderCache {
        &self.cache
    }
}

impl OrderStore for CachedOrderStore {
    fn create(&self, order: Order) -> StoreFuture<'_, OrderId> {
        Box::pin(async move {
            let id = self.inner.create(order.clone()).await?;
            self.cache.insert(order);
            Ok(id)
        })
    }

    fn get(&self, id: OrderId) -> StoreFuture<'_, Order> {
        Box::pin(async move {
            if let Some(order) = self.cache.get(&id) {
                CacheMetrics::record_hit();
                return Ok(order);
            }

            CacheMetrics::record_miss();
            let order = self.inner.get(id).await?;
            self.cache.insert(order.clone());
            Ok(order)
        })
    }

    fn find(&self, filter: OrderFilter) -> StoreFuture<'_, Vec<Order>> {
        self.inner.find(filter)
    }

    fn replace(
        &self,
        order: Order,
        expected_updated_at: DateTime<Utc>,
    ) -> StoreFuture<'_, Order> {
        Box::pin(async move {
            let id = order.id;
            match self.inner.replace(order, expected_updated_at).await {
                Ok(stored) => {
                    self.cache.insert(stored.clone());
                    Ok(stored)
                }
                Err(error @ (StoreError::Conflict { .. } | StoreError::NotFound(_))) => {
                    tracing::debug!(order_id = %id, %error, "Evicting cached order");
                    self.cache.remove(&id);
                    Err(error)
                }
                Err(error) => Err(error),
            }
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        self.inner.ping()
    }
}

//! Order store trait and related types.
//!
//! The store persists whole [`Order`] documents keyed by [`OrderId`]. Lines
//! are never stored separately, so a single write is atomic for the whole
//! order.
//!
//! # Optimistic Concurrency
//!
//! [`OrderStore::replace`] takes the `updated_at` value the caller last saw.
//! If the stored document has moved on, the write is refused with
//! [`StoreError::Conflict`] and nothing is changed. [`OrderStoreExt::update`]
//! wraps the usual load → mutate → replace cycle.
//!
//! # Implementations
//!
//! - `InMemoryOrderStore` (in `bookstore-testing`): lock-guarded map
//! - `PostgresOrderStore` (in `bookstore-postgres`): JSONB documents
//!
//! # Dyn Compatibility
//!
//! Methods return boxed futures so the service can hold an
//! `Arc<dyn OrderStore>`.

use crate::order::{ClientId, Order, OrderId, ShopId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Errors that can occur during store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No document with this id.
    #[error("order {0} not found")]
    NotFound(OrderId),

    /// The document changed since it was read.
    #[error("order {id} was modified concurrently: expected version {expected}, found {actual}")]
    Conflict {
        /// Order being written.
        id: OrderId,
        /// Version the writer read.
        expected: DateTime<Utc>,
        /// Version currently stored.
        actual: DateTime<Utc>,
    },

    /// A document with this id already exists.
    #[error("order {0} already exists")]
    Duplicate(OrderId),

    /// The document is soft-deleted and can no longer change.
    #[error("order {0} is deleted")]
    Deleted(OrderId),

    /// Backend unavailable or query failed.
    #[error("database error: {0}")]
    Database(String),

    /// Stored document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A document as laid out in the shared collection.
///
/// The `kind` discriminator lets several entity types share one collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum StoredDocument {
    /// An order document.
    Order(Order),
}

impl StoredDocument {
    /// Discriminator value written alongside the document.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Order(_) => "Order",
        }
    }

    /// Whether the document is soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        match self {
            Self::Order(order) => order.is_deleted,
        }
    }

    /// Unwraps the order.
    #[must_use]
    pub fn into_order(self) -> Order {
        match self {
            Self::Order(order) => order,
        }
    }
}

/// Selection criteria for [`OrderStore::find`]. Empty criteria match all.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderFilter {
    /// Only orders of this shop.
    pub shop_id: Option<ShopId>,
    /// Only orders of this client.
    pub client_id: Option<ClientId>,
    /// Only orders registered by this user.
    pub user_id: Option<UserId>,
    /// Include soft-deleted orders.
    pub include_deleted: bool,
}

impl OrderFilter {
    /// Every order, including deleted ones.
    #[must_use]
    pub fn all() -> Self {
        Self {
            include_deleted: true,
            ..Self::default()
        }
    }

    /// Orders of one shop.
    #[must_use]
    pub fn for_shop(shop_id: ShopId) -> Self {
        Self {
            shop_id: Some(shop_id),
            ..Self::all()
        }
    }

    /// Orders of one client.
    #[must_use]
    pub fn for_client(client_id: ClientId) -> Self {
        Self {
            client_id: Some(client_id),
            ..Self::all()
        }
    }

    /// Orders registered by one user.
    #[must_use]
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::all()
        }
    }

    /// Leaves soft-deleted orders out.
    #[must_use]
    pub const fn active_only(mut self) -> Self {
        self.include_deleted = false;
        self
    }

    /// Whether `order` satisfies every criterion.
    #[must_use]
    pub fn matches(&self, order: &Order) -> bool {
        (self.include_deleted || !order.is_deleted)
            && self.shop_id.as_ref().is_none_or(|id| *id == order.shop_id)
            && self.client_id.as_ref().is_none_or(|id| *id == order.client_id)
            && self.user_id.as_ref().is_none_or(|id| *id == order.user_id)
    }
}

/// Persistence abstraction over order documents.
///
/// Implementations must be `Send + Sync`; the service shares one store across
/// all request tasks.
pub trait OrderStore: Send + Sync {
    /// Persists a new order and returns its id.
    ///
    /// # Errors
    ///
    /// - `Duplicate`: an order with the same id exists
    /// - `Database` / `Serialization`: the write failed
    fn create(&self, order: Order) -> StoreFuture<'_, OrderId>;

    /// Loads one order, deleted or not.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no order with this id
    /// - `Database` / `Serialization`: the read failed
    fn get(&self, id: OrderId) -> StoreFuture<'_, Order>;

    /// Loads all orders matching `filter`, oldest first (ties broken by id).
    ///
    /// # Errors
    ///
    /// - `Database` / `Serialization`: the read failed
    fn find(&self, filter: OrderFilter) -> StoreFuture<'_, Vec<Order>>;

    /// Overwrites an order if its stored `updated_at` still equals
    /// `expected_updated_at`.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no order with this id
    /// - `Conflict`: the stored version differs
    /// - `Database` / `Serialization`: the write failed
    fn replace(&self, order: Order, expected_updated_at: DateTime<Utc>)
        -> StoreFuture<'_, Order>;

    /// Checks that the backend is reachable. Stores without an external
    /// backend are always reachable.
    ///
    /// # Errors
    ///
    /// - `Database`: the backend did not answer
    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    /// Orders of one shop, including deleted ones.
    ///
    /// # Errors
    ///
    /// See [`OrderStore::find`].
    fn list_by_shop(&self, shop_id: &ShopId) -> StoreFuture<'_, Vec<Order>> {
        self.find(OrderFilter::for_shop(shop_id.clone()))
    }

    /// Orders of one client, including deleted ones.
    ///
    /// # Errors
    ///
    /// See [`OrderStore::find`].
    fn list_by_client(&self, client_id: &ClientId) -> StoreFuture<'_, Vec<Order>> {
        self.find(OrderFilter::for_client(client_id.clone()))
    }

    /// Orders registered by one user, including deleted ones.
    ///
    /// # Errors
    ///
    /// See [`OrderStore::find`].
    fn list_by_user(&self, user_id: &UserId) -> StoreFuture<'_, Vec<Order>> {
        self.find(OrderFilter::for_user(user_id.clone()))
    }
}

/// Read-modify-write helper available on every [`OrderStore`].
pub trait OrderStoreExt: OrderStore {
    /// Loads an order, applies `mutator`, and writes it back with optimistic
    /// concurrency against the loaded version.
    ///
    /// The mutator cannot change the order's id or its version: after it
    /// runs, `updated_at` is advanced past the loaded value using `now`
    /// (see [`Order::touch`]), so every successful update invalidates the
    /// version other writers hold.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no order with this id
    /// - `Deleted`: the order is soft-deleted
    /// - `Conflict`: another writer got there first
    /// - `Database` / `Serialization`: the read or write failed
    fn update<'a, F>(
        &'a self,
        id: OrderId,
        now: DateTime<Utc>,
        mutator: F,
    ) -> StoreFuture<'a, Order>
    where
        F: FnOnce(&mut Order) + Send + 'a,
    {
        Box::pin(async move {
            let mut order = self.get(id).await?;
            if order.is_deleted {
                return Err(StoreError::Deleted(id));
            }

            let expected = order.updated_at;
            mutator(&mut order);
            order.id = id;
            order.updated_at = expected;
            order.touch(now);

            self.replace(order, expected).await
        })
    }
}

impl<S: OrderStore + ?Sized> OrderStoreExt for S {}

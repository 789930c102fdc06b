//! Order service: validation, persistence and notification.
//!
//! Every mutation follows the same path:
//!
//! 1. validate the draft with [`validate_and_compute`]
//! 2. persist with a single atomic store write
//! 3. queue an [`OrderEvent`] on the [`Notifier`]
//!
//! Step 3 is best-effort. A notification that cannot be queued is logged and
//! reported in [`Committed::notification`]; the write stays committed.

use crate::metrics::OrderMetrics;
use crate::notify::{Notifier, PublishError};
use bookstore_core::environment::Clock;
use bookstore_core::{
    ClientId, Order, OrderDraft, OrderEvent, OrderFilter, OrderId, OrderStore, OrderStoreExt,
    Page, PageRequest, PricedOrder, ShopId, StoreError, UserId, ValidationError,
    validate_and_compute,
};
use std::sync::Arc;
use thiserror::Error;

/// Errors returned by [`OrderService`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// The draft is inconsistent or incomplete.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No order with this id.
    #[error("order {0} not found")]
    NotFound(OrderId),

    /// Another writer modified the order first. Safe to retry.
    #[error("order {0} was modified concurrently")]
    Conflict(OrderId),

    /// The order is soft-deleted and can no longer change.
    #[error("order {0} is deleted")]
    Deleted(OrderId),

    /// The store failed.
    #[error("persistence failure: {0}")]
    Persistence(StoreError),
}

impl From<StoreError> for OrderError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Conflict { id, .. } => Self::Conflict(id),
            StoreError::Deleted(id) => Self::Deleted(id),
            StoreError::Duplicate(_) | StoreError::Database(_) | StoreError::Serialization(_) => {
                Self::Persistence(error)
            }
        }
    }
}

/// What happened to the notification of a committed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStatus {
    /// Handed to the notifier for fan-out.
    Queued,
    /// Not queued; subscribers will not hear about this write.
    Skipped(PublishError),
}

/// A committed write and the fate of its notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed<T> {
    /// The persisted value.
    pub value: T,
    /// Notification outcome.
    pub notification: PublishStatus,
}

/// Orchestrates order use cases over a store, a notifier and a clock.
///
/// Cheap to clone; clones share the same collaborators.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
}

impl OrderService {
    /// Creates a service.
    #[must_use]
    pub fn new(store: Arc<dyn OrderStore>, notifier: Notifier, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            notifier,
            clock,
        }
    }

    /// The notifier events are published to.
    #[must_use]
    pub const fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Validates, prices and persists a new order, then announces it.
    ///
    /// # Errors
    ///
    /// - [`OrderError::Validation`]: the draft is rejected
    /// - [`OrderError::Persistence`]: the store write failed
    #[tracing::instrument(
        skip_all,
        fields(shop_id = %draft.shop_id, client_id = %draft.client_id)
    )]
    pub async fn place_order(&self, draft: OrderDraft) -> Result<Committed<Order>, OrderError> {
        let priced = validate(&draft)?;
        let order = priced.into_order(OrderId::generate(), self.clock.now());

        self.store.create(order.clone()).await?;
        OrderMetrics::record_placed();
        tracing::info!(
            order_id = %order.id,
            total = %order.total,
            total_books = order.total_books,
            "Order placed"
        );

        let notification = self.announce(OrderEvent::OrderCreated {
            order: order.clone(),
        });
        Ok(Committed {
            value: order,
            notification,
        })
    }

    /// Loads one order. Deleted orders are returned too.
    ///
    /// # Errors
    ///
    /// - [`OrderError::NotFound`]: unknown id
    /// - [`OrderError::Persistence`]: the store read failed
    pub async fn get_order(&self, id: OrderId) -> Result<Order, OrderError> {
        Ok(self.store.get(id).await?)
    }

    /// Active orders of a shop, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Persistence`] if the store read failed.
    pub async fn list_orders_for_shop(&self, shop_id: &ShopId) -> Result<Vec<Order>, OrderError> {
        self.find(OrderFilter::for_shop(shop_id.clone())).await
    }

    /// Active orders of a client, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Persistence`] if the store read failed.
    pub async fn list_orders_for_client(
        &self,
        client_id: &ClientId,
    ) -> Result<Vec<Order>, OrderError> {
        self.find(OrderFilter::for_client(client_id.clone())).await
    }

    /// Active orders registered by a user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Persistence`] if the store read failed.
    pub async fn list_orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, OrderError> {
        self.find(OrderFilter::for_user(user_id.clone())).await
    }

    /// One page of all active orders, in the request's sort order.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Persistence`] if the store read failed.
    pub async fn list_orders(&self, request: PageRequest) -> Result<Page<Order>, OrderError> {
        let mut orders = self.find(OrderFilter::all()).await?;
        request.sort().apply(&mut orders);
        Ok(Page::from_items(orders, request))
    }

    /// Replaces the identifiers and lines of an order with a re-validated
    /// draft. Id and creation time are kept.
    ///
    /// # Errors
    ///
    /// - [`OrderError::Validation`]: the draft is rejected
    /// - [`OrderError::NotFound`]: unknown id
    /// - [`OrderError::Deleted`]: the order is soft-deleted
    /// - [`OrderError::Conflict`]: a concurrent write won
    /// - [`OrderError::Persistence`]: the store failed
    #[tracing::instrument(skip_all, fields(order_id = %id))]
    pub async fn update_order(
        &self,
        id: OrderId,
        draft: OrderDraft,
    ) -> Result<Committed<Order>, OrderError> {
        let priced = validate(&draft)?;
        let now = self.clock.now();

        let order = self
            .store
            .update(id, now, move |order| priced.apply_to(order))
            .await?;
        OrderMetrics::record_updated();
        tracing::info!(total = %order.total, total_books = order.total_books, "Order updated");

        let notification = self.announce(OrderEvent::OrderUpdated {
            order: order.clone(),
        });
        Ok(Committed {
            value: order,
            notification,
        })
    }

    /// Soft-deletes an order.
    ///
    /// # Errors
    ///
    /// - [`OrderError::NotFound`]: unknown id
    /// - [`OrderError::Deleted`]: already deleted
    /// - [`OrderError::Conflict`]: a concurrent write won
    /// - [`OrderError::Persistence`]: the store failed
    #[tracing::instrument(skip_all, fields(order_id = %id))]
    pub async fn delete_order(&self, id: OrderId) -> Result<Committed<Order>, OrderError> {
        let now = self.clock.now();

        let order = self
            .store
            .update(id, now, |order| order.is_deleted = true)
            .await?;
        OrderMetrics::record_deleted();
        tracing::info!("Order deleted");

        let notification = self.announce(OrderEvent::OrderUpdated {
            order: order.clone(),
        });
        Ok(Committed {
            value: order,
            notification,
        })
    }

    /// Checks that the store answers.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Persistence`] if the store is unreachable.
    pub async fn check_store(&self) -> Result<(), OrderError> {
        Ok(self.store.ping().await?)
    }

    async fn find(&self, filter: OrderFilter) -> Result<Vec<Order>, OrderError> {
        Ok(self.store.find(filter.active_only()).await?)
    }

    fn announce(&self, event: OrderEvent) -> PublishStatus {
        let order_id = event.order().id;
        let event_type = event.event_type();

        match self.notifier.publish(event) {
            Ok(()) => PublishStatus::Queued,
            Err(error) => {
                OrderMetrics::record_notification_skipped();
                tracing::warn!(%order_id, event_type, %error, "Order notification skipped");
                PublishStatus::Skipped(error)
            }
        }
    }
}

fn validate(draft: &OrderDraft) -> Result<PricedOrder, OrderError> {
    validate_and_compute(draft).map_err(|error| {
        OrderMetrics::record_rejected();
        tracing::debug!(%error, "Order draft rejected");
        OrderError::Validation(error)
    })
}

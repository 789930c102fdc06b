//! # Bookstore Runtime
//!
//! Runtime side of the bookstore order subsystem.
//!
//! This crate provides:
//!
//! - [`OrderService`]: validation, persistence and notification of orders
//! - [`Notifier`]: the actor that fans order events out to subscribers
//! - [`CachedOrderStore`]: read-through cache in front of any order store
//! - [`retry`]: exponential backoff for transient startup failures
//! - [`metrics`]: Prometheus counters for orders and notifications
//!
//! ## Example
//!
//! ```
//! use bookstore_core::environment::SystemClock;
//! use bookstore_runtime::{Notifier, NotifierConfig, OrderService};
//! use bookstore_testing::{helpers, InMemoryOrderStore};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = OrderService::new(
//!     Arc::new(InMemoryOrderStore::new()),
//!     Notifier::spawn(NotifierConfig::default()),
//!     Arc::new(SystemClock),
//! );
//!
//! let placed = service.place_order(helpers::draft("s1", "c1")).await?;
//! let fetched = service.get_order(placed.value.id).await?;
//! assert_eq!(fetched, placed.value);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod metrics;
pub mod notify;
pub mod retry;
pub mod service;

pub use cache::{CachedOrderStore, OrderCache};
pub use notify::{DeliveryFailure, Notifier, NotifierConfig, PublishError, Subscription, SubscriptionId};
pub use service::{Committed, OrderError, OrderService, PublishStatus};

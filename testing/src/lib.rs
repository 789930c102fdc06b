//! # Bookstore Testing
//!
//! Testing utilities and in-memory infrastructure for the bookstore order
//! subsystem.
//!
//! This crate provides:
//! - Mock implementations of environment traits ([`FixedClock`])
//! - [`InMemoryOrderStore`], the lock-guarded store used by tests and by the
//!   `memory` storage backend
//! - [`FailingOrderStore`] for exercising persistence failures
//! - Draft builders and proptest strategies for domain types
//!
//! ## Example
//!
//! ```
//! use bookstore_core::{OrderStore, validate_and_compute};
//! use bookstore_core::environment::Clock;
//! use bookstore_testing::{helpers, test_clock, InMemoryOrderStore};
//! use bookstore_core::OrderId;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryOrderStore::new();
//! let priced = validate_and_compute(&helpers::draft("s1", "c1"))?;
//! let order = priced.into_order(OrderId::generate(), test_clock().now());
//!
//! let id = store.create(order).await?;
//! assert_eq!(store.get(id).await?.shop_id.as_str(), "s1");
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use bookstore_core::environment::Clock;

mod memory_store;

pub use memory_store::InMemoryOrderStore;

/// Mock implementations of environment traits and stores.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use bookstore_core::{Order, OrderFilter, OrderId, OrderStore, StoreError, StoreFuture};

    pub use crate::memory_store::InMemoryOrderStore;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use bookstore_testing::mocks::FixedClock;
    /// use bookstore_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Store whose every operation fails with [`StoreError::Database`].
    ///
    /// Stands in for an unreachable database.
    #[derive(Debug, Clone)]
    pub struct FailingOrderStore {
        message: String,
    }

    impl FailingOrderStore {
        /// Create a store failing with the given message
        #[must_use]
        pub fn new(message: impl Into<String>) -> Self {
            Self {
                message: message.into(),
            }
        }

        fn fail<T: Send + 'static>(&self) -> StoreFuture<'_, T> {
            let error = StoreError::Database(self.message.clone());
            Box::pin(async move { Err(error) })
        }
    }

    impl Default for FailingOrderStore {
        fn default() -> Self {
            Self::new("connection refused")
        }
    }

    impl OrderStore for FailingOrderStore {
        fn create(&self, _order: Order) -> StoreFuture<'_, OrderId> {
            self.fail()
        }

        fn get(&self, _id: OrderId) -> StoreFuture<'_, Order> {
            self.fail()
        }

        fn find(&self, _filter: OrderFilter) -> StoreFuture<'_, Vec<Order>> {
            self.fail()
        }

        fn replace(
            &self,
            _order: Order,
            _expected_updated_at: DateTime<Utc>,
        ) -> StoreFuture<'_, Order> {
            self.fail()
        }

        fn ping(&self) -> StoreFuture<'_, ()> {
            self.fail()
        }
    }
}

/// Builders for common test inputs.
pub mod helpers {
    use bookstore_core::{BookId, ClientId, LineInput, Money, OrderDraft, ShopId, UserId};

    /// A line without a caller-supplied total.
    #[must_use]
    pub const fn line(book_id: u64, quantity: i64, price: i64) -> LineInput {
        LineInput::new(BookId::new(book_id), quantity, Money::from_minor(price))
    }

    /// A valid two-line draft for the given shop and client, registered by `u1`.
    ///
    /// Prices to a total of 50 over 3 books.
    #[must_use]
    pub fn draft(shop: &str, client: &str) -> OrderDraft {
        draft_with_lines(shop, client, vec![line(1, 2, 10), line(2, 1, 30)])
    }

    /// A draft with explicit lines.
    #[must_use]
    pub fn draft_with_lines(shop: &str, client: &str, lines: Vec<LineInput>) -> OrderDraft {
        OrderDraft::new(
            UserId::new("u1"),
            ClientId::new(client),
            ShopId::new(shop),
            lines,
        )
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use super::helpers;
    use bookstore_core::{BookId, LineInput, Money, OrderDraft};
    use proptest::prelude::*;

    /// Lines with positive quantities and non-negative prices.
    ///
    /// The price is derived from the book id, so repeated books always agree.
    pub fn valid_line() -> impl Strategy<Value = LineInput> {
        (1u64..40, 1i64..500).prop_map(|(book, quantity)| {
            let price = i64::try_from(book).unwrap_or(0) * 125;
            LineInput::new(BookId::new(book), quantity, Money::from_minor(price))
        })
    }

    /// Drafts that always pass validation.
    pub fn valid_draft() -> impl Strategy<Value = OrderDraft> {
        (
            prop::sample::select(vec!["s1", "s2", "s3"]),
            prop::sample::select(vec!["c1", "c2"]),
            prop::collection::vec(valid_line(), 1..12),
        )
            .prop_map(|(shop, client, lines)| helpers::draft_with_lines(shop, client, lines))
    }
}

// Re-export commonly used items
pub use mocks::{FailingOrderStore, FixedClock, test_clock};

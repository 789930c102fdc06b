//! # Bookstore Core
//!
//! Domain types and pure logic for the bookstore order subsystem.
//!
//! This crate has no runtime and performs no I/O. It provides:
//!
//! - **Order model**: [`Order`], [`OrderLine`], identifiers and [`Money`]
//! - **Pricing engine**: [`validate_and_compute`], deterministic and side-effect free
//! - **Store contract**: the [`OrderStore`] trait implemented by backends
//! - **Events**: [`OrderEvent`] pushed to subscribers after a committed write
//! - **Environment**: the [`environment::Clock`] abstraction for testable time
//!
//! ## Example
//!
//! ```
//! use bookstore_core::{validate_and_compute, BookId, ClientId, LineInput, Money, OrderDraft, ShopId, UserId};
//!
//! let draft = OrderDraft::new(
//!     UserId::new("u1"),
//!     ClientId::new("c1"),
//!     ShopId::new("s1"),
//!     vec![LineInput::new(BookId::new(1), 2, Money::from_minor(10))],
//! );
//!
//! let priced = validate_and_compute(&draft).unwrap();
//! assert_eq!(priced.total, Money::from_minor(20));
//! assert_eq!(priced.total_books, 2);
//! ```

pub mod event;
pub mod order;
pub mod page;
pub mod pricing;
pub mod store;

pub use event::{Interest, OrderEvent};
pub use order::{BookId, ClientId, Money, Order, OrderId, OrderLine, ShopId, UserId};
pub use page::{Direction, Page, PageError, PageRequest, Sort, SortField};
pub use pricing::{LineInput, OrderDraft, PricedOrder, ValidationError, validate_and_compute};
pub use store::{OrderFilter, OrderStore, OrderStoreExt, StoreError, StoreFuture, StoredDocument};

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

/// Environment module - Dependency injection traits
///
/// External dependencies are abstracted behind traits and injected into the
/// service, so tests can substitute deterministic implementations.
pub mod environment {
    use chrono::{DateTime, SubsecRound, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use bookstore_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let earlier = clock.now();
    /// assert!(clock.now() >= earlier);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    ///
    /// Truncated to whole microseconds, the precision of `TIMESTAMPTZ`, so a
    /// timestamp survives a database round trip unchanged.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now().trunc_subsecs(6)
        }
    }
}

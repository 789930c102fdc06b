//! Application state for Axum handlers.

use axum::extract::FromRef;
use bookstore_runtime::{Notifier, OrderService};

/// State shared across all HTTP handlers.
///
/// Handlers extract the part they need directly, e.g.
/// `State(service): State<OrderService>`.
#[derive(Clone, FromRef)]
pub struct AppState {
    /// Order use cases.
    pub orders: OrderService,
    /// Notifier the service publishes to; websocket clients subscribe here.
    pub notifier: Notifier,
}

impl AppState {
    /// Build state around a service, sharing its notifier.
    #[must_use]
    pub fn new(orders: OrderService) -> Self {
        let notifier = orders.notifier().clone();
        Self { orders, notifier }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_clone() {
        fn assert_clone<T: Clone + Send + Sync + 'static>() {}
        assert_clone::<AppState>();
    }
}

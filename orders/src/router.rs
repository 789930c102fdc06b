//! Order API router.
//!
//! Composes all order handlers, the notification socket and the health
//! checks into a single Axum router.

use crate::handlers;
use axum::{routing::get, Router};
use bookstore_web::handlers::{health_check, readiness, websocket};
use bookstore_web::{request_context_layer, AppState};
use tower_http::trace::TraceLayer;

/// Create the order API router.
///
/// # Routes
///
/// - `POST /orders` - Place a new order
/// - `GET /orders?page=&size=` - Page through active orders
/// - `GET /orders/:id` - Get order details
/// - `PUT /orders/:id` - Replace an order's lines
/// - `DELETE /orders/:id` - Soft-delete an order
/// - `GET /shops/:shop_id/orders` - Active orders of a shop
/// - `GET /clients/:client_id/orders` - Active orders of a client
/// - `GET /users/:user_id/orders` - Active orders registered by a user
/// - `GET /ws/orders` - WebSocket order notifications
/// - `GET /health`, `GET /health/ready` - Liveness and readiness
pub fn order_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/orders",
            get(handlers::list_orders).post(handlers::place_order),
        )
        .route(
            "/orders/:id",
            get(handlers::get_order)
                .put(handlers::update_order)
                .delete(handlers::delete_order),
        )
        .route("/shops/:shop_id/orders", get(handlers::list_shop_orders))
        .route("/clients/:client_id/orders", get(handlers::list_client_orders))
        .route("/users/:user_id/orders", get(handlers::list_user_orders))
        .route("/ws/orders", get(websocket::handle))
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness))
        .layer(TraceLayer::new_for_http())
        .layer(request_context_layer())
        .with_state(state)
}

//! Health check endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health.

use axum::{extract::State, http::StatusCode, Json};
use bookstore_runtime::OrderService;
use serde::Serialize;

/// Simple health check endpoint (for basic liveness).
///
/// Returns 200 OK to indicate the service is running.
/// This endpoint does NOT check dependencies.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Readiness report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Readiness {
    /// `ready` or `unavailable`.
    pub status: &'static str,
    /// Whether the order store answered.
    pub store: bool,
    /// Live websocket subscriptions, when the notifier answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribers: Option<usize>,
}

/// Readiness check.
///
/// Pings the order store and asks the notifier for its subscriber count.
///
/// # Status Codes
///
/// - 200 OK: the store answers and the notifier task is running
/// - 503 Service Unavailable: either check failed
///
/// # Endpoint
///
/// ```text
/// GET /health/ready
/// ```
///
/// # Response
///
/// ```json
/// { "status": "ready", "store": true, "subscribers": 3 }
/// ```
pub async fn readiness(State(service): State<OrderService>) -> (StatusCode, Json<Readiness>) {
    let store = match service.check_store().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Order store is not reachable");
            false
        }
    };

    let subscribers = match service.notifier().subscriber_count().await {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!(error = %e, "Notifier is not running");
            None
        }
    };

    let (status, label) = if store && subscribers.is_some() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    };

    (
        status,
        Json(Readiness {
            status: label,
            store,
            subscribers,
        }),
    )
}

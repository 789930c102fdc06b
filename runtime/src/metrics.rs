//! Prometheus metrics for the order service and notifier.
//!
//! Recording goes through the `metrics` facade; nothing is exported until a
//! recorder is installed with [`MetricsServer::start`].
//!
//! # Example
//!
//! ```rust,no_run
//! use bookstore_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Serve metrics on port 9090
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use thiserror::Error;

pub use metrics::{counter, gauge};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics server.
///
/// Exposes metrics on an HTTP endpoint for Prometheus scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address to bind to (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Install the recorder and start the HTTP listener.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Build`] if the listener cannot bind, or
    /// [`MetricsError::Install`] if a recorder is already installed.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let (recorder, exporter) = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .build()
            .map_err(|e| MetricsError::Build(e.to_string()))?;
        let handle = recorder.handle();

        metrics::set_global_recorder(recorder)
            .map_err(|e| MetricsError::Install(e.to_string()))?;

        tokio::spawn(async move {
            if exporter.await.is_err() {
                tracing::error!("Metrics exporter stopped");
            }
        });

        self.handle = Some(handle);
        tracing::info!(addr = %self.addr, "Metrics available at http://{}/metrics", self.addr);
        Ok(())
    }

    /// Address the server was configured with.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if server hasn't been started.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!("orders_placed_total", "Orders persisted by place_order");
    describe_counter!("orders_updated_total", "Orders modified by update_order");
    describe_counter!("orders_deleted_total", "Orders soft-deleted");
    describe_counter!(
        "orders_rejected_total",
        "Order drafts that failed validation"
    );
    describe_counter!(
        "orders_notifications_skipped_total",
        "Committed writes whose notification could not be queued"
    );

    describe_counter!(
        "notifications_delivered_total",
        "Events handed to a subscriber queue"
    );
    describe_counter!(
        "notifications_subscribers_dropped_total",
        "Subscribers removed after failed deliveries"
    );
    describe_gauge!("notifications_subscribers", "Currently registered subscribers");

    describe_counter!("orders_cache_hits_total", "Order reads served from the cache");
    describe_counter!("orders_cache_misses_total", "Order reads that went to the store");
}

/// Order service metrics recorder.
pub struct OrderMetrics;

impl OrderMetrics {
    /// Record a placed order.
    pub fn record_placed() {
        counter!("orders_placed_total").increment(1);
    }

    /// Record an updated order.
    pub fn record_updated() {
        counter!("orders_updated_total").increment(1);
    }

    /// Record a soft delete.
    pub fn record_deleted() {
        counter!("orders_deleted_total").increment(1);
    }

    /// Record a draft rejected by validation.
    pub fn record_rejected() {
        counter!("orders_rejected_total").increment(1);
    }

    /// Record a notification that was not queued.
    pub fn record_notification_skipped() {
        counter!("orders_notifications_skipped_total").increment(1);
    }
}

/// Notifier metrics recorder.
pub struct NotifierMetrics;

impl NotifierMetrics {
    /// Record successful deliveries.
    pub fn record_delivered(count: usize) {
        counter!("notifications_delivered_total").increment(count as u64);
    }

    /// Record a dropped subscriber.
    pub fn record_dropped() {
        counter!("notifications_subscribers_dropped_total").increment(1);
    }

    /// Record the current number of subscribers.
    #[allow(clippy::cast_precision_loss)]
    pub fn record_subscribers(count: usize) {
        gauge!("notifications_subscribers").set(count as f64);
    }
}

/// Order cache metrics recorder.
pub struct CacheMetrics;

impl CacheMetrics {
    /// Record a read served from the cache.
    pub fn record_hit() {
        counter!("orders_cache_hits_total").increment(1);
    }

    /// Record a read that went to the store.
    pub fn record_miss() {
        counter!("orders_cache_misses_total").increment(1);
    }
}

//! Bookstore order server.
//!
//! Wires the order service to HTTP and WebSocket endpoints:
//!
//! - [`config`]: environment-driven configuration
//! - [`handlers`]: JSON request/response translation
//! - [`router`]: the Axum route table
//!
//! # Example
//!
//! ```no_run
//! use bookstore_core::environment::SystemClock;
//! use bookstore_orders::router::order_router;
//! use bookstore_runtime::{Notifier, NotifierConfig, OrderService};
//! use bookstore_testing::InMemoryOrderStore;
//! use bookstore_web::AppState;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = OrderService::new(
//!     Arc::new(InMemoryOrderStore::new()),
//!     Notifier::spawn(NotifierConfig::default()),
//!     Arc::new(SystemClock),
//! );
//!
//! let app = order_router(AppState::new(service));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod handlers;
pub mod router;

pub use config::{Config, ConfigError, ServerConfig, StorageConfig};
pub use router::order_router;

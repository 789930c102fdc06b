//! Axum integration for the bookstore order subsystem.
//!
//! This crate holds the HTTP plumbing that is not specific to a route table:
//!
//! - [`AppError`]: maps service errors to status codes and JSON bodies
//! - [`ValidJson`] / [`ValidQuery`]: extractors whose rejections are
//!   [`AppError`]s
//! - [`middleware::request_context_layer`]: correlation ids, request spans
//!   and request metrics
//! - [`handlers::health`]: liveness and readiness checks
//! - [`handlers::websocket`]: the order notification socket
//!
//! # Request Flow
//!
//! 1. **HTTP Request** arrives at an Axum handler
//! 2. **Extract data** from the request (JSON, path, query)
//! 3. **Call** the [`bookstore_runtime::OrderService`]
//! 4. **Map result** to an HTTP response, errors through [`AppError`]

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod state;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{CorrelationId, ValidJson, ValidQuery};
pub use middleware::{request_context_layer, CORRELATION_ID_HEADER};
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

//! Error types for web handlers.
//!
//! [`AppError`] bridges service errors and HTTP responses. Every error body
//! has the same shape:
//!
//! ```json
//! { "code": "NOT_FOUND", "message": "Order with id ... not found" }
//! ```

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bookstore_core::PageError;
use bookstore_runtime::OrderError;
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// Implements Axum's `IntoResponse`, so handlers can return
/// `Result<T, AppError>` and use `?` on service calls.
///
/// # Examples
///
/// ```ignore
/// async fn handler(State(service): State<OrderService>, Path(id): Path<String>)
///     -> Result<Json<Order>, AppError>
/// {
///     let id = id.parse().map_err(|_| AppError::bad_request("malformed order id"))?;
///     Ok(Json(service.get_order(id).await?))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: &'static str,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code,
            source: None,
        }
    }

    /// Attach the underlying error for logging.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// Create a 400 error for a draft the pricing engine rejected.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{resource} with id {id} not found"),
        )
    }

    /// Create a 409 Conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR", message)
    }

    /// Create a 503 Service Unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }

    /// HTTP status of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    /// User-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse<'a> {
    /// Error code (for client error handling).
    code: &'a str,
    /// Human-readable error message.
    message: &'a str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    error = %source,
                    "Request failed"
                ),
                None => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    "Request failed"
                ),
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: &self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Validation(e) => Self::validation(e.to_string()),
            OrderError::NotFound(id) => Self::not_found("Order", id),
            OrderError::Conflict(id) => Self::conflict(format!(
                "Order {id} was modified concurrently; reload and retry"
            )),
            OrderError::Deleted(id) => Self::new(
                StatusCode::CONFLICT,
                "ORDER_DELETED",
                format!("Order {id} is deleted and cannot be changed"),
            ),
            OrderError::Persistence(source) => {
                Self::internal("An internal error occurred").with_source(source.into())
            }
        }
    }
}

/// Body that is not JSON, or JSON that does not fit the request type.
///
/// A missing field or a value of the wrong type is a validation error; a
/// syntax error or a missing content type is a plain bad request.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(e) => Self::validation(e.body_text()),
            other => Self::bad_request(other.body_text()),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PageError> for AppError {
    fn from(err: PageError) -> Self {
        Self::bad_request(err.to_string())
    }
}

/// Convert `anyhow::Error` to `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use bookstore_core::{OrderId, StoreError, ValidationError};

    async fn body_json(error: AppError) -> serde_json::Value {
        let response = error.into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid input");
    }

    #[test]
    fn test_not_found() {
        let err = AppError::not_found("Order", "123");
        assert_eq!(err.to_string(), "[NOT_FOUND] Order with id 123 not found");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn order_errors_map_to_statuses() {
        let id = OrderId::generate();

        let cases = [
            (
                OrderError::Validation(ValidationError::EmptyOrder),
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
            ),
            (OrderError::NotFound(id), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (OrderError::Conflict(id), StatusCode::CONFLICT, "CONFLICT"),
            (OrderError::Deleted(id), StatusCode::CONFLICT, "ORDER_DELETED"),
            (
                OrderError::Persistence(StoreError::Database("boom".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
            ),
        ];

        for (error, status, code) in cases {
            let app_error = AppError::from(error);
            assert_eq!(app_error.status(), status);
            assert_eq!(app_error.code(), code);
        }
    }

    #[tokio::test]
    async fn persistence_details_stay_internal() {
        let error = AppError::from(OrderError::Persistence(StoreError::Database(
            "password authentication failed for user bookstore".into(),
        )));

        let body = body_json(error).await;

        assert_eq!(body["code"], "INTERNAL_SERVER_ERROR");
        assert_eq!(body["message"], "An internal error occurred");
    }

    #[test]
    fn paging_errors_are_bad_requests() {
        let err = AppError::from(PageError::InvalidSize(0));

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "size must be between 1 and 100, got 0");
    }

    #[tokio::test]
    async fn validation_message_is_exposed() {
        let body = body_json(AppError::from(OrderError::Validation(
            ValidationError::EmptyOrder,
        )))
        .await;

        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["message"], "order must contain at least one line");
    }
}

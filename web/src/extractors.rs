//! Custom Axum extractors.

use crate::error::AppError;
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts},
    http::request::Parts,
};
use std::fmt;
use uuid::Uuid;

/// JSON body whose rejections are answered as [`AppError`]s.
///
/// Axum's own [`axum::Json`] answers a missing field or a wrong type with
/// `422` and a plain-text body. This wrapper turns those into `400` with the
/// usual `{"code", "message"}` body.
///
/// # Example
///
/// ```ignore
/// async fn place_order(ValidJson(request): ValidJson<OrderRequest>) -> WebResult<Json<Order>> {
///     // ...
/// }
/// ```
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ValidJson<T>(pub T);

/// Query string whose rejections are answered as [`AppError`]s.
#[derive(Debug, Clone, Copy, Default, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ValidQuery<T>(pub T);

/// Correlation ID for request tracing.
///
/// Reads the id assigned by [`crate::middleware::request_context_layer`].
/// Without the middleware it falls back to the `X-Correlation-ID` header,
/// or a new UUID v4.
///
/// # Example
///
/// ```ignore
/// async fn handler(correlation_id: CorrelationId) -> String {
///     format!("Request ID: {correlation_id}")
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationId(pub Uuid);

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = parts.extensions.get::<Self>() {
            return Ok(*id);
        }
        Ok(Self::from_headers(&parts.headers))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::middleware::CORRELATION_ID_HEADER;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::routing::{get, post};
    use axum::Router;
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Debug, Deserialize)]
    struct Line {
        #[allow(dead_code)]
        quantity: i64,
    }

    #[derive(Debug, Deserialize)]
    struct Paging {
        #[allow(dead_code)]
        size: u32,
    }

    #[allow(clippy::unused_async)]
    async fn accept_line(ValidJson(_line): ValidJson<Line>) -> StatusCode {
        StatusCode::NO_CONTENT
    }

    #[allow(clippy::unused_async)]
    async fn accept_paging(ValidQuery(_paging): ValidQuery<Paging>) -> StatusCode {
        StatusCode::NO_CONTENT
    }

    fn app() -> Router {
        Router::new()
            .route("/lines", post(accept_line))
            .route("/pages", get(accept_paging))
    }

    async fn call(request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(body: &'static str) -> Request<Body> {
        Request::post("/lines")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn well_formed_body_is_accepted() {
        let (status, _) = call(post_json(r#"{"quantity": 2}"#)).await;

        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn missing_field_is_a_validation_error() {
        let (status, body) = call(post_json("{}")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert!(body["message"].as_str().unwrap().contains("quantity"));
    }

    #[tokio::test]
    async fn wrong_type_is_a_validation_error() {
        let (status, body) = call(post_json(r#"{"quantity": 1.5}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn syntax_error_is_a_bad_request() {
        let (status, body) = call(post_json("{oops")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn missing_content_type_is_a_bad_request() {
        let request = Request::post("/lines")
            .body(Body::from(r#"{"quantity": 2}"#))
            .unwrap();

        let (status, body) = call(request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn unparsable_query_is_a_bad_request() {
        let request = Request::get("/pages?size=-1").body(Body::empty()).unwrap();

        let (status, body) = call(request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn falls_back_to_header() {
        let id = Uuid::new_v4();
        let (mut parts, ()) = Request::builder()
            .header(CORRELATION_ID_HEADER, id.to_string())
            .body(())
            .unwrap()
            .into_parts();

        let extracted = CorrelationId::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(extracted, CorrelationId(id));
    }

    #[tokio::test]
    async fn prefers_extension() {
        let id = CorrelationId(Uuid::new_v4());
        let (mut parts, ()) = Request::builder()
            .header(CORRELATION_ID_HEADER, Uuid::new_v4().to_string())
            .body(())
            .unwrap()
            .into_parts();
        parts.extensions.insert(id);

        let extracted = CorrelationId::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(extracted, id);
    }
}

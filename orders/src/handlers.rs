//! HTTP handlers for the order API.
//!
//! Handlers only translate between JSON and the [`OrderService`]; all rules
//! live in the pricing engine and the service.

use axum::{
    extract::{OriginalUri, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use bookstore_core::{
    BookId, ClientId, Direction, LineInput, Money, Order, OrderDraft, OrderId, Page, PageError,
    PageRequest, ShopId, Sort, SortField, UserId,
};
use bookstore_core::page::DEFAULT_PAGE_SIZE;
use bookstore_runtime::OrderService;
use bookstore_web::{AppError, ValidJson, ValidQuery, WebResult};
use serde::{Deserialize, Serialize};

/// Body of `POST /orders` and `PUT /orders/:id`.
///
/// `total` and `totalBooks` are optional; when present they must agree with
/// the computed values.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    /// User registering the order.
    pub user_id: UserId,

    /// Client the order is for.
    pub client_id: ClientId,

    /// Shop the order is placed in.
    pub shop_id: ShopId,

    /// Requested lines.
    #[serde(alias = "lines")]
    pub order_lines: Vec<OrderLineRequest>,

    /// Caller-computed order total.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<Money>,

    /// Caller-computed number of books.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_books: Option<u64>,
}

/// One requested line.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRequest {
    /// Book identifier.
    pub book_id: BookId,

    /// Number of copies.
    pub quantity: i64,

    /// Unit price in minor currency units.
    pub price: Money,

    /// Caller-computed line total.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<Money>,
}

impl From<OrderRequest> for OrderDraft {
    fn from(request: OrderRequest) -> Self {
        let lines = request
            .order_lines
            .into_iter()
            .map(|line| LineInput {
                book_id: line.book_id,
                quantity: line.quantity,
                price: line.price,
                total: line.total,
            })
            .collect();

        Self {
            user_id: request.user_id,
            client_id: request.client_id,
            shop_id: request.shop_id,
            lines,
            total: request.total,
            total_books: request.total_books,
        }
    }
}

/// Query string of `GET /orders`.
///
/// Out-of-range numbers and unknown sort names are rejected, never clamped.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    /// Zero-based page index.
    pub page: Option<i64>,
    /// Items per page.
    pub size: Option<i64>,
    /// Field to sort by, e.g. `total`.
    pub order_by: Option<String>,
    /// `ASC` or `DESC`.
    pub order: Option<String>,
}

impl TryFrom<PageQuery> for PageRequest {
    type Error = PageError;

    fn try_from(query: PageQuery) -> Result<Self, Self::Error> {
        let field = query
            .order_by
            .as_deref()
            .map_or(Ok(SortField::default()), str::parse)?;
        let direction = query
            .order
            .as_deref()
            .map_or(Ok(Direction::default()), str::parse)?;

        Ok(Self::checked(
            query.page.unwrap_or(0),
            query.size.unwrap_or_else(|| i64::from(DEFAULT_PAGE_SIZE)),
        )?
        .with_sort(Sort::new(field, direction)))
    }
}

/// `Link` header value pointing at the neighbouring and outer pages.
///
/// `next` and `last` are present while later pages exist; `prev` and
/// `first` while earlier ones do. Empty for a single page.
#[must_use]
pub fn pagination_links<T>(path: &str, page: &Page<T>) -> String {
    let uri = |index: u64| {
        format!(
            "{path}?page={index}&size={}&orderBy={}&order={}",
            page.size, page.sort.field, page.sort.direction
        )
    };

    let current = u64::from(page.page);
    let mut links = Vec::new();
    if page.has_next() {
        links.push(format!("<{}>; rel=\"next\"", uri(current + 1)));
    }
    if page.has_previous() {
        let previous = current.min(page.total_pages).saturating_sub(1);
        links.push(format!("<{}>; rel=\"prev\"", uri(previous)));
        links.push(format!("<{}>; rel=\"first\"", uri(0)));
    }
    if page.has_next() {
        links.push(format!("<{}>; rel=\"last\"", uri(page.last_page())));
    }
    links.join(", ")
}

fn parse_id(raw: &str) -> WebResult<OrderId> {
    raw.parse()
        .map_err(|_| AppError::bad_request(format!("malformed order id: {raw}")))
}

/// Place a new order.
///
/// # Endpoint
///
/// ```text
/// POST /orders
/// Content-Type: application/json
///
/// {
///   "userId": "u1",
///   "clientId": "c1",
///   "shopId": "s1",
///   "orderLines": [{ "bookId": 1, "quantity": 2, "price": 10 }]
/// }
/// ```
///
/// # Response
///
/// `201 Created` with the stored order and a `Location` header.
///
/// # Errors
///
/// - 400: the body is not JSON, misses a field, or fails validation
/// - 500: the order could not be stored
pub async fn place_order(
    State(service): State<OrderService>,
    ValidJson(request): ValidJson<OrderRequest>,
) -> WebResult<impl IntoResponse> {
    let order = service.place_order(request.into()).await?.value;

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/orders/{}", order.id))],
        Json(order),
    ))
}

/// Fetch one order, including soft-deleted ones.
///
/// ```text
/// GET /orders/:id
/// ```
///
/// # Errors
///
/// - 400: malformed id
/// - 404: no such order
pub async fn get_order(
    State(service): State<OrderService>,
    Path(id): Path<String>,
) -> WebResult<Json<Order>> {
    let id = parse_id(&id)?;
    Ok(Json(service.get_order(id).await?))
}

/// Page through all active orders, oldest first unless a sort is given.
///
/// ```text
/// GET /orders?page=0&size=10&orderBy=total&order=DESC
/// ```
///
/// The response carries a `Link` header with `next`, `prev`, `first` and
/// `last` relations where they apply.
///
/// # Errors
///
/// - 400: negative page, size outside `1..=100`, or unknown sort
/// - 500: the store could not be read
pub async fn list_orders(
    State(service): State<OrderService>,
    OriginalUri(uri): OriginalUri,
    ValidQuery(query): ValidQuery<PageQuery>,
) -> WebResult<(HeaderMap, Json<Page<Order>>)> {
    let request = PageRequest::try_from(query)?;
    let page = service.list_orders(request).await?;

    let mut headers = HeaderMap::new();
    let links = pagination_links(uri.path(), &page);
    if !links.is_empty() {
        let value = HeaderValue::from_str(&links)
            .map_err(|e| AppError::internal("invalid Link header").with_source(e.into()))?;
        headers.insert(header::LINK, value);
    }

    Ok((headers, Json(page)))
}

/// Replace an order's ids and lines. Totals are recomputed.
///
/// ```text
/// PUT /orders/:id
/// ```
///
/// # Errors
///
/// - 400: malformed id or invalid draft
/// - 404: no such order
/// - 409: the order was deleted or concurrently modified
pub async fn update_order(
    State(service): State<OrderService>,
    Path(id): Path<String>,
    ValidJson(request): ValidJson<OrderRequest>,
) -> WebResult<Json<Order>> {
    let id = parse_id(&id)?;
    Ok(Json(service.update_order(id, request.into()).await?.value))
}

/// Soft-delete an order and return its final state.
///
/// ```text
/// DELETE /orders/:id
/// ```
///
/// # Errors
///
/// - 400: malformed id
/// - 404: no such order
/// - 409: already deleted
pub async fn delete_order(
    State(service): State<OrderService>,
    Path(id): Path<String>,
) -> WebResult<Json<Order>> {
    let id = parse_id(&id)?;
    Ok(Json(service.delete_order(id).await?.value))
}

/// Active orders of a shop. An unknown shop yields an empty list.
///
/// ```text
/// GET /shops/:shop_id/orders
/// ```
///
/// # Errors
///
/// - 500: the store could not be read
pub async fn list_shop_orders(
    State(service): State<OrderService>,
    Path(shop_id): Path<ShopId>,
) -> WebResult<Json<Vec<Order>>> {
    Ok(Json(service.list_orders_for_shop(&shop_id).await?))
}

/// Active orders of a client.
///
/// # Errors
///
/// - 500: the store could not be read
pub async fn list_client_orders(
    State(service): State<OrderService>,
    Path(client_id): Path<ClientId>,
) -> WebResult<Json<Vec<Order>>> {
    Ok(Json(service.list_orders_for_client(&client_id).await?))
}

/// Active orders registered by a user.
///
/// # Errors
///
/// - 500: the store could not be read
pub async fn list_user_orders(
    State(service): State<OrderService>,
    Path(user_id): Path<UserId>,
) -> WebResult<Json<Vec<Order>>> {
    Ok(Json(service.list_orders_for_user(&user_id).await?))
}

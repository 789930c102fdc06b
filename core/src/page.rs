//! Offset pagination and sorting for order listings.
//!
//! A [`PageRequest`] names a zero-based page, a page size and a [`Sort`].
//! [`Page::from_items`] cuts that page out of a sorted result set and
//! reports where it sits among the other pages, so callers can build
//! navigation links.

use crate::order::Order;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Largest page size a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Default page size when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Rejected paging or sorting parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    /// Negative or oversized page index.
    #[error("page must be a non-negative index, got {0}")]
    InvalidPage(i64),

    /// Page size outside `1..=MAX_PAGE_SIZE`.
    #[error("size must be between 1 and {MAX_PAGE_SIZE}, got {0}")]
    InvalidSize(i64),

    /// `orderBy` names no sortable field.
    #[error("cannot sort by {0:?}")]
    UnknownSortField(String),

    /// `order` is neither `ASC` nor `DESC`.
    #[error("order must be ASC or DESC, got {0:?}")]
    UnknownDirection(String),
}

/// Order attribute a listing can be sorted by.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    /// Order id.
    Id,
    /// Creation time.
    #[default]
    CreatedAt,
    /// Last modification time.
    UpdatedAt,
    /// Order total.
    Total,
    /// Number of books.
    TotalBooks,
    /// Shop id.
    ShopId,
    /// Client id.
    ClientId,
    /// Registering user id.
    UserId,
}

impl SortField {
    /// Query-string name of the field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::CreatedAt => "createdAt",
            Self::UpdatedAt => "updatedAt",
            Self::Total => "total",
            Self::TotalBooks => "totalBooks",
            Self::ShopId => "shopId",
            Self::ClientId => "clientId",
            Self::UserId => "userId",
        }
    }

    fn compare(self, a: &Order, b: &Order) -> Ordering {
        match self {
            Self::Id => a.id.cmp(&b.id),
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
            Self::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            Self::Total => a.total.cmp(&b.total),
            Self::TotalBooks => a.total_books.cmp(&b.total_books),
            Self::ShopId => a.shop_id.as_str().cmp(b.shop_id.as_str()),
            Self::ClientId => a.client_id.as_str().cmp(b.client_id.as_str()),
            Self::UserId => a.user_id.as_str().cmp(b.user_id.as_str()),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortField {
    type Err = PageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Self::Id,
            Self::CreatedAt,
            Self::UpdatedAt,
            Self::Total,
            Self::TotalBooks,
            Self::ShopId,
            Self::ClientId,
            Self::UserId,
        ]
        .into_iter()
        .find(|field| field.as_str() == s.trim())
        .ok_or_else(|| PageError::UnknownSortField(s.to_string()))
    }
}

/// Sort direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Smallest first.
    #[default]
    Asc,
    /// Largest first.
    Desc,
}

impl Direction {
    /// Query-string name of the direction.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = PageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            _ => Err(PageError::UnknownDirection(s.to_string())),
        }
    }
}

/// How a listing is ordered.
///
/// Ties on the chosen field fall back to creation time, then id, so the
/// order is total and pages never overlap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sort {
    /// Field compared first.
    #[serde(rename = "sortBy")]
    pub field: SortField,
    /// Direction applied to the whole ordering.
    pub direction: Direction,
}

impl Sort {
    /// Sort by `field` in `direction`.
    #[must_use]
    pub const fn new(field: SortField, direction: Direction) -> Self {
        Self { field, direction }
    }

    /// Compares two orders under this sort.
    #[must_use]
    pub fn compare(&self, a: &Order, b: &Order) -> Ordering {
        let ordering = self
            .field
            .compare(a, b)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id));

        match self.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    }

    /// Sorts `orders` in place.
    pub fn apply(&self, orders: &mut [Order]) {
        orders.sort_by(|a, b| self.compare(a, b));
    }
}

/// Zero-based page request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    size: u32,
    sort: Sort,
}

impl PageRequest {
    /// Creates a request; `size` is clamped to `1..=MAX_PAGE_SIZE`.
    #[must_use]
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size: size.clamp(1, MAX_PAGE_SIZE),
            sort: Sort::default(),
        }
    }

    /// Creates a request from caller input, rejecting out-of-range values.
    ///
    /// # Errors
    ///
    /// - [`PageError::InvalidPage`]: `page` is negative
    /// - [`PageError::InvalidSize`]: `size` is outside `1..=MAX_PAGE_SIZE`
    pub fn checked(page: i64, size: i64) -> Result<Self, PageError> {
        let page = u32::try_from(page).map_err(|_| PageError::InvalidPage(page))?;
        let size = u32::try_from(size)
            .ok()
            .filter(|size| (1..=MAX_PAGE_SIZE).contains(size))
            .ok_or(PageError::InvalidSize(size))?;

        Ok(Self {
            page,
            size,
            sort: Sort::default(),
        })
    }

    /// Replaces the sort.
    #[must_use]
    pub const fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    /// Zero-based page index.
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// Items per page.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Requested ordering.
    #[must_use]
    pub const fn sort(&self) -> Sort {
        self.sort
    }

    /// Index of the first item on this page.
    #[must_use]
    pub fn offset(&self) -> usize {
        (self.page as usize).saturating_mul(self.size as usize)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE)
    }
}

/// One page of results.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items on this page.
    pub content: Vec<T>,
    /// Zero-based page index.
    pub page: u32,
    /// Requested page size.
    pub size: u32,
    /// Items across all pages.
    pub total_elements: u64,
    /// Number of pages.
    pub total_pages: u64,
    /// Ordering the items were cut from.
    #[serde(flatten)]
    pub sort: Sort,
}

impl<T> Page<T> {
    /// Cuts the requested page out of the full, already sorted result set.
    #[must_use]
    pub fn from_items(items: Vec<T>, request: PageRequest) -> Self {
        let total_elements = items.len() as u64;
        let total_pages = total_elements.div_ceil(u64::from(request.size()));
        let content = items
            .into_iter()
            .skip(request.offset())
            .take(request.size() as usize)
            .collect();

        Self {
            content,
            page: request.page(),
            size: request.size(),
            total_elements,
            total_pages,
            sort: request.sort(),
        }
    }

    /// Whether a later page holds items.
    #[must_use]
    pub fn has_next(&self) -> bool {
        u64::from(self.page) + 1 < self.total_pages
    }

    /// Whether an earlier page exists.
    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.page > 0
    }

    /// Index of the last page; zero when there are no items.
    #[must_use]
    pub const fn last_page(&self) -> u64 {
        self.total_pages.saturating_sub(1)
    }
}

//! Pricing and validation engine.
//!
//! [`validate_and_compute`] turns caller input into a priced order or a
//! [`ValidationError`]. It is a pure function: no clock, no ids, no I/O.
//!
//! Rules applied to an [`OrderDraft`]:
//!
//! - user, client and shop ids must not be blank
//! - the draft must contain at least one line
//! - every quantity must be positive, every price non-negative
//! - a caller-supplied line total must equal `quantity * price` exactly
//! - lines for the same book are merged; they must agree on the price
//! - a caller-supplied order total / book count must match the computed one

use crate::order::{BookId, ClientId, Money, Order, OrderId, OrderLine, ShopId, UserId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

/// Caller input that failed validation. Always user-correctable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required identifier was empty.
    #[error("{field} must not be blank")]
    BlankIdentifier {
        /// Name of the offending field.
        field: &'static str,
    },

    /// The order has no lines.
    #[error("order must contain at least one line")]
    EmptyOrder,

    /// A line quantity was zero or negative.
    #[error("book {book_id}: quantity must be positive, got {quantity}")]
    NonPositiveQuantity {
        /// Book of the offending line.
        book_id: BookId,
        /// Supplied quantity.
        quantity: i64,
    },

    /// A line price was negative.
    #[error("book {book_id}: price must not be negative, got {price}")]
    NegativePrice {
        /// Book of the offending line.
        book_id: BookId,
        /// Supplied price.
        price: Money,
    },

    /// The supplied line total disagrees with `quantity * price`.
    #[error("book {book_id}: line total {supplied} does not match computed {computed}")]
    LineTotalMismatch {
        /// Book of the offending line.
        book_id: BookId,
        /// Total sent by the caller.
        supplied: Money,
        /// Total computed from quantity and price.
        computed: Money,
    },

    /// Two lines for the same book carry different prices.
    #[error("book {book_id}: conflicting prices {first} and {second}")]
    ConflictingPrice {
        /// Book listed twice.
        book_id: BookId,
        /// Price of the first line.
        first: Money,
        /// Price of the later line.
        second: Money,
    },

    /// The supplied order total disagrees with the sum of the lines.
    #[error("order total {supplied} does not match computed {computed}")]
    OrderTotalMismatch {
        /// Total sent by the caller.
        supplied: Money,
        /// Sum of line totals.
        computed: Money,
    },

    /// The supplied book count disagrees with the sum of quantities.
    #[error("total books {supplied} does not match computed {computed}")]
    TotalBooksMismatch {
        /// Count sent by the caller.
        supplied: u64,
        /// Sum of quantities.
        computed: u64,
    },

    /// An amount or quantity does not fit the numeric range.
    #[error("amount out of range")]
    Overflow,
}

/// One requested line, as sent by the caller.
///
/// Quantity is signed so that non-positive input can be reported instead of
/// rejected at deserialization time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineInput {
    /// Book being ordered.
    pub book_id: BookId,
    /// Requested copies.
    pub quantity: i64,
    /// Unit price.
    pub price: Money,
    /// Optional caller-computed line total.
    pub total: Option<Money>,
}

impl LineInput {
    /// A line without a caller-supplied total.
    #[must_use]
    pub const fn new(book_id: BookId, quantity: i64, price: Money) -> Self {
        Self {
            book_id,
            quantity,
            price,
            total: None,
        }
    }

    /// Attaches a caller-computed total to be verified.
    #[must_use]
    pub const fn with_total(mut self, total: Money) -> Self {
        self.total = Some(total);
        self
    }
}

/// Unvalidated order input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderDraft {
    /// User registering the order.
    pub user_id: UserId,
    /// Client the order is for.
    pub client_id: ClientId,
    /// Shop the order is placed in.
    pub shop_id: ShopId,
    /// Requested lines.
    pub lines: Vec<LineInput>,
    /// Optional caller-computed order total.
    pub total: Option<Money>,
    /// Optional caller-computed book count.
    pub total_books: Option<u64>,
}

impl OrderDraft {
    /// A draft without caller-supplied order totals.
    #[must_use]
    pub const fn new(
        user_id: UserId,
        client_id: ClientId,
        shop_id: ShopId,
        lines: Vec<LineInput>,
    ) -> Self {
        Self {
            user_id,
            client_id,
            shop_id,
            lines,
            total: None,
            total_books: None,
        }
    }
}

impl From<&Order> for OrderDraft {
    fn from(order: &Order) -> Self {
        Self {
            user_id: order.user_id.clone(),
            client_id: order.client_id.clone(),
            shop_id: order.shop_id.clone(),
            lines: order
                .order_lines
                .iter()
                .map(|line| {
                    LineInput::new(line.book_id, i64::from(line.quantity), line.price)
                        .with_total(line.total)
                })
                .collect(),
            total: Some(order.total),
            total_books: Some(order.total_books),
        }
    }
}

/// Output of a successful validation: consistent lines and totals.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricedOrder {
    /// User registering the order.
    pub user_id: UserId,
    /// Client the order is for.
    pub client_id: ClientId,
    /// Shop the order is placed in.
    pub shop_id: ShopId,
    /// Merged lines with computed totals.
    pub lines: Vec<OrderLine>,
    /// Sum of line totals.
    pub total: Money,
    /// Sum of quantities.
    pub total_books: u64,
}

impl PricedOrder {
    /// Materializes a new, not yet persisted order.
    #[must_use]
    pub fn into_order(self, id: OrderId, now: DateTime<Utc>) -> Order {
        Order {
            id,
            user_id: self.user_id,
            client_id: self.client_id,
            shop_id: self.shop_id,
            order_lines: self.lines,
            total: self.total,
            total_books: self.total_books,
            created_at: now,
            updated_at: now,
            is_deleted: false,
        }
    }

    /// Overwrites the mutable fields of an existing order, keeping its
    /// identity and timestamps.
    pub fn apply_to(self, order: &mut Order) {
        order.user_id = self.user_id;
        order.client_id = self.client_id;
        order.shop_id = self.shop_id;
        order.order_lines = self.lines;
        order.total = self.total;
        order.total_books = self.total_books;
    }
}

/// Validates a draft and computes its totals.
///
/// # Errors
///
/// Returns the first [`ValidationError`] encountered, checking identifiers
/// first, then lines in input order, then the order-level totals.
pub fn validate_and_compute(draft: &OrderDraft) -> Result<PricedOrder, ValidationError> {
    check_identifiers(draft)?;

    if draft.lines.is_empty() {
        return Err(ValidationError::EmptyOrder);
    }

    let mut lines: Vec<OrderLine> = Vec::with_capacity(draft.lines.len());
    let mut by_book: HashMap<BookId, usize> = HashMap::new();

    for input in &draft.lines {
        let line = price_line(input)?;

        if let Some(&index) = by_book.get(&line.book_id) {
            let existing = &mut lines[index];
            if existing.price != line.price {
                return Err(ValidationError::ConflictingPrice {
                    book_id: line.book_id,
                    first: existing.price,
                    second: line.price,
                });
            }
            existing.quantity = existing
                .quantity
                .checked_add(line.quantity)
                .ok_or(ValidationError::Overflow)?;
            existing.total = existing
                .price
                .checked_times(existing.quantity)
                .ok_or(ValidationError::Overflow)?;
        } else {
            by_book.insert(line.book_id, lines.len());
            lines.push(line);
        }
    }

    let total = lines
        .iter()
        .try_fold(Money::ZERO, |acc, line| acc.checked_add(line.total))
        .ok_or(ValidationError::Overflow)?;
    let total_books = lines.iter().map(|line| u64::from(line.quantity)).sum::<u64>();

    if let Some(supplied) = draft.total {
        if supplied != total {
            return Err(ValidationError::OrderTotalMismatch {
                supplied,
                computed: total,
            });
        }
    }

    if let Some(supplied) = draft.total_books {
        if supplied != total_books {
            return Err(ValidationError::TotalBooksMismatch {
                supplied,
                computed: total_books,
            });
        }
    }

    Ok(PricedOrder {
        user_id: draft.user_id.clone(),
        client_id: draft.client_id.clone(),
        shop_id: draft.shop_id.clone(),
        lines,
        total,
        total_books,
    })
}

fn check_identifiers(draft: &OrderDraft) -> Result<(), ValidationError> {
    if draft.user_id.is_blank() {
        return Err(ValidationError::BlankIdentifier { field: "userId" });
    }
    if draft.client_id.is_blank() {
        return Err(ValidationError::BlankIdentifier { field: "clientId" });
    }
    if draft.shop_id.is_blank() {
        return Err(ValidationError::BlankIdentifier { field: "shopId" });
    }
    Ok(())
}

fn price_line(input: &LineInput) -> Result<OrderLine, ValidationError> {
    if input.quantity <= 0 {
        return Err(ValidationError::NonPositiveQuantity {
            book_id: input.book_id,
            quantity: input.quantity,
        });
    }
    let quantity = u32::try_from(input.quantity).map_err(|_| ValidationError::Overflow)?;

    if input.price.is_negative() {
        return Err(ValidationError::NegativePrice {
            book_id: input.book_id,
            price: input.price,
        });
    }

    let computed = input
        .price
        .checked_times(quantity)
        .ok_or(ValidationError::Overflow)?;

    if let Some(supplied) = input.total {
        if supplied != computed {
            return Err(ValidationError::LineTotalMismatch {
                book_id: input.book_id,
                supplied,
                computed,
            });
        }
    }

    Ok(OrderLine {
        book_id: input.book_id,
        quantity,
        price: input.price,
        total: computed,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn draft(lines: Vec<LineInput>) -> OrderDraft {
        OrderDraft::new(
            UserId::new("u1"),
            ClientId::new("c1"),
            ShopId::new("s1"),
            lines,
        )
    }

    fn line(book: u64, quantity: i64, price: i64) -> LineInput {
        LineInput::new(BookId::new(book), quantity, Money::from_minor(price))
    }

    #[test]
    fn single_line_example() {
        let priced = validate_and_compute(&draft(vec![line(1, 2, 10)])).expect("valid");

        assert_eq!(priced.total, Money::from_minor(20));
        assert_eq!(priced.total_books, 2);
        assert_eq!(priced.lines.len(), 1);
        assert_eq!(priced.lines[0].total, Money::from_minor(20));
    }

    #[test]
    fn multiple_lines_sum() {
        let priced =
            validate_and_compute(&draft(vec![line(1, 2, 10), line(2, 3, 250), line(3, 1, 0)]))
                .expect("valid");

        assert_eq!(priced.total, Money::from_minor(770));
        assert_eq!(priced.total_books, 6);
    }

    #[test]
    fn empty_order_rejected() {
        assert_eq!(
            validate_and_compute(&draft(vec![])),
            Err(ValidationError::EmptyOrder)
        );
    }

    #[test]
    fn zero_and_negative_quantities_rejected() {
        assert!(matches!(
            validate_and_compute(&draft(vec![line(1, 0, 10)])),
            Err(ValidationError::NonPositiveQuantity { quantity: 0, .. })
        ));
        assert!(matches!(
            validate_and_compute(&draft(vec![line(1, -3, 10)])),
            Err(ValidationError::NonPositiveQuantity { quantity: -3, .. })
        ));
    }

    #[test]
    fn negative_price_rejected() {
        assert!(matches!(
            validate_and_compute(&draft(vec![line(7, 1, -1)])),
            Err(ValidationError::NegativePrice { .. })
        ));
    }

    #[test]
    fn supplied_line_total_must_match_exactly() {
        let ok = line(1, 2, 10).with_total(Money::from_minor(20));
        assert!(validate_and_compute(&draft(vec![ok])).is_ok());

        let off_by_one = line(1, 2, 10).with_total(Money::from_minor(21));
        assert_eq!(
            validate_and_compute(&draft(vec![off_by_one])),
            Err(ValidationError::LineTotalMismatch {
                book_id: BookId::new(1),
                supplied: Money::from_minor(21),
                computed: Money::from_minor(20),
            })
        );
    }

    #[test]
    fn duplicate_books_are_merged() {
        let priced = validate_and_compute(&draft(vec![line(1, 2, 10), line(2, 1, 5), line(1, 3, 10)]))
            .expect("valid");

        assert_eq!(priced.lines.len(), 2);
        assert_eq!(priced.lines[0].book_id, BookId::new(1));
        assert_eq!(priced.lines[0].quantity, 5);
        assert_eq!(priced.lines[0].total, Money::from_minor(50));
        assert_eq!(priced.total, Money::from_minor(55));
        assert_eq!(priced.total_books, 6);
    }

    #[test]
    fn duplicate_books_with_different_prices_rejected() {
        assert!(matches!(
            validate_and_compute(&draft(vec![line(1, 1, 10), line(1, 1, 12)])),
            Err(ValidationError::ConflictingPrice { .. })
        ));
    }

    #[test]
    fn blank_identifiers_rejected() {
        let mut input = draft(vec![line(1, 1, 10)]);
        input.shop_id = ShopId::new("");
        assert_eq!(
            validate_and_compute(&input),
            Err(ValidationError::BlankIdentifier { field: "shopId" })
        );
    }

    #[test]
    fn supplied_order_totals_checked() {
        let mut input = draft(vec![line(1, 2, 10)]);
        input.total = Some(Money::from_minor(19));
        assert!(matches!(
            validate_and_compute(&input),
            Err(ValidationError::OrderTotalMismatch { .. })
        ));

        input.total = Some(Money::from_minor(20));
        input.total_books = Some(3);
        assert!(matches!(
            validate_and_compute(&input),
            Err(ValidationError::TotalBooksMismatch { supplied: 3, computed: 2 })
        ));
    }

    #[test]
    fn overflow_detected() {
        assert_eq!(
            validate_and_compute(&draft(vec![line(1, 2, i64::MAX)])),
            Err(ValidationError::Overflow)
        );
        assert_eq!(
            validate_and_compute(&draft(vec![line(1, i64::from(u32::MAX) + 1, 1)])),
            Err(ValidationError::Overflow)
        );
    }

    #[test]
    fn revalidating_an_order_is_stable() {
        let priced = validate_and_compute(&draft(vec![line(1, 2, 10), line(2, 1, 99)]))
            .expect("valid");
        let order = priced.clone().into_order(OrderId::generate(), Utc::now());

        let again = validate_and_compute(&OrderDraft::from(&order)).expect("still valid");
        assert_eq!(again, priced);
    }

    #[test]
    fn apply_to_keeps_identity() {
        let now = Utc::now();
        let priced = validate_and_compute(&draft(vec![line(1, 1, 10)])).expect("valid");
        let mut order = priced.into_order(OrderId::generate(), now);
        let id = order.id;

        let replacement = validate_and_compute(&draft(vec![line(9, 4, 3)])).expect("valid");
        replacement.apply_to(&mut order);

        assert_eq!(order.id, id);
        assert_eq!(order.created_at, now);
        assert_eq!(order.total, Money::from_minor(12));
        assert_eq!(order.order_lines[0].book_id, BookId::new(9));
    }
}

//! Property tests for the pricing engine.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use bookstore_core::{
    BookId, ClientId, LineInput, Money, OrderDraft, OrderId, ShopId, UserId, Utc,
    ValidationError, validate_and_compute,
};
use proptest::prelude::*;

fn line_strategy() -> impl Strategy<Value = LineInput> {
    (1u64..50, 1i64..1_000, 0i64..100_000).prop_map(|(book, quantity, price)| {
        LineInput::new(BookId::new(book), quantity, Money::from_minor(price))
    })
}

fn draft_strategy() -> impl Strategy<Value = OrderDraft> {
    prop::collection::vec(line_strategy(), 1..20).prop_map(|lines| {
        OrderDraft::new(
            UserId::new("u1"),
            ClientId::new("c1"),
            ShopId::new("s1"),
            lines,
        )
    })
}

/// Drafts whose duplicate books always share one price, so they validate.
fn valid_draft_strategy() -> impl Strategy<Value = OrderDraft> {
    draft_strategy().prop_map(|mut draft| {
        for line in &mut draft.lines {
            line.price = Money::from_minor(i64::try_from(line.book_id.get()).unwrap() * 37);
        }
        draft
    })
}

proptest! {
    #[test]
    fn totals_are_consistent(draft in valid_draft_strategy()) {
        let priced = validate_and_compute(&draft).expect("valid draft");

        let line_sum: i64 = priced.lines.iter().map(|l| l.total.minor_units()).sum();
        prop_assert_eq!(priced.total.minor_units(), line_sum);

        let books: u64 = priced.lines.iter().map(|l| u64::from(l.quantity)).sum();
        prop_assert_eq!(priced.total_books, books);

        for line in &priced.lines {
            prop_assert_eq!(
                line.total.minor_units(),
                line.price.minor_units() * i64::from(line.quantity)
            );
            prop_assert!(line.quantity > 0);
        }

        let requested: i64 = draft.lines.iter().map(|l| l.quantity).sum();
        prop_assert_eq!(i64::try_from(priced.total_books).unwrap(), requested);
    }

    #[test]
    fn validation_is_idempotent(draft in valid_draft_strategy()) {
        let priced = validate_and_compute(&draft).expect("valid draft");
        let order = priced.clone().into_order(OrderId::generate(), Utc::now());

        let again = validate_and_compute(&OrderDraft::from(&order)).expect("re-validation");
        prop_assert_eq!(again, priced);
    }

    #[test]
    fn validation_is_deterministic(draft in draft_strategy()) {
        prop_assert_eq!(validate_and_compute(&draft), validate_and_compute(&draft));
    }

    #[test]
    fn wrong_supplied_total_is_rejected(
        draft in valid_draft_strategy(),
        index in any::<prop::sample::Index>(),
        delta in prop_oneof![-1_000i64..=-1, 1i64..=1_000],
    ) {
        let mut draft = draft;
        let i = index.index(draft.lines.len());
        let line = &mut draft.lines[i];
        let quantity = u32::try_from(line.quantity).unwrap();
        let correct = line.price.checked_times(quantity).unwrap();
        line.total = Some(Money::from_minor(correct.minor_units() + delta));

        let result = validate_and_compute(&draft);
        prop_assert!(
            matches!(result, Err(ValidationError::LineTotalMismatch { .. })),
            "expected LineTotalMismatch, got {:?}",
            result
        );
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockroom_core::{DomainError, Entity, Money, OrderId, OrderLineId, ProductId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("order must contain at least one line")]
    EmptyOrder,

    /// `line` is the zero-based position in the request.
    #[error("line {line}: quantity must be positive, got {quantity}")]
    InvalidQuantity { line: usize, quantity: i64 },

    #[error(transparent)]
    Amount(#[from] DomainError),
}

/// One requested `(product, quantity)` pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

impl OrderLineRequest {
    pub fn new(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Check the shape of a placement request before touching storage.
///
/// Reports the first offending line in request order.
pub fn validate_request(lines: &[OrderLineRequest]) -> Result<(), OrderError> {
    if lines.is_empty() {
        return Err(OrderError::EmptyOrder);
    }
    if let Some((line, req)) = lines.iter().enumerate().find(|(_, l)| l.quantity <= 0) {
        return Err(OrderError::InvalidQuantity {
            line,
            quantity: req.quantity,
        });
    }
    Ok(())
}

/// Order line: product, quantity, unit price as charged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    id: OrderLineId,
    product_id: ProductId,
    quantity: i64,
    unit_price: Money,
    line_total: Money,
}

impl OrderLine {
    /// Price a line at `unit_price`.
    pub fn priced(product_id: ProductId, quantity: i64, unit_price: Money) -> Result<Self, OrderError> {
        if quantity <= 0 {
            return Err(OrderError::InvalidQuantity { line: 0, quantity });
        }
        let line_total = unit_price.times(quantity)?;
        Ok(Self {
            id: OrderLineId::new(),
            product_id,
            quantity,
            unit_price,
            line_total,
        })
    }

    /// Rebuild a line from storage; the total is recomputed.
    pub fn rehydrate(
        id: OrderLineId,
        product_id: ProductId,
        quantity: i64,
        unit_price: Money,
    ) -> Result<Self, OrderError> {
        let line_total = unit_price.times(quantity)?;
        Ok(Self {
            id,
            product_id,
            quantity,
            unit_price,
            line_total,
        })
    }

    pub fn id(&self) -> OrderLineId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn line_total(&self) -> Money {
        self.line_total
    }
}

/// Entity: Order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    placed_at: DateTime<Utc>,
    lines: Vec<OrderLine>,
    total: Money,
}

impl Order {
    /// Assemble a new order from already priced lines.
    pub fn place(
        user_id: UserId,
        lines: Vec<OrderLine>,
        placed_at: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        Self::rehydrate(OrderId::new(), user_id, placed_at, lines)
    }

    pub fn rehydrate(
        id: OrderId,
        user_id: UserId,
        placed_at: DateTime<Utc>,
        lines: Vec<OrderLine>,
    ) -> Result<Self, OrderError> {
        if lines.is_empty() {
            return Err(OrderError::EmptyOrder);
        }
        let total = lines
            .iter()
            .map(OrderLine::line_total)
            .try_fold(Money::ZERO, Money::checked_add)
            .ok_or_else(|| DomainError::invalid_amount(format!("order {id} total overflows")))?;
        Ok(Self {
            id,
            user_id,
            placed_at,
            lines,
            total,
        })
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn placed_at(&self) -> DateTime<Utc> {
        self.placed_at
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Sum of all line totals.
    pub fn total(&self) -> Money {
        self.total
    }
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn money(s: &str) -> Money {
        s.parse().unwrap()
    }

    #[test]
    fn empty_request_is_rejected() {
        assert_eq!(validate_request(&[]), Err(OrderError::EmptyOrder));
    }

    #[test]
    fn first_non_positive_quantity_is_reported() {
        let p = ProductId::new();
        let lines = [
            OrderLineRequest::new(p, 1),
            OrderLineRequest::new(p, 0),
            OrderLineRequest::new(p, -4),
        ];
        assert_eq!(
            validate_request(&lines),
            Err(OrderError::InvalidQuantity { line: 1, quantity: 0 })
        );
    }

    #[test]
    fn line_total_is_price_times_quantity() {
        let line = OrderLine::priced(ProductId::new(), 3, money("19.99")).unwrap();
        assert_eq!(line.line_total(), money("59.97"));
    }

    #[test]
    fn order_total_sums_lines() {
        let order = Order::place(
            UserId::new(),
            vec![
                OrderLine::priced(ProductId::new(), 2, money("1500")).unwrap(),
                OrderLine::priced(ProductId::new(), 1, money("0.05")).unwrap(),
            ],
            Utc::now(),
        )
        .unwrap();
        assert_eq!(order.total(), money("3000.05"));
        assert_eq!(Entity::id(&order), &order.id_typed());
    }

    #[test]
    fn order_total_overflow_is_rejected() {
        let price = money("50000000000000000000000000000");
        let line = || OrderLine::priced(ProductId::new(), 1, price).unwrap();
        assert!(matches!(
            Order::place(UserId::new(), vec![line(), line()], Utc::now()),
            Err(OrderError::Amount(DomainError::InvalidAmount(_)))
        ));
    }

    #[test]
    fn order_without_lines_cannot_exist() {
        assert_eq!(
            Order::place(UserId::new(), vec![], Utc::now()),
            Err(OrderError::EmptyOrder)
        );
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: requests with only positive quantities always validate.
            #[test]
            fn positive_requests_validate(qtys in proptest::collection::vec(1i64..10_000, 1..30)) {
                let lines: Vec<_> = qtys
                    .into_iter()
                    .map(|q| OrderLineRequest::new(ProductId::new(), q))
                    .collect();
                prop_assert!(validate_request(&lines).is_ok());
            }

            /// Property: the reported line is the first non-positive one.
            #[test]
            fn reports_first_bad_line(
                prefix in proptest::collection::vec(1i64..100, 0..10),
                bad in -100i64..=0,
                suffix in proptest::collection::vec(-100i64..100, 0..10)
            ) {
                let p = ProductId::new();
                let lines: Vec<_> = prefix
                    .iter()
                    .copied()
                    .chain(std::iter::once(bad))
                    .chain(suffix)
                    .map(|q| OrderLineRequest::new(p, q))
                    .collect();
                prop_assert_eq!(
                    validate_request(&lines),
                    Err(OrderError::InvalidQuantity { line: prefix.len(), quantity: bad })
                );
            }
        }
    }
}

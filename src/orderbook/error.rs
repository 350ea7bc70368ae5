use serde::{Deserialize, Serialize};
use std::fmt;

use crate::orderbook::types::{CurrencyPair, OrderId, MAX_PRICE, MAX_QUANTITY};

/// Why an order was refused at the validation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Price is zero or negative after rounding
    NonPositivePrice,
    /// Quantity is zero or negative after rounding
    NonPositiveQuantity,
    /// Price is above `MAX_PRICE`
    PriceTooLarge,
    /// Quantity is above `MAX_QUANTITY`
    QuantityTooLarge,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NonPositivePrice => write!(f, "price must be positive"),
            RejectReason::NonPositiveQuantity => write!(f, "quantity must be positive"),
            RejectReason::PriceTooLarge => write!(f, "price exceeds {}", MAX_PRICE),
            RejectReason::QuantityTooLarge => write!(f, "quantity exceeds {}", MAX_QUANTITY),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderBookError {
    /// Order failed validation; the book was not touched
    InvalidOrder(RejectReason),

    /// Order is not resting (already filled, cancelled or never existed)
    OrderNotFound(OrderId),

    /// No book is listed for this pair
    UnknownMarket(CurrencyPair),

    /// Cannot fill more than remaining quantity
    OverFill,

    /// Snapshot cannot be restored into a consistent book
    InvalidSnapshot(String),

    /// The book broke one of its structural invariants
    InvariantViolation(String),
}

impl OrderBookError {
    /// Errors a caller is expected to absorb (skip the action for this tick).
    /// Trading on an unlisted pair is a wiring mistake, not one of them.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            OrderBookError::InvalidOrder(_) | OrderBookError::OrderNotFound(_)
        )
    }
}

impl fmt::Display for OrderBookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderBookError::InvalidOrder(reason) => write!(f, "Invalid order: {}", reason),
            OrderBookError::OrderNotFound(id) => write!(f, "Order not found: {}", id),
            OrderBookError::UnknownMarket(pair) => write!(f, "No market listed for {}", pair),
            OrderBookError::OverFill => write!(f, "Cannot fill more than remaining quantity"),
            OrderBookError::InvalidSnapshot(msg) => write!(f, "Invalid snapshot: {}", msg),
            OrderBookError::InvariantViolation(msg) => {
                write!(f, "Order book invariant violated: {}", msg)
            }
        }
    }
}

impl std::error::Error for OrderBookError {}

/// Result type for order book operations
pub type OrderBookResult<T> = Result<T, OrderBookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            OrderBookError::OrderNotFound(OrderId(4)).to_string(),
            "Order not found: #4"
        );
        assert_eq!(
            OrderBookError::InvalidOrder(RejectReason::NonPositivePrice).to_string(),
            "Invalid order: price must be positive"
        );
        assert_eq!(
            OrderBookError::InvariantViolation("crossed".to_string()).to_string(),
            "Order book invariant violated: crossed"
        );
    }

    #[test]
    fn test_recoverable() {
        assert!(OrderBookError::OrderNotFound(OrderId(1)).is_recoverable());
        assert!(OrderBookError::InvalidOrder(RejectReason::NonPositiveQuantity).is_recoverable());
        assert!(!OrderBookError::InvariantViolation(String::new()).is_recoverable());
        assert!(!OrderBookError::UnknownMarket(CurrencyPair::NOMIN_FIAT).is_recoverable());
    }

    #[test]
    fn test_error_serialization() {
        let error = OrderBookError::OrderNotFound(OrderId(9));
        let serialized = serde_json::to_string(&error).unwrap();
        let deserialized: OrderBookError = serde_json::from_str(&serialized).unwrap();
        assert_eq!(error, deserialized);
    }
}

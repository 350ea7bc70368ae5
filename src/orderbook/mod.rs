//! Core order book implementation module
//!
//! This module contains the order book data structures and the matching
//! algorithm for one currency pair.

pub mod book;
pub mod book_side;
pub mod depth;
pub mod error;
pub mod liquidity;
pub mod matching;
pub mod price_level;
pub mod snapshot;
pub mod types;

// Re-export main types for convenience
pub use book::{OrderBook, OrderBookStats};
pub use book_side::BookSide;
pub use depth::Depth;
pub use error::{OrderBookError, OrderBookResult, RejectReason};
pub use price_level::PriceLevel;
pub use types::{
    round_currency, AgentId, BookSnapshot, Currency, CurrencyPair, DepthLevel, Fill, Order, OrderId,
    OrderRequest, Price, PriceLevelInfo, Quantity, Sequence, Side, SubmitResult, Tick,
    CURRENCY_PRECISION, MAX_PRICE, MAX_QUANTITY,
};

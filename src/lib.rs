//! Havven Market Order Book
//!
//! A deterministic limit order book for a three-currency agent-based market
//! simulation: a native asset (havvens), a stabilized token (nomins) and a
//! fiat-pegged unit, traded pairwise.
//!
//! # Features
//!
//! - **Price-Time Priority**: better price fills first, FIFO within a price level
//! - **Exact Arithmetic**: prices and quantities are decimals rounded to 8 places
//! - **Deterministic**: the same sequence of calls always yields the same fills
//! - **Depth Curves**: lazy, restartable cumulative depth iterators for charting
//! - **Snapshots**: serialize a book and restore it with identical queue priority
//! - **Monitoring**: counters, gauges and latency histograms through `metrics`
//! - **Simulation**: seeded agents, rolling prices and candles per market
//!
//! # Quick Start
//!
//! ```rust
//! use havven_orderbook::orderbook::{AgentId, CurrencyPair, OrderBook, OrderRequest};
//! use rust_decimal_macros::dec;
//!
//! // One book per currency pair
//! let mut book = OrderBook::new(CurrencyPair::HAVVEN_NOMIN);
//!
//! // Rest a bid, then cross it with a smaller ask
//! book.submit(OrderRequest::bid(dec!(10), dec!(5), AgentId(1)))?;
//! let result = book.submit(OrderRequest::ask(dec!(10), dec!(3), AgentId(2)))?;
//!
//! assert_eq!(result.fills.len(), 1);
//! assert_eq!(book.best_bid(), Some(dec!(10)));
//!
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! Each side of a book is a two-level structure:
//!
//! 1. **Price Levels**: `BTreeMap` keyed so that iteration starts at the best price
//! 2. **Order Queues**: within each price level, orders keep time priority in a `VecDeque`
//!
//! An id index maps every resting order to its side and price, so cancels
//! and amends go straight to the right queue. Books are plain values with
//! no shared state; independent simulations run in parallel by owning their
//! own exchange.

pub mod agents;
pub mod config;
pub mod market;
pub mod metrics;
pub mod orderbook;
pub mod simulation;

// Re-export commonly used types
pub use orderbook::{
    error::{OrderBookError, OrderBookResult},
    types::{
        AgentId, CurrencyPair, DepthLevel, Fill, Order, OrderId, OrderRequest, Price, Quantity,
        Side, SubmitResult,
    },
    OrderBook,
};

pub use config::{ConfigError, SimulationConfig};
pub use market::Exchange;
pub use metrics::OrderBookMetrics;
pub use simulation::{Simulation, SimulationReport};

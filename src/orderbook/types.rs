use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::orderbook::error::{OrderBookError, OrderBookResult};

pub type Price = Decimal; // Quoted currency per unit of base currency
pub type Quantity = Decimal; // Denominated in the base currency
pub type Sequence = u64;
pub type Tick = u64;

/// Number of decimal places kept for every price and quantity.
pub const CURRENCY_PRECISION: u32 = 8;

/// Largest price the book accepts.
pub const MAX_PRICE: Price = dec!(1000000000000);

/// Largest quantity the book accepts in a single order. With `MAX_PRICE`
/// this keeps any one notional at or below 10^24.
pub const MAX_QUANTITY: Quantity = dec!(1000000000000);

/// Round a value to currency precision, half away from zero.
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(CURRENCY_PRECISION, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque reference to the agent that owns an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// The three currencies traded in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Currency {
    /// Native asset backing the system
    Havven,
    /// Stabilized token
    Nomin,
    /// Fiat-pegged unit of account
    Fiat,
}

impl Currency {
    pub fn code(self) -> &'static str {
        match self {
            Currency::Havven => "HAV",
            Currency::Nomin => "NOM",
            Currency::Fiat => "FIAT",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A market between a base currency (what asks sell) and a quoted currency
/// (what bids pay with). Prices are quoted per unit of base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub base: Currency,
    pub quote: Currency,
}

impl CurrencyPair {
    pub const HAVVEN_NOMIN: CurrencyPair = CurrencyPair::new(Currency::Havven, Currency::Nomin);
    pub const HAVVEN_FIAT: CurrencyPair = CurrencyPair::new(Currency::Havven, Currency::Fiat);
    pub const NOMIN_FIAT: CurrencyPair = CurrencyPair::new(Currency::Nomin, Currency::Fiat);

    /// Every pair the simulation lists a book for.
    pub const ALL: [CurrencyPair; 3] = [
        CurrencyPair::HAVVEN_NOMIN,
        CurrencyPair::HAVVEN_FIAT,
        CurrencyPair::NOMIN_FIAT,
    ];

    pub const fn new(base: Currency, quote: Currency) -> Self {
        Self { base, quote }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// An order as submitted by a caller, before the book assigns it an id and a
/// sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
    pub owner: AgentId,
}

impl OrderRequest {
    pub fn new(side: Side, price: Price, quantity: Quantity, owner: AgentId) -> Self {
        Self {
            side,
            price,
            quantity,
            owner,
        }
    }

    pub fn bid(price: Price, quantity: Quantity, owner: AgentId) -> Self {
        Self::new(Side::Buy, price, quantity, owner)
    }

    pub fn ask(price: Price, quantity: Quantity, owner: AgentId) -> Self {
        Self::new(Side::Sell, price, quantity, owner)
    }
}

/// A resting order held by the book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub side: Side,
    pub price: Price,
    pub original_quantity: Quantity,
    pub remaining_quantity: Quantity,
    pub owner: AgentId,
    pub sequence: Sequence,
    pub submitted_at: Tick,
}

impl Order {
    pub fn fill(&mut self, quantity: Quantity) -> OrderBookResult<()> {
        if quantity > self.remaining_quantity {
            return Err(OrderBookError::OverFill);
        }

        self.remaining_quantity -= quantity;
        Ok(())
    }

    pub fn is_filled(&self) -> bool {
        self.remaining_quantity.is_zero()
    }
}

/// A completed match between an incoming order and one resting order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub buyer: AgentId,
    pub seller: AgentId,
    pub price: Price,
    pub quantity: Quantity,
    /// Side of the incoming order that took liquidity
    pub aggressor: Side,
    pub tick: Tick,
    /// Sequence number of the incoming order
    pub sequence: Sequence,
}

impl Fill {
    /// Quoted currency exchanged by this fill.
    pub fn notional(&self) -> Decimal {
        round_currency(self.price * self.quantity)
    }
}

/// Outcome of a submission or a price amendment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResult {
    pub order_id: OrderId,
    pub sequence: Sequence,
    pub fills: Vec<Fill>,
    /// Quantity left resting in the book, zero if the order fully traded
    pub resting_quantity: Quantity,
}

impl SubmitResult {
    pub fn filled_quantity(&self) -> Quantity {
        self.fills.iter().map(|f| f.quantity).sum()
    }

    pub fn is_resting(&self) -> bool {
        !self.resting_quantity.is_zero()
    }
}

/// One aggregated price level of a depth curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Price,
    /// Quantity resting at exactly this price
    pub quantity: Quantity,
    /// Quantity resting at this price or any better one
    pub cumulative_quantity: Quantity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevelInfo {
    pub price: Price,
    pub quantity: Quantity,
    pub order_count: u32,
}

/// Full resting state of a book, enough to rebuild it exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub pair: CurrencyPair,
    pub tick: Tick,
    pub next_order_id: u64,
    pub next_sequence: Sequence,
    /// Bids in priority order
    pub bids: Vec<Order>,
    /// Asks in priority order
    pub asks: Vec<Order>,
    pub taken_at: DateTime<Utc>,
}

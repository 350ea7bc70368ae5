use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::orderbook::book_side::BookSide;
use crate::orderbook::depth::Depth;
use crate::orderbook::error::{OrderBookError, OrderBookResult, RejectReason};
use crate::orderbook::matching::MatchingEngine;
use crate::orderbook::types::{
    round_currency, AgentId, CurrencyPair, Order, OrderId, OrderRequest, Price,
    PriceLevelInfo, Quantity, Sequence, Side, SubmitResult, Tick, MAX_PRICE, MAX_QUANTITY,
};

/// Price-time priority limit order book for one currency pair.
///
/// Single-threaded: every mutation completes synchronously and the
/// book is never crossed when a mutating call returns.
#[derive(Debug, Clone)]
pub struct OrderBook {
    pair: CurrencyPair,

    bids: BookSide, // Buy orders (highest price first)
    asks: BookSide, // Sell orders (lowest price first)

    // Order tracking
    order_locations: HashMap<OrderId, (Side, Price)>,

    next_order_id: u64,
    next_sequence: Sequence,
    tick: Tick,

    // Statistics
    last_trade_price: Option<Price>,
    total_fills: u64,
    total_volume: Quantity,
}

impl OrderBook {
    pub fn new(pair: CurrencyPair) -> Self {
        info!("Creating new order book for pair: {}", pair);

        Self {
            pair,
            bids: BookSide::new(Side::Buy),
            asks: BookSide::new(Side::Sell),
            order_locations: HashMap::new(),
            next_order_id: 1,
            next_sequence: 1,
            tick: 0,
            last_trade_price: None,
            total_fills: 0,
            total_volume: Decimal::ZERO,
        }
    }

    pub fn pair(&self) -> CurrencyPair {
        self.pair
    }

    /// Submit a limit order. It is matched against the opposite side first;
    /// any remainder rests in the book.
    pub fn submit(&mut self, request: OrderRequest) -> OrderBookResult<SubmitResult> {
        debug!("Submitting order to {}: {:?}", self.pair, request);

        let (price, quantity) = Self::validate(request.price, request.quantity)?;

        let order = Order {
            id: self.next_order_id(),
            side: request.side,
            price,
            original_quantity: quantity,
            remaining_quantity: quantity,
            owner: request.owner,
            sequence: self.next_sequence(),
            submitted_at: self.tick,
        };

        let result = self.match_and_rest(order);
        self.debug_check();
        Ok(result)
    }

    /// Remove a resting order and hand it back to the caller.
    pub fn cancel(&mut self, order_id: OrderId) -> OrderBookResult<Order> {
        debug!("Cancelling order: {}", order_id);

        let (side, price) = self
            .order_locations
            .remove(&order_id)
            .ok_or(OrderBookError::OrderNotFound(order_id))?;

        let order = self
            .side_mut(side)
            .remove(&order_id, price)
            .ok_or(OrderBookError::OrderNotFound(order_id))?;

        debug!(
            "Order {} cancelled, {} remaining",
            order_id, order.remaining_quantity
        );
        self.debug_check();
        Ok(order)
    }

    /// Change the price and/or quantity of a resting order.
    ///
    /// A quantity-only change keeps the order's place in its queue. A price
    /// change takes the order out, gives it a fresh sequence number and
    /// matches it again like a new submission under the same id.
    pub fn amend(
        &mut self,
        order_id: OrderId,
        new_price: Price,
        new_quantity: Quantity,
    ) -> OrderBookResult<SubmitResult> {
        debug!(
            "Amending order {} to {}@{}",
            order_id, new_quantity, new_price
        );

        let (new_price, new_quantity) = Self::validate(new_price, new_quantity)?;

        let (side, price) = *self
            .order_locations
            .get(&order_id)
            .ok_or(OrderBookError::OrderNotFound(order_id))?;

        if price == new_price {
            let order = self
                .order(side, order_id, price)
                .ok_or(OrderBookError::OrderNotFound(order_id))?;
            let sequence = order.sequence;

            if order.remaining_quantity != new_quantity {
                self.side_mut(side)
                    .set_quantity(&order_id, price, new_quantity)
                    .ok_or(OrderBookError::OrderNotFound(order_id))?;
            }

            self.debug_check();
            return Ok(SubmitResult {
                order_id,
                sequence,
                fills: Vec::new(),
                resting_quantity: new_quantity,
            });
        }

        let mut order = self
            .side_mut(side)
            .remove(&order_id, price)
            .ok_or(OrderBookError::OrderNotFound(order_id))?;
        self.order_locations.remove(&order_id);

        order.original_quantity += new_quantity - order.remaining_quantity;
        order.remaining_quantity = new_quantity;
        order.price = new_price;
        order.sequence = self.next_sequence();
        order.submitted_at = self.tick;

        let result = self.match_and_rest(order);
        self.debug_check();
        Ok(result)
    }

    /// Buy `quantity` at whatever the asks currently demand: a bid priced at
    /// `price_to_buy(quantity)`. With no asks the bid goes in at
    /// `fallback_price`. Anything the asks cannot cover rests.
    pub fn buy(
        &mut self,
        quantity: Quantity,
        owner: AgentId,
        fallback_price: Price,
    ) -> OrderBookResult<SubmitResult> {
        let request = self.market_request(Side::Buy, quantity, owner, fallback_price);
        self.submit(request)
    }

    /// Sell `quantity` into the bids; the mirror of [`OrderBook::buy`].
    pub fn sell(
        &mut self,
        quantity: Quantity,
        owner: AgentId,
        fallback_price: Price,
    ) -> OrderBookResult<SubmitResult> {
        let request = self.market_request(Side::Sell, quantity, owner, fallback_price);
        self.submit(request)
    }

    /// Limit order that sweeps the opposite side for `quantity`, priced at
    /// the deepest level it has to reach.
    pub fn market_request(
        &self,
        side: Side,
        quantity: Quantity,
        owner: AgentId,
        fallback_price: Price,
    ) -> OrderRequest {
        let price = match side {
            Side::Buy => self.price_to_buy(quantity),
            Side::Sell => self.price_to_sell(quantity),
        };
        OrderRequest::new(side, price.unwrap_or(fallback_price), quantity, owner)
    }

    /// Get current best bid price
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.best_price()
    }

    /// Get current best ask price
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.best_price()
    }

    /// Get current spread
    pub fn spread(&self) -> Option<Price> {
        match (self.best_ask(), self.best_bid()) {
            (Some(ask), Some(bid)) => Some(ask - bid),
            _ => None,
        }
    }

    pub fn mid_price(&self) -> Option<Price> {
        match (self.best_ask(), self.best_bid()) {
            (Some(ask), Some(bid)) => Some(round_currency((ask + bid) / Decimal::TWO)),
            _ => None,
        }
    }

    /// Get last trade price
    pub fn last_trade_price(&self) -> Option<Price> {
        self.last_trade_price
    }

    /// Quantity resting at the best price of a side, zero if the side is empty
    pub fn best_level_quantity(&self, side: Side) -> Quantity {
        self.side(side)
            .best_level()
            .map(|level| level.total_quantity())
            .unwrap_or(Decimal::ZERO)
    }

    /// Cumulative depth walking outward from the best price.
    /// `max_levels` of `None` walks the whole side.
    pub fn depth(&self, side: Side, max_levels: Option<usize>) -> Depth<'_> {
        Depth::new(self.side(side).levels(), max_levels)
    }

    /// Aggregated price levels, best first
    pub fn levels(&self, side: Side) -> Vec<PriceLevelInfo> {
        self.side(side)
            .levels()
            .map(|level| {
                let (quantity, order_count) = level.get_depth_info();
                PriceLevelInfo {
                    price: level.price,
                    quantity,
                    order_count,
                }
            })
            .collect()
    }

    /// Resting orders of a side in price-time priority
    pub fn orders(&self, side: Side) -> impl Iterator<Item = &Order> + '_ {
        self.side(side).orders()
    }

    pub fn get_order(&self, order_id: OrderId) -> Option<&Order> {
        let (side, price) = self.order_locations.get(&order_id)?;
        self.order(*side, order_id, *price)
    }

    pub fn contains(&self, order_id: OrderId) -> bool {
        self.order_locations.contains_key(&order_id)
    }

    /// Get total number of orders in the book
    pub fn total_orders(&self) -> usize {
        self.order_locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order_locations.is_empty()
    }

    /// Total resting quantity on one side
    pub fn resting_quantity(&self, side: Side) -> Quantity {
        self.side(side).total_quantity()
    }

    /// Drop every resting order without generating fills.
    pub fn clear(&mut self) {
        if !self.is_empty() {
            info!(
                "Clearing order book {} ({} resting orders)",
                self.pair,
                self.total_orders()
            );
        }

        self.bids.clear();
        self.asks.clear();
        self.order_locations.clear();
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Set the logical clock stamped onto new orders and fills
    pub fn set_tick(&mut self, tick: Tick) {
        self.tick = tick;
    }

    /// Get statistics
    pub fn get_stats(&self) -> OrderBookStats {
        OrderBookStats {
            pair: self.pair,
            total_orders: self.total_orders(),
            bid_levels: self.bids.level_count(),
            ask_levels: self.asks.level_count(),
            best_bid: self.best_bid(),
            best_ask: self.best_ask(),
            spread: self.spread(),
            last_trade_price: self.last_trade_price(),
            total_fills: self.total_fills,
            total_volume: self.total_volume,
        }
    }

    /// Verify the structural invariants of the book.
    pub fn check_invariants(&self) -> OrderBookResult<()> {
        let violation = |msg: String| Err(OrderBookError::InvariantViolation(msg));

        if let (Some(bid), Some(ask)) = (self.best_bid(), self.best_ask()) {
            if MatchingEngine::prices_cross(bid, ask) {
                return violation(format!("book crossed: bid {} >= ask {}", bid, ask));
            }
        }

        let mut seen = 0usize;
        for book_side in [&self.bids, &self.asks] {
            let mut side_total = Decimal::ZERO;
            let mut side_count = 0usize;

            for level in book_side.levels() {
                if level.is_empty() {
                    return violation(format!("empty level at {}", level.price));
                }
                if level.recount_quantity() != level.total_quantity() {
                    return violation(format!("level {} total out of sync", level.price));
                }

                let mut last_sequence = None;
                for order in level.orders() {
                    if order.side != book_side.side() || order.price != level.price {
                        return violation(format!("order {} filed under wrong level", order.id));
                    }
                    if order.remaining_quantity <= Decimal::ZERO {
                        return violation(format!("order {} has no remaining quantity", order.id));
                    }
                    if last_sequence.is_some_and(|last| last >= order.sequence) {
                        return violation(format!("order {} out of time priority", order.id));
                    }
                    if self.order_locations.get(&order.id) != Some(&(order.side, order.price)) {
                        return violation(format!("order {} missing from index", order.id));
                    }
                    last_sequence = Some(order.sequence);
                    side_count += 1;
                }
                side_total += level.total_quantity();
            }

            if side_total != book_side.total_quantity() || side_count != book_side.order_count() {
                return violation(format!("{} side totals out of sync", book_side.side()));
            }
            seen += side_count;
        }

        if seen != self.order_locations.len() {
            return violation(format!(
                "index holds {} orders, book holds {}",
                self.order_locations.len(),
                seen
            ));
        }

        Ok(())
    }

    // Private helper methods

    /// Round to currency precision and check the bounds every resting
    /// order satisfies.
    pub(crate) fn validate(price: Price, quantity: Quantity) -> OrderBookResult<(Price, Quantity)> {
        let price = round_currency(price);
        let quantity = round_currency(quantity);

        if price <= Decimal::ZERO {
            return Err(OrderBookError::InvalidOrder(RejectReason::NonPositivePrice));
        }
        if quantity <= Decimal::ZERO {
            return Err(OrderBookError::InvalidOrder(RejectReason::NonPositiveQuantity));
        }
        if price > MAX_PRICE {
            return Err(OrderBookError::InvalidOrder(RejectReason::PriceTooLarge));
        }
        if quantity > MAX_QUANTITY {
            return Err(OrderBookError::InvalidOrder(RejectReason::QuantityTooLarge));
        }

        Ok((price, quantity))
    }

    fn match_and_rest(&mut self, mut order: Order) -> SubmitResult {
        let tick = self.tick;
        let opposite = match order.side {
            Side::Buy => &mut self.asks,
            Side::Sell => &mut self.bids,
        };

        let outcome = MatchingEngine::match_order(&mut order, opposite, tick);

        for order_id in &outcome.exhausted {
            self.order_locations.remove(order_id);
        }

        if let Some(last) = outcome.fills.last() {
            self.last_trade_price = Some(last.price);
        }
        self.total_fills += outcome.fills.len() as u64;
        for fill in &outcome.fills {
            self.total_volume = self.total_volume.saturating_add(fill.quantity);
        }

        let result = SubmitResult {
            order_id: order.id,
            sequence: order.sequence,
            fills: outcome.fills,
            resting_quantity: order.remaining_quantity,
        };

        if !order.is_filled() {
            self.add_order_to_book(order);
        }

        result
    }

    pub(crate) fn add_order_to_book(&mut self, order: Order) {
        self.order_locations
            .insert(order.id, (order.side, order.price));
        self.side_mut(order.side).insert(order);
    }

    pub(crate) fn side(&self, side: Side) -> &BookSide {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut BookSide {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    fn order(&self, side: Side, order_id: OrderId, price: Price) -> Option<&Order> {
        self.side(side)
            .get_level(price)?
            .orders()
            .find(|o| o.id == order_id)
    }

    fn next_order_id(&mut self) -> OrderId {
        let id = OrderId(self.next_order_id);
        self.next_order_id += 1;
        id
    }

    fn next_sequence(&mut self) -> Sequence {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    pub(crate) fn counters(&self) -> (u64, Sequence) {
        (self.next_order_id, self.next_sequence)
    }

    pub(crate) fn set_counters(&mut self, next_order_id: u64, next_sequence: Sequence) {
        self.next_order_id = next_order_id;
        self.next_sequence = next_sequence;
    }

    fn debug_check(&self) {
        debug_assert!(
            self.check_invariants().is_ok(),
            "{:?}",
            self.check_invariants()
        );
    }
}

#[derive(Debug, Clone)]
pub struct OrderBookStats {
    pub pair: CurrencyPair,
    pub total_orders: usize,
    pub bid_levels: usize,
    pub ask_levels: usize,
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
    pub spread: Option<Price>,
    pub last_trade_price: Option<Price>,
    pub total_fills: u64,
    pub total_volume: Quantity,
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new(CurrencyPair::HAVVEN_NOMIN)
    }
}

use rust_decimal::Decimal;
use std::collections::btree_map::{self, BTreeMap};

use crate::orderbook::price_level::PriceLevel;
use crate::orderbook::types::{Order, OrderId, Price, Quantity, Side};

/// Map key that sorts levels best-first in ascending order: asks by price,
/// bids by negated price. Negation is exact for decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LevelKey(Decimal);

impl LevelKey {
    fn for_price(side: Side, price: Price) -> Self {
        match side {
            Side::Buy => LevelKey(-price),
            Side::Sell => LevelKey(price),
        }
    }
}

/// One side of the book: price levels ordered from the best price outward.
#[derive(Debug, Clone)]
pub struct BookSide {
    side: Side,
    levels: BTreeMap<LevelKey, PriceLevel>,
    total_quantity: Quantity,
    order_count: usize,
}

impl BookSide {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
            total_quantity: Decimal::ZERO,
            order_count: 0,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Append an order to the back of its price level, creating the level if needed
    pub fn insert(&mut self, order: Order) {
        debug_assert_eq!(order.side, self.side);

        self.total_quantity += order.remaining_quantity;
        self.order_count += 1;
        self.levels
            .entry(LevelKey::for_price(self.side, order.price))
            .or_insert_with(|| PriceLevel::new(order.price))
            .add_order(order);
    }

    /// Remove a resting order, dropping its level if it empties
    pub fn remove(&mut self, order_id: &OrderId, price: Price) -> Option<Order> {
        let key = LevelKey::for_price(self.side, price);
        let level = self.levels.get_mut(&key)?;
        let order = level.remove_order(order_id)?;

        if level.is_empty() {
            self.levels.remove(&key);
        }
        self.total_quantity -= order.remaining_quantity;
        self.order_count -= 1;

        Some(order)
    }

    /// Change a resting order's quantity without touching its priority
    pub fn set_quantity(&mut self, order_id: &OrderId, price: Price, quantity: Quantity) -> Option<Quantity> {
        let level = self.levels.get_mut(&LevelKey::for_price(self.side, price))?;
        let old = level.set_order_quantity(order_id, quantity)?;
        self.total_quantity += quantity - old;
        Some(old)
    }

    pub fn best_price(&self) -> Option<Price> {
        self.levels.values().next().map(|level| level.price)
    }

    pub fn best_level(&self) -> Option<&PriceLevel> {
        self.levels.values().next()
    }

    /// Fill up to `quantity` against the front order of the best level.
    /// Returns the resting order after the fill and the quantity taken.
    pub(crate) fn fill_best(&mut self, quantity: Quantity) -> Option<(Order, Quantity)> {
        let mut entry = self.levels.first_entry()?;
        let (order, taken) = entry.get_mut().fill_front(quantity)?;

        if entry.get().is_empty() {
            entry.remove();
        }
        self.total_quantity -= taken;
        if order.is_filled() {
            self.order_count -= 1;
        }

        Some((order, taken))
    }

    /// Price levels from the best price outward
    pub fn levels(&self) -> btree_map::Values<'_, LevelKey, PriceLevel> {
        self.levels.values()
    }

    pub fn get_level(&self, price: Price) -> Option<&PriceLevel> {
        self.levels.get(&LevelKey::for_price(self.side, price))
    }

    /// Resting orders in price-time priority
    pub fn orders(&self) -> impl Iterator<Item = &Order> + '_ {
        self.levels.values().flat_map(|level| level.orders())
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn order_count(&self) -> usize {
        self.order_count
    }

    pub fn total_quantity(&self) -> Quantity {
        self.total_quantity
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn clear(&mut self) {
        self.levels.clear();
        self.total_quantity = Decimal::ZERO;
        self.order_count = 0;
    }

    /// Whether a resting price on this side trades with an incoming limit
    /// price from the other side.
    pub fn crosses(&self, resting_price: Price, incoming_limit: Price) -> bool {
        match self.side {
            Side::Sell => resting_price <= incoming_limit,
            Side::Buy => resting_price >= incoming_limit,
        }
    }
}

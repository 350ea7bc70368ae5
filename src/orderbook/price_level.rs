use crate::orderbook::types::{Order, OrderId, Price, Quantity};
use rust_decimal::Decimal;
use std::collections::VecDeque;

/// Represents a price level in the order book
/// All orders at this price level maintain time priority (FIFO)
#[derive(Debug, Clone)]
pub struct PriceLevel {
    pub price: Price,
    orders: VecDeque<Order>,
    total_quantity: Quantity,
}

impl PriceLevel {
    pub fn new(price: Price) -> Self {
        Self {
            price,
            orders: VecDeque::new(),
            total_quantity: Decimal::ZERO,
        }
    }

    /// Add an order to the back of the queue
    pub fn add_order(&mut self, order: Order) {
        self.total_quantity += order.remaining_quantity;
        self.orders.push_back(order);
    }

    /// Remove an order by ID from this price level
    pub fn remove_order(&mut self, order_id: &OrderId) -> Option<Order> {
        let pos = self.orders.iter().position(|o| &o.id == order_id)?;
        let order = self.orders.remove(pos)?;
        self.total_quantity -= order.remaining_quantity;
        Some(order)
    }

    /// Take up to `quantity` from the order at the front of the queue.
    /// Returns the filled order's state after the fill and the quantity taken;
    /// an order whose remaining quantity reaches zero is popped.
    pub fn fill_front(&mut self, quantity: Quantity) -> Option<(Order, Quantity)> {
        let front = self.orders.front_mut()?;
        let taken = quantity.min(front.remaining_quantity);

        // taken never exceeds remaining, so the fill cannot fail
        front.fill(taken).ok()?;
        self.total_quantity -= taken;

        let filled = if front.is_filled() {
            self.orders.pop_front()?
        } else {
            front.clone()
        };

        Some((filled, taken))
    }

    /// Change an order's remaining quantity in place, keeping its queue position.
    /// Returns the previous remaining quantity.
    pub fn set_order_quantity(&mut self, order_id: &OrderId, quantity: Quantity) -> Option<Quantity> {
        let order = self.orders.iter_mut().find(|o| &o.id == order_id)?;
        let old_quantity = order.remaining_quantity;

        order.remaining_quantity = quantity;
        order.original_quantity += quantity - old_quantity;
        self.total_quantity += quantity - old_quantity;

        Some(old_quantity)
    }

    /// Get total quantity at this price level
    pub fn total_quantity(&self) -> Quantity {
        self.total_quantity
    }

    /// Get number of orders at this price level
    pub fn order_count(&self) -> u32 {
        self.orders.len() as u32
    }

    /// Check if this price level is empty
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Orders in time priority
    pub fn orders(&self) -> impl Iterator<Item = &Order> + '_ {
        self.orders.iter()
    }

    /// Get depth information for this level
    pub fn get_depth_info(&self) -> (Quantity, u32) {
        (self.total_quantity(), self.order_count())
    }

    /// Sum of remaining quantities, recomputed from the queue
    pub(crate) fn recount_quantity(&self) -> Quantity {
        self.orders.iter().map(|o| o.remaining_quantity).sum()
    }
}

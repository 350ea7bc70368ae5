//! Read-only liquidity queries used by agents to price their orders.
//!
//! These are instantaneous answers: any intervening submission can
//! invalidate them.

use rust_decimal::Decimal;

use crate::orderbook::book::OrderBook;
use crate::orderbook::types::{round_currency, Price, Quantity, Side};

impl OrderBook {
    /// Bid price needed to buy `quantity` of the base currency right now: the
    /// deepest ask price touched while accumulating that much. If the asks
    /// cannot cover it, the deepest ask price. `None` with no asks.
    pub fn price_to_buy(&self, quantity: Quantity) -> Option<Price> {
        self.price_to_cover(Side::Sell, quantity)
    }

    /// Ask price needed to sell `quantity` of the base currency right now.
    pub fn price_to_sell(&self, quantity: Quantity) -> Option<Price> {
        self.price_to_cover(Side::Buy, quantity)
    }

    /// Base quantity obtainable from asks priced no higher than `limit`,
    /// spending at most `quote_budget` of the quoted currency if given.
    pub fn base_obtainable(&self, limit: Price, quote_budget: Option<Quantity>) -> Quantity {
        let mut bought = Decimal::ZERO;
        let mut spent = Decimal::ZERO;

        for ask in self.orders(Side::Sell).take_while(|ask| ask.price <= limit) {
            let cost = round_currency(ask.price * ask.remaining_quantity);
            if let Some(budget) = quote_budget {
                if spent.saturating_add(cost) > budget {
                    bought += round_currency((budget - spent) / ask.price);
                    break;
                }
            }
            spent = spent.saturating_add(cost);
            bought = bought.saturating_add(ask.remaining_quantity);
        }

        bought
    }

    /// Quoted currency obtainable by selling into bids priced no lower than
    /// `limit`, selling at most `base_budget` of the base currency if given.
    pub fn quote_obtainable(&self, limit: Price, base_budget: Option<Quantity>) -> Quantity {
        let mut received = Decimal::ZERO;
        let mut sold = Decimal::ZERO;

        for bid in self.orders(Side::Buy).take_while(|bid| bid.price >= limit) {
            if let Some(budget) = base_budget {
                if sold + bid.remaining_quantity > budget {
                    received += round_currency((budget - sold) * bid.price);
                    break;
                }
            }
            sold = sold.saturating_add(bid.remaining_quantity);
            received = received.saturating_add(round_currency(bid.price * bid.remaining_quantity));
        }

        received
    }

    fn price_to_cover(&self, side: Side, quantity: Quantity) -> Option<Price> {
        let mut last = None;
        for level in self.depth(side, None) {
            last = Some(level.price);
            if level.cumulative_quantity >= quantity {
                break;
            }
        }
        last
    }
}

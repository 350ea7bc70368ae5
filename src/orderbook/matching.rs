use tracing::debug;

use crate::orderbook::book_side::BookSide;
use crate::orderbook::types::{Fill, Order, OrderId, Price, Quantity, Side, Tick};

/// Fills and exhausted resting orders produced by matching one incoming order.
#[derive(Debug, Default)]
pub struct MatchOutcome {
    pub fills: Vec<Fill>,
    /// Resting orders that were fully filled and left the book
    pub exhausted: Vec<OrderId>,
}

/// Price-time priority matching of an incoming limit order against the
/// opposite side of the book.
pub struct MatchingEngine;

impl MatchingEngine {
    /// Match `incoming` greedily against `opposite`, best price first, FIFO
    /// within a price. Every fill executes at the resting order's price.
    /// Stops when the incoming order is filled, the best resting price no
    /// longer crosses, or the side is exhausted.
    pub fn match_order(incoming: &mut Order, opposite: &mut BookSide, tick: Tick) -> MatchOutcome {
        debug_assert_eq!(opposite.side(), incoming.side.opposite());

        let mut outcome = MatchOutcome::default();

        while !incoming.remaining_quantity.is_zero() {
            let Some(best) = opposite.best_price() else {
                break;
            };
            if !opposite.crosses(best, incoming.price) {
                break;
            }

            let Some((resting, quantity)) = opposite.fill_best(incoming.remaining_quantity) else {
                break;
            };

            // quantity = min(incoming, resting) so the incoming side cannot overfill
            incoming.remaining_quantity -= quantity;

            // The order already in the book sets the price
            let fill = Self::build_fill(incoming, &resting, resting.price, quantity, tick);
            debug!(
                "Matched {} against {}: {}@{}",
                incoming.id, resting.id, fill.quantity, fill.price
            );

            if resting.is_filled() {
                outcome.exhausted.push(resting.id);
            }
            outcome.fills.push(fill);
        }

        outcome
    }

    /// Whether two limit prices overlap
    pub fn prices_cross(bid: Price, ask: Price) -> bool {
        bid >= ask
    }

    fn build_fill(incoming: &Order, resting: &Order, price: Price, quantity: Quantity, tick: Tick) -> Fill {
        let (buy, sell) = match incoming.side {
            Side::Buy => (incoming, resting),
            Side::Sell => (resting, incoming),
        };

        Fill {
            buy_order_id: buy.id,
            sell_order_id: sell.id,
            buyer: buy.owner,
            seller: sell.owner,
            price,
            quantity,
            aggressor: incoming.side,
            tick,
            sequence: incoming.sequence,
        }
    }
}

use chrono::Utc;
use std::collections::HashSet;
use tracing::info;

use crate::orderbook::book::OrderBook;
use crate::orderbook::error::{OrderBookError, OrderBookResult};
use crate::orderbook::types::{round_currency, BookSnapshot, Side};

impl OrderBook {
    /// Capture every resting order plus the id and sequence counters.
    pub fn snapshot(&self) -> BookSnapshot {
        let (next_order_id, next_sequence) = self.counters();

        BookSnapshot {
            pair: self.pair(),
            tick: self.tick(),
            next_order_id,
            next_sequence,
            bids: self.orders(Side::Buy).cloned().collect(),
            asks: self.orders(Side::Sell).cloned().collect(),
            taken_at: Utc::now(),
        }
    }

    /// Rebuild a book from a snapshot. Resting orders keep their ids, owners
    /// and sequence numbers, so replaying the same submissions afterwards
    /// yields the same fills as the original book would have.
    pub fn restore(snapshot: BookSnapshot) -> OrderBookResult<OrderBook> {
        let invalid = |msg: String| Err(OrderBookError::InvalidSnapshot(msg));

        let mut book = OrderBook::new(snapshot.pair);
        book.set_tick(snapshot.tick);

        let mut orders = Vec::with_capacity(snapshot.bids.len() + snapshot.asks.len());
        for (expected, side_orders) in [(Side::Buy, snapshot.bids), (Side::Sell, snapshot.asks)] {
            for order in side_orders {
                if order.side != expected {
                    return invalid(format!("order {} listed on the {} side", order.id, expected));
                }
                orders.push(order);
            }
        }

        let mut seen_ids = HashSet::new();
        let mut seen_sequences = HashSet::new();
        for order in &orders {
            // Only what submit could have produced: in bounds and already rounded
            match OrderBook::validate(order.price, order.remaining_quantity) {
                Err(e) => return invalid(format!("order {}: {}", order.id, e)),
                Ok(terms) if terms != (order.price, order.remaining_quantity) => {
                    return invalid(format!("order {} is finer than currency precision", order.id));
                }
                Ok(_) => {}
            }
            if round_currency(order.original_quantity) != order.original_quantity
                || order.remaining_quantity > order.original_quantity
            {
                return invalid(format!("order {} has invalid quantity", order.id));
            }
            if !seen_ids.insert(order.id) {
                return invalid(format!("duplicate order id {}", order.id));
            }
            if !seen_sequences.insert(order.sequence) {
                return invalid(format!("duplicate sequence {}", order.sequence));
            }
            if order.id.0 >= snapshot.next_order_id || order.sequence >= snapshot.next_sequence {
                return invalid(format!("order {} is ahead of the book counters", order.id));
            }
        }

        // Re-inserting in sequence order rebuilds every level's time priority
        orders.sort_by_key(|order| order.sequence);
        let count = orders.len();
        for order in orders {
            book.add_order_to_book(order);
        }
        book.set_counters(snapshot.next_order_id, snapshot.next_sequence);

        book.check_invariants()
            .map_err(|e| OrderBookError::InvalidSnapshot(e.to_string()))?;

        info!("Restored order book {} with {} resting orders", book.pair(), count);
        Ok(book)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::types::{AgentId, CurrencyPair, OrderId, OrderRequest};
    use rust_decimal_macros::dec;

    fn populated_book() -> OrderBook {
        let mut book = OrderBook::new(CurrencyPair::NOMIN_FIAT);
        book.set_tick(3);
        book.submit(OrderRequest::bid(dec!(0.99), dec!(10), AgentId(1))).unwrap();
        book.submit(OrderRequest::bid(dec!(0.99), dec!(5), AgentId(2))).unwrap();
        book.submit(OrderRequest::bid(dec!(0.98), dec!(7), AgentId(3))).unwrap();
        book.submit(OrderRequest::ask(dec!(1.01), dec!(4), AgentId(4))).unwrap();
        book.submit(OrderRequest::ask(dec!(0.99), dec!(3), AgentId(5))).unwrap();
        book
    }

    #[test]
    fn test_snapshot_round_trip_through_json() {
        let book = populated_book();
        let snapshot = book.snapshot();

        let json = serde_json::to_string(&snapshot).unwrap();
        let decoded: BookSnapshot = serde_json::from_str(&json).unwrap();
        let restored = OrderBook::restore(decoded).unwrap();

        assert_eq!(restored.pair(), CurrencyPair::NOMIN_FIAT);
        assert_eq!(restored.tick(), 3);
        assert_eq!(restored.levels(Side::Buy), book.levels(Side::Buy));
        assert_eq!(restored.levels(Side::Sell), book.levels(Side::Sell));
        let original: Vec<_> = book.orders(Side::Buy).cloned().collect();
        let rebuilt: Vec<_> = restored.orders(Side::Buy).cloned().collect();
        assert_eq!(original, rebuilt);
    }

    #[test]
    fn test_restored_book_replays_identically() {
        let mut original = populated_book();
        let mut restored = OrderBook::restore(original.snapshot()).unwrap();

        let request = OrderRequest::ask(dec!(0.98), dec!(20), AgentId(9));
        let a = original.submit(request.clone()).unwrap();
        let b = restored.submit(request).unwrap();

        assert_eq!(a, b);
        assert_eq!(original.snapshot().bids, restored.snapshot().bids);
        assert_eq!(original.snapshot().asks, restored.snapshot().asks);
    }

    #[test]
    fn test_restore_rejects_crossed_snapshot() {
        let mut snapshot = populated_book().snapshot();
        let mut ask = snapshot.asks[0].clone();
        ask.price = dec!(0.5);
        snapshot.asks[0] = ask;

        assert!(matches!(
            OrderBook::restore(snapshot),
            Err(OrderBookError::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn test_restore_rejects_duplicates_and_wrong_side() {
        let mut snapshot = populated_book().snapshot();
        let duplicate = snapshot.bids[0].clone();
        snapshot.bids.push(duplicate);
        assert!(OrderBook::restore(snapshot).is_err());

        let mut snapshot = populated_book().snapshot();
        let misplaced = snapshot.asks.remove(0);
        snapshot.bids.push(misplaced);
        assert!(OrderBook::restore(snapshot).is_err());

        let mut snapshot = populated_book().snapshot();
        snapshot.bids[0].id = OrderId(snapshot.next_order_id + 10);
        assert!(OrderBook::restore(snapshot).is_err());
    }

    #[test]
    fn test_restore_accepts_only_submittable_terms() {
        let mut snapshot = populated_book().snapshot();
        snapshot.bids[0].price = dec!(0.989999999);
        assert!(matches!(
            OrderBook::restore(snapshot),
            Err(OrderBookError::InvalidSnapshot(_))
        ));

        let mut snapshot = populated_book().snapshot();
        snapshot.asks[0].remaining_quantity = dec!(3.000000001);
        snapshot.asks[0].original_quantity = dec!(4);
        assert!(OrderBook::restore(snapshot).is_err());

        let mut snapshot = populated_book().snapshot();
        snapshot.bids[0].original_quantity = dec!(10.000000001);
        assert!(OrderBook::restore(snapshot).is_err());

        let mut snapshot = populated_book().snapshot();
        snapshot.bids[0].remaining_quantity = dec!(50000000000000000000000000000);
        snapshot.bids[0].original_quantity = dec!(50000000000000000000000000000);
        assert!(OrderBook::restore(snapshot).is_err());

        // Trailing zeros are still at currency precision
        let mut snapshot = populated_book().snapshot();
        snapshot.bids[0].price = dec!(0.99000000);
        assert!(OrderBook::restore(snapshot).is_ok());
    }
}

use havven_orderbook::orderbook::{
    AgentId, OrderBook, OrderBookError, OrderId, OrderRequest, Side,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
enum Op {
    Submit { side: Side, price: i64, quantity: i64 },
    Cancel { pick: usize },
    Amend { pick: usize, price: i64, quantity: i64 },
}

/// Prices 0.1 .. 4.0, quantities 0.01 .. 50.00
fn any_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (any_side(), 1i64..40, 1i64..5_000)
            .prop_map(|(side, price, quantity)| Op::Submit { side, price, quantity }),
        2 => any::<usize>().prop_map(|pick| Op::Cancel { pick }),
        1 => (any::<usize>(), 1i64..40, 1i64..5_000)
            .prop_map(|(pick, price, quantity)| Op::Amend { pick, price, quantity }),
    ]
}

fn any_side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Buy), Just(Side::Sell)]
}

fn price(ticks: i64) -> Decimal {
    Decimal::new(ticks, 1)
}

fn quantity(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Per-side ledger of everything that entered or left the book
#[derive(Debug, Default)]
struct Ledger {
    submitted: [Decimal; 2],
    filled: [Decimal; 2],
    cancelled: [Decimal; 2],
}

fn slot(side: Side) -> usize {
    match side {
        Side::Buy => 0,
        Side::Sell => 1,
    }
}

/// Apply `ops`, returning every id the book handed out
fn apply(book: &mut OrderBook, ops: &[Op], ledger: &mut Ledger) -> Vec<OrderId> {
    let mut ids = Vec::new();

    for op in ops {
        match op {
            Op::Submit { side, price: p, quantity: q } => {
                let request = OrderRequest::new(*side, price(*p), quantity(*q), AgentId(1));
                let result = book.submit(request).unwrap();
                ledger.submitted[slot(*side)] += quantity(*q);
                for fill in &result.fills {
                    ledger.filled[0] += fill.quantity;
                    ledger.filled[1] += fill.quantity;
                }
                ids.push(result.order_id);
            }
            Op::Cancel { pick } => {
                if ids.is_empty() {
                    continue;
                }
                let id = ids[pick % ids.len()];
                match book.cancel(id) {
                    Ok(order) => ledger.cancelled[slot(order.side)] += order.remaining_quantity,
                    Err(e) => assert_eq!(e, OrderBookError::OrderNotFound(id)),
                }
            }
            Op::Amend { pick, price: p, quantity: q } => {
                if ids.is_empty() {
                    continue;
                }
                let id = ids[pick % ids.len()];
                let Some(order) = book.get_order(id).cloned() else {
                    assert!(book.amend(id, price(*p), quantity(*q)).is_err());
                    continue;
                };
                // Resizing is a cancel of the old remainder plus a new submission
                ledger.cancelled[slot(order.side)] += order.remaining_quantity;
                ledger.submitted[slot(order.side)] += quantity(*q);
                let result = book.amend(id, price(*p), quantity(*q)).unwrap();
                for fill in &result.fills {
                    ledger.filled[0] += fill.quantity;
                    ledger.filled[1] += fill.quantity;
                }
            }
        }
    }

    ids
}

proptest! {
    #[test]
    fn book_never_crosses(ops in prop::collection::vec(any_op(), 1..300)) {
        let mut book = OrderBook::default();
        let mut ledger = Ledger::default();
        apply(&mut book, &ops, &mut ledger);

        if let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) {
            prop_assert!(bid < ask);
        }
        prop_assert!(book.check_invariants().is_ok());
    }

    #[test]
    fn quantity_is_conserved(ops in prop::collection::vec(any_op(), 1..300)) {
        let mut book = OrderBook::default();
        let mut ledger = Ledger::default();
        apply(&mut book, &ops, &mut ledger);

        for side in [Side::Buy, Side::Sell] {
            let i = slot(side);
            prop_assert_eq!(
                ledger.submitted[i],
                ledger.filled[i] + book.resting_quantity(side) + ledger.cancelled[i]
            );
        }
    }

    #[test]
    fn depth_matches_resting_orders(ops in prop::collection::vec(any_op(), 1..300)) {
        let mut book = OrderBook::default();
        let mut ledger = Ledger::default();
        apply(&mut book, &ops, &mut ledger);

        for side in [Side::Buy, Side::Sell] {
            let depth: Vec<_> = book.depth(side, None).collect();
            let mut cumulative = Decimal::ZERO;

            for (i, level) in depth.iter().enumerate() {
                let at_price: Decimal = book
                    .orders(side)
                    .filter(|order| order.price == level.price)
                    .map(|order| order.remaining_quantity)
                    .sum();
                prop_assert_eq!(level.quantity, at_price);
                prop_assert!(level.quantity > Decimal::ZERO);

                cumulative += level.quantity;
                prop_assert_eq!(level.cumulative_quantity, cumulative);

                if i > 0 {
                    let previous = depth[i - 1].price;
                    match side {
                        Side::Buy => prop_assert!(level.price < previous),
                        Side::Sell => prop_assert!(level.price > previous),
                    }
                }
            }
            prop_assert_eq!(cumulative, book.resting_quantity(side));
        }
    }

    #[test]
    fn equal_prices_fill_in_submission_order(
        quantities in prop::collection::vec(1i64..1_000, 2..20),
        sweep in 1i64..20_000,
    ) {
        let mut book = OrderBook::default();
        let mut ids = Vec::new();
        for (owner, q) in quantities.iter().enumerate() {
            let request = OrderRequest::bid(price(10), quantity(*q), AgentId(owner as u64));
            ids.push(book.submit(request).unwrap().order_id);
        }

        let result = book
            .submit(OrderRequest::ask(price(10), quantity(sweep), AgentId(99)))
            .unwrap();

        let filled: Vec<_> = result.fills.iter().map(|fill| fill.buy_order_id).collect();
        prop_assert_eq!(&filled[..], &ids[..filled.len()]);

        // Only the last order touched may be left partially filled
        for fill in result.fills.iter().rev().skip(1) {
            prop_assert!(!book.contains(fill.buy_order_id));
        }
    }

    #[test]
    fn clear_is_idempotent(ops in prop::collection::vec(any_op(), 0..100)) {
        let mut book = OrderBook::default();
        let mut ledger = Ledger::default();
        apply(&mut book, &ops, &mut ledger);

        book.clear();
        let once = book.snapshot();
        book.clear();
        let twice = book.snapshot();

        prop_assert!(book.is_empty());
        prop_assert_eq!(book.best_bid(), None);
        prop_assert_eq!(book.best_ask(), None);
        prop_assert_eq!(once.next_order_id, twice.next_order_id);
        prop_assert_eq!(once.next_sequence, twice.next_sequence);
        prop_assert!(twice.bids.is_empty() && twice.asks.is_empty());
    }

    #[test]
    fn restored_book_behaves_identically(
        setup in prop::collection::vec(any_op(), 0..150),
        replay in prop::collection::vec(any_op(), 0..150),
    ) {
        let mut original = OrderBook::default();
        let mut ledger = Ledger::default();
        apply(&mut original, &setup, &mut ledger);

        let mut restored = OrderBook::restore(original.snapshot()).unwrap();
        prop_assert_eq!(restored.levels(Side::Buy), original.levels(Side::Buy));
        prop_assert_eq!(restored.levels(Side::Sell), original.levels(Side::Sell));

        // Replay only submissions; ids from the setup phase are not shared
        for op in replay {
            if let Op::Submit { side, price: p, quantity: q } = op {
                let request = OrderRequest::new(side, price(p), quantity(q), AgentId(2));
                prop_assert_eq!(
                    original.submit(request.clone()).unwrap(),
                    restored.submit(request).unwrap()
                );
            }
        }

        prop_assert_eq!(original.snapshot().bids, restored.snapshot().bids);
        prop_assert_eq!(original.snapshot().asks, restored.snapshot().asks);
    }
}

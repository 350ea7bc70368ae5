//! Market maker agent
//!
//! Quotes both sides of one market around a predicted price. A quoting
//! cycle starts from the rolling price and the latest price gradient; the
//! distance between the quotes and the prediction shrinks linearly from the
//! initial margin to the ending margin. Between cycles the maker sits out
//! for a fixed number of ticks.

use rand::rngs::StdRng;
use rand::Rng;
use rust_decimal::Decimal;
use tracing::debug;

use super::{AgentAction, OrderProposer};
use crate::config::MarketMakerConfig;
use crate::market::Exchange;
use crate::orderbook::{
    round_currency, AgentId, CurrencyPair, Fill, OrderBookError, OrderId, OrderRequest, Price,
    Quantity, Side, SubmitResult, Tick,
};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Cycle {
    start_price: Price,
    gradient: Decimal,
    bid: Option<OrderId>,
    ask: Option<OrderId>,
}

#[derive(Debug, Clone)]
pub struct MarketMaker {
    id: AgentId,
    pair: CurrencyPair,
    config: MarketMakerConfig,
    /// Ticks since the last cycle ended; may start negative to stagger makers
    since_last_cycle: i64,
    cycle: Option<Cycle>,
    traded_quantity: Quantity,
}

impl MarketMaker {
    pub fn new(id: AgentId, pair: CurrencyPair, config: MarketMakerConfig, rng: &mut StdRng) -> Self {
        Self {
            id,
            pair,
            config,
            since_last_cycle: rng.random_range(-20..=10),
            cycle: None,
            traded_quantity: Decimal::ZERO,
        }
    }

    pub fn pair(&self) -> CurrencyPair {
        self.pair
    }

    pub fn is_quoting(&self) -> bool {
        self.cycle.is_some()
    }

    /// Base quantity this agent has traded so far
    pub fn traded_quantity(&self) -> Quantity {
        self.traded_quantity
    }

    /// Bid and ask for the given number of ticks into a cycle.
    pub fn quote_prices(&self, start_price: Price, gradient: Decimal, elapsed: Tick) -> (Price, Price) {
        let predicted = start_price + gradient * Decimal::from(elapsed);

        let duration = Decimal::from(self.config.quote_duration);
        let remaining = Decimal::from(self.config.quote_duration.saturating_sub(elapsed));
        let margin = remaining / duration * (self.config.initial_margin - self.config.ending_margin)
            + self.config.ending_margin;

        let bid_base = predicted.max(self.config.minimal_price);
        let ask_base = predicted.max(self.config.minimal_price * Decimal::TWO);

        (
            round_currency(bid_base * (Decimal::ONE - margin)),
            round_currency(ask_base * (Decimal::ONE + margin)),
        )
    }

    fn wait(&self) -> i64 {
        self.config.minimal_wait as i64
    }

    fn cycle_length(&self) -> i64 {
        self.wait() + self.config.quote_duration as i64
    }

    fn quote(&self, side: Side, price: Price, resting: Option<OrderId>) -> AgentAction {
        match resting {
            Some(order_id) => AgentAction::Amend {
                pair: self.pair,
                order_id,
                price,
                quantity: self.config.quote_size,
            },
            None => AgentAction::Submit {
                pair: self.pair,
                request: OrderRequest::new(side, price, self.config.quote_size, self.id),
            },
        }
    }

    fn forget(&mut self, order_id: OrderId) {
        if let Some(cycle) = self.cycle.as_mut() {
            if cycle.bid == Some(order_id) {
                cycle.bid = None;
            }
            if cycle.ask == Some(order_id) {
                cycle.ask = None;
            }
        }
    }
}

impl OrderProposer for MarketMaker {
    fn id(&self) -> AgentId {
        self.id
    }

    fn name(&self) -> String {
        format!("MarketMaker {} ({})", self.id, self.pair)
    }

    fn propose(&mut self, exchange: &Exchange, _tick: Tick, _rng: &mut StdRng) -> Vec<AgentAction> {
        let Some(book) = exchange.book(self.pair) else {
            return Vec::new();
        };

        // A quote that is no longer resting was filled
        if let Some(cycle) = self.cycle.as_mut() {
            cycle.bid = cycle.bid.filter(|id| book.contains(*id));
            cycle.ask = cycle.ask.filter(|id| book.contains(*id));
        }

        let mut actions = Vec::new();

        if self.since_last_cycle >= self.cycle_length() {
            if let Some(cycle) = self.cycle.take() {
                actions.extend(cycle.bid.into_iter().chain(cycle.ask).map(|order_id| {
                    AgentAction::Cancel {
                        pair: self.pair,
                        order_id,
                    }
                }));
            }
            self.since_last_cycle = 0;
            debug!("{} ended its quoting cycle", self.name());
        } else if let Some(cycle) = self.cycle {
            let elapsed = (self.since_last_cycle - self.wait()).max(0) as Tick;
            let (bid, ask) = self.quote_prices(cycle.start_price, cycle.gradient, elapsed);
            actions.push(self.quote(Side::Buy, bid, cycle.bid));
            actions.push(self.quote(Side::Sell, ask, cycle.ask));
        } else if self.since_last_cycle >= self.wait() {
            self.since_last_cycle = self.wait();

            let Some(history) = exchange.history(self.pair) else {
                return actions;
            };
            let prices = history.price_series();
            if prices.len() < 2 {
                return actions;
            }
            let gradient = (prices[prices.len() - 1] - prices[prices.len() - 2]) / Decimal::TWO;
            let start_price = history.last_price();

            let cycle = Cycle {
                start_price,
                gradient,
                bid: None,
                ask: None,
            };
            let (bid, ask) = self.quote_prices(start_price, gradient, 0);
            actions.push(self.quote(Side::Buy, bid, None));
            actions.push(self.quote(Side::Sell, ask, None));
            self.cycle = Some(cycle);
            debug!("{} started quoting around {}", self.name(), start_price);
        }

        self.since_last_cycle += 1;
        actions
    }

    fn on_submitted(&mut self, action: &AgentAction, result: &SubmitResult) {
        let Some(cycle) = self.cycle.as_mut() else {
            return;
        };
        let resting = result.is_resting().then_some(result.order_id);

        match action {
            AgentAction::Submit { request, .. } => match request.side {
                Side::Buy => cycle.bid = resting,
                Side::Sell => cycle.ask = resting,
            },
            AgentAction::Amend { order_id, .. } if resting.is_none() => self.forget(*order_id),
            _ => {}
        }
    }

    fn on_fill(&mut self, _pair: CurrencyPair, fill: &Fill) {
        self.traded_quantity += fill.quantity;
    }

    fn on_rejected(&mut self, action: &AgentAction, _error: &OrderBookError) {
        if let Some(order_id) = action.order_id() {
            self.forget(order_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HistoryConfig;
    use rand::SeedableRng;
    use rust_decimal_macros::dec;

    fn maker() -> MarketMaker {
        let mut rng = StdRng::seed_from_u64(1);
        let mut maker = MarketMaker::new(
            AgentId(9),
            CurrencyPair::NOMIN_FIAT,
            MarketMakerConfig {
                initial_margin: dec!(0.05),
                ending_margin: dec!(0.01),
                quote_duration: 4,
                minimal_wait: 1,
                quote_size: dec!(10),
                minimal_price: dec!(0.0001),
            },
            &mut rng,
        );
        maker.since_last_cycle = 0;
        maker
    }

    fn apply(exchange: &mut Exchange, maker: &mut MarketMaker, actions: Vec<AgentAction>) {
        for action in actions {
            match &action {
                AgentAction::Submit { pair, request } => {
                    let result = exchange.submit(*pair, request.clone()).unwrap();
                    maker.on_submitted(&action, &result);
                }
                AgentAction::Amend {
                    pair,
                    order_id,
                    price,
                    quantity,
                } => {
                    let result = exchange.amend(*pair, *order_id, *price, *quantity).unwrap();
                    maker.on_submitted(&action, &result);
                }
                AgentAction::Cancel { pair, order_id } => {
                    exchange.cancel(*pair, *order_id).unwrap();
                }
            }
        }
    }

    #[test]
    fn test_margin_narrows_over_cycle() {
        let maker = maker();

        let (bid, ask) = maker.quote_prices(dec!(1), dec!(0), 0);
        assert_eq!((bid, ask), (dec!(0.95), dec!(1.05)));

        let (bid, ask) = maker.quote_prices(dec!(1), dec!(0), 2);
        assert_eq!((bid, ask), (dec!(0.97), dec!(1.03)));

        let (bid, ask) = maker.quote_prices(dec!(1), dec!(0), 4);
        assert_eq!((bid, ask), (dec!(0.99), dec!(1.01)));
    }

    #[test]
    fn test_prediction_follows_gradient_with_price_floor() {
        let maker = maker();
        let (bid, _) = maker.quote_prices(dec!(1), dec!(0.1), 4);
        assert_eq!(bid, round_currency(dec!(1.4) * dec!(0.99)));

        let (bid, ask) = maker.quote_prices(dec!(0.0001), dec!(-1), 4);
        assert_eq!(bid, round_currency(dec!(0.0001) * dec!(0.99)));
        assert_eq!(ask, round_currency(dec!(0.0002) * dec!(1.01)));
    }

    #[test]
    fn test_quoting_cycle() {
        let mut exchange = Exchange::new(&HistoryConfig::default());
        let mut maker = maker();
        let mut rng = StdRng::seed_from_u64(2);
        let pair = CurrencyPair::NOMIN_FIAT;

        // Needs two closed ticks of price history before quoting
        for _ in 0..2 {
            let actions = maker.propose(&exchange, exchange.tick(), &mut rng);
            assert!(actions.is_empty());
            exchange.step();
        }

        let actions = maker.propose(&exchange, exchange.tick(), &mut rng);
        assert_eq!(actions.len(), 2);
        assert!(actions.iter().all(|a| matches!(a, AgentAction::Submit { .. })));
        apply(&mut exchange, &mut maker, actions);
        assert!(maker.is_quoting());
        assert_eq!(exchange.book(pair).unwrap().best_bid(), Some(dec!(0.95)));
        assert_eq!(exchange.book(pair).unwrap().best_ask(), Some(dec!(1.05)));
        exchange.step();

        // Following ticks amend the same two orders inward
        let actions = maker.propose(&exchange, exchange.tick(), &mut rng);
        assert!(actions.iter().all(|a| matches!(a, AgentAction::Amend { .. })));
        apply(&mut exchange, &mut maker, actions);
        assert_eq!(exchange.book(pair).unwrap().total_orders(), 2);
        assert!(exchange.book(pair).unwrap().best_bid() > Some(dec!(0.95)));
        exchange.step();

        // Two more amends, then the cycle ends and both quotes are withdrawn
        for _ in 0..3 {
            let actions = maker.propose(&exchange, exchange.tick(), &mut rng);
            apply(&mut exchange, &mut maker, actions);
            exchange.step();
        }
        assert!(!maker.is_quoting());
        assert!(exchange.book(pair).unwrap().is_empty());
    }

    #[test]
    fn test_filled_quote_is_replaced() {
        let mut exchange = Exchange::new(&HistoryConfig::default());
        let mut maker = maker();
        let mut rng = StdRng::seed_from_u64(2);
        let pair = CurrencyPair::NOMIN_FIAT;

        for _ in 0..2 {
            let actions = maker.propose(&exchange, exchange.tick(), &mut rng);
            apply(&mut exchange, &mut maker, actions);
            exchange.step();
        }
        let actions = maker.propose(&exchange, exchange.tick(), &mut rng);
        apply(&mut exchange, &mut maker, actions);
        exchange.step();

        // Someone lifts the whole ask
        exchange
            .submit(pair, OrderRequest::bid(dec!(2), dec!(10), AgentId(1)))
            .unwrap();

        let actions = maker.propose(&exchange, exchange.tick(), &mut rng);
        assert!(matches!(actions[0], AgentAction::Amend { .. }));
        assert!(matches!(
            actions[1],
            AgentAction::Submit { request: OrderRequest { side: Side::Sell, .. }, .. }
        ));
    }
}

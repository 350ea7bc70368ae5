//! Randomizer agent
//!
//! Provides background liquidity: random bids and asks scattered around the
//! rolling price of a randomly chosen market.

use rand::rngs::StdRng;
use rand::Rng;
use rust_decimal::Decimal;

use super::{AgentAction, OrderProposer};
use crate::config::RandomizerConfig;
use crate::market::Exchange;
use crate::orderbook::{
    round_currency, AgentId, CurrencyPair, Fill, OrderId, OrderRequest, Quantity, Side,
    SubmitResult, Tick,
};

#[derive(Debug, Clone, Copy, PartialEq)]
struct OpenOrder {
    pair: CurrencyPair,
    order_id: OrderId,
    placed_at: Tick,
}

#[derive(Debug, Clone)]
pub struct Randomizer {
    id: AgentId,
    config: RandomizerConfig,
    open_orders: Vec<OpenOrder>,
    current_tick: Tick,
    traded_quantity: Quantity,
}

impl Randomizer {
    pub fn new(id: AgentId, config: RandomizerConfig) -> Self {
        Self {
            id,
            config,
            open_orders: Vec::new(),
            current_tick: 0,
            traded_quantity: Decimal::ZERO,
        }
    }

    /// Orders this agent believes are still resting
    pub fn open_order_count(&self) -> usize {
        self.open_orders.len()
    }

    /// Base quantity this agent has traded so far
    pub fn traded_quantity(&self) -> Quantity {
        self.traded_quantity
    }

    fn random_order(&self, exchange: &Exchange, rng: &mut StdRng) -> Option<AgentAction> {
        let pair = CurrencyPair::ALL[rng.random_range(0..CurrencyPair::ALL.len())];
        let side = if rng.random::<bool>() { Side::Buy } else { Side::Sell };
        let price = exchange.price(pair)?;

        let swing = Decimal::try_from(2.0 * rng.random::<f64>() - 1.0).ok()?;
        let movement = round_currency(swing * price * self.config.variance);
        let size = Decimal::try_from(rng.random_range(0.1..1.0)).ok()?;
        let quantity = round_currency(self.config.order_size * size);

        Some(AgentAction::Submit {
            pair,
            request: OrderRequest::new(side, price + movement, quantity, self.id),
        })
    }
}

impl OrderProposer for Randomizer {
    fn id(&self) -> AgentId {
        self.id
    }

    fn name(&self) -> String {
        format!("Randomizer {}", self.id)
    }

    fn propose(&mut self, exchange: &Exchange, tick: Tick, rng: &mut StdRng) -> Vec<AgentAction> {
        self.current_tick = tick;

        // Forget orders that were filled since last tick
        self.open_orders.retain(|open| {
            exchange
                .book(open.pair)
                .is_some_and(|book| book.contains(open.order_id))
        });

        let lifetime = self.config.order_lifetime;
        let mut actions: Vec<AgentAction> = self
            .open_orders
            .iter()
            .filter(|open| tick > open.placed_at + lifetime)
            .map(|open| AgentAction::Cancel {
                pair: open.pair,
                order_id: open.order_id,
            })
            .collect();
        self.open_orders
            .retain(|open| tick <= open.placed_at + lifetime);

        if self.open_orders.len() < self.config.max_orders {
            actions.extend(self.random_order(exchange, rng));
        }

        actions
    }

    fn on_submitted(&mut self, action: &AgentAction, result: &SubmitResult) {
        if result.is_resting() {
            self.open_orders.push(OpenOrder {
                pair: action.pair(),
                order_id: result.order_id,
                placed_at: self.current_tick,
            });
        }
    }

    fn on_fill(&mut self, _pair: CurrencyPair, fill: &Fill) {
        self.traded_quantity += fill.quantity;
    }
}

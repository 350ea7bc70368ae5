//! Simulated market participants
//!
//! Agents never touch a book directly. Each tick they look at the exchange,
//! propose a list of actions, and the simulation applies them in order and
//! reports the outcome back through the callbacks.

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::market::Exchange;
use crate::orderbook::{
    AgentId, CurrencyPair, Fill, Order, OrderBookError, OrderId, OrderRequest, Price, Quantity,
    SubmitResult, Tick,
};

pub mod market_maker;
pub mod randomizer;

pub use market_maker::MarketMaker;
pub use randomizer::Randomizer;

/// Something an agent wants done on one market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AgentAction {
    /// Place a new limit order
    Submit {
        pair: CurrencyPair,
        request: OrderRequest,
    },
    /// Withdraw a resting order
    Cancel { pair: CurrencyPair, order_id: OrderId },
    /// Re-price and/or resize a resting order
    Amend {
        pair: CurrencyPair,
        order_id: OrderId,
        price: Price,
        quantity: Quantity,
    },
}

impl AgentAction {
    pub fn pair(&self) -> CurrencyPair {
        match self {
            AgentAction::Submit { pair, .. }
            | AgentAction::Cancel { pair, .. }
            | AgentAction::Amend { pair, .. } => *pair,
        }
    }

    /// Order the action refers to, if it already exists
    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            AgentAction::Submit { .. } => None,
            AgentAction::Cancel { order_id, .. } | AgentAction::Amend { order_id, .. } => {
                Some(*order_id)
            }
        }
    }
}

/// A participant that proposes order flow each tick
pub trait OrderProposer: Send {
    fn id(&self) -> AgentId;

    /// Short label for logs
    fn name(&self) -> String;

    /// Decide what to do this tick given the current state of every market
    fn propose(&mut self, exchange: &Exchange, tick: Tick, rng: &mut StdRng) -> Vec<AgentAction>;

    /// A `Submit` or `Amend` went through
    fn on_submitted(&mut self, _action: &AgentAction, _result: &SubmitResult) {}

    /// One of this agent's orders traded, either incoming or resting
    fn on_fill(&mut self, _pair: CurrencyPair, _fill: &Fill) {}

    /// An action was refused; the books are unchanged
    fn on_rejected(&mut self, _action: &AgentAction, _error: &OrderBookError) {}

    fn on_cancelled(&mut self, _pair: CurrencyPair, _order: &Order) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_action_accessors() {
        let submit = AgentAction::Submit {
            pair: CurrencyPair::HAVVEN_FIAT,
            request: OrderRequest::bid(dec!(1), dec!(1), AgentId(1)),
        };
        let amend = AgentAction::Amend {
            pair: CurrencyPair::NOMIN_FIAT,
            order_id: OrderId(4),
            price: dec!(1),
            quantity: dec!(2),
        };

        assert_eq!(submit.pair(), CurrencyPair::HAVVEN_FIAT);
        assert_eq!(submit.order_id(), None);
        assert_eq!(amend.pair(), CurrencyPair::NOMIN_FIAT);
        assert_eq!(amend.order_id(), Some(OrderId(4)));
    }
}

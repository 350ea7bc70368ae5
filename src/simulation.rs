//! Discrete-time simulation driver
//!
//! One tick: every agent in a fixed order looks at the exchange and its
//! actions are applied immediately, then the exchange closes the tick.
//! Everything random flows from one seeded generator, so a config and seed
//! fully determine the run.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::agents::{AgentAction, MarketMaker, OrderProposer, Randomizer};
use crate::config::{ConfigError, SimulationConfig};
use crate::market::Exchange;
use crate::metrics::OrderBookMetrics;
use crate::orderbook::{
    AgentId, CurrencyPair, Fill, Order, OrderBookError, OrderBookResult, Price, Quantity,
    SubmitResult, Tick,
};

/// Operation counts over a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationStats {
    pub submitted: u64,
    pub amended: u64,
    pub cancelled: u64,
    pub rejected: u64,
    pub missed: u64,
    pub fills: u64,
}

/// End-of-run state of one market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketReport {
    pub pair: CurrencyPair,
    pub rolling_price: Price,
    pub last_trade_price: Option<Price>,
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
    pub resting_orders: usize,
    pub volume: Quantity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub seed: u64,
    pub ticks: Tick,
    pub agents: usize,
    pub stats: SimulationStats,
    pub markets: Vec<MarketReport>,
}

impl SimulationReport {
    pub fn total_volume(&self) -> Quantity {
        self.markets.iter().map(|market| market.volume).sum()
    }
}

enum Applied {
    Submitted(SubmitResult),
    Amended(SubmitResult),
    Cancelled(Order),
}

pub struct Simulation {
    config: SimulationConfig,
    exchange: Exchange,
    agents: Vec<Box<dyn OrderProposer>>,
    agent_index: HashMap<AgentId, usize>,
    rng: StdRng,
    stats: SimulationStats,
}

impl Simulation {
    /// Build a simulation with the configured population of agents
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        Self::build(config, None)
    }

    pub fn with_metrics(
        config: SimulationConfig,
        metrics: Arc<OrderBookMetrics>,
    ) -> Result<Self, ConfigError> {
        Self::build(config, Some(metrics))
    }

    fn build(
        config: SimulationConfig,
        metrics: Option<Arc<OrderBookMetrics>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut exchange = Exchange::new(&config.history);
        if let Some(metrics) = metrics {
            exchange = exchange.with_metrics(metrics);
        }

        let mut simulation = Self {
            rng: StdRng::seed_from_u64(config.seed),
            exchange,
            agents: Vec::new(),
            agent_index: HashMap::new(),
            stats: SimulationStats::default(),
            config,
        };

        let mut next_id = 1;
        for _ in 0..simulation.config.agents.randomizers {
            let agent = Randomizer::new(AgentId(next_id), simulation.config.randomizer.clone());
            simulation.add_agent(Box::new(agent));
            next_id += 1;
        }
        for i in 0..simulation.config.agents.market_makers {
            let pair = CurrencyPair::ALL[i % CurrencyPair::ALL.len()];
            let agent = MarketMaker::new(
                AgentId(next_id),
                pair,
                simulation.config.market_maker.clone(),
                &mut simulation.rng,
            );
            simulation.add_agent(Box::new(agent));
            next_id += 1;
        }

        info!(
            "Simulation ready: seed {} with {} agents",
            simulation.config.seed,
            simulation.agents.len()
        );
        Ok(simulation)
    }

    /// Append an agent to the end of the iteration order
    pub fn add_agent(&mut self, agent: Box<dyn OrderProposer>) {
        self.agent_index.insert(agent.id(), self.agents.len());
        self.agents.push(agent);
    }

    pub fn exchange(&self) -> &Exchange {
        &self.exchange
    }

    pub fn tick(&self) -> Tick {
        self.exchange.tick()
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    /// Run one tick. A broken book or an action on an unlisted market is an
    /// error; refused orders and missed cancels are handed back to the agent
    /// that proposed them.
    pub fn step(&mut self) -> OrderBookResult<()> {
        let tick = self.exchange.tick();

        for index in 0..self.agents.len() {
            let actions = self.agents[index].propose(&self.exchange, tick, &mut self.rng);
            for action in actions {
                self.apply(index, action)?;
            }
        }

        self.exchange.step();
        Ok(())
    }

    /// Run the configured number of ticks from wherever the clock stands
    pub fn run(&mut self) -> OrderBookResult<SimulationReport> {
        for _ in 0..self.config.ticks {
            self.step()?;
        }
        self.exchange.check_invariants()?;

        let report = self.report();
        info!(
            "Simulation seed {} finished {} ticks: {} fills, volume {}",
            report.seed,
            report.ticks,
            report.stats.fills,
            report.total_volume()
        );
        Ok(report)
    }

    pub fn report(&self) -> SimulationReport {
        let markets = self
            .exchange
            .pairs()
            .filter_map(|pair| {
                let book = self.exchange.book(pair)?;
                let history = self.exchange.history(pair)?;
                Some(MarketReport {
                    pair,
                    rolling_price: history.last_price(),
                    last_trade_price: book.last_trade_price(),
                    best_bid: book.best_bid(),
                    best_ask: book.best_ask(),
                    resting_orders: book.total_orders(),
                    volume: history.total_volume(),
                })
            })
            .collect();

        SimulationReport {
            seed: self.config.seed,
            ticks: self.exchange.tick(),
            agents: self.agents.len(),
            stats: self.stats.clone(),
            markets,
        }
    }

    fn apply(&mut self, index: usize, action: AgentAction) -> OrderBookResult<()> {
        let pair = action.pair();
        let outcome = match &action {
            AgentAction::Submit { request, .. } => self
                .exchange
                .submit(pair, request.clone())
                .map(Applied::Submitted),
            AgentAction::Amend {
                order_id,
                price,
                quantity,
                ..
            } => self
                .exchange
                .amend(pair, *order_id, *price, *quantity)
                .map(Applied::Amended),
            AgentAction::Cancel { order_id, .. } => {
                self.exchange.cancel(pair, *order_id).map(Applied::Cancelled)
            }
        };

        match outcome {
            Ok(Applied::Submitted(result)) => {
                self.stats.submitted += 1;
                self.dispatch_fills(pair, &result.fills);
                self.agents[index].on_submitted(&action, &result);
            }
            Ok(Applied::Amended(result)) => {
                self.stats.amended += 1;
                self.dispatch_fills(pair, &result.fills);
                self.agents[index].on_submitted(&action, &result);
            }
            Ok(Applied::Cancelled(order)) => {
                self.stats.cancelled += 1;
                self.agents[index].on_cancelled(pair, &order);
            }
            Err(e) if e.is_recoverable() => {
                if matches!(e, OrderBookError::OrderNotFound(_)) {
                    self.stats.missed += 1;
                    debug!("{} on {}: {}", self.agents[index].name(), pair, e);
                } else {
                    self.stats.rejected += 1;
                    warn!("{} on {}: {}", self.agents[index].name(), pair, e);
                }
                self.agents[index].on_rejected(&action, &e);
            }
            Err(e) => return Err(e),
        }

        Ok(())
    }

    fn dispatch_fills(&mut self, pair: CurrencyPair, fills: &[Fill]) {
        self.stats.fills += fills.len() as u64;

        for fill in fills {
            let mut owners = vec![fill.buyer];
            if fill.seller != fill.buyer {
                owners.push(fill.seller);
            }
            for owner in owners {
                if let Some(&i) = self.agent_index.get(&owner) {
                    self.agents[i].on_fill(pair, fill);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::{OrderRequest, Side};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn small_config() -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.ticks = 60;
        config.agents.randomizers = 6;
        config.agents.market_makers = 3;
        config
    }

    /// Proposes a fixed list of actions on the first tick and nothing after
    struct Scripted {
        id: AgentId,
        script: Vec<AgentAction>,
    }

    impl OrderProposer for Scripted {
        fn id(&self) -> AgentId {
            self.id
        }

        fn name(&self) -> String {
            "Scripted".to_string()
        }

        fn propose(&mut self, _exchange: &Exchange, _tick: Tick, _rng: &mut StdRng) -> Vec<AgentAction> {
            std::mem::take(&mut self.script)
        }
    }

    #[test]
    fn test_invalid_config_refused() {
        let mut config = SimulationConfig::default();
        config.history.rolling_window = 0;
        assert!(Simulation::new(config).is_err());
    }

    #[test]
    fn test_population() {
        let simulation = Simulation::new(small_config()).unwrap();
        assert_eq!(simulation.report().agents, 9);
        assert_eq!(simulation.tick(), 0);
    }

    #[test]
    fn test_run_produces_trades() {
        let mut simulation = Simulation::new(small_config()).unwrap();
        let report = simulation.run().unwrap();

        assert_eq!(report.ticks, 60);
        assert_eq!(report.markets.len(), 3);
        assert!(report.stats.submitted > 0);
        assert!(report.stats.fills > 0);
        assert!(report.total_volume() > Decimal::ZERO);
        assert!(report.markets.iter().any(|market| market.volume > Decimal::ZERO));
        assert!(simulation.exchange().check_invariants().is_ok());
    }

    #[test]
    fn test_recoverable_errors_go_back_to_agent() {
        let mut config = small_config();
        config.agents.randomizers = 0;
        config.agents.market_makers = 0;
        let mut simulation = Simulation::new(config).unwrap();

        let pair = CurrencyPair::HAVVEN_NOMIN;
        simulation.add_agent(Box::new(Scripted {
            id: AgentId(100),
            script: vec![
                AgentAction::Submit {
                    pair,
                    request: OrderRequest::new(Side::Sell, dec!(1), dec!(2), AgentId(100)),
                },
                AgentAction::Submit {
                    pair,
                    request: OrderRequest::new(Side::Buy, dec!(0), dec!(2), AgentId(100)),
                },
                AgentAction::Cancel {
                    pair,
                    order_id: crate::orderbook::OrderId(999),
                },
            ],
        }));
        simulation.add_agent(Box::new(Scripted {
            id: AgentId(101),
            script: vec![AgentAction::Submit {
                pair,
                request: OrderRequest::new(Side::Buy, dec!(1.5), dec!(1), AgentId(101)),
            }],
        }));

        simulation.step().unwrap();

        let stats = simulation.stats();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.missed, 1);
        assert_eq!(stats.fills, 1);

        let book = simulation.exchange().book(pair).unwrap();
        assert_eq!(book.best_ask(), Some(dec!(1)));
        assert_eq!(book.best_level_quantity(Side::Sell), dec!(1));
        assert_eq!(simulation.exchange().price(pair), Some(dec!(1)));
    }

    #[test]
    fn test_unlisted_market_stops_the_run() {
        let mut config = small_config();
        config.agents.randomizers = 0;
        config.agents.market_makers = 0;
        let mut simulation = Simulation::new(config).unwrap();

        let reversed = CurrencyPair::new(
            CurrencyPair::NOMIN_FIAT.quote,
            CurrencyPair::NOMIN_FIAT.base,
        );
        simulation.add_agent(Box::new(Scripted {
            id: AgentId(100),
            script: vec![AgentAction::Submit {
                pair: reversed,
                request: OrderRequest::new(Side::Buy, dec!(1), dec!(1), AgentId(100)),
            }],
        }));

        assert_eq!(
            simulation.step(),
            Err(OrderBookError::UnknownMarket(reversed))
        );
        assert_eq!(simulation.stats().rejected, 0);
    }
}

//! Simulation configuration
//!
//! Every field has a default, so an empty JSON object is a valid config.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::orderbook::{CurrencyPair, Currency, Price, Quantity, Tick};

/// Top level configuration for a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seed for the agents' random number generator
    pub seed: u64,
    /// Number of ticks to run
    pub ticks: Tick,
    /// Independent replicas run side by side, seeded `seed + i`
    pub replicas: usize,
    pub agents: AgentCounts,
    pub randomizer: RandomizerConfig,
    pub market_maker: MarketMakerConfig,
    pub history: HistoryConfig,
    pub metrics: MetricsConfig,
    /// Where to write the final books of the first replica
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentCounts {
    pub randomizers: usize,
    /// Market makers are spread over the standard pairs in turn
    pub market_makers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomizerConfig {
    /// Orders are placed within +/- variance * price of the rolling price
    pub variance: Decimal,
    /// Orders resting longer than this many ticks are cancelled
    pub order_lifetime: Tick,
    /// Never hold more than this many resting orders
    pub max_orders: usize,
    /// Upper bound for the base quantity of one order
    pub order_size: Quantity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketMakerConfig {
    /// Relative distance of both quotes from the predicted price when a
    /// quoting cycle starts
    pub initial_margin: Decimal,
    /// Relative distance at the end of the cycle
    pub ending_margin: Decimal,
    /// Length of a quoting cycle in ticks
    pub quote_duration: Tick,
    /// Ticks to sit out between cycles
    pub minimal_wait: Tick,
    /// Base quantity offered on each side
    pub quote_size: Quantity,
    /// Floor for the bid price; asks are floored at twice this
    pub minimal_price: Price,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Ticks covered by the rolling average price
    pub rolling_window: Tick,
    /// Weight the rolling average by traded quantity
    pub volume_weighted: bool,
    pub initial_prices: InitialPrices,
}

/// Rolling price each market reports before its first trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialPrices {
    pub havven_nomin: Price,
    pub havven_fiat: Price,
    pub nomin_fiat: Price,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Period of the metrics summary log line
    pub report_interval_secs: u64,
    /// Serve Prometheus metrics on this address when set
    pub prometheus_listen: Option<SocketAddr>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            ticks: 200,
            replicas: 1,
            agents: AgentCounts::default(),
            randomizer: RandomizerConfig::default(),
            market_maker: MarketMakerConfig::default(),
            history: HistoryConfig::default(),
            metrics: MetricsConfig::default(),
            snapshot_path: None,
        }
    }
}

impl Default for AgentCounts {
    fn default() -> Self {
        Self {
            randomizers: 12,
            market_makers: 3,
        }
    }
}

impl Default for RandomizerConfig {
    fn default() -> Self {
        Self {
            variance: dec!(0.02),
            order_lifetime: 30,
            max_orders: 10,
            order_size: dec!(10),
        }
    }
}

impl Default for MarketMakerConfig {
    fn default() -> Self {
        Self {
            initial_margin: dec!(0.05),
            ending_margin: dec!(0.01),
            quote_duration: 30,
            minimal_wait: 10,
            quote_size: dec!(50),
            minimal_price: dec!(0.0001),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            rolling_window: 7,
            volume_weighted: true,
            initial_prices: InitialPrices::default(),
        }
    }
}

impl Default for InitialPrices {
    fn default() -> Self {
        Self {
            havven_nomin: Decimal::ONE,
            havven_fiat: Decimal::ONE,
            nomin_fiat: Decimal::ONE,
        }
    }
}

impl InitialPrices {
    pub fn for_pair(&self, pair: CurrencyPair) -> Price {
        match (pair.base, pair.quote) {
            (Currency::Havven, Currency::Nomin) => self.havven_nomin,
            (Currency::Havven, Currency::Fiat) => self.havven_fiat,
            (Currency::Nomin, Currency::Fiat) => self.nomin_fiat,
            _ => Decimal::ONE,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 5,
            prometheus_listen: None,
        }
    }
}

impl SimulationConfig {
    /// Load and validate a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig = serde_json::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.replicas == 0 {
            return invalid("replicas must be at least 1");
        }
        if self.randomizer.variance < Decimal::ZERO || self.randomizer.variance >= Decimal::ONE {
            return invalid("randomizer.variance must be in [0, 1)");
        }
        if self.randomizer.order_size <= Decimal::ZERO {
            return invalid("randomizer.order_size must be positive");
        }
        if self.market_maker.quote_duration == 0 {
            return invalid("market_maker.quote_duration must be at least 1");
        }
        if self.market_maker.ending_margin < Decimal::ZERO
            || self.market_maker.initial_margin < self.market_maker.ending_margin
            || self.market_maker.initial_margin >= Decimal::ONE
        {
            return invalid("market_maker margins must satisfy 0 <= ending <= initial < 1");
        }
        if self.market_maker.quote_size <= Decimal::ZERO {
            return invalid("market_maker.quote_size must be positive");
        }
        if self.market_maker.minimal_price <= Decimal::ZERO {
            return invalid("market_maker.minimal_price must be positive");
        }
        if self.history.rolling_window == 0 {
            return invalid("history.rolling_window must be at least 1");
        }
        let prices = &self.history.initial_prices;
        if [prices.havven_nomin, prices.havven_fiat, prices.nomin_fiat]
            .iter()
            .any(|price| *price <= Decimal::ZERO)
        {
            return invalid("history.initial_prices must be positive");
        }
        if self.metrics.report_interval_secs == 0 {
            return invalid("metrics.report_interval_secs must be at least 1");
        }

        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    /// The config file could not be read
    Io(std::io::Error),
    /// The file is not valid config JSON
    Parse(serde_json::Error),
    /// Values parsed but are out of range
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Cannot read config: {}", e),
            ConfigError::Parse(e) => write!(f, "Cannot parse config: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

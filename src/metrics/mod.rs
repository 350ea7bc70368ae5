use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::info;

use crate::orderbook::{CurrencyPair, Fill, OrderBook, OrderBookError, CURRENCY_PRECISION};

pub mod exporters;

/// Metrics collector for order book operations
#[derive(Debug)]
pub struct OrderBookMetrics {
    // Latency tracking
    submit_latency: LatencyTracker,
    cancel_latency: LatencyTracker,
    amend_latency: LatencyTracker,

    // Throughput counters
    orders_submitted: AtomicU64,
    orders_rejected: AtomicU64,
    orders_cancelled: AtomicU64,
    orders_amended: AtomicU64,
    cancel_misses: AtomicU64,
    fills_executed: AtomicU64,

    // Volume tracking, exact
    total_volume: Mutex<Decimal>,
    total_notional: Mutex<Decimal>,
}

impl OrderBookMetrics {
    pub fn new() -> Self {
        // Register metric descriptions
        describe_counter!("orderbook_orders_total", "Total number of order operations processed");
        describe_counter!("orderbook_fills_total", "Total number of fills executed");
        describe_counter!("orderbook_rejections_total", "Orders refused at validation");
        describe_histogram!(
            "orderbook_operation_duration_seconds",
            "Duration of order book operations"
        );
        describe_gauge!("orderbook_levels_total", "Number of price levels in the book");
        describe_gauge!("orderbook_orders_current", "Current number of orders in the book");
        describe_gauge!("orderbook_spread", "Current bid-ask spread");
        describe_counter!("orderbook_volume_total", "Base quantity traded, in units of 10^-8");

        Self {
            submit_latency: LatencyTracker::new("submit"),
            cancel_latency: LatencyTracker::new("cancel"),
            amend_latency: LatencyTracker::new("amend"),
            orders_submitted: AtomicU64::new(0),
            orders_rejected: AtomicU64::new(0),
            orders_cancelled: AtomicU64::new(0),
            orders_amended: AtomicU64::new(0),
            cancel_misses: AtomicU64::new(0),
            fills_executed: AtomicU64::new(0),
            total_volume: Mutex::new(Decimal::ZERO),
            total_notional: Mutex::new(Decimal::ZERO),
        }
    }

    // Latency measurement methods
    pub fn time_submit<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.submit_latency.time(f)
    }

    pub fn time_cancel<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.cancel_latency.time(f)
    }

    pub fn time_amend<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.amend_latency.time(f)
    }

    // Counter methods
    pub fn increment_orders_submitted(&self, pair: CurrencyPair) {
        self.orders_submitted.fetch_add(1, Ordering::Relaxed);
        counter!("orderbook_orders_total", "operation" => "submit", "pair" => pair.to_string())
            .increment(1);
    }

    pub fn increment_orders_cancelled(&self, pair: CurrencyPair) {
        self.orders_cancelled.fetch_add(1, Ordering::Relaxed);
        counter!("orderbook_orders_total", "operation" => "cancel", "pair" => pair.to_string())
            .increment(1);
    }

    pub fn increment_orders_amended(&self, pair: CurrencyPair) {
        self.orders_amended.fetch_add(1, Ordering::Relaxed);
        counter!("orderbook_orders_total", "operation" => "amend", "pair" => pair.to_string())
            .increment(1);
    }

    /// Count a recoverable failure by kind
    pub fn record_error(&self, pair: CurrencyPair, error: &OrderBookError) {
        match error {
            OrderBookError::InvalidOrder(reason) => {
                self.orders_rejected.fetch_add(1, Ordering::Relaxed);
                counter!("orderbook_rejections_total", "pair" => pair.to_string(), "reason" => reason.to_string())
                    .increment(1);
            }
            OrderBookError::OrderNotFound(_) => {
                self.cancel_misses.fetch_add(1, Ordering::Relaxed);
                counter!("orderbook_orders_total", "operation" => "miss", "pair" => pair.to_string())
                    .increment(1);
            }
            _ => {}
        }
    }

    pub fn record_fills(&self, pair: CurrencyPair, fills: &[Fill]) {
        if fills.is_empty() {
            return;
        }

        let volume = fills
            .iter()
            .fold(Decimal::ZERO, |total, f| total.saturating_add(f.quantity));
        let notional = fills
            .iter()
            .fold(Decimal::ZERO, |total, f| total.saturating_add(f.notional()));

        self.fills_executed
            .fetch_add(fills.len() as u64, Ordering::Relaxed);
        {
            let mut total = self.total_volume.lock();
            *total = total.saturating_add(volume);
        }
        {
            let mut total = self.total_notional.lock();
            *total = total.saturating_add(notional);
        }

        counter!("orderbook_fills_total", "pair" => pair.to_string()).increment(fills.len() as u64);
        counter!("orderbook_volume_total", "pair" => pair.to_string())
            .increment(volume_units(volume));
    }

    /// Publish the current shape of a book as gauges
    pub fn observe_book(&self, book: &OrderBook) {
        let stats = book.get_stats();
        let pair = stats.pair.to_string();

        gauge!("orderbook_orders_current", "pair" => pair.clone()).set(stats.total_orders as f64);
        gauge!("orderbook_levels_total", "pair" => pair.clone(), "side" => "bid")
            .set(stats.bid_levels as f64);
        gauge!("orderbook_levels_total", "pair" => pair.clone(), "side" => "ask")
            .set(stats.ask_levels as f64);
        if let Some(spread) = stats.spread.and_then(|s| s.to_f64()) {
            gauge!("orderbook_spread", "pair" => pair.clone()).set(spread);
        }
        if let Some(bid) = stats.best_bid.and_then(|p| p.to_f64()) {
            gauge!("orderbook_best_bid", "pair" => pair.clone()).set(bid);
        }
        if let Some(ask) = stats.best_ask.and_then(|p| p.to_f64()) {
            gauge!("orderbook_best_ask", "pair" => pair).set(ask);
        }
    }

    // Getters for current values
    pub fn get_orders_submitted(&self) -> u64 {
        self.orders_submitted.load(Ordering::Relaxed)
    }

    pub fn get_orders_rejected(&self) -> u64 {
        self.orders_rejected.load(Ordering::Relaxed)
    }

    pub fn get_orders_cancelled(&self) -> u64 {
        self.orders_cancelled.load(Ordering::Relaxed)
    }

    pub fn get_orders_amended(&self) -> u64 {
        self.orders_amended.load(Ordering::Relaxed)
    }

    pub fn get_cancel_misses(&self) -> u64 {
        self.cancel_misses.load(Ordering::Relaxed)
    }

    pub fn get_fills_executed(&self) -> u64 {
        self.fills_executed.load(Ordering::Relaxed)
    }

    pub fn get_total_volume(&self) -> Decimal {
        *self.total_volume.lock()
    }

    pub fn get_total_notional(&self) -> Decimal {
        *self.total_notional.lock()
    }

    pub fn get_latency_stats(&self) -> LatencyStats {
        LatencyStats {
            submit: self.submit_latency.get_stats(),
            cancel: self.cancel_latency.get_stats(),
            amend: self.amend_latency.get_stats(),
        }
    }
}

/// Quantity as a whole number of its smallest currency unit, saturating.
fn volume_units(quantity: Decimal) -> u64 {
    quantity
        .checked_mul(Decimal::from(10u64.pow(CURRENCY_PRECISION)))
        .and_then(|units| units.trunc().to_u64())
        .unwrap_or(u64::MAX)
}

impl Default for OrderBookMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency tracker for individual operations
#[derive(Debug)]
struct LatencyTracker {
    operation: &'static str,
    samples: AtomicU64,
    total_nanos: AtomicU64,
    min_nanos: AtomicU64,
    max_nanos: AtomicU64,
}

impl LatencyTracker {
    fn new(operation: &'static str) -> Self {
        Self {
            operation,
            samples: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
            min_nanos: AtomicU64::new(u64::MAX),
            max_nanos: AtomicU64::new(0),
        }
    }

    fn time<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.record_latency(start.elapsed());
        result
    }

    fn record_latency(&self, duration: Duration) {
        let nanos = duration.as_nanos() as u64;

        self.samples.fetch_add(1, Ordering::Relaxed);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.min_nanos.fetch_min(nanos, Ordering::Relaxed);
        self.max_nanos.fetch_max(nanos, Ordering::Relaxed);

        histogram!("orderbook_operation_duration_seconds", "operation" => self.operation)
            .record(duration.as_secs_f64());
    }

    fn get_stats(&self) -> OperationLatencyStats {
        let samples = self.samples.load(Ordering::Relaxed);
        let total = self.total_nanos.load(Ordering::Relaxed);
        let min = self.min_nanos.load(Ordering::Relaxed);
        let max = self.max_nanos.load(Ordering::Relaxed);

        let avg = if samples > 0 { total / samples } else { 0 };

        OperationLatencyStats {
            operation: self.operation.to_string(),
            samples,
            avg_nanos: avg,
            min_nanos: if min == u64::MAX { 0 } else { min },
            max_nanos: max,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LatencyStats {
    pub submit: OperationLatencyStats,
    pub cancel: OperationLatencyStats,
    pub amend: OperationLatencyStats,
}

#[derive(Debug, Clone)]
pub struct OperationLatencyStats {
    pub operation: String,
    pub samples: u64,
    pub avg_nanos: u64,
    pub min_nanos: u64,
    pub max_nanos: u64,
}

impl OperationLatencyStats {
    pub fn avg_micros(&self) -> f64 {
        self.avg_nanos as f64 / 1_000.0
    }

    pub fn min_micros(&self) -> f64 {
        self.min_nanos as f64 / 1_000.0
    }

    pub fn max_micros(&self) -> f64 {
        self.max_nanos as f64 / 1_000.0
    }
}

/// Background metrics reporter
pub struct MetricsReporter {
    metrics: Arc<OrderBookMetrics>,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<OrderBookMetrics>, interval: Duration) -> Self {
        Self { metrics, interval }
    }

    /// Log one summary line
    pub fn report(&self) {
        let stats = self.metrics.get_latency_stats();

        info!(
            "OrderBook Metrics - Orders: +{} -{} ~{} rejected={} missed={} | Fills: {} volume={} | Latency (μs): submit={:.2} cancel={:.2} amend={:.2}",
            self.metrics.get_orders_submitted(),
            self.metrics.get_orders_cancelled(),
            self.metrics.get_orders_amended(),
            self.metrics.get_orders_rejected(),
            self.metrics.get_cancel_misses(),
            self.metrics.get_fills_executed(),
            self.metrics.get_total_volume(),
            stats.submit.avg_micros(),
            stats.cancel.avg_micros(),
            stats.amend.avg_micros()
        );
    }

    pub async fn run(&self) {
        let mut interval = interval(self.interval);

        loop {
            interval.tick().await;
            self.report();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::{AgentId, OrderId, RejectReason, Side};
    use rust_decimal_macros::dec;

    fn fill(price: Decimal, quantity: Decimal) -> Fill {
        Fill {
            buy_order_id: OrderId(1),
            sell_order_id: OrderId(2),
            buyer: AgentId(1),
            seller: AgentId(2),
            price,
            quantity,
            aggressor: Side::Buy,
            tick: 0,
            sequence: 2,
        }
    }

    #[test]
    fn test_counters() {
        let metrics = OrderBookMetrics::new();
        let pair = CurrencyPair::HAVVEN_NOMIN;

        metrics.increment_orders_submitted(pair);
        metrics.increment_orders_submitted(pair);
        metrics.increment_orders_cancelled(pair);
        metrics.record_error(pair, &OrderBookError::InvalidOrder(RejectReason::NonPositivePrice));
        metrics.record_error(pair, &OrderBookError::OrderNotFound(OrderId(3)));
        metrics.record_fills(pair, &[fill(dec!(2), dec!(1.5)), fill(dec!(3), dec!(1))]);

        assert_eq!(metrics.get_orders_submitted(), 2);
        assert_eq!(metrics.get_orders_cancelled(), 1);
        assert_eq!(metrics.get_orders_rejected(), 1);
        assert_eq!(metrics.get_cancel_misses(), 1);
        assert_eq!(metrics.get_fills_executed(), 2);
        assert_eq!(metrics.get_total_volume(), dec!(2.5));
        assert_eq!(metrics.get_total_notional(), dec!(6));
    }

    #[test]
    fn test_volume_units() {
        assert_eq!(volume_units(dec!(2.5)), 250_000_000);
        assert_eq!(volume_units(dec!(0.00000001)), 1);
        assert_eq!(volume_units(Decimal::MAX), u64::MAX);
    }

    #[test]
    fn test_large_fills_accumulate_without_overflow() {
        let metrics = OrderBookMetrics::new();
        let pair = CurrencyPair::NOMIN_FIAT;
        let big = fill(crate::orderbook::MAX_PRICE, crate::orderbook::MAX_QUANTITY);

        for _ in 0..3 {
            metrics.record_fills(pair, &[big.clone(), big.clone()]);
        }

        assert_eq!(metrics.get_fills_executed(), 6);
        assert_eq!(metrics.get_total_volume(), crate::orderbook::MAX_QUANTITY * dec!(6));
        assert_eq!(metrics.get_total_notional(), dec!(6000000000000000000000000));
    }

    #[test]
    fn test_latency_tracking() {
        let metrics = OrderBookMetrics::new();
        let value = metrics.time_submit(|| 41 + 1);
        assert_eq!(value, 42);

        let stats = metrics.get_latency_stats();
        assert_eq!(stats.submit.samples, 1);
        assert_eq!(stats.cancel.samples, 0);
        assert_eq!(stats.cancel.min_nanos, 0);
        assert!(stats.submit.max_nanos >= stats.submit.min_nanos);
    }
}

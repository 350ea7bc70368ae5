use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::HistoryConfig;
use crate::market::history::MarketHistory;
use crate::metrics::OrderBookMetrics;
use crate::orderbook::{
    AgentId, BookSnapshot, CurrencyPair, Order, OrderBook, OrderBookError, OrderBookResult, OrderId,
    OrderRequest, Price, Quantity, Side, SubmitResult, Tick,
};

#[derive(Debug)]
struct Market {
    book: OrderBook,
    history: MarketHistory,
}

/// One order book and one trade history per standard currency pair, all
/// sharing a clock.
#[derive(Debug)]
pub struct Exchange {
    markets: BTreeMap<CurrencyPair, Market>,
    metrics: Option<Arc<OrderBookMetrics>>,
    tick: Tick,
}

impl Exchange {
    pub fn new(history: &HistoryConfig) -> Self {
        let markets = CurrencyPair::ALL
            .into_iter()
            .map(|pair| {
                let mut history = MarketHistory::new(
                    pair,
                    history.rolling_window,
                    history.volume_weighted,
                    history.initial_prices.for_pair(pair),
                );
                history.price(0);
                (
                    pair,
                    Market {
                        book: OrderBook::new(pair),
                        history,
                    },
                )
            })
            .collect();

        info!("Opened exchange with {} markets", CurrencyPair::ALL.len());

        Self {
            markets,
            metrics: None,
            tick: 0,
        }
    }

    /// Report every operation on this exchange to `metrics`
    pub fn with_metrics(mut self, metrics: Arc<OrderBookMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn pairs(&self) -> impl Iterator<Item = CurrencyPair> + '_ {
        self.markets.keys().copied()
    }

    pub fn book(&self, pair: CurrencyPair) -> Option<&OrderBook> {
        self.markets.get(&pair).map(|market| &market.book)
    }

    pub fn history(&self, pair: CurrencyPair) -> Option<&MarketHistory> {
        self.markets.get(&pair).map(|market| &market.history)
    }

    /// Rolling price of a market as of the start of the current tick
    pub fn price(&self, pair: CurrencyPair) -> Option<Price> {
        self.history(pair).map(MarketHistory::last_price)
    }

    pub fn submit(
        &mut self,
        pair: CurrencyPair,
        request: OrderRequest,
    ) -> OrderBookResult<SubmitResult> {
        let market = self
            .markets
            .get_mut(&pair)
            .ok_or(OrderBookError::UnknownMarket(pair))?;

        let result = match &self.metrics {
            Some(metrics) => metrics.time_submit(|| market.book.submit(request)),
            None => market.book.submit(request),
        };

        match &result {
            Ok(submitted) => {
                market.history.record(&submitted.fills);
                if let Some(metrics) = &self.metrics {
                    metrics.increment_orders_submitted(pair);
                    metrics.record_fills(pair, &submitted.fills);
                }
            }
            Err(e) => self.report_error(pair, e),
        }
        result
    }

    /// Buy `quantity` of the pair's base currency at the going price. An
    /// empty ask side prices the bid at the market's rolling price.
    pub fn buy(
        &mut self,
        pair: CurrencyPair,
        quantity: Quantity,
        owner: AgentId,
    ) -> OrderBookResult<SubmitResult> {
        let request = self.market_request(pair, Side::Buy, quantity, owner)?;
        self.submit(pair, request)
    }

    /// Sell `quantity` of the pair's base currency at the going price.
    pub fn sell(
        &mut self,
        pair: CurrencyPair,
        quantity: Quantity,
        owner: AgentId,
    ) -> OrderBookResult<SubmitResult> {
        let request = self.market_request(pair, Side::Sell, quantity, owner)?;
        self.submit(pair, request)
    }

    pub fn cancel(&mut self, pair: CurrencyPair, order_id: OrderId) -> OrderBookResult<Order> {
        let market = self
            .markets
            .get_mut(&pair)
            .ok_or(OrderBookError::UnknownMarket(pair))?;

        let result = match &self.metrics {
            Some(metrics) => metrics.time_cancel(|| market.book.cancel(order_id)),
            None => market.book.cancel(order_id),
        };

        match &result {
            Ok(_) => {
                if let Some(metrics) = &self.metrics {
                    metrics.increment_orders_cancelled(pair);
                }
            }
            Err(e) => self.report_error(pair, e),
        }
        result
    }

    pub fn amend(
        &mut self,
        pair: CurrencyPair,
        order_id: OrderId,
        price: Price,
        quantity: Quantity,
    ) -> OrderBookResult<SubmitResult> {
        let market = self
            .markets
            .get_mut(&pair)
            .ok_or(OrderBookError::UnknownMarket(pair))?;

        let result = match &self.metrics {
            Some(metrics) => metrics.time_amend(|| market.book.amend(order_id, price, quantity)),
            None => market.book.amend(order_id, price, quantity),
        };

        match &result {
            Ok(amended) => {
                market.history.record(&amended.fills);
                if let Some(metrics) = &self.metrics {
                    metrics.increment_orders_amended(pair);
                    metrics.record_fills(pair, &amended.fills);
                }
            }
            Err(e) => self.report_error(pair, e),
        }
        result
    }

    /// Close the current tick on every market and advance the clock.
    ///
    /// Rolling prices for the new tick are fixed here, so every agent sees
    /// the same price for the whole tick.
    pub fn step(&mut self) {
        let closing = self.tick;
        self.tick += 1;

        for (pair, market) in self.markets.iter_mut() {
            let candle = market.history.close_tick(closing);
            let price = market.history.price(self.tick);
            market.book.set_tick(self.tick);

            if let Some(metrics) = &self.metrics {
                metrics.observe_book(&market.book);
            }

            debug!(
                "{} tick {} closed at {} volume {} rolling price {}",
                pair, closing, candle.close, candle.volume, price
            );
        }
    }

    /// Drop every resting order on every market. Histories are kept.
    pub fn clear(&mut self) {
        for market in self.markets.values_mut() {
            market.book.clear();
        }
    }

    pub fn snapshots(&self) -> Vec<BookSnapshot> {
        self.markets
            .values()
            .map(|market| market.book.snapshot())
            .collect()
    }

    pub fn check_invariants(&self) -> OrderBookResult<()> {
        self.markets
            .values()
            .try_for_each(|market| market.book.check_invariants())
    }

    fn market_request(
        &self,
        pair: CurrencyPair,
        side: Side,
        quantity: Quantity,
        owner: AgentId,
    ) -> OrderBookResult<OrderRequest> {
        let market = self
            .markets
            .get(&pair)
            .ok_or(OrderBookError::UnknownMarket(pair))?;
        Ok(market
            .book
            .market_request(side, quantity, owner, market.history.last_price()))
    }

    fn report_error(&self, pair: CurrencyPair, error: &OrderBookError) {
        if let Some(metrics) = &self.metrics {
            metrics.record_error(pair, error);
        }
    }
}

//! Per-market trade history: rolling price, candles and volume series.
//!
//! The order book keeps no record of past fills. Whoever drives the book
//! feeds them in here.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::orderbook::{round_currency, CurrencyPair, Fill, Price, Quantity, Tick};

/// Open/high/low/close for one tick plus the base quantity traded in it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub tick: Tick,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: Quantity,
}

#[derive(Debug, Clone, Copy)]
struct TradePoint {
    tick: Tick,
    price: Price,
    quantity: Quantity,
}

/// The candle still being built for the current tick. `close` stays empty
/// until a trade prints.
#[derive(Debug, Clone, Copy)]
struct OpenCandle {
    open: Price,
    high: Price,
    low: Price,
    close: Option<Price>,
    volume: Quantity,
}

impl OpenCandle {
    fn starting_at(open: Price) -> Self {
        Self {
            open,
            high: open,
            low: open,
            close: None,
            volume: Decimal::ZERO,
        }
    }

    fn add_trade(&mut self, price: Price, quantity: Quantity) {
        if self.close.is_none() {
            self.high = price;
            self.low = price;
        }
        self.close = Some(price);
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.volume = self.volume.saturating_add(quantity);
    }

    fn finish(self, tick: Tick) -> Candle {
        match self.close {
            Some(close) => Candle {
                tick,
                open: self.open,
                high: self.high,
                low: self.low,
                close,
                volume: self.volume,
            },
            // Nothing traded: a flat candle at the open
            None => Candle {
                tick,
                open: self.open,
                high: self.open,
                low: self.open,
                close: self.open,
                volume: Decimal::ZERO,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarketHistory {
    pair: CurrencyPair,
    window: Tick,
    volume_weighted: bool,
    trades: VecDeque<TradePoint>,
    cached_price: Price,
    cached_at: Option<Tick>,
    current: OpenCandle,
    candles: Vec<Candle>,
    prices: Vec<Price>,
}

impl MarketHistory {
    pub fn new(pair: CurrencyPair, window: Tick, volume_weighted: bool, initial_price: Price) -> Self {
        Self {
            pair,
            window,
            volume_weighted,
            trades: VecDeque::new(),
            cached_price: initial_price,
            cached_at: None,
            current: OpenCandle::starting_at(initial_price),
            candles: Vec::new(),
            prices: Vec::new(),
        }
    }

    pub fn pair(&self) -> CurrencyPair {
        self.pair
    }

    /// Feed fills from one submission, in execution order.
    pub fn record(&mut self, fills: &[Fill]) {
        for fill in fills {
            self.trades.push_back(TradePoint {
                tick: fill.tick,
                price: fill.price,
                quantity: fill.quantity,
            });
            self.current.add_trade(fill.price, fill.quantity);
        }
    }

    /// Rolling average trade price over the last `window` ticks.
    ///
    /// Computed at most once per tick: fills recorded after the first call
    /// in a tick only show up from the next tick on. With no trades in the
    /// window the previous price carries over.
    pub fn price(&mut self, now: Tick) -> Price {
        if self.cached_at.is_some_and(|at| now <= at) {
            return self.cached_price;
        }

        if let Some(price) = self.average_since(now.saturating_sub(self.window)) {
            self.cached_price = price;
        }
        self.cached_at = Some(now);
        self.cached_price
    }

    /// Most recently computed rolling price, without recomputing.
    pub fn last_price(&self) -> Price {
        self.cached_price
    }

    /// Close the candle for `now`, record the rolling price and open the next
    /// candle at this one's close.
    pub fn close_tick(&mut self, now: Tick) -> Candle {
        let price = self.price(now);
        let candle = self.current.finish(now);

        self.candles.push(candle);
        self.prices.push(price);
        self.current = OpenCandle::starting_at(candle.close);

        // Anything at or before now - window can never be averaged again
        let window = self.window;
        while self
            .trades
            .front()
            .is_some_and(|trade| trade.tick + window <= now)
        {
            self.trades.pop_front();
        }

        candle
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    /// Rolling price as recorded at the close of every tick.
    pub fn price_series(&self) -> &[Price] {
        &self.prices
    }

    pub fn volume_series(&self) -> impl Iterator<Item = Quantity> + '_ {
        self.candles.iter().map(|candle| candle.volume)
    }

    /// Base quantity traded over every closed tick.
    pub fn total_volume(&self) -> Quantity {
        self.volume_series().fold(Decimal::ZERO, Decimal::saturating_add)
    }

    fn average_since(&self, from: Tick) -> Option<Price> {
        let recent = self.trades.iter().rev().take_while(|trade| trade.tick >= from);

        if self.volume_weighted {
            let mut weighted = Decimal::ZERO;
            let mut volume = Decimal::ZERO;
            for trade in recent {
                weighted = weighted.checked_add(trade.price.checked_mul(trade.quantity)?)?;
                volume = volume.checked_add(trade.quantity)?;
            }
            (!volume.is_zero()).then(|| round_currency(weighted / volume))
        } else {
            let mut total = Decimal::ZERO;
            let mut count = 0u32;
            for trade in recent {
                total = total.checked_add(trade.price)?;
                count += 1;
            }
            (count > 0).then(|| round_currency(total / Decimal::from(count)))
        }
    }
}

use rust_decimal::Decimal;
use std::collections::btree_map;
use std::iter::FusedIterator;

use crate::orderbook::book_side::LevelKey;
use crate::orderbook::price_level::PriceLevel;
use crate::orderbook::types::{DepthLevel, Quantity};

/// Cumulative depth curve of one side of the book, walking outward from the
/// best price. Each item is one distinct price with the quantity resting
/// there and the running total up to and including it.
///
/// The iterator borrows the book, so the book cannot change while it is
/// alive. Clone it to restart from the best price.
#[derive(Debug, Clone)]
pub struct Depth<'a> {
    levels: btree_map::Values<'a, LevelKey, PriceLevel>,
    remaining_levels: Option<usize>,
    cumulative: Quantity,
}

impl<'a> Depth<'a> {
    pub(crate) fn new(
        levels: btree_map::Values<'a, LevelKey, PriceLevel>,
        max_levels: Option<usize>,
    ) -> Self {
        Self {
            levels,
            remaining_levels: max_levels,
            cumulative: Decimal::ZERO,
        }
    }
}

impl<'a> Iterator for Depth<'a> {
    type Item = DepthLevel;

    fn next(&mut self) -> Option<DepthLevel> {
        if let Some(remaining) = self.remaining_levels.as_mut() {
            if *remaining == 0 {
                return None;
            }
            *remaining -= 1;
        }

        let level = self.levels.next()?;
        self.cumulative += level.total_quantity();

        Some(DepthLevel {
            price: level.price,
            quantity: level.total_quantity(),
            cumulative_quantity: self.cumulative,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let available = self.levels.len();
        let n = match self.remaining_levels {
            Some(limit) => limit.min(available),
            None => available,
        };
        (n, Some(n))
    }
}

impl ExactSizeIterator for Depth<'_> {}

impl FusedIterator for Depth<'_> {}

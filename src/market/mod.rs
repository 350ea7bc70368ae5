//! Markets around the order books: trade history and the exchange that
//! routes orders to the right book.

pub mod exchange;
pub mod history;

pub use exchange::Exchange;
pub use history::{Candle, MarketHistory};

pub mod aggregator;

pub use aggregator::{CoinMarket, MarketAggregator, MarketSnapshot};

//! Outbound collaborators that supply raw data: daily price history and a
//! fundamentals key/value map.

pub mod provider;
pub mod types;
pub mod yahoo;

pub use provider::{FundamentalsProvider, HttpJsonFundamentalsProvider, MarketDataProvider};
pub use yahoo::{YahooChartProvider, YahooQuoteFundamentalsProvider};

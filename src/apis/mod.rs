#[cfg(feature = "binance")]
mod binance;
mod mock;

#[cfg(feature = "binance")]
pub use self::binance::*;
pub use mock::*;

use async_trait::async_trait;
use thiserror::Error;

use crate::{Asset, Candle, Price, Symbol};

/// An upstream exchange. The source of truth for symbols, prices and candles.
#[async_trait]
pub trait Api: Send + Sync {
    const NAME: &'static str;

    /// List all symbols quoted in `quote`.
    async fn get_symbols(&self, quote: Asset) -> Result<Vec<Symbol>, ApiError>;
    /// Get the current price of a single symbol.
    async fn get_price(&self, symbol: &str) -> Result<Price, ApiError>;
    /// Get the current price of every symbol quoted in `quote`.
    async fn get_prices(&self, quote: Asset) -> Result<Vec<Price>, ApiError>;
    /// Get the `limit` most recent candles, oldest first.
    async fn get_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: i64,
    ) -> Result<Vec<Candle>, ApiError>;
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Could not connect to the API: {0}")]
    Network(String),
    #[error("API responded with status {status} to {endpoint}.")]
    Status { endpoint: String, status: u16 },
    #[error("Malformed API payload: {0}")]
    Payload(String),
}

mod sqlite;

pub use sqlite::*;

use async_trait::async_trait;
use thiserror::Error;

use crate::{Candle, Price, Symbol};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Could not prepare the database file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait SymbolStore: Send + Sync {
    async fn all_symbols(&self) -> Result<Vec<Symbol>, StoreError>;
    /// Append symbols. Fails if a ticker is already stored.
    async fn add_symbols(&self, symbols: &[Symbol]) -> Result<(), StoreError>;
    /// Whether any symbol is stored.
    async fn any_symbol(&self) -> Result<bool, StoreError>;
    /// Tickers of all stored symbols.
    async fn symbol_names(&self) -> Result<Vec<String>, StoreError>;
}

#[async_trait]
pub trait PriceStore: Send + Sync {
    /// The latest price of each of `symbols` that has one.
    async fn latest_prices_for(&self, symbols: &[String]) -> Result<Vec<Price>, StoreError>;
    async fn add_prices(&self, prices: &[Price]) -> Result<(), StoreError>;
    /// Swap the whole price history for `prices`.
    async fn replace_prices(&self, prices: &[Price]) -> Result<(), StoreError>;
    /// The latest price of every symbol.
    async fn latest_prices(&self) -> Result<Vec<Price>, StoreError>;
}

#[async_trait]
pub trait CandleStore: Send + Sync {
    /// Up to `limit` candles, most recent open time first. A non-positive
    /// limit yields no candles.
    async fn get_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: i64,
    ) -> Result<Vec<Candle>, StoreError>;
    async fn add_candles(&self, candles: &[Candle]) -> Result<(), StoreError>;
}

/// All three repositories behind one handle.
pub trait Store: SymbolStore + PriceStore + CandleStore {}

impl<T> Store for T where T: SymbolStore + PriceStore + CandleStore {}

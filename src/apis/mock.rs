use super::Api;
use crate::{apis::ApiError, Asset, Candle, Price, Symbol};

use async_trait::async_trait;
use futures_util::lock::Mutex;
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

/// Canned upstream data for the mock.
#[derive(Default, Clone)]
pub struct Settings {
    pub symbols: Vec<Symbol>,
    pub prices: Vec<Price>,
    pub candles: Vec<Candle>,
    /// Price lookups for these symbols fail.
    pub failing: Vec<String>,
    /// Every request fails as if the exchange could not be reached.
    pub offline: bool,
    /// Each request waits this long before answering.
    pub latency: Duration,
}

/// The Mock API answers from canned data and records every call it
/// receives. This is useful for testing and offline runs.
pub struct Mock {
    settings: Settings,
    symbol_calls: AtomicUsize,
    price_calls: Mutex<Vec<String>>,
    board_calls: AtomicUsize,
    candle_calls: AtomicUsize,
}

impl Mock {
    pub fn new(settings: Settings) -> Self {
        Mock {
            settings,
            symbol_calls: AtomicUsize::new(0),
            price_calls: Mutex::new(Vec::new()),
            board_calls: AtomicUsize::new(0),
            candle_calls: AtomicUsize::new(0),
        }
    }

    pub fn symbol_calls(&self) -> usize {
        self.symbol_calls.load(Ordering::SeqCst)
    }

    /// Symbols passed to `get_price`, in call order.
    pub async fn price_calls(&self) -> Vec<String> {
        self.price_calls.lock().await.clone()
    }

    pub fn board_calls(&self) -> usize {
        self.board_calls.load(Ordering::SeqCst)
    }

    pub fn candle_calls(&self) -> usize {
        self.candle_calls.load(Ordering::SeqCst)
    }

    /// Total number of upstream requests of any kind.
    pub async fn calls(&self) -> usize {
        self.symbol_calls()
            + self.price_calls.lock().await.len()
            + self.board_calls()
            + self.candle_calls()
    }

    async fn respond(&self) -> Result<(), ApiError> {
        if !self.settings.latency.is_zero() {
            tokio::time::sleep(self.settings.latency).await;
        }

        if self.settings.offline {
            return Err(ApiError::Network("mock exchange is offline".to_owned()));
        }

        Ok(())
    }
}

#[async_trait]
impl Api for Mock {
    const NAME: &'static str = "Mock";

    async fn get_symbols(&self, quote: Asset) -> Result<Vec<Symbol>, ApiError> {
        self.symbol_calls.fetch_add(1, Ordering::SeqCst);
        self.respond().await?;
        Ok(self
            .settings
            .symbols
            .iter()
            .filter(|symbol| symbol.quote_asset == quote)
            .cloned()
            .collect())
    }

    async fn get_price(&self, symbol: &str) -> Result<Price, ApiError> {
        self.price_calls.lock().await.push(symbol.to_owned());
        self.respond().await?;

        if self.settings.failing.iter().any(|failing| failing == symbol) {
            return Err(ApiError::Status {
                endpoint: format!("ticker/price?symbol={}", symbol),
                status: 503,
            });
        }

        self.settings
            .prices
            .iter()
            .find(|price| price.symbol == symbol)
            .cloned()
            .ok_or_else(|| ApiError::Status {
                endpoint: format!("ticker/price?symbol={}", symbol),
                status: 400,
            })
    }

    async fn get_prices(&self, quote: Asset) -> Result<Vec<Price>, ApiError> {
        self.board_calls.fetch_add(1, Ordering::SeqCst);
        self.respond().await?;
        Ok(self
            .settings
            .prices
            .iter()
            .filter(|price| price.symbol.ends_with(quote.as_str()))
            .cloned()
            .collect())
    }

    // Like the exchange, returns the most recent `limit` candles oldest first.
    async fn get_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: i64,
    ) -> Result<Vec<Candle>, ApiError> {
        self.candle_calls.fetch_add(1, Ordering::SeqCst);
        self.respond().await?;
        if limit <= 0 {
            return Ok(Vec::new());
        }

        let mut candles: Vec<Candle> = self
            .settings
            .candles
            .iter()
            .filter(|candle| candle.symbol == symbol && candle.interval == interval)
            .cloned()
            .collect();
        candles.sort_by_key(|candle| candle.open_time);

        let skip = candles.len().saturating_sub(limit as usize);
        Ok(candles.split_off(skip))
    }
}

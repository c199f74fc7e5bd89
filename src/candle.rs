use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One OHLCV bar. Identified by (symbol, interval, open time).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub interval: String,
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// A candle query. Results are cached per key, so the same symbol and
/// interval with a different limit is a different entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CandleKey {
    pub symbol: String,
    pub interval: String,
    pub limit: i64,
}

impl CandleKey {
    pub fn new<T: AsRef<str>>(symbol: T, interval: T, limit: i64) -> Self {
        CandleKey {
            symbol: symbol.as_ref().to_owned(),
            interval: interval.as_ref().to_owned(),
            limit,
        }
    }
}

impl fmt::Display for CandleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "candles:{}:{}:{}", self.symbol, self.interval, self.limit)
    }
}

/// Order candles most recent open time first.
pub(crate) fn sort_recent_first(candles: &mut [Candle]) {
    candles.sort_by(|a, b| b.open_time.cmp(&a.open_time));
}

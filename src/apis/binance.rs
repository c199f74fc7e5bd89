use crate::{
    apis::{Api, ApiError},
    Asset, Candle, Price, Symbol,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::{env, str::FromStr, time::Duration};

const COM: &str = "https://api.binance.com";
const US: &str = "https://api.binance.us";

/// Binance spot REST API. Only public market data endpoints are used, so no
/// key is needed.
pub struct Binance {
    client: reqwest::Client,
    endpoint: String,
}

impl Binance {
    pub fn new<T: Into<String>>(endpoint: T, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ApiError::Network(err.to_string()))?;

        Ok(Binance {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_owned(),
        })
    }

    /// Configure from `BINANCE_ENDPOINT` (`com`, `us` or a base URL) and
    /// `BINANCE_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ApiError> {
        let endpoint = env::var("BINANCE_ENDPOINT")
            .map(|endpoint| match endpoint.to_ascii_lowercase().as_str() {
                "com" => COM.to_owned(),
                "us" => US.to_owned(),
                _ => endpoint,
            })
            .unwrap_or_else(|_| COM.to_owned());

        let timeout = env::var("BINANCE_TIMEOUT_SECS")
            .ok()
            .and_then(|secs| secs.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        Binance::new(endpoint, timeout)
    }

    async fn fetch(&self, path: &str) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.endpoint, path);
        log::trace!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| ApiError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                endpoint: path.to_owned(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|err| ApiError::Network(err.to_string()))?;

        serde_json::from_str(&body).map_err(|err| ApiError::Payload(err.to_string()))
    }
}

#[async_trait]
impl Api for Binance {
    const NAME: &'static str = "Binance";

    async fn get_symbols(&self, quote: Asset) -> Result<Vec<Symbol>, ApiError> {
        let body = self.fetch("/api/v3/exchangeInfo").await?;
        parse_symbols(&body, quote)
    }

    async fn get_price(&self, symbol: &str) -> Result<Price, ApiError> {
        let body = self
            .fetch(&format!("/api/v3/ticker/price?symbol={}", symbol))
            .await?;
        parse_price(&body, Utc::now())
    }

    async fn get_prices(&self, quote: Asset) -> Result<Vec<Price>, ApiError> {
        let body = self.fetch("/api/v3/ticker/price").await?;
        parse_prices(&body, quote, Utc::now())
    }

    async fn get_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: i64,
    ) -> Result<Vec<Candle>, ApiError> {
        let body = self
            .fetch(&format!(
                "/api/v3/klines?symbol={}&interval={}&limit={}",
                symbol, interval, limit
            ))
            .await?;
        parse_klines(&body, symbol, interval)
    }
}

fn field<'a>(value: &'a Value, name: &str) -> Result<&'a Value, ApiError> {
    value
        .get(name)
        .ok_or_else(|| ApiError::Payload(format!("missing field `{}`", name)))
}

fn string<'a>(value: &'a Value, name: &str) -> Result<&'a str, ApiError> {
    field(value, name)?
        .as_str()
        .ok_or_else(|| ApiError::Payload(format!("field `{}` is not a string", name)))
}

// Binance sends decimals as strings; plain numbers are accepted too.
fn decimal(value: &Value) -> Result<Decimal, ApiError> {
    let parsed = match value {
        Value::String(text) => Decimal::from_str(text),
        Value::Number(number) => Decimal::from_str(&number.to_string()),
        _ => return Err(ApiError::Payload(format!("`{}` is not a decimal", value))),
    };
    parsed.map_err(|err| ApiError::Payload(format!("`{}`: {}", value, err)))
}

fn array<'a>(value: &'a Value, what: &str) -> Result<&'a Vec<Value>, ApiError> {
    value
        .as_array()
        .ok_or_else(|| ApiError::Payload(format!("{} is not an array", what)))
}

pub(crate) fn parse_symbols(body: &Value, quote: Asset) -> Result<Vec<Symbol>, ApiError> {
    let mut symbols = Vec::new();
    for item in array(field(body, "symbols")?, "symbols")? {
        if string(item, "quoteAsset")? != quote.as_str() {
            continue;
        }

        symbols.push(Symbol::new(
            string(item, "symbol")?,
            Asset::new(string(item, "baseAsset")?),
            quote,
        ));
    }

    log::debug!("Binance lists {} {} symbols.", symbols.len(), quote);
    Ok(symbols)
}

pub(crate) fn parse_price(body: &Value, now: DateTime<Utc>) -> Result<Price, ApiError> {
    Ok(Price {
        symbol: string(body, "symbol")?.to_owned(),
        value: decimal(field(body, "price")?)?,
        timestamp: now,
    })
}

pub(crate) fn parse_prices(
    body: &Value,
    quote: Asset,
    now: DateTime<Utc>,
) -> Result<Vec<Price>, ApiError> {
    let mut prices = Vec::new();
    for item in array(body, "price list")? {
        if !string(item, "symbol")?.ends_with(quote.as_str()) {
            continue;
        }
        prices.push(parse_price(item, now)?);
    }

    Ok(prices)
}

// Each kline is an array: [open time, open, high, low, close, volume, ...].
pub(crate) fn parse_klines(
    body: &Value,
    symbol: &str,
    interval: &str,
) -> Result<Vec<Candle>, ApiError> {
    let raw = array(body, "kline list")?;
    let mut candles = Vec::with_capacity(raw.len());

    for entry in raw {
        let kline = array(entry, "kline")?;
        if kline.len() < 6 {
            log::warn!("Skipping malformed kline with {} elements.", kline.len());
            continue;
        }

        let millis = kline[0]
            .as_i64()
            .ok_or_else(|| ApiError::Payload("kline open time is not an integer".to_owned()))?;
        let open_time = Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| ApiError::Payload(format!("open time {} out of range", millis)))?;

        candles.push(Candle {
            symbol: symbol.to_owned(),
            interval: interval.to_owned(),
            open_time,
            open: decimal(&kline[1])?,
            high: decimal(&kline[2])?,
            low: decimal(&kline[3])?,
            close: decimal(&kline[4])?,
            volume: decimal(&kline[5])?,
        });
    }

    log::trace!("Got {} {} candles for {}.", candles.len(), interval, symbol);
    Ok(candles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn symbols_filtered_by_quote() {
        let body = json!({
            "timezone": "UTC",
            "symbols": [
                { "symbol": "BTCUSDT", "baseAsset": "BTC", "quoteAsset": "USDT" },
                { "symbol": "ETHBTC", "baseAsset": "ETH", "quoteAsset": "BTC" },
                { "symbol": "ETHUSDT", "baseAsset": "ETH", "quoteAsset": "USDT" }
            ]
        });

        let symbols = parse_symbols(&body, Asset::usdt()).unwrap();
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].name, "BTCUSDT");
        assert_eq!(symbols[1].base_asset, Asset::new("ETH"));
    }

    #[test]
    fn symbols_without_list_fail() {
        let err = parse_symbols(&json!({ "code": -1 }), Asset::usdt()).unwrap_err();
        assert!(matches!(err, ApiError::Payload(_)));
    }

    #[test]
    fn price_from_string() {
        let now = Utc::now();
        let price = parse_price(&json!({ "symbol": "BTCUSDT", "price": "50000.12000000" }), now)
            .unwrap();
        assert_eq!(price.symbol, "BTCUSDT");
        assert_eq!(price.value, dec!(50000.12));
        assert_eq!(price.timestamp, now);
    }

    #[test]
    fn price_rejects_garbage() {
        let err = parse_price(&json!({ "symbol": "BTCUSDT", "price": "abc" }), Utc::now())
            .unwrap_err();
        assert!(matches!(err, ApiError::Payload(_)));
    }

    #[test]
    fn prices_filtered_by_quote() {
        let body = json!([
            { "symbol": "BTCUSDT", "price": "50000.0" },
            { "symbol": "ETHBTC", "price": "0.05" },
            { "symbol": "BNBUSDT", "price": 400 }
        ]);

        let prices = parse_prices(&body, Asset::usdt(), Utc::now()).unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[1].value, dec!(400));
    }

    #[test]
    fn klines() {
        let body = json!([
            [
                1499040000000i64,
                "0.01634790",
                "0.80000000",
                "0.01575800",
                "0.01577100",
                "148976.11427815",
                1499644799999i64
            ],
            [1499040060000i64, "0.01577100"]
        ]);

        let candles = parse_klines(&body, "BTCUSDT", "1m").unwrap();
        assert_eq!(candles.len(), 1);

        let candle = &candles[0];
        assert_eq!(candle.open_time, Utc.timestamp_millis_opt(1499040000000).unwrap());
        assert_eq!(candle.open, dec!(0.01634790));
        assert_eq!(candle.high, dec!(0.8));
        assert_eq!(candle.volume, dec!(148976.11427815));
        assert_eq!(candle.interval, "1m");
    }
}

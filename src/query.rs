//! Request parsing for callers that expose the market over a transport.
//! The market itself does not validate its arguments.

use crate::Error;

/// Parse a comma separated symbol list such as `btcusdt, ETHUSDT`.
pub fn parse_symbols(list: &str) -> Result<Vec<String>, Error> {
    let symbols: Vec<String> = list
        .split(',')
        .map(|symbol| symbol.trim().to_ascii_uppercase())
        .filter(|symbol| !symbol.is_empty())
        .collect();

    if symbols.is_empty() {
        return Err(Error::InvalidInput("at least one symbol is required".to_owned()));
    }

    Ok(symbols)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandleQuery {
    pub symbol: String,
    pub interval: String,
    pub limit: i64,
}

impl CandleQuery {
    pub const DEFAULT_INTERVAL: &'static str = "1m";
    pub const DEFAULT_LIMIT: i64 = 100;

    pub fn new(symbol: &str, interval: Option<&str>, limit: Option<i64>) -> Result<Self, Error> {
        let symbol = symbol.trim().to_ascii_uppercase();
        if symbol.is_empty() {
            return Err(Error::InvalidInput("a symbol is required".to_owned()));
        }

        let interval = interval.unwrap_or(Self::DEFAULT_INTERVAL).trim();
        if interval.is_empty() {
            return Err(Error::InvalidInput("interval must not be blank".to_owned()));
        }

        let limit = limit.unwrap_or(Self::DEFAULT_LIMIT);
        if limit <= 0 {
            return Err(Error::InvalidInput(format!("limit must be positive, got {}", limit)));
        }

        Ok(CandleQuery {
            symbol,
            interval: interval.to_owned(),
            limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_list() {
        assert_eq!(
            parse_symbols(" btcusdt,ETHUSDT ,,").unwrap(),
            vec!["BTCUSDT", "ETHUSDT"]
        );
        assert!(matches!(parse_symbols(" , "), Err(Error::InvalidInput(_))));
        assert!(matches!(parse_symbols(""), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn candle_defaults() {
        let query = CandleQuery::new("btcusdt", None, None).unwrap();
        assert_eq!(query.symbol, "BTCUSDT");
        assert_eq!(query.interval, "1m");
        assert_eq!(query.limit, 100);
    }

    #[test]
    fn candle_rejects_bad_values() {
        assert!(CandleQuery::new(" ", None, None).is_err());
        assert!(CandleQuery::new("BTCUSDT", Some(""), None).is_err());
        assert!(CandleQuery::new("BTCUSDT", Some("1h"), Some(0)).is_err());
        assert_eq!(
            CandleQuery::new("BTCUSDT", Some("1h"), Some(5)).unwrap().limit,
            5
        );
    }
}

use chrono::{DateTime, Utc};
use fxhash::FxHashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A spot price captured at `timestamp`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub symbol: String,
    pub value: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// The latest known price per symbol.
#[derive(Default, Debug, Clone)]
pub struct Snapshot {
    prices: FxHashMap<String, Price>,
}

impl Snapshot {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn get(&self, symbol: &str) -> Option<&Price> {
        self.prices.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.prices.contains_key(symbol)
    }

    pub fn prices(&self) -> impl Iterator<Item = &Price> {
        self.prices.values()
    }

    /// Insert a price unless a strictly newer one is already held.
    pub fn merge(&mut self, price: Price) {
        match self.prices.get(&price.symbol) {
            Some(held) if held.timestamp > price.timestamp => {
                log::trace!("Keeping newer price for {}.", price.symbol);
            }
            _ => {
                self.prices.insert(price.symbol.clone(), price);
            }
        }
    }

    /// Symbols from `symbols` that have no price, in the given order.
    pub fn missing<'a>(&self, symbols: &'a [String]) -> Vec<&'a str> {
        symbols
            .iter()
            .map(String::as_str)
            .filter(|symbol| !self.contains(symbol))
            .collect()
    }

    /// Prices for `symbols`, in the given order, skipping unknown symbols.
    pub fn select(&self, symbols: &[String]) -> Vec<Price> {
        symbols
            .iter()
            .filter_map(|symbol| self.prices.get(symbol).cloned())
            .collect()
    }
}

impl Extend<Price> for Snapshot {
    fn extend<I: IntoIterator<Item = Price>>(&mut self, iter: I) {
        for price in iter {
            self.merge(price);
        }
    }
}

impl FromIterator<Price> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Price>>(iter: I) -> Self {
        let mut snapshot = Snapshot::new();
        snapshot.extend(iter);
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn price(symbol: &str, value: Decimal, secs: i64) -> Price {
        Price {
            symbol: symbol.to_owned(),
            value,
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs),
        }
    }

    #[test]
    fn merge_keeps_latest() {
        let mut snapshot = Snapshot::new();
        snapshot.merge(price("BTCUSDT", dec!(50000), 10));
        snapshot.merge(price("BTCUSDT", dec!(49000), 5));
        assert_eq!(snapshot.get("BTCUSDT").unwrap().value, dec!(50000));

        snapshot.merge(price("BTCUSDT", dec!(51000), 20));
        assert_eq!(snapshot.get("BTCUSDT").unwrap().value, dec!(51000));
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn missing_and_select() {
        let snapshot: Snapshot = vec![
            price("BTCUSDT", dec!(50000), 0),
            price("ETHUSDT", dec!(3000), 0),
            price("BNBUSDT", dec!(400), 0),
        ]
        .into_iter()
        .collect();

        let requested = vec!["ETHUSDT".to_owned(), "XRPUSDT".to_owned(), "BTCUSDT".to_owned()];
        assert_eq!(snapshot.missing(&requested), vec!["XRPUSDT"]);

        let selected = snapshot.select(&requested);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].symbol, "ETHUSDT");
        assert_eq!(selected[1].symbol, "BTCUSDT");
    }
}

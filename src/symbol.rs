use crate::Asset;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A tradable pair, identified by its uppercase ticker (e.g. `BTCUSDT`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub base_asset: Asset,
    pub quote_asset: Asset,
}

impl Symbol {
    pub fn new<T: AsRef<str>>(name: T, base_asset: Asset, quote_asset: Asset) -> Self {
        Symbol {
            name: name.as_ref().trim().to_ascii_uppercase(),
            base_asset,
            quote_asset,
        }
    }

    /// Split a ticker on a known quote asset, e.g. `BTCUSDT` into `BTC` and `USDT`.
    /// Returns `None` if the ticker is not quoted in `quote` or has no base.
    pub fn split<T: AsRef<str>>(ticker: T, quote: Asset) -> Option<Self> {
        let ticker = ticker.as_ref().trim().to_ascii_uppercase();
        let base = ticker.strip_suffix(quote.as_str())?;
        if base.is_empty() {
            return None;
        }

        Some(Symbol::new(&ticker, Asset::new(base), quote))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_on_quote() {
        let symbol = Symbol::split("btcusdt", Asset::usdt()).unwrap();
        assert_eq!(symbol.name, "BTCUSDT");
        assert_eq!(symbol.base_asset, Asset::new("BTC"));
        assert_eq!(symbol.quote_asset, Asset::usdt());
    }

    #[test]
    fn split_rejects_other_quotes() {
        assert!(Symbol::split("ETHBTC", Asset::usdt()).is_none());
        assert!(Symbol::split("USDT", Asset::usdt()).is_none());
    }
}

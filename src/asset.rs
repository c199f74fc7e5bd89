use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize};
use std::{collections::HashSet, fmt, sync::Mutex};

/// An asset code such as `BTC` or `USDT`, always uppercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Asset(&'static str);

impl<'de> Deserialize<'de> for Asset {
    #[inline]
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Asset::new)
    }
}

impl Asset {
    // Codes are interned so that Asset can be Copy. A code is leaked the
    // first time it is seen and reused afterwards.
    pub fn new<R: AsRef<str>>(code: R) -> Self {
        static CODES: Lazy<Mutex<HashSet<&'static str>>> = Lazy::new(|| Mutex::new(HashSet::new()));

        let code = code.as_ref().trim().to_ascii_uppercase();
        let mut codes = CODES.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(interned) = codes.get(code.as_str()) {
            return Asset(interned);
        }

        let leaked: &'static str = Box::leak(code.into_boxed_str());
        codes.insert(leaked);
        Asset(leaked)
    }

    pub fn usdt() -> Self {
        Asset::new("USDT")
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning() {
        let btc1 = Asset::new("BTC");
        let btc2 = Asset::new("btc ");
        let eth = Asset::new("ETH");
        assert!(std::ptr::eq(btc1.0, btc2.0));
        assert!(!std::ptr::eq(btc1.0, eth.0));
        assert_eq!(btc2.as_str(), "BTC");
    }

    #[test]
    fn deserialize_normalizes() {
        let asset: Asset = serde_json::from_str("\"usdt\"").unwrap();
        assert_eq!(asset, Asset::usdt());
        assert_eq!(serde_json::to_string(&asset).unwrap(), "\"USDT\"");
    }
}

#![deny(unused_must_use)]
#![deny(unsafe_code)]

pub mod apis;
mod asset;
pub mod cache;
mod candle;
mod error;
mod market;
mod price;
mod query;
pub mod store;
mod symbol;

pub use asset::*;
pub use candle::{Candle, CandleKey};
pub use error::*;
pub use market::*;
pub use price::*;
pub use query::*;
pub use symbol::*;

use apis::Api;
use cache::MemoryCache;
use std::{env, path::PathBuf};
use store::Sqlite;

/// Connection settings for a [`Market`] backed by SQLite and the
/// in-memory cache.
#[derive(Clone, Debug)]
pub struct CryptoMarket {
    /// Database file. Defaults to `./.store/{api}.db`.
    pub database: Option<PathBuf>,
    pub quote: Asset,
    pub ttl: Ttl,
}

impl Default for CryptoMarket {
    fn default() -> Self {
        CryptoMarket {
            database: None,
            quote: Asset::usdt(),
            ttl: Ttl::default(),
        }
    }
}

impl CryptoMarket {
    /// Read `CRYPTOMARKET_DATABASE` and `CRYPTOMARKET_QUOTE`, keeping the
    /// defaults for unset variables.
    pub fn from_env() -> Self {
        let mut config = CryptoMarket::default();
        if let Ok(database) = env::var("CRYPTOMARKET_DATABASE") {
            config.database = Some(database.into());
        }
        if let Ok(quote) = env::var("CRYPTOMARKET_QUOTE") {
            if !quote.trim().is_empty() {
                config.quote = Asset::new(quote);
            }
        }
        config
    }

    fn database_for<A: Api>(&self) -> PathBuf {
        self.database.clone().unwrap_or_else(|| {
            PathBuf::from(format!("./.store/{}.db", A::NAME.to_ascii_lowercase()))
        })
    }

    /// Open the database and build the market around `api`.
    pub async fn connect<A: Api>(self, api: A) -> Result<Market<A, Sqlite, MemoryCache>, Error> {
        let path = self.database_for::<A>();
        log::debug!("Opening store at {}.", path.display());
        let store = Sqlite::open(&path).await?;

        Ok(Market::new(api, store, MemoryCache::new())
            .with_quote(self.quote)
            .with_ttl(self.ttl))
    }
}

use crate::{
    apis::Api,
    cache::{Bucket, Cache, CacheKey, Cached, MemoryCache},
    candle::sort_recent_first,
    store::Store,
    Asset, Candle, CandleKey, Error, Price, Snapshot, Symbol,
};
use futures_util::future::try_join_all;
use fxhash::FxHashSet;
use std::{sync::Arc, time::Duration};

/// How long each cache bucket stays valid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ttl {
    pub symbols: Duration,
    pub prices: Duration,
    pub candles: Duration,
}

impl Default for Ttl {
    fn default() -> Self {
        Ttl {
            symbols: Duration::from_secs(60 * 60),
            prices: Duration::from_secs(60),
            candles: Duration::from_secs(5 * 60),
        }
    }
}

/// Serves symbols, prices and candles from the cache, falling back to the
/// store and then to the upstream API, and backfills the tiers it missed.
///
/// Operations may run concurrently. The cache lock is never held across a
/// store or API call, so two callers missing the same key may both fetch;
/// the last one to finish wins.
pub struct Market<A, S, C = MemoryCache>
where
    A: Api,
    S: Store,
    C: Cache,
{
    api: A,
    store: S,
    cache: C,
    quote: Asset,
    ttl: Ttl,
}

impl<A, S, C> Market<A, S, C>
where
    A: Api,
    S: Store,
    C: Cache,
{
    pub fn new(api: A, store: S, cache: C) -> Self {
        Market {
            api,
            store,
            cache,
            quote: Asset::usdt(),
            ttl: Ttl::default(),
        }
    }

    /// Only symbols quoted in `quote` are listed. Defaults to USDT.
    pub fn with_quote(mut self, quote: Asset) -> Self {
        self.quote = quote;
        self
    }

    pub fn with_ttl(mut self, ttl: Ttl) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn quote(&self) -> Asset {
        self.quote
    }

    /// List all symbols. Once the store holds any symbol it is the source of
    /// truth; use [`Market::refresh_symbols`] to pick up new listings.
    pub async fn get_symbols(&self) -> Result<Vec<Symbol>, Error> {
        if let Some(Cached::Symbols(symbols)) = self.cache.get(&CacheKey::Symbols).await {
            log::trace!("Symbols served from cache.");
            return Ok(symbols.to_vec());
        }

        let symbols = if self.store.any_symbol().await? {
            log::trace!("Symbol cache was empty, loading from store.");
            self.store.all_symbols().await?
        } else {
            log::trace!("Store has no symbols, fetching using {}.", A::NAME);
            let mut seen = FxHashSet::default();
            let symbols: Vec<Symbol> = self
                .api
                .get_symbols(self.quote)
                .await?
                .into_iter()
                .filter(|symbol| seen.insert(symbol.name.clone()))
                .collect();
            self.store.add_symbols(&symbols).await?;
            symbols
        };

        self.cache
            .set(
                CacheKey::Symbols,
                Cached::Symbols(Arc::new(symbols.clone())),
                self.ttl.symbols,
            )
            .await;

        Ok(symbols)
    }

    /// Store symbols listed upstream that the store does not know yet.
    /// Known symbols are never touched and delisted ones are kept. Returns
    /// the symbols that were added.
    pub async fn refresh_symbols(&self) -> Result<Vec<Symbol>, Error> {
        let listed = self.api.get_symbols(self.quote).await?;
        if listed.is_empty() {
            log::debug!("{} listed no {} symbols.", A::NAME, self.quote);
            return Ok(Vec::new());
        }

        let mut known: FxHashSet<String> = self.store.symbol_names().await?.into_iter().collect();
        // Inserting into `known` also drops repeats within the listing.
        let added: Vec<Symbol> = listed
            .into_iter()
            .filter(|symbol| known.insert(symbol.name.clone()))
            .collect();

        if added.is_empty() {
            log::debug!("No new symbols.");
            return Ok(added);
        }

        self.store.add_symbols(&added).await?;
        self.invalidate_all().await;

        log::debug!("Added {} new symbols.", added.len());
        Ok(added)
    }

    /// Get up to `limit` candles, most recent first. An empty result is not
    /// an error and is not cached. `limit` is passed on as is.
    pub async fn get_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: i64,
    ) -> Result<Vec<Candle>, Error> {
        let key = CacheKey::Candles(CandleKey::new(symbol, interval, limit));
        if let Some(Cached::Candles(candles)) = self.cache.get(&key).await {
            log::trace!("{} served from cache.", key);
            return Ok(candles.to_vec());
        }

        let stored = self.store.get_candles(symbol, interval, limit).await?;
        let candles = if !stored.is_empty() {
            log::trace!("{} loaded from store.", key);
            stored
        } else {
            log::trace!("Store had no candles for {}, fetching using {}.", key, A::NAME);
            let mut fetched = self.api.get_candles(symbol, interval, limit).await?;
            if fetched.is_empty() {
                return Ok(fetched);
            }

            sort_recent_first(&mut fetched);
            self.store.add_candles(&fetched).await?;
            fetched
        };

        self.cache
            .set(key, Cached::Candles(Arc::new(candles.clone())), self.ttl.candles)
            .await;

        Ok(candles)
    }

    /// Drop every cached entry so the next reads go to the store.
    pub async fn refresh_market(&self) {
        self.invalidate_all().await;
    }

    /// Get the latest price of each requested symbol. Symbols missing from
    /// the snapshot are fetched upstream concurrently; if any of those
    /// fetches fails the whole call fails and nothing is stored.
    pub async fn get_prices<T: AsRef<str>>(&self, symbols: &[T]) -> Result<Vec<Price>, Error> {
        let mut seen = FxHashSet::default();
        let requested: Vec<String> = symbols
            .iter()
            .map(|symbol| symbol.as_ref().to_owned())
            .filter(|symbol| seen.insert(symbol.clone()))
            .collect();

        if requested.is_empty() {
            return Ok(Vec::new());
        }

        let snapshot = self.snapshot().await?;

        let missing = snapshot.missing(&requested);
        if missing.is_empty() {
            return Ok(snapshot.select(&requested));
        }

        log::trace!("Fetching {} missing prices using {}.", missing.len(), A::NAME);
        let fetched =
            try_join_all(missing.iter().map(|symbol| self.api.get_price(symbol))).await?;
        self.store.add_prices(&fetched).await?;

        let mut merged = snapshot.as_ref().clone();
        merged.extend(fetched);
        let merged = Arc::new(merged);
        self.cache
            .set(
                CacheKey::Prices,
                Cached::Prices(Arc::clone(&merged)),
                self.ttl.prices,
            )
            .await;

        Ok(merged.select(&requested))
    }

    /// Replace the stored and cached prices with the full upstream board for
    /// the quote asset. Returns the number of prices in the new snapshot.
    pub async fn sync_prices(&self) -> Result<usize, Error> {
        let board = self.api.get_prices(self.quote).await?;
        if board.is_empty() {
            log::debug!("{} returned no {} prices.", A::NAME, self.quote);
            return Ok(0);
        }

        self.store.replace_prices(&board).await?;

        let snapshot: Snapshot = board.into_iter().collect();
        let count = snapshot.len();
        self.cache
            .set(
                CacheKey::Prices,
                Cached::Prices(Arc::new(snapshot)),
                self.ttl.prices,
            )
            .await;

        Ok(count)
    }

    async fn snapshot(&self) -> Result<Arc<Snapshot>, Error> {
        if let Some(Cached::Prices(snapshot)) = self.cache.get(&CacheKey::Prices).await {
            log::trace!("Price snapshot served from cache.");
            return Ok(snapshot);
        }

        log::trace!("Price snapshot cache was empty, loading from store.");
        let snapshot: Arc<Snapshot> =
            Arc::new(self.store.latest_prices().await?.into_iter().collect());
        self.cache
            .set(
                CacheKey::Prices,
                Cached::Prices(Arc::clone(&snapshot)),
                self.ttl.prices,
            )
            .await;

        Ok(snapshot)
    }

    async fn invalidate_all(&self) {
        for bucket in Bucket::ALL {
            self.cache.invalidate(bucket).await;
        }
    }
}

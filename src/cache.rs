//! Process-local cache with per-entry expiry.
//!
//! Entries live in one of three buckets: the symbol list, the price
//! snapshot, and candle query results. Candle results are keyed per query,
//! so dropping the candle bucket removes every candle entry at once.

use crate::{Candle, CandleKey, Snapshot, Symbol};
use async_trait::async_trait;
use futures_util::lock::Mutex;
use fxhash::FxHashMap;
use std::{fmt, sync::Arc, time::Duration};
use tokio::time::Instant;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Symbols,
    Prices,
    Candles(CandleKey),
}

impl CacheKey {
    pub fn bucket(&self) -> Bucket {
        match self {
            CacheKey::Symbols => Bucket::Symbols,
            CacheKey::Prices => Bucket::Prices,
            CacheKey::Candles(_) => Bucket::Candles,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Symbols => write!(f, "symbols"),
            CacheKey::Prices => write!(f, "prices"),
            CacheKey::Candles(key) => write!(f, "{}", key),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Bucket {
    Symbols,
    Prices,
    Candles,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::Symbols, Bucket::Prices, Bucket::Candles];
}

/// A cached value. Shared so that hits do not copy the whole collection
/// while the cache lock is held.
#[derive(Clone, Debug)]
pub enum Cached {
    Symbols(Arc<Vec<Symbol>>),
    Prices(Arc<Snapshot>),
    Candles(Arc<Vec<Candle>>),
}

#[async_trait]
pub trait Cache: Send + Sync {
    /// Get an unexpired entry.
    async fn get(&self, key: &CacheKey) -> Option<Cached>;
    /// Insert or overwrite an entry that expires after `ttl`.
    async fn set(&self, key: CacheKey, value: Cached, ttl: Duration);
    async fn remove(&self, key: &CacheKey);
    /// Remove every entry in `bucket`.
    async fn invalidate(&self, bucket: Bucket);
}

struct Entry {
    value: Cached,
    // None if the ttl overflows the clock.
    expires: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires, Some(expires) if expires <= now)
    }
}

/// In-memory [`Cache`]. Every operation takes the lock once, so operations
/// on the same key are atomic with respect to each other. Concurrent
/// writers to one key are not coordinated; the last write wins.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<FxHashMap<CacheKey, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Default::default()
    }

    /// Number of unexpired entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Option<Cached> {
        let mut entries = self.entries.lock().await;
        let expired = entries.get(key)?.is_expired(Instant::now());
        if expired {
            log::trace!("Cache entry {} expired.", key);
            entries.remove(key);
            return None;
        }

        entries.get(key).map(|entry| entry.value.clone())
    }

    async fn set(&self, key: CacheKey, value: Cached, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        // Expired entries are otherwise only dropped when their key is read.
        entries.retain(|_, entry| !entry.is_expired(now));
        entries.insert(
            key,
            Entry {
                value,
                expires: now.checked_add(ttl),
            },
        );
    }

    async fn remove(&self, key: &CacheKey) {
        self.entries.lock().await.remove(key);
    }

    async fn invalidate(&self, bucket: Bucket) {
        let mut entries = self.entries.lock().await;
        entries.retain(|key, _| key.bucket() != bucket);
        log::trace!("Invalidated {:?} cache bucket.", bucket);
    }
}

use super::{CandleStore, PriceStore, StoreError, SymbolStore};
use crate::{Asset, Candle, Price, Symbol};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    ConnectOptions, SqliteConnection, SqlitePool,
};
use std::{path::Path, str::FromStr};

// Keeps every statement below SQLite's default limit of 999 parameters.
const CHUNK_SIZE: usize = 100;

type PriceRow = (String, Vec<u8>, i64);
type CandleRow = (String, String, i64, Vec<u8>, Vec<u8>, Vec<u8>, Vec<u8>, Vec<u8>);

/// Durable store on top of a SQLite database. Tables are created on connect.
pub struct Sqlite {
    pool: SqlitePool,
}

impl Sqlite {
    /// Open (or create) the database file at `path`.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Sqlite::init(pool).await
    }

    /// A private in-memory database. Lost when the store is dropped.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options =
            SqliteConnectOptions::from_str("sqlite::memory:")?.disable_statement_logging();

        // Every connection would see its own empty database, so keep exactly one alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Sqlite::init(pool).await
    }

    async fn init(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(
            "
                CREATE TABLE IF NOT EXISTS symbols (
                    name TEXT NOT NULL PRIMARY KEY,
                    base_asset TEXT NOT NULL,
                    quote_asset TEXT NOT NULL
                )
            ",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "
                CREATE TABLE IF NOT EXISTS prices (
                    symbol TEXT NOT NULL,
                    value BLOB NOT NULL,
                    timestamp INTEGER NOT NULL
                )
            ",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS prices_symbol_timestamp ON prices (symbol, timestamp)",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "
                CREATE TABLE IF NOT EXISTS candles (
                    symbol TEXT NOT NULL,
                    interval TEXT NOT NULL,
                    open_time INTEGER NOT NULL,
                    open BLOB NOT NULL,
                    high BLOB NOT NULL,
                    low BLOB NOT NULL,
                    close BLOB NOT NULL,
                    volume BLOB NOT NULL,
                    PRIMARY KEY(symbol, interval, open_time)
                )
            ",
        )
        .execute(&pool)
        .await?;

        Ok(Sqlite { pool })
    }
}

#[async_trait]
impl SymbolStore for Sqlite {
    async fn all_symbols(&self) -> Result<Vec<Symbol>, StoreError> {
        let rows: Vec<(String, String, String)> =
            sqlx::query_as("SELECT name, base_asset, quote_asset FROM symbols ORDER BY rowid")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(name, base, quote)| Symbol::new(name, Asset::new(base), Asset::new(quote)))
            .collect())
    }

    async fn add_symbols(&self, symbols: &[Symbol]) -> Result<(), StoreError> {
        if symbols.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for chunk in symbols.chunks(CHUNK_SIZE) {
            let sql = format!(
                "INSERT INTO symbols (name, base_asset, quote_asset) VALUES {}",
                placeholders(chunk.len(), 3)
            );
            let mut query = sqlx::query::<sqlx::Sqlite>(&sql);
            for symbol in chunk {
                query = query
                    .bind(symbol.name.as_str())
                    .bind(symbol.base_asset.as_str())
                    .bind(symbol.quote_asset.as_str());
            }
            query.execute(&mut *tx).await?;
        }
        tx.commit().await?;

        log::debug!("Stored {} symbols.", symbols.len());
        Ok(())
    }

    async fn any_symbol(&self) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, i64>("SELECT EXISTS (SELECT 1 FROM symbols)")
            .fetch_one(&self.pool)
            .await?;
        Ok(exists != 0)
    }

    async fn symbol_names(&self) -> Result<Vec<String>, StoreError> {
        Ok(sqlx::query_scalar::<_, String>("SELECT name FROM symbols")
            .fetch_all(&self.pool)
            .await?)
    }
}

#[async_trait]
impl PriceStore for Sqlite {
    async fn latest_prices_for(&self, symbols: &[String]) -> Result<Vec<Price>, StoreError> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        // SQLite takes the bare columns from the row holding MAX(timestamp).
        let mut rows: Vec<PriceRow> = Vec::new();
        for chunk in symbols.chunks(CHUNK_SIZE) {
            let sql = format!(
                "
                    SELECT symbol, value, MAX(timestamp)
                    FROM prices
                    WHERE symbol IN ({})
                    GROUP BY symbol
                    ORDER BY symbol
                ",
                vec!["?"; chunk.len()].join(",")
            );
            let mut query = sqlx::query_as::<sqlx::Sqlite, PriceRow>(&sql);
            for symbol in chunk {
                query = query.bind(symbol.as_str());
            }
            rows.extend(query.fetch_all(&self.pool).await?);
        }

        rows.into_iter().map(price_from_row).collect()
    }

    async fn add_prices(&self, prices: &[Price]) -> Result<(), StoreError> {
        if prices.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        insert_prices(&mut *tx, prices).await?;
        tx.commit().await?;

        log::debug!("Stored {} prices.", prices.len());
        Ok(())
    }

    async fn replace_prices(&self, prices: &[Price]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM prices").execute(&mut *tx).await?;
        insert_prices(&mut *tx, prices).await?;
        tx.commit().await?;

        log::debug!("Replaced price table with {} prices.", prices.len());
        Ok(())
    }

    async fn latest_prices(&self) -> Result<Vec<Price>, StoreError> {
        let rows: Vec<PriceRow> = sqlx::query_as(
            "
                SELECT symbol, value, MAX(timestamp)
                FROM prices
                GROUP BY symbol
                ORDER BY symbol
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(price_from_row).collect()
    }
}

#[async_trait]
impl CandleStore for Sqlite {
    async fn get_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: i64,
    ) -> Result<Vec<Candle>, StoreError> {
        // SQLite reads a negative LIMIT as "no limit".
        if limit <= 0 {
            return Ok(Vec::new());
        }

        let rows: Vec<CandleRow> = sqlx::query_as(
            "
                SELECT symbol, interval, open_time, open, high, low, close, volume
                FROM candles
                WHERE symbol = ?
                AND interval = ?
                ORDER BY open_time DESC
                LIMIT ?
            ",
        )
        .bind(symbol)
        .bind(interval)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(candle_from_row).collect()
    }

    async fn add_candles(&self, candles: &[Candle]) -> Result<(), StoreError> {
        if candles.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for chunk in candles.chunks(CHUNK_SIZE) {
            // A candle that is already stored keeps its first version.
            let sql = format!(
                "INSERT OR IGNORE INTO candles \
                    (symbol, interval, open_time, open, high, low, close, volume) \
                    VALUES {}",
                placeholders(chunk.len(), 8)
            );
            let mut query = sqlx::query::<sqlx::Sqlite>(&sql);
            for candle in chunk {
                query = query
                    .bind(candle.symbol.as_str())
                    .bind(candle.interval.as_str())
                    .bind(candle.open_time.timestamp_millis())
                    .bind(dec_to_blob(candle.open))
                    .bind(dec_to_blob(candle.high))
                    .bind(dec_to_blob(candle.low))
                    .bind(dec_to_blob(candle.close))
                    .bind(dec_to_blob(candle.volume));
            }
            query.execute(&mut *tx).await?;
        }
        tx.commit().await?;

        log::debug!("Stored {} candles.", candles.len());
        Ok(())
    }
}

async fn insert_prices(conn: &mut SqliteConnection, prices: &[Price]) -> Result<(), StoreError> {
    for chunk in prices.chunks(CHUNK_SIZE) {
        let sql = format!(
            "INSERT INTO prices (symbol, value, timestamp) VALUES {}",
            placeholders(chunk.len(), 3)
        );
        let mut query = sqlx::query::<sqlx::Sqlite>(&sql);
        for price in chunk {
            query = query
                .bind(price.symbol.as_str())
                .bind(dec_to_blob(price.value))
                .bind(price.timestamp.timestamp_millis());
        }
        query.execute(&mut *conn).await?;
    }

    Ok(())
}

/// `(?,?,?),(?,?,?)` for `rows` rows of `columns` values.
fn placeholders(rows: usize, columns: usize) -> String {
    let row = format!("({})", vec!["?"; columns].join(","));
    vec![row; rows].join(",")
}

fn price_from_row((symbol, value, timestamp): PriceRow) -> Result<Price, StoreError> {
    Ok(Price {
        symbol,
        value: blob_to_dec(value)?,
        timestamp: millis_to_time(timestamp)?,
    })
}

fn candle_from_row(row: CandleRow) -> Result<Candle, StoreError> {
    let (symbol, interval, open_time, open, high, low, close, volume) = row;
    Ok(Candle {
        symbol,
        interval,
        open_time: millis_to_time(open_time)?,
        open: blob_to_dec(open)?,
        high: blob_to_dec(high)?,
        low: blob_to_dec(low)?,
        close: blob_to_dec(close)?,
        volume: blob_to_dec(volume)?,
    })
}

fn millis_to_time(millis: i64) -> Result<DateTime<Utc>, StoreError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp {} out of range", millis)))
}

fn blob_to_dec(blob: Vec<u8>) -> Result<Decimal, StoreError> {
    let buf: [u8; 16] = blob
        .as_slice()
        .try_into()
        .map_err(|_| StoreError::Corrupt(format!("decimal of {} bytes", blob.len())))?;
    Ok(Decimal::deserialize(buf))
}

fn dec_to_blob(decimal: Decimal) -> Vec<u8> {
    decimal.serialize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn time(minutes: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::minutes(minutes)
    }

    fn symbol(name: &str) -> Symbol {
        Symbol::split(name, Asset::usdt()).unwrap()
    }

    fn price(symbol: &str, value: Decimal, minutes: i64) -> Price {
        Price {
            symbol: symbol.to_owned(),
            value,
            timestamp: time(minutes),
        }
    }

    fn candle(symbol: &str, interval: &str, minutes: i64, close: Decimal) -> Candle {
        Candle {
            symbol: symbol.to_owned(),
            interval: interval.to_owned(),
            open_time: time(minutes),
            open: dec!(1.5),
            high: dec!(2.25),
            low: dec!(0.75),
            close,
            volume: dec!(1000.000001),
        }
    }

    #[tokio::test]
    async fn symbols() {
        let store = Sqlite::in_memory().await.unwrap();
        assert!(!store.any_symbol().await.unwrap());

        store
            .add_symbols(&[symbol("BTCUSDT"), symbol("ETHUSDT")])
            .await
            .unwrap();
        store.add_symbols(&[symbol("BNBUSDT")]).await.unwrap();

        assert!(store.any_symbol().await.unwrap());
        let all = store.all_symbols().await.unwrap();
        assert_eq!(all, vec![symbol("BTCUSDT"), symbol("ETHUSDT"), symbol("BNBUSDT")]);

        let mut names = store.symbol_names().await.unwrap();
        names.sort();
        assert_eq!(names, vec!["BNBUSDT", "BTCUSDT", "ETHUSDT"]);
    }

    #[tokio::test]
    async fn duplicate_symbol_is_rejected() {
        let store = Sqlite::in_memory().await.unwrap();
        store.add_symbols(&[symbol("BTCUSDT")]).await.unwrap();

        let err = store.add_symbols(&[symbol("BTCUSDT")]).await.unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
        assert_eq!(store.all_symbols().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn many_symbols_are_chunked() {
        let store = Sqlite::in_memory().await.unwrap();
        let symbols: Vec<Symbol> = (0..250).map(|i| symbol(&format!("A{}USDT", i))).collect();
        store.add_symbols(&symbols).await.unwrap();
        assert_eq!(store.all_symbols().await.unwrap(), symbols);
    }

    #[tokio::test]
    async fn latest_prices() {
        let store = Sqlite::in_memory().await.unwrap();
        store
            .add_prices(&[
                price("BTCUSDT", dec!(49000), 0),
                price("BTCUSDT", dec!(50000), 2),
                price("BTCUSDT", dec!(49500), 1),
                price("ETHUSDT", dec!(3000), 0),
            ])
            .await
            .unwrap();

        let latest = store.latest_prices().await.unwrap();
        assert_eq!(
            latest,
            vec![price("BTCUSDT", dec!(50000), 2), price("ETHUSDT", dec!(3000), 0)]
        );

        let some = store
            .latest_prices_for(&["ETHUSDT".to_owned(), "XRPUSDT".to_owned()])
            .await
            .unwrap();
        assert_eq!(some, vec![price("ETHUSDT", dec!(3000), 0)]);
        assert!(store.latest_prices_for(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replace_prices() {
        let store = Sqlite::in_memory().await.unwrap();
        store
            .add_prices(&[price("BTCUSDT", dec!(49000), 0), price("ETHUSDT", dec!(3000), 0)])
            .await
            .unwrap();

        store
            .replace_prices(&[price("BNBUSDT", dec!(400), 5)])
            .await
            .unwrap();

        assert_eq!(
            store.latest_prices().await.unwrap(),
            vec![price("BNBUSDT", dec!(400), 5)]
        );
    }

    #[tokio::test]
    async fn candles_most_recent_first() {
        let store = Sqlite::in_memory().await.unwrap();
        store
            .add_candles(&[
                candle("BTCUSDT", "1m", 0, dec!(100)),
                candle("BTCUSDT", "1m", 1, dec!(101)),
                candle("BTCUSDT", "1m", 2, dec!(102)),
                candle("BTCUSDT", "1h", 0, dec!(200)),
                candle("ETHUSDT", "1m", 0, dec!(300)),
            ])
            .await
            .unwrap();

        let candles = store.get_candles("BTCUSDT", "1m", 2).await.unwrap();
        assert_eq!(
            candles,
            vec![
                candle("BTCUSDT", "1m", 2, dec!(102)),
                candle("BTCUSDT", "1m", 1, dec!(101)),
            ]
        );

        assert_eq!(store.get_candles("BTCUSDT", "1m", 10).await.unwrap().len(), 3);
        assert!(store.get_candles("BTCUSDT", "1m", 0).await.unwrap().is_empty());
        assert!(store.get_candles("BTCUSDT", "1m", -1).await.unwrap().is_empty());
        assert!(store.get_candles("XRPUSDT", "1m", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_candles_are_ignored() {
        let store = Sqlite::in_memory().await.unwrap();
        store
            .add_candles(&[candle("BTCUSDT", "1m", 0, dec!(100))])
            .await
            .unwrap();
        store
            .add_candles(&[
                candle("BTCUSDT", "1m", 0, dec!(999)),
                candle("BTCUSDT", "1m", 1, dec!(101)),
            ])
            .await
            .unwrap();

        let candles = store.get_candles("BTCUSDT", "1m", 10).await.unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].close, dec!(100));
    }

    #[test]
    fn decimal_blobs() {
        let value = dec!(-12345.678901234);
        assert_eq!(blob_to_dec(dec_to_blob(value)).unwrap(), value);
        assert!(matches!(blob_to_dec(vec![1, 2, 3]), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn placeholder_rows() {
        assert_eq!(placeholders(2, 3), "(?,?,?),(?,?,?)");
    }
}

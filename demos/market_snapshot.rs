use cryptomarket::{apis::Binance, parse_symbols, CandleQuery, CryptoMarket, Error};
use std::env;

// Prints a few prices and recent candles. Usage:
// cargo run --example market_snapshot -- BTCUSDT,ETHUSDT [interval] [limit]
#[tokio::main]
async fn main() -> Result<(), Error> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Debug)
        .with_utc_timestamps()
        .init()
        .unwrap();

    let mut args = env::args().skip(1);
    let symbols = parse_symbols(&args.next().unwrap_or_else(|| "BTCUSDT,ETHUSDT".to_owned()))?;
    let interval = args.next();
    let limit = args.next().and_then(|limit| limit.parse().ok());

    let market = CryptoMarket::from_env().connect(Binance::from_env()?).await?;

    let listed = market.get_symbols().await?;
    let added = market.refresh_symbols().await?;
    log::info!("{} symbols listed, {} new.", listed.len(), added.len());

    for price in market.get_prices(&symbols).await? {
        println!("{:<12} {:>16} at {}", price.symbol, price.value, price.timestamp);
    }

    let query = CandleQuery::new(&symbols[0], interval.as_deref(), limit)?;
    for candle in market
        .get_candles(&query.symbol, &query.interval, query.limit)
        .await?
    {
        println!(
            "{} {} o={} h={} l={} c={} v={}",
            candle.open_time,
            candle.interval,
            candle.open,
            candle.high,
            candle.low,
            candle.close,
            candle.volume
        );
    }

    Ok(())
}

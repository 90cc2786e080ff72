//! Deterministic synthetic market data
//!
//! Produces regular-session minute bars (09:30 through 16:00 UTC inclusive,
//! 391 bars per weekday) so that five sessions give 1955 bars per ticker.

use super::types::{Dataset, PriceBar, Ticker};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use std::fs::File;
use std::path::Path;

/// Bars per regular session
pub const BARS_PER_SESSION: usize = 391;

const SYMBOLS: [(&str, &str); 8] = [
    ("AAPL", "Apple Inc."),
    ("MSFT", "Microsoft Corp."),
    ("GOOGL", "Alphabet Inc."),
    ("AMZN", "Amazon.com Inc."),
    ("TSLA", "Tesla Inc."),
    ("NVDA", "NVIDIA Corp."),
    ("META", "Meta Platforms Inc."),
    ("NFLX", "Netflix Inc."),
];

/// Largest ticker universe the generator supports
pub const MAX_TICKERS: usize = SYMBOLS.len();

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn session_open(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_hms_opt(9, 30, 0).unwrap_or_default())
}

fn next_weekday(day: NaiveDate) -> NaiveDate {
    let mut next = day + Duration::days(1);
    while matches!(next.weekday(), Weekday::Sat | Weekday::Sun) {
        next += Duration::days(1);
    }
    next
}

/// Minute timestamps for `count` bars starting at the session beginning on `first_day`
pub fn session_timestamps(first_day: NaiveDate, count: usize) -> Vec<DateTime<Utc>> {
    let mut out = Vec::with_capacity(count);
    let mut day = first_day;
    while out.len() < count {
        let open = session_open(day);
        let take = BARS_PER_SESSION.min(count - out.len());
        out.extend((0..take).map(|m| open + Duration::minutes(m as i64)));
        day = next_weekday(day);
    }
    out
}

/// Generate `tickers` symbols with `bars_per_ticker` bars each, starting Monday 2025-11-17
pub fn generate(tickers: usize, bars_per_ticker: usize) -> Dataset {
    let tickers = tickers.min(MAX_TICKERS);
    let first_day = NaiveDate::from_ymd_opt(2025, 11, 17).unwrap_or_default();
    let timestamps = session_timestamps(first_day, bars_per_ticker);

    let ticker_list: Vec<Ticker> = SYMBOLS[..tickers]
        .iter()
        .enumerate()
        .map(|(i, (symbol, name))| Ticker {
            ticker_id: i as i64 + 1,
            symbol: symbol.to_string(),
            name: name.to_string(),
            exchange: "NASDAQ".to_string(),
        })
        .collect();

    let mut bars = Vec::with_capacity(tickers * bars_per_ticker);
    for (i, ticker) in ticker_list.iter().enumerate() {
        let base = 100.0 + 50.0 * i as f64;
        let drift = (i as f64 - 2.0) * 2e-5;
        let mut prev_close = round2(base);

        for (k, ts) in timestamps.iter().enumerate() {
            let t = k as f64;
            let close = round2(base * (1.0 + 0.02 * (t * 0.013 + i as f64).sin() + drift * t));
            let open = prev_close;
            let high = round2(open.max(close) * 1.0005);
            let low = round2(open.min(close) * 0.9995);
            let volume = 1_000 + ((k * 37 + i * 101) % 5_000) as i64;

            bars.push(PriceBar {
                timestamp: *ts,
                ticker_id: ticker.ticker_id,
                symbol: ticker.symbol.clone(),
                open,
                high,
                low,
                close,
                volume,
            });
            prev_close = close;
        }
    }

    Dataset::new(ticker_list, bars)
}

/// Write a dataset as the two input CSV files the loader reads
pub fn write_csv(dataset: &Dataset, market_path: &Path, tickers_path: &Path) -> anyhow::Result<()> {
    for path in [market_path, tickers_path] {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_writer(File::create(tickers_path)?);
    writer.write_record(["ticker_id", "symbol", "name", "exchange"])?;
    for t in dataset.tickers() {
        writer.write_record([
            t.ticker_id.to_string(),
            t.symbol.clone(),
            t.name.clone(),
            t.exchange.clone(),
        ])?;
    }
    writer.flush()?;

    // Interleave symbols by time, the way a consolidated feed would arrive
    let mut rows: Vec<&PriceBar> = dataset.bars().iter().collect();
    rows.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.symbol.cmp(&b.symbol)));

    let mut writer = csv::Writer::from_writer(File::create(market_path)?);
    writer.write_record(["timestamp", "symbol", "open", "high", "low", "close", "volume"])?;
    for bar in rows {
        writer.write_record([
            bar.timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            bar.symbol.clone(),
            format!("{:.2}", bar.open),
            format!("{:.2}", bar.high),
            format!("{:.2}", bar.low),
            format!("{:.2}", bar.close),
            bar.volume.to_string(),
        ])?;
    }
    writer.flush()?;

    tracing::info!(
        market = %market_path.display(),
        tickers = %tickers_path.display(),
        bars = dataset.bars().len(),
        "Wrote synthetic input files"
    );
    Ok(())
}

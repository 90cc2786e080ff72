//! Loader types

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Loader errors that abort the whole load
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Input file could not be opened or read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// CSV framing error (not a per-row validation failure)
    #[error("Malformed CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    /// Market data file lacks required columns
    #[error("Missing required columns in {path}: {columns:?}")]
    MissingColumns { path: PathBuf, columns: Vec<String> },
    /// Ticker master list is unusable
    #[error("Invalid ticker list: {0}")]
    InvalidTickers(String),
    /// Required tickers have no accepted bars (strict mode)
    #[error("Missing required tickers in market data: {0:?}")]
    MissingTickers(Vec<String>),
}

/// Reference data for one instrument
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ticker {
    pub ticker_id: i64,
    pub symbol: String,
    pub name: String,
    pub exchange: String,
}

/// One validated minute bar
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub ticker_id: i64,
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl PriceBar {
    /// UTC trading day of the bar
    pub fn trade_date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Validated dataset shared by both storage layouts.
///
/// Bars are sorted by `(symbol, timestamp)` and unique on that key.
/// [`Dataset::new`] is the only constructor, so the ordering always holds.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    tickers: Vec<Ticker>,
    bars: Vec<PriceBar>,
}

impl Dataset {
    /// Sort bars by symbol then time; on a repeated key the first bar wins
    pub fn new(tickers: Vec<Ticker>, mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by(|a, b| {
            a.symbol
                .cmp(&b.symbol)
                .then_with(|| a.timestamp.cmp(&b.timestamp))
        });
        bars.dedup_by(|later, first| {
            later.symbol == first.symbol && later.timestamp == first.timestamp
        });
        Self { tickers, bars }
    }

    pub fn tickers(&self) -> &[Ticker] {
        &self.tickers
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Distinct symbols present in the bars, in sorted order
    pub fn symbols(&self) -> Vec<&str> {
        let mut symbols: Vec<&str> = self.bars.iter().map(|b| b.symbol.as_str()).collect();
        symbols.dedup();
        symbols
    }

    /// Bars for one symbol, in timestamp order
    pub fn bars_for(&self, symbol: &str) -> &[PriceBar] {
        let start = self.bars.partition_point(|b| b.symbol.as_str() < symbol);
        let end = self.bars.partition_point(|b| b.symbol.as_str() <= symbol);
        &self.bars[start..end]
    }

    pub fn ticker(&self, symbol: &str) -> Option<&Ticker> {
        self.tickers.iter().find(|t| t.symbol == symbol)
    }
}

/// Why a raw row was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    UnknownSymbol,
    MalformedTimestamp,
    NonMonotonicTimestamp,
    DuplicateKey,
    NegativeVolume,
    NonPositivePrice,
    MissingField,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::UnknownSymbol => "unknown_symbol",
            RejectReason::MalformedTimestamp => "malformed_timestamp",
            RejectReason::NonMonotonicTimestamp => "non_monotonic_timestamp",
            RejectReason::DuplicateKey => "duplicate_key",
            RejectReason::NegativeVolume => "negative_volume",
            RejectReason::NonPositivePrice => "non_positive_price",
            RejectReason::MissingField => "missing_field",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-run loader statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    /// Data rows read from the market data file
    pub rows_read: usize,
    /// Rows that passed validation
    pub rows_accepted: usize,
    /// Dropped rows by reason
    pub rejected: BTreeMap<RejectReason, usize>,
    /// Ticker list entries with no accepted bars
    pub missing_tickers: Vec<String>,
    /// Whether a `ticker` header was normalized to `symbol`
    pub renamed_ticker_column: bool,
}

impl LoadReport {
    pub fn reject(&mut self, reason: RejectReason) {
        *self.rejected.entry(reason).or_insert(0) += 1;
    }

    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }

    pub fn rejected_for(&self, reason: RejectReason) -> usize {
        self.rejected.get(&reason).copied().unwrap_or(0)
    }
}

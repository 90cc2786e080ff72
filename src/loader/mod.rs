//! Data loader
//!
//! Reads the market data and ticker CSVs, validates each row and produces the
//! single [`Dataset`] both storage layouts ingest. Bad rows are dropped and
//! counted in a [`LoadReport`]; only unreadable files, missing columns and
//! (in strict mode) missing tickers abort the load.

mod csv_input;
pub mod synthetic;
mod types;
mod validate;

pub use csv_input::{read_market_data, read_tickers, RawMarketData, RawTick, REQUIRED_COLUMNS};
pub use types::{Dataset, LoadReport, LoaderError, PriceBar, RejectReason, Ticker};
pub use validate::{parse_timestamp, validate_rows, RowValidator};

use crate::telemetry;
use std::collections::HashSet;
use std::path::Path;

/// Loader behaviour switches
#[derive(Debug, Clone, Copy, Default)]
pub struct LoaderOptions {
    /// Fail when a listed ticker has no accepted bars
    pub require_all_tickers: bool,
}

/// Validate already-read rows against a ticker list
pub fn build_dataset(
    tickers: Vec<Ticker>,
    raw: RawMarketData,
    options: LoaderOptions,
) -> Result<(Dataset, LoadReport), LoaderError> {
    let mut report = LoadReport {
        renamed_ticker_column: raw.renamed_ticker_column,
        ..Default::default()
    };
    let bars = validate_rows(&tickers, &raw.rows, &mut report);

    let present: HashSet<&str> = bars.iter().map(|b| b.symbol.as_str()).collect();
    report.missing_tickers = tickers
        .iter()
        .filter(|t| !present.contains(t.symbol.as_str()))
        .map(|t| t.symbol.clone())
        .collect();

    for (reason, count) in &report.rejected {
        telemetry::record_rejected(*reason, *count as u64);
    }

    if !report.missing_tickers.is_empty() {
        if options.require_all_tickers {
            return Err(LoaderError::MissingTickers(report.missing_tickers));
        }
        tracing::warn!(missing = ?report.missing_tickers, "Market data is missing listed tickers");
    }

    tracing::info!(
        read = report.rows_read,
        accepted = report.rows_accepted,
        rejected = report.rejected_total(),
        "Validation complete"
    );

    Ok((Dataset::new(tickers, bars), report))
}

/// Load, validate and normalize both input files
pub fn load_validate_data(
    market_data_path: &Path,
    tickers_path: &Path,
    options: LoaderOptions,
) -> Result<(Dataset, LoadReport), LoaderError> {
    let tickers = read_tickers(tickers_path)?;
    let raw = read_market_data(market_data_path)?;
    build_dataset(tickers, raw, options)
}

//! CSV readers for the market data and ticker master files

use super::types::{LoaderError, Ticker};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

/// Columns every market data file must carry (after normalization)
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "timestamp", "symbol", "open", "high", "low", "close", "volume",
];

/// One market data row as read from disk, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTick {
    pub timestamp: String,
    pub symbol: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
}

/// Raw rows plus what header normalization did
#[derive(Debug, Clone, Default)]
pub struct RawMarketData {
    pub rows: Vec<RawTick>,
    pub renamed_ticker_column: bool,
}

#[derive(Debug, Deserialize)]
struct TickerRow {
    #[serde(default)]
    ticker_id: Option<i64>,
    symbol: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    exchange: String,
}

fn open(path: &Path) -> Result<File, LoaderError> {
    File::open(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn csv_err(path: &Path) -> impl Fn(csv::Error) -> LoaderError + '_ {
    move |source| LoaderError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

/// Lowercase and trim header names, aliasing `ticker` to `symbol`
fn normalize_headers(headers: &StringRecord) -> (StringRecord, bool) {
    let mut names: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
    let mut renamed = false;
    if !names.iter().any(|n| n == "symbol") {
        if let Some(pos) = names.iter().position(|n| n == "ticker") {
            names[pos] = "symbol".to_string();
            renamed = true;
        }
    }
    (StringRecord::from(names), renamed)
}

/// Read the ticker master list.
///
/// Ids come from a `ticker_id` column when present, otherwise 1..=n in file order.
pub fn read_tickers(path: &Path) -> Result<Vec<Ticker>, LoaderError> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_reader(open(path)?);

    let headers = reader.headers().map_err(csv_err(path))?.clone();
    let (headers, _) = normalize_headers(&headers);
    reader.set_headers(headers);

    let mut tickers = Vec::new();
    let mut seen_symbols = HashSet::new();
    let mut seen_ids = HashSet::new();

    for (i, row) in reader.deserialize::<TickerRow>().enumerate() {
        let row = row.map_err(csv_err(path))?;
        if row.symbol.is_empty() {
            return Err(LoaderError::InvalidTickers(format!(
                "empty symbol on line {}",
                i + 2
            )));
        }
        let ticker_id = row.ticker_id.unwrap_or(i as i64 + 1);
        if !seen_symbols.insert(row.symbol.clone()) {
            return Err(LoaderError::InvalidTickers(format!(
                "duplicate symbol {}",
                row.symbol
            )));
        }
        if !seen_ids.insert(ticker_id) {
            return Err(LoaderError::InvalidTickers(format!(
                "duplicate ticker_id {ticker_id}"
            )));
        }
        tickers.push(Ticker {
            ticker_id,
            symbol: row.symbol,
            name: row.name,
            exchange: row.exchange,
        });
    }

    tracing::info!(path = %path.display(), count = tickers.len(), "Loaded ticker list");
    Ok(tickers)
}

/// Read market data rows without validating their contents
pub fn read_market_data(path: &Path) -> Result<RawMarketData, LoaderError> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(open(path)?);

    let headers = reader.headers().map_err(csv_err(path))?.clone();
    let (headers, renamed_ticker_column) = normalize_headers(&headers);
    if renamed_ticker_column {
        tracing::info!("Normalized 'ticker' column to 'symbol'");
    }

    let mut indices = [0usize; REQUIRED_COLUMNS.len()];
    let mut missing = Vec::new();
    for (slot, column) in indices.iter_mut().zip(REQUIRED_COLUMNS) {
        match headers.iter().position(|h| h == column) {
            Some(pos) => *slot = pos,
            None => missing.push(column.to_string()),
        }
    }
    if !missing.is_empty() {
        return Err(LoaderError::MissingColumns {
            path: path.to_path_buf(),
            columns: missing,
        });
    }

    let field = |record: &StringRecord, i: usize| -> String {
        record.get(indices[i]).unwrap_or_default().to_string()
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err(path))?;
        rows.push(RawTick {
            timestamp: field(&record, 0),
            symbol: field(&record, 1),
            open: field(&record, 2),
            high: field(&record, 3),
            low: field(&record, 4),
            close: field(&record, 5),
            volume: field(&record, 6),
        });
    }

    tracing::info!(path = %path.display(), rows = rows.len(), "Read market data");
    Ok(RawMarketData {
        rows,
        renamed_ticker_column,
    })
}

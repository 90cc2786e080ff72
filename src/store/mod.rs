//! Storage layouts
//!
//! Two physical layouts of the same dataset behind one trait:
//! - [`RowStore`]: SQLite, `tickers` + `prices` tables
//! - [`ColumnStore`]: Parquet, one partition directory per symbol

pub mod column;
mod query;
pub mod row;
mod window;

pub use column::ColumnStore;
pub use query::{
    approx_eq, AverageVolumeRow, BarRow, DailyPriceRow, Query, QueryKind, QueryResult,
    ReturnRow, RollingAverageRow, VolatilityRow,
};
pub use row::RowStore;
pub use window::{daily_returns, rolling_mean, rolling_std};

use crate::loader::Dataset;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Partition file unreadable or with an unexpected schema
    #[error("Malformed partition {path}: {reason}")]
    MalformedPartition { path: PathBuf, reason: String },
    /// More than one data file for a symbol
    #[error("Duplicate data files for partition symbol={0}")]
    DuplicatePartition(String),
    /// Stored value could not be decoded
    #[error("Corrupt value in {column}: {value}")]
    CorruptValue { column: &'static str, value: String },
    #[error("{layout} does not support query {kind}")]
    Unsupported {
        layout: &'static str,
        kind: QueryKind,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> StoreError {
        let path = path.into();
        move |source| StoreError::Io { path, source }
    }
}

/// What a load wrote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub tickers: usize,
    pub bars: usize,
    /// Partitions written (column layout) or tables created (row layout)
    pub objects: usize,
}

/// One physical layout of the dataset.
///
/// Loads are full rebuilds: whatever was stored before is replaced, and a
/// failed load leaves the previous contents in place.
pub trait StorageLayout {
    /// Short name for reports and metric labels
    fn name(&self) -> &'static str;

    /// Replace the stored data with `dataset`
    fn load(&mut self, dataset: &Dataset) -> Result<LoadSummary, StoreError>;

    /// Whether this layout answers `kind`
    fn supports(&self, kind: QueryKind) -> bool;

    /// Run a query; missing tables or partitions yield an empty result
    fn query(&self, query: &Query) -> Result<QueryResult, StoreError>;

    /// Bytes on disk for this layout
    fn disk_size(&self) -> Result<u64, StoreError>;
}

/// Total size of all files below `path` (or of `path` itself if it is a file)
pub fn disk_usage(path: &Path) -> Result<u64, StoreError> {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(StoreError::io(path)(e)),
    };
    if meta.is_file() {
        return Ok(meta.len());
    }

    let mut total = 0;
    for entry in fs::read_dir(path).map_err(StoreError::io(path))? {
        let entry = entry.map_err(StoreError::io(path))?;
        total += disk_usage(&entry.path())?;
    }
    Ok(total)
}

/// Bytes to mebibytes
pub fn to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

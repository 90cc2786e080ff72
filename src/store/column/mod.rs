//! Parquet column store
//!
//! Layout: `{root}/symbol={SYMBOL}/part-0.parquet`, one partition per symbol.
//! Queries prune partitions by symbol, read only the columns they need and
//! push timestamp predicates into the Parquet reader.

mod partition;

pub use partition::{
    parse_partition_dir, partition_dir_name, partition_schema, write_partition, Column,
    ColumnFrame, PartitionReader, PARTITION_FILE,
};

use super::query::{
    AverageVolumeRow, BarRow, DailyPriceRow, Query, QueryKind, QueryResult, ReturnRow,
    RollingAverageRow, VolatilityRow,
};
use super::window::{daily_returns, rolling_mean, rolling_std};
use super::{disk_usage, LoadSummary, StorageLayout, StoreError};
use crate::loader::Dataset;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Default maximum rows per Parquet row group
pub const DEFAULT_ROW_GROUP_SIZE: usize = 1024;

/// Column-oriented layout rooted at one directory
#[derive(Debug)]
pub struct ColumnStore {
    root: PathBuf,
    row_group_size: usize,
    /// symbol -> data file, discovered from disk
    partitions: BTreeMap<String, PathBuf>,
}

impl ColumnStore {
    /// Store handle without touching disk; call [`ColumnStore::load`] or [`ColumnStore::open`]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
            partitions: BTreeMap::new(),
        }
    }

    pub fn with_row_group_size(mut self, rows: usize) -> Self {
        self.row_group_size = rows.max(1);
        self
    }

    /// Open an existing store, validating every partition
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let mut store = Self::new(root);
        store.refresh()?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Symbols with a partition, sorted
    pub fn symbols(&self) -> Vec<&str> {
        self.partitions.keys().map(String::as_str).collect()
    }

    pub fn partition_path(&self, symbol: &str) -> Option<&Path> {
        self.partitions.get(symbol).map(PathBuf::as_path)
    }

    /// Rescan the root directory.
    ///
    /// A partition directory with more than one data file, or a file that is
    /// not a valid partition, fails the whole scan.
    pub fn refresh(&mut self) -> Result<(), StoreError> {
        self.partitions.clear();
        if !self.root.exists() {
            return Ok(());
        }

        for entry in fs::read_dir(&self.root).map_err(StoreError::io(&self.root))? {
            let entry = entry.map_err(StoreError::io(&self.root))?;
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(symbol) = parse_partition_dir(&name) else {
                continue;
            };

            let mut files = Vec::new();
            for file in fs::read_dir(&dir).map_err(StoreError::io(&dir))? {
                let path = file.map_err(StoreError::io(&dir))?.path();
                if path.extension().and_then(|e| e.to_str()) == Some("parquet") {
                    files.push(path);
                }
            }
            match files.len() {
                0 => continue,
                1 => {}
                _ => return Err(StoreError::DuplicatePartition(symbol.to_string())),
            }

            let path = files.remove(0);
            let rows = PartitionReader::new(path.clone()).validate()?;
            tracing::debug!(symbol, rows, "Discovered partition");
            self.partitions.insert(symbol.to_string(), path);
        }

        Ok(())
    }

    fn staging_dir(&self) -> PathBuf {
        let name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "column_store".to_string());
        self.root.with_file_name(format!(".{name}.staging"))
    }

    fn backup_dir(&self) -> PathBuf {
        let name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "column_store".to_string());
        self.root.with_file_name(format!(".{name}.previous"))
    }

    /// Scan partitions matching `symbol` (all when `None`), reading `columns`
    fn scan(
        &self,
        symbol: Option<&str>,
        columns: &[Column],
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<(String, ColumnFrame)>, StoreError> {
        let selected: Vec<(&String, &PathBuf)> = match symbol {
            Some(symbol) => self.partitions.get_key_value(symbol).into_iter().collect(),
            None => self.partitions.iter().collect(),
        };
        tracing::debug!(
            scanned = selected.len(),
            pruned = self.partitions.len() - selected.len(),
            columns = ?columns.iter().map(Column::name).collect::<Vec<_>>(),
            "Partition scan"
        );

        selected
            .into_iter()
            .map(|(symbol, path)| {
                let frame = PartitionReader::new(path.clone()).read(columns, range)?;
                Ok((symbol.clone(), frame))
            })
            .collect()
    }

    pub fn range(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BarRow>, StoreError> {
        let columns = [Column::Open, Column::High, Column::Low, Column::Close, Column::Volume];
        let mut out = Vec::new();
        for (symbol, frame) in self.scan(Some(symbol), &columns, Some((start, end)))? {
            for i in 0..frame.len() {
                out.push(BarRow {
                    timestamp: frame.timestamp[i],
                    symbol: symbol.clone(),
                    open: frame.open[i],
                    high: frame.high[i],
                    low: frame.low[i],
                    close: frame.close[i],
                    volume: frame.volume[i],
                });
            }
        }
        Ok(out)
    }

    pub fn average_daily_volume(&self) -> Result<Vec<AverageVolumeRow>, StoreError> {
        let mut out = Vec::new();
        for (symbol, frame) in self.scan(None, &[Column::Volume], None)? {
            let mut daily: BTreeMap<NaiveDate, i64> = BTreeMap::new();
            for (ts, volume) in frame.timestamp.iter().zip(&frame.volume) {
                *daily.entry(ts.date_naive()).or_insert(0) += volume;
            }
            if daily.is_empty() {
                continue;
            }
            let total: f64 = daily.values().map(|v| *v as f64).sum();
            out.push(AverageVolumeRow {
                symbol,
                avg_daily_volume: total / daily.len() as f64,
            });
        }
        Ok(out)
    }

    pub fn top_returns(&self, n: usize) -> Result<Vec<ReturnRow>, StoreError> {
        let mut out = Vec::new();
        for (symbol, frame) in self.scan(None, &[Column::Open, Column::Close], None)? {
            let first = frame.timestamp.iter().enumerate().min_by_key(|(_, ts)| **ts);
            let last = frame.timestamp.iter().enumerate().max_by_key(|(_, ts)| **ts);
            let (Some((first, _)), Some((last, _))) = (first, last) else {
                continue;
            };
            let first_price = frame.open[first];
            let last_price = frame.close[last];
            // No defined return from a non-positive base; the SQL side filters the same way
            if first_price <= 0.0 {
                continue;
            }
            out.push(ReturnRow {
                symbol,
                first_price,
                last_price,
                pct_return: ((last_price / first_price) - 1.0) * 100.0,
            });
        }
        out.sort_by(|a, b| {
            b.pct_return
                .total_cmp(&a.pct_return)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        out.truncate(n);
        Ok(out)
    }

    pub fn daily_first_last(&self) -> Result<Vec<DailyPriceRow>, StoreError> {
        let mut out = Vec::new();
        for (symbol, frame) in self.scan(None, &[Column::Open, Column::Close], None)? {
            // date -> (first ts, first open, last ts, last close)
            let mut days: BTreeMap<NaiveDate, (DateTime<Utc>, f64, DateTime<Utc>, f64)> =
                BTreeMap::new();
            for i in 0..frame.len() {
                let ts = frame.timestamp[i];
                let day = days
                    .entry(ts.date_naive())
                    .or_insert((ts, frame.open[i], ts, frame.close[i]));
                if ts < day.0 {
                    day.0 = ts;
                    day.1 = frame.open[i];
                }
                if ts > day.2 {
                    day.2 = ts;
                    day.3 = frame.close[i];
                }
            }
            out.extend(days.into_iter().map(|(date, (_, first, _, last))| DailyPriceRow {
                symbol: symbol.clone(),
                date,
                first_price: first,
                last_price: last,
            }));
        }
        Ok(out)
    }

    pub fn rolling_average(
        &self,
        symbol: &str,
        window: usize,
    ) -> Result<Vec<RollingAverageRow>, StoreError> {
        let mut out = Vec::new();
        for (_, frame) in self.scan(Some(symbol), &[Column::Close], None)? {
            let averages = rolling_mean(&frame.close, window);
            out.extend(
                frame
                    .timestamp
                    .iter()
                    .zip(&frame.close)
                    .zip(averages)
                    .map(|((ts, close), avg)| RollingAverageRow {
                        timestamp: *ts,
                        close: *close,
                        rolling_avg: avg,
                    }),
            );
        }
        Ok(out)
    }

    pub fn rolling_volatility(&self, window: usize) -> Result<Vec<VolatilityRow>, StoreError> {
        let mut out = Vec::new();
        for (symbol, frame) in self.scan(None, &[Column::Close], None)? {
            // Last close of each day
            let mut daily: BTreeMap<NaiveDate, (DateTime<Utc>, f64)> = BTreeMap::new();
            for (ts, close) in frame.timestamp.iter().zip(&frame.close) {
                let day = daily.entry(ts.date_naive()).or_insert((*ts, *close));
                if *ts >= day.0 {
                    *day = (*ts, *close);
                }
            }
            let closes: Vec<f64> = daily.values().map(|(_, c)| *c).collect();
            let vols = rolling_std(&daily_returns(&closes), window);
            out.extend(daily.keys().zip(closes.iter()).zip(vols).map(|((date, close), vol)| {
                VolatilityRow {
                    symbol: symbol.clone(),
                    date: *date,
                    daily_close: *close,
                    volatility: vol,
                }
            }));
        }
        Ok(out)
    }
}

impl StorageLayout for ColumnStore {
    fn name(&self) -> &'static str {
        "parquet"
    }

    /// Write every partition into a staging directory, then swap it in for the root
    fn load(&mut self, dataset: &Dataset) -> Result<LoadSummary, StoreError> {
        let staging = self.staging_dir();
        let backup = self.backup_dir();
        for dir in [&staging, &backup] {
            if dir.exists() {
                fs::remove_dir_all(dir).map_err(StoreError::io(dir))?;
            }
        }
        fs::create_dir_all(&staging).map_err(StoreError::io(&staging))?;

        let symbols = dataset.symbols();
        for symbol in &symbols {
            let dir = staging.join(partition_dir_name(symbol));
            write_partition(&dir, dataset.bars_for(symbol), self.row_group_size)?;
        }

        if self.root.exists() {
            fs::rename(&self.root, &backup).map_err(StoreError::io(&self.root))?;
        }
        fs::rename(&staging, &self.root).map_err(StoreError::io(&self.root))?;
        if backup.exists() {
            fs::remove_dir_all(&backup).map_err(StoreError::io(&backup))?;
        }

        self.refresh()?;
        tracing::info!(
            root = %self.root.display(),
            partitions = symbols.len(),
            bars = dataset.bars().len(),
            "Wrote partitioned Parquet store"
        );

        Ok(LoadSummary {
            tickers: dataset.tickers().len(),
            bars: dataset.bars().len(),
            objects: symbols.len(),
        })
    }

    fn supports(&self, _kind: QueryKind) -> bool {
        true
    }

    fn query(&self, query: &Query) -> Result<QueryResult, StoreError> {
        Ok(match query {
            Query::Range { symbol, start, end } => QueryResult::Bars(self.range(symbol, *start, *end)?),
            Query::AverageDailyVolume => QueryResult::AverageVolume(self.average_daily_volume()?),
            Query::TopReturns { n } => QueryResult::TopReturns(self.top_returns(*n)?),
            Query::DailyFirstLast => QueryResult::DailyFirstLast(self.daily_first_last()?),
            Query::RollingAverage { symbol, window } => {
                QueryResult::RollingAverage(self.rolling_average(symbol, *window)?)
            }
            Query::RollingVolatility { window } => {
                QueryResult::RollingVolatility(self.rolling_volatility(*window)?)
            }
        })
    }

    fn disk_size(&self) -> Result<u64, StoreError> {
        disk_usage(&self.root)
    }
}

//! SQLite row store
//!
//! Fixed two-table schema: `tickers` (surrogate key, unique symbol) and
//! `prices` (surrogate key, foreign key to `tickers`, OHLCV columns).
//! Timestamps are stored as `YYYY-MM-DD HH:MM:SS.ffffff` UTC text. The fixed
//! width keeps lexical order equal to time order, and `DATE(timestamp)` is the
//! UTC trading day.

use super::query::{AverageVolumeRow, BarRow, DailyPriceRow, Query, QueryKind, QueryResult, ReturnRow};
use super::{disk_usage, LoadSummary, StorageLayout, StoreError};
use crate::loader::Dataset;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

/// Text format of `prices.timestamp`, microsecond precision like the Parquet column
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Drop-and-recreate DDL, run inside the load transaction
pub const SCHEMA_SQL: &str = "
    DROP TABLE IF EXISTS prices;
    DROP TABLE IF EXISTS tickers;

    CREATE TABLE tickers (
        ticker_id INTEGER PRIMARY KEY,
        symbol    TEXT NOT NULL UNIQUE,
        name      TEXT NOT NULL,
        exchange  TEXT NOT NULL
    );

    CREATE TABLE prices (
        id        INTEGER PRIMARY KEY,
        timestamp TEXT    NOT NULL,
        ticker_id INTEGER NOT NULL REFERENCES tickers (ticker_id),
        open      REAL    NOT NULL,
        high      REAL    NOT NULL,
        low       REAL    NOT NULL,
        close     REAL    NOT NULL,
        volume    INTEGER NOT NULL
    );
";

const INDEX_SQL: &str =
    "CREATE UNIQUE INDEX idx_prices_ticker_ts ON prices (ticker_id, timestamp);";

const RANGE_SQL: &str = "
    SELECT p.timestamp, t.symbol, p.open, p.high, p.low, p.close, p.volume
    FROM prices p
    JOIN tickers t ON p.ticker_id = t.ticker_id
    WHERE t.symbol = ?1
      AND p.timestamp >= ?2
      AND p.timestamp <= ?3
    ORDER BY p.timestamp";

const AVG_DAILY_VOLUME_SQL: &str = "
    WITH daily_volume AS (
        SELECT t.symbol, DATE(p.timestamp) AS trade_date, SUM(p.volume) AS total_volume
        FROM prices p
        JOIN tickers t ON p.ticker_id = t.ticker_id
        GROUP BY t.symbol, trade_date
    )
    SELECT symbol, AVG(total_volume)
    FROM daily_volume
    GROUP BY symbol
    ORDER BY symbol";

const TOP_RETURNS_SQL: &str = "
    WITH bounds AS (
        SELECT ticker_id, MIN(timestamp) AS first_ts, MAX(timestamp) AS last_ts
        FROM prices
        GROUP BY ticker_id
    )
    SELECT t.symbol, f.open, l.close, ((l.close / f.open) - 1.0) * 100.0 AS pct_return
    FROM bounds b
    JOIN tickers t ON t.ticker_id = b.ticker_id
    JOIN prices f ON f.ticker_id = b.ticker_id AND f.timestamp = b.first_ts
    JOIN prices l ON l.ticker_id = b.ticker_id AND l.timestamp = b.last_ts
    WHERE f.open > 0
    ORDER BY pct_return DESC, t.symbol
    LIMIT ?1";

const DAILY_FIRST_LAST_SQL: &str = "
    WITH daily AS (
        SELECT ticker_id, DATE(timestamp) AS trade_date, open, close,
               ROW_NUMBER() OVER (
                   PARTITION BY ticker_id, DATE(timestamp) ORDER BY timestamp ASC
               ) AS rn_first,
               ROW_NUMBER() OVER (
                   PARTITION BY ticker_id, DATE(timestamp) ORDER BY timestamp DESC
               ) AS rn_last
        FROM prices
    )
    SELECT t.symbol, f.trade_date, f.open, l.close
    FROM tickers t
    JOIN daily f ON f.ticker_id = t.ticker_id AND f.rn_first = 1
    JOIN daily l ON l.ticker_id = t.ticker_id AND l.trade_date = f.trade_date AND l.rn_last = 1
    ORDER BY t.symbol, f.trade_date";

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    // `%.f` accepts any fraction width
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .map(|ts| ts.and_utc())
        .map_err(|_| StoreError::CorruptValue {
            column: "prices.timestamp",
            value: raw.to_string(),
        })
}

fn parse_date(raw: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| StoreError::CorruptValue {
        column: "trade_date",
        value: raw.to_string(),
    })
}

/// Row-oriented layout backed by one SQLite database.
///
/// The connection is owned here and closed when the store is dropped.
pub struct RowStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl RowStore {
    /// Open or create the database file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(StoreError::io(parent))?;
        }
        let conn = Connection::open(path)?;
        configure_connection(&conn)?;
        tracing::debug!(path = %path.display(), "Opened SQLite store");
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// In-memory database; `disk_size` reports zero
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        configure_connection(&conn)?;
        Ok(Self { conn, path: None })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn has_table(&self, name: &str) -> Result<bool, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn tables_ready(&self) -> Result<bool, StoreError> {
        Ok(self.has_table("tickers")? && self.has_table("prices")?)
    }

    /// Row count of `prices` or `tickers`; zero if the table does not exist
    pub fn count_rows(&self, table: &str) -> Result<usize, StoreError> {
        let table = match table {
            "prices" => "prices",
            "tickers" => "tickers",
            other => {
                return Err(StoreError::CorruptValue {
                    column: "table",
                    value: other.to_string(),
                })
            }
        };
        if !self.has_table(table)? {
            return Ok(0);
        }
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// DDL of every table and index, ordered by name
    pub fn schema(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT sql FROM sqlite_master WHERE sql IS NOT NULL ORDER BY type, name",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn range(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BarRow>, StoreError> {
        if !self.tables_ready()? {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare_cached(RANGE_SQL)?;
        let rows = stmt.query_map(
            params![
                symbol,
                start.format(TIMESTAMP_FORMAT).to_string(),
                end.format(TIMESTAMP_FORMAT).to_string()
            ],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, f64>(5)?,
                    row.get::<_, i64>(6)?,
                ))
            },
        )?;

        let mut out = Vec::new();
        for row in rows {
            let (ts, symbol, open, high, low, close, volume) = row?;
            out.push(BarRow {
                timestamp: parse_ts(&ts)?,
                symbol,
                open,
                high,
                low,
                close,
                volume,
            });
        }
        Ok(out)
    }

    pub fn average_daily_volume(&self) -> Result<Vec<AverageVolumeRow>, StoreError> {
        if !self.tables_ready()? {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare_cached(AVG_DAILY_VOLUME_SQL)?;
        let rows = stmt.query_map([], |row| {
            Ok(AverageVolumeRow {
                symbol: row.get(0)?,
                avg_daily_volume: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn top_returns(&self, n: usize) -> Result<Vec<ReturnRow>, StoreError> {
        if !self.tables_ready()? {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare_cached(TOP_RETURNS_SQL)?;
        let rows = stmt.query_map([n as i64], |row| {
            Ok(ReturnRow {
                symbol: row.get(0)?,
                first_price: row.get(1)?,
                last_price: row.get(2)?,
                pct_return: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn daily_first_last(&self) -> Result<Vec<DailyPriceRow>, StoreError> {
        if !self.tables_ready()? {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare_cached(DAILY_FIRST_LAST_SQL)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (symbol, date, first_price, last_price) = row?;
            out.push(DailyPriceRow {
                symbol,
                date: parse_date(&date)?,
                first_price,
                last_price,
            });
        }
        Ok(out)
    }
}

/// Per-connection settings; foreign keys are off by default in SQLite
pub fn configure_connection(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA journal_mode = DELETE;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(())
}

impl StorageLayout for RowStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    /// All-or-nothing: schema rebuild and every insert share one transaction
    fn load(&mut self, dataset: &Dataset) -> Result<LoadSummary, StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(SCHEMA_SQL)?;
        {
            let mut insert_ticker = tx.prepare(
                "INSERT INTO tickers (ticker_id, symbol, name, exchange) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for t in dataset.tickers() {
                insert_ticker.execute(params![t.ticker_id, t.symbol, t.name, t.exchange])?;
            }

            let mut insert_price = tx.prepare(
                "INSERT INTO prices (timestamp, ticker_id, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for bar in dataset.bars() {
                insert_price.execute(params![
                    bar.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    bar.ticker_id,
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume,
                ])?;
            }
        }
        tx.execute_batch(INDEX_SQL)?;
        tx.commit()?;

        // Reclaim pages freed by the dropped tables so size reflects only live data
        self.conn.execute_batch("VACUUM;")?;

        tracing::info!(
            tickers = dataset.tickers().len(),
            bars = dataset.bars().len(),
            "Populated SQLite store"
        );
        Ok(LoadSummary {
            tickers: dataset.tickers().len(),
            bars: dataset.bars().len(),
            objects: 2,
        })
    }

    fn supports(&self, kind: QueryKind) -> bool {
        matches!(
            kind,
            QueryKind::Range
                | QueryKind::AverageDailyVolume
                | QueryKind::TopReturns
                | QueryKind::DailyFirstLast
        )
    }

    fn query(&self, query: &Query) -> Result<QueryResult, StoreError> {
        match query {
            Query::Range { symbol, start, end } => {
                Ok(QueryResult::Bars(self.range(symbol, *start, *end)?))
            }
            Query::AverageDailyVolume => Ok(QueryResult::AverageVolume(self.average_daily_volume()?)),
            Query::TopReturns { n } => Ok(QueryResult::TopReturns(self.top_returns(*n)?)),
            Query::DailyFirstLast => Ok(QueryResult::DailyFirstLast(self.daily_first_last()?)),
            other => Err(StoreError::Unsupported {
                layout: self.name(),
                kind: other.kind(),
            }),
        }
    }

    fn disk_size(&self) -> Result<u64, StoreError> {
        match &self.path {
            Some(path) => disk_usage(path),
            None => Ok(0),
        }
    }
}

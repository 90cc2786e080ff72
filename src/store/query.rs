//! Named analytical queries and their typed results

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fmt::{self, Write as _};

/// Query identity, independent of parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Range,
    AverageDailyVolume,
    TopReturns,
    DailyFirstLast,
    RollingAverage,
    RollingVolatility,
}

impl QueryKind {
    pub const ALL: [QueryKind; 6] = [
        QueryKind::Range,
        QueryKind::AverageDailyVolume,
        QueryKind::TopReturns,
        QueryKind::DailyFirstLast,
        QueryKind::RollingAverage,
        QueryKind::RollingVolatility,
    ];

    /// Stable metric/label name
    pub fn name(&self) -> &'static str {
        match self {
            QueryKind::Range => "range",
            QueryKind::AverageDailyVolume => "average_daily_volume",
            QueryKind::TopReturns => "top_returns",
            QueryKind::DailyFirstLast => "daily_first_last",
            QueryKind::RollingAverage => "rolling_average",
            QueryKind::RollingVolatility => "rolling_volatility",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A parameterized analytical query
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Bars for one ticker with `start <= timestamp <= end`
    Range {
        symbol: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Mean over days of total daily volume, per ticker
    AverageDailyVolume,
    /// Best `n` tickers by full-period return
    TopReturns { n: usize },
    /// First open and last close per ticker per day
    DailyFirstLast,
    /// Trailing mean of close over `window` bars for one ticker
    RollingAverage { symbol: String, window: usize },
    /// Trailing std dev of daily returns over `window` days, per ticker
    RollingVolatility { window: usize },
}

impl Query {
    pub fn kind(&self) -> QueryKind {
        match self {
            Query::Range { .. } => QueryKind::Range,
            Query::AverageDailyVolume => QueryKind::AverageDailyVolume,
            Query::TopReturns { .. } => QueryKind::TopReturns,
            Query::DailyFirstLast => QueryKind::DailyFirstLast,
            Query::RollingAverage { .. } => QueryKind::RollingAverage,
            Query::RollingVolatility { .. } => QueryKind::RollingVolatility,
        }
    }

    /// Human-readable description for reports
    pub fn describe(&self) -> String {
        match self {
            Query::Range { symbol, start, end } => format!(
                "{symbol} bars {} to {}",
                start.format("%Y-%m-%d %H:%M"),
                end.format("%Y-%m-%d %H:%M")
            ),
            Query::AverageDailyVolume => "Average total daily volume per ticker".to_string(),
            Query::TopReturns { n } => format!("Top {n} tickers by full-period return"),
            Query::DailyFirstLast => "First and last trade price per ticker per day".to_string(),
            Query::RollingAverage { symbol, window } => {
                format!("{symbol} {window}-bar rolling average close")
            }
            Query::RollingVolatility { window } => {
                format!("{window}-day rolling volatility of daily returns")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarRow {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AverageVolumeRow {
    pub symbol: String,
    pub avg_daily_volume: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnRow {
    pub symbol: String,
    pub first_price: f64,
    pub last_price: f64,
    pub pct_return: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyPriceRow {
    pub symbol: String,
    pub date: NaiveDate,
    pub first_price: f64,
    pub last_price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RollingAverageRow {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub rolling_avg: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolatilityRow {
    pub symbol: String,
    pub date: NaiveDate,
    pub daily_close: f64,
    pub volatility: Option<f64>,
}

/// Result of one query, in the query's canonical order
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Bars(Vec<BarRow>),
    AverageVolume(Vec<AverageVolumeRow>),
    TopReturns(Vec<ReturnRow>),
    DailyFirstLast(Vec<DailyPriceRow>),
    RollingAverage(Vec<RollingAverageRow>),
    RollingVolatility(Vec<VolatilityRow>),
}

/// Relative-or-absolute float comparison: `|a - b| <= tol * max(1, |a|, |b|)`
pub fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
    if a == b {
        return true;
    }
    let scale = 1.0_f64.max(a.abs()).max(b.abs());
    (a - b).abs() <= tolerance * scale
}

fn approx_opt(a: Option<f64>, b: Option<f64>, tolerance: f64) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => approx_eq(a, b, tolerance),
        (None, None) => true,
        _ => false,
    }
}

fn zip_all<T>(a: &[T], b: &[T], eq: impl Fn(&T, &T) -> bool) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| eq(x, y))
}

impl QueryResult {
    /// An empty result of the shape `kind` produces
    pub fn empty(kind: QueryKind) -> Self {
        match kind {
            QueryKind::Range => QueryResult::Bars(Vec::new()),
            QueryKind::AverageDailyVolume => QueryResult::AverageVolume(Vec::new()),
            QueryKind::TopReturns => QueryResult::TopReturns(Vec::new()),
            QueryKind::DailyFirstLast => QueryResult::DailyFirstLast(Vec::new()),
            QueryKind::RollingAverage => QueryResult::RollingAverage(Vec::new()),
            QueryKind::RollingVolatility => QueryResult::RollingVolatility(Vec::new()),
        }
    }

    pub fn kind(&self) -> QueryKind {
        match self {
            QueryResult::Bars(_) => QueryKind::Range,
            QueryResult::AverageVolume(_) => QueryKind::AverageDailyVolume,
            QueryResult::TopReturns(_) => QueryKind::TopReturns,
            QueryResult::DailyFirstLast(_) => QueryKind::DailyFirstLast,
            QueryResult::RollingAverage(_) => QueryKind::RollingAverage,
            QueryResult::RollingVolatility(_) => QueryKind::RollingVolatility,
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            QueryResult::Bars(rows) => rows.len(),
            QueryResult::AverageVolume(rows) => rows.len(),
            QueryResult::TopReturns(rows) => rows.len(),
            QueryResult::DailyFirstLast(rows) => rows.len(),
            QueryResult::RollingAverage(rows) => rows.len(),
            QueryResult::RollingVolatility(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Row-by-row agreement: keys equal, floats within `tolerance`
    pub fn agrees_with(&self, other: &QueryResult, tolerance: f64) -> bool {
        let eq = |a: f64, b: f64| approx_eq(a, b, tolerance);
        match (self, other) {
            (QueryResult::Bars(a), QueryResult::Bars(b)) => zip_all(a, b, |x, y| {
                x.timestamp == y.timestamp
                    && x.symbol == y.symbol
                    && x.volume == y.volume
                    && eq(x.open, y.open)
                    && eq(x.high, y.high)
                    && eq(x.low, y.low)
                    && eq(x.close, y.close)
            }),
            (QueryResult::AverageVolume(a), QueryResult::AverageVolume(b)) => {
                zip_all(a, b, |x, y| {
                    x.symbol == y.symbol && eq(x.avg_daily_volume, y.avg_daily_volume)
                })
            }
            (QueryResult::TopReturns(a), QueryResult::TopReturns(b)) => zip_all(a, b, |x, y| {
                x.symbol == y.symbol
                    && eq(x.first_price, y.first_price)
                    && eq(x.last_price, y.last_price)
                    && eq(x.pct_return, y.pct_return)
            }),
            (QueryResult::DailyFirstLast(a), QueryResult::DailyFirstLast(b)) => {
                zip_all(a, b, |x, y| {
                    x.symbol == y.symbol
                        && x.date == y.date
                        && eq(x.first_price, y.first_price)
                        && eq(x.last_price, y.last_price)
                })
            }
            (QueryResult::RollingAverage(a), QueryResult::RollingAverage(b)) => {
                zip_all(a, b, |x, y| {
                    x.timestamp == y.timestamp
                        && eq(x.close, y.close)
                        && approx_opt(x.rolling_avg, y.rolling_avg, tolerance)
                })
            }
            (QueryResult::RollingVolatility(a), QueryResult::RollingVolatility(b)) => {
                zip_all(a, b, |x, y| {
                    x.symbol == y.symbol
                        && x.date == y.date
                        && eq(x.daily_close, y.daily_close)
                        && approx_opt(x.volatility, y.volatility, tolerance)
                })
            }
            _ => false,
        }
    }

    /// Render the first and last `edge` rows as a plain-text table
    pub fn render(&self, edge: usize) -> String {
        let lines: Vec<String> = match self {
            QueryResult::Bars(rows) => rows
                .iter()
                .map(|r| {
                    format!(
                        "{}  {:<6} o={:.2} h={:.2} l={:.2} c={:.2} v={}",
                        r.timestamp.format("%Y-%m-%d %H:%M"),
                        r.symbol,
                        r.open,
                        r.high,
                        r.low,
                        r.close,
                        r.volume
                    )
                })
                .collect(),
            QueryResult::AverageVolume(rows) => rows
                .iter()
                .map(|r| format!("{:<6} {:.2}", r.symbol, r.avg_daily_volume))
                .collect(),
            QueryResult::TopReturns(rows) => rows
                .iter()
                .map(|r| {
                    format!(
                        "{:<6} first={:.2} last={:.2} return={:+.4}%",
                        r.symbol, r.first_price, r.last_price, r.pct_return
                    )
                })
                .collect(),
            QueryResult::DailyFirstLast(rows) => rows
                .iter()
                .map(|r| {
                    format!(
                        "{:<6} {} first={:.2} last={:.2}",
                        r.symbol, r.date, r.first_price, r.last_price
                    )
                })
                .collect(),
            QueryResult::RollingAverage(rows) => rows
                .iter()
                .map(|r| {
                    let avg = r
                        .rolling_avg
                        .map(|v| format!("{v:.4}"))
                        .unwrap_or_else(|| "-".to_string());
                    format!("{}  close={:.2} avg={avg}", r.timestamp.format("%Y-%m-%d %H:%M"), r.close)
                })
                .collect(),
            QueryResult::RollingVolatility(rows) => rows
                .iter()
                .map(|r| {
                    let vol = r
                        .volatility
                        .map(|v| format!("{v:.6}"))
                        .unwrap_or_else(|| "-".to_string());
                    format!("{:<6} {} close={:.2} vol={vol}", r.symbol, r.date, r.daily_close)
                })
                .collect(),
        };

        let mut out = String::new();
        if lines.len() <= edge * 2 {
            for line in &lines {
                let _ = writeln!(out, "  {line}");
            }
        } else {
            for line in &lines[..edge] {
                let _ = writeln!(out, "  {line}");
            }
            let _ = writeln!(out, "  ... ({} rows omitted)", lines.len() - edge * 2);
            for line in &lines[lines.len() - edge..] {
                let _ = writeln!(out, "  {line}");
            }
        }
        let _ = write!(out, "  [{} rows]", lines.len());
        out
    }
}

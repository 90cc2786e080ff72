//! Configuration types for ohlcv-bench

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub loader: LoaderConfig,
    pub row_store: RowStoreConfig,
    pub column_store: ColumnStoreConfig,
    pub queries: QueriesConfig,
    pub benchmark: BenchmarkConfig,
    pub report: ReportConfig,
    pub telemetry: TelemetryConfig,
}

/// Input files
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataConfig {
    /// Minute bars: timestamp, symbol (or ticker), open, high, low, close, volume
    #[serde(default = "default_market_data")]
    pub market_data: PathBuf,

    /// Ticker master list: [ticker_id,] symbol, name, exchange
    #[serde(default = "default_tickers")]
    pub tickers: PathBuf,
}

fn default_market_data() -> PathBuf {
    PathBuf::from("data/market_data.csv")
}
fn default_tickers() -> PathBuf {
    PathBuf::from("data/tickers.csv")
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            market_data: default_market_data(),
            tickers: default_tickers(),
        }
    }
}

/// Loader behaviour
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoaderConfig {
    /// Fail the load when a listed ticker has no bars
    #[serde(default)]
    pub require_all_tickers: bool,
}

/// SQLite row store
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RowStoreConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("output/market_data.db")
}

impl Default for RowStoreConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Parquet column store
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ColumnStoreConfig {
    /// Root directory of the `symbol=` partitions
    #[serde(default = "default_column_root")]
    pub root: PathBuf,

    /// Maximum rows per row group
    #[serde(default = "default_row_group_size")]
    pub row_group_size: usize,
}

fn default_column_root() -> PathBuf {
    PathBuf::from("output/market_data_parquet")
}
fn default_row_group_size() -> usize {
    crate::store::column::DEFAULT_ROW_GROUP_SIZE
}

impl Default for ColumnStoreConfig {
    fn default() -> Self {
        Self {
            root: default_column_root(),
            row_group_size: default_row_group_size(),
        }
    }
}

/// Parameters of the analytical query battery
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueriesConfig {
    #[serde(default = "default_range_symbol")]
    pub range_symbol: String,

    /// Inclusive lower bound of the range query
    #[serde(default = "default_range_start")]
    pub range_start: DateTime<Utc>,

    /// Inclusive upper bound of the range query
    #[serde(default = "default_range_end")]
    pub range_end: DateTime<Utc>,

    #[serde(default = "default_top_n")]
    pub top_n: usize,

    #[serde(default = "default_rolling_symbol")]
    pub rolling_symbol: String,

    /// Bars in the rolling-average window
    #[serde(default = "default_window")]
    pub rolling_window: usize,

    /// Daily returns in the volatility window
    #[serde(default = "default_window")]
    pub volatility_window: usize,
}

fn default_range_symbol() -> String {
    "TSLA".to_string()
}
fn default_range_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 17, 0, 0, 0)
        .single()
        .unwrap_or_default()
}
fn default_range_end() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 18, 23, 59, 59)
        .single()
        .unwrap_or_default()
}
fn default_top_n() -> usize {
    3
}
fn default_rolling_symbol() -> String {
    "AAPL".to_string()
}
fn default_window() -> usize {
    5
}

impl Default for QueriesConfig {
    fn default() -> Self {
        Self {
            range_symbol: default_range_symbol(),
            range_start: default_range_start(),
            range_end: default_range_end(),
            top_n: default_top_n(),
            rolling_symbol: default_rolling_symbol(),
            rolling_window: default_window(),
            volatility_window: default_window(),
        }
    }
}

/// Timing and reconciliation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BenchmarkConfig {
    /// Timed runs per query per layout
    #[serde(default = "default_iterations")]
    pub iterations: usize,

    /// Relative float tolerance for result agreement
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_iterations() -> usize {
    10
}
fn default_tolerance() -> f64 {
    1e-9
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            tolerance: default_tolerance(),
        }
    }
}

/// Report output
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportConfig {
    /// Markdown report; the JSON report is written next to it
    #[serde(default = "default_report_path")]
    pub output_path: PathBuf,

    /// Rows shown from each end of a printed query result
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
}

fn default_report_path() -> PathBuf {
    PathBuf::from("output/comparison.md")
}
fn default_preview_rows() -> usize {
    5
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_path: default_report_path(),
            preview_rows: default_preview_rows(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormatConfig,

    /// Write a Prometheus text snapshot of run metrics here on exit
    #[serde(default)]
    pub metrics_snapshot: Option<PathBuf>,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatConfig {
    #[default]
    Pretty,
    Json,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormatConfig::Pretty,
            metrics_snapshot: None,
        }
    }
}

/// Bundled example configuration
pub const EXAMPLE_CONFIG: &str = include_str!("../config.toml.example");

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// The bundled `config.toml.example`
    pub fn example() -> anyhow::Result<Self> {
        Ok(toml::from_str(EXAMPLE_CONFIG)?)
    }

    /// JSON report path: the Markdown path with a `.json` extension
    pub fn json_report_path(&self) -> PathBuf {
        self.report.output_path.with_extension("json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialize() {
        let toml = r#"
            [data]
            market_data = "in/bars.csv"
            tickers = "in/tickers.csv"

            [loader]
            require_all_tickers = true

            [row_store]
            path = "out/bars.db"

            [column_store]
            root = "out/bars_parquet"
            row_group_size = 256

            [queries]
            range_symbol = "MSFT"
            range_start = "2025-11-18T09:30:00Z"
            range_end = "2025-11-18T16:00:00Z"
            top_n = 2
            rolling_symbol = "NVDA"
            rolling_window = 10
            volatility_window = 3

            [benchmark]
            iterations = 3
            tolerance = 1e-6

            [report]
            output_path = "out/report.md"
            preview_rows = 2

            [telemetry]
            log_level = "debug"
            log_format = "json"
            metrics_snapshot = "out/metrics.prom"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.loader.require_all_tickers);
        assert_eq!(config.column_store.row_group_size, 256);
        assert_eq!(config.queries.range_symbol, "MSFT");
        assert_eq!(
            config.queries.range_start,
            Utc.with_ymd_and_hms(2025, 11, 18, 9, 30, 0).unwrap()
        );
        assert_eq!(config.benchmark.tolerance, 1e-6);
        assert_eq!(config.telemetry.log_format, LogFormatConfig::Json);
        assert_eq!(config.json_report_path(), PathBuf::from("out/report.json"));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.data.market_data, PathBuf::from("data/market_data.csv"));
        assert_eq!(config.queries.range_symbol, "TSLA");
        assert_eq!(config.queries.top_n, 3);
        assert_eq!(config.benchmark.iterations, 10);
        assert_eq!(config.benchmark.tolerance, 1e-9);
        assert!(!config.loader.require_all_tickers);
        assert!(config.telemetry.metrics_snapshot.is_none());
    }

    #[test]
    fn test_partial_section_fills_defaults() {
        let toml = r#"
            [queries]
            top_n = 5
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.queries.top_n, 5);
        assert_eq!(config.queries.rolling_window, 5);
        assert_eq!(config.queries.rolling_symbol, "AAPL");
    }

    #[test]
    fn test_example_config_parses() {
        let config = Config::example().unwrap();
        assert_eq!(config.row_store.path, PathBuf::from("output/market_data.db"));
        assert_eq!(config.report.output_path, PathBuf::from("output/comparison.md"));
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_log_format_rejected() {
        let toml = r#"
            [telemetry]
            log_format = "xml"
        "#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }
}

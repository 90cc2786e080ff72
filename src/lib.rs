//! ohlcv-bench: row vs column storage benchmark for minute OHLCV data
//!
//! This library provides the core components for:
//! - CSV ingestion with per-row validation and rejection accounting
//! - A SQLite row store with referential integrity
//! - A symbol-partitioned Parquet column store with pruning and pushdown
//! - Matched analytical queries against both layouts
//! - Latency, footprint and consistency comparison reports
//! - Structured logging and run metrics

pub mod cli;
pub mod compare;
pub mod config;
pub mod loader;
pub mod store;
pub mod telemetry;

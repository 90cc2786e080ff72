//! CLI interface for ohlcv-bench
//!
//! Provides subcommands for:
//! - `row-store`: Build the SQLite store and run the SQL queries
//! - `column-store`: Build the Parquet store, run its queries and compare
//! - `validate`: Load and validate input only
//! - `generate`: Write synthetic input CSVs
//! - `config`: Show the effective configuration

mod column_store;
mod generate;
mod row_store;
mod validate;

pub use column_store::ColumnStoreArgs;
pub use generate::GenerateArgs;
pub use row_store::RowStoreArgs;
pub use validate::ValidateArgs;

use crate::config::Config;
use crate::loader::{self, Dataset, LoadReport, LoaderOptions};
use anyhow::Context;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "ohlcv-bench")]
#[command(about = "Row (SQLite) vs column (Parquet) storage benchmark for OHLCV data")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load input into SQLite and run the SQL queries
    RowStore(RowStoreArgs),
    /// Load input into Parquet, run the column queries and compare with SQLite
    ColumnStore(ColumnStoreArgs),
    /// Validate input files without writing any store
    Validate(ValidateArgs),
    /// Write synthetic market data and ticker CSVs
    Generate(GenerateArgs),
    /// Show configuration
    Config,
}

/// Load and validate the configured input files
pub fn load_dataset(config: &Config) -> anyhow::Result<(Dataset, LoadReport)> {
    let options = LoaderOptions {
        require_all_tickers: config.loader.require_all_tickers,
    };
    let (dataset, report) =
        loader::load_validate_data(&config.data.market_data, &config.data.tickers, options)
            .with_context(|| {
                format!(
                    "Failed to load {} with tickers {}",
                    config.data.market_data.display(),
                    config.data.tickers.display()
                )
            })?;
    if dataset.is_empty() {
        anyhow::bail!("No valid rows in {}", config.data.market_data.display());
    }
    Ok((dataset, report))
}

/// Print one labelled query result
pub(crate) fn print_result(title: &str, result: &crate::store::QueryResult, edge: usize) {
    println!("\n[{title}]");
    println!("{}", result.render(edge));
}

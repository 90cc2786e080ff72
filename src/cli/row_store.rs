//! Row store command implementation

use super::{load_dataset, print_result};
use crate::compare::query_battery;
use crate::config::Config;
use crate::store::{to_mb, RowStore, StorageLayout};
use anyhow::Context;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct RowStoreArgs {
    /// SQLite database path (overrides config)
    #[arg(long)]
    pub db: Option<PathBuf>,
}

impl RowStoreArgs {
    pub fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let (dataset, _) = load_dataset(config)?;
        let path = self.db.as_ref().unwrap_or(&config.row_store.path);

        let mut store = RowStore::open(path)
            .with_context(|| format!("Failed to open SQLite store at {}", path.display()))?;
        let summary = store.load(&dataset).context("SQLite load failed; nothing committed")?;
        println!(
            "Database {} populated: {} tickers, {} prices ({:.4} MB)",
            path.display(),
            summary.tickers,
            summary.bars,
            to_mb(store.disk_size()?)
        );

        let edge = config.report.preview_rows;
        for query in query_battery(&config.queries) {
            if !store.supports(query.kind()) {
                continue;
            }
            let result = store.query(&query)?;
            print_result(&query.describe(), &result, edge);
        }
        Ok(())
    }
}

//! Column store command implementation

use super::{load_dataset, print_result};
use crate::compare::{query_battery, Comparator};
use crate::config::Config;
use crate::store::{to_mb, ColumnStore, RowStore, StorageLayout};
use anyhow::Context;
use clap::Args;

#[derive(Args, Debug)]
pub struct ColumnStoreArgs {
    /// Only build and query the Parquet store
    #[arg(long)]
    pub skip_compare: bool,

    /// Timed runs per query (overrides config)
    #[arg(long)]
    pub iterations: Option<usize>,
}

impl ColumnStoreArgs {
    pub fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let (dataset, _) = load_dataset(config)?;
        let root = &config.column_store.root;

        let mut store =
            ColumnStore::new(root.clone()).with_row_group_size(config.column_store.row_group_size);
        let summary = store
            .load(&dataset)
            .with_context(|| format!("Failed to write Parquet store at {}", root.display()))?;
        println!(
            "Saved {} bars to {} partitions under {} ({:.4} MB)",
            summary.bars,
            summary.objects,
            root.display(),
            to_mb(store.disk_size()?)
        );

        let queries = query_battery(&config.queries);
        let edge = config.report.preview_rows;
        for query in &queries {
            let result = store.query(query)?;
            print_result(&query.describe(), &result, edge);
        }

        if self.skip_compare {
            return Ok(());
        }

        let db_path = &config.row_store.path;
        if !db_path.exists() {
            anyhow::bail!(
                "SQLite store not found at {}; run `row-store` first or pass --skip-compare",
                db_path.display()
            );
        }
        let row = RowStore::open(db_path)
            .with_context(|| format!("Failed to open SQLite store at {}", db_path.display()))?;

        let report = Comparator::new(&row, &store)
            .with_iterations(self.iterations.unwrap_or(config.benchmark.iterations))
            .with_tolerance(config.benchmark.tolerance)
            .run(&queries)
            .context("Comparison failed")?;

        println!("{}", report.format_table());
        report.write(&config.report.output_path, &config.json_report_path())?;
        if !report.consistent {
            tracing::warn!("Row and column stores returned different results");
        }
        Ok(())
    }
}

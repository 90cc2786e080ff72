//! Validate command implementation

use super::load_dataset;
use crate::config::Config;
use clap::Args;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Print the load report as JSON
    #[arg(long)]
    pub json: bool,
}

impl ValidateArgs {
    pub fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let (dataset, report) = load_dataset(config)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        println!("Rows read:      {}", report.rows_read);
        println!("Rows accepted:  {}", report.rows_accepted);
        println!("Rows rejected:  {}", report.rejected_total());
        for (reason, count) in &report.rejected {
            println!("  {reason:<24} {count}");
        }
        if report.renamed_ticker_column {
            println!("Normalized 'ticker' column to 'symbol'");
        }
        if !report.missing_tickers.is_empty() {
            println!("Missing tickers: {}", report.missing_tickers.join(", "));
        }

        println!("\nTickers: {}", dataset.symbols().join(", "));
        println!("Sample:");
        for bar in dataset.bars().iter().take(config.report.preview_rows) {
            println!(
                "  {}  {:<6} o={:.2} h={:.2} l={:.2} c={:.2} v={}",
                bar.timestamp.format("%Y-%m-%d %H:%M"),
                bar.symbol,
                bar.open,
                bar.high,
                bar.low,
                bar.close,
                bar.volume
            );
        }
        Ok(())
    }
}

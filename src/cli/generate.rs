//! Generate command implementation

use crate::config::Config;
use crate::loader::synthetic;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Number of tickers (at most 8)
    #[arg(long, default_value = "5")]
    pub tickers: usize,

    /// One-minute bars per ticker
    #[arg(long, default_value = "1955")]
    pub bars: usize,

    /// Market data CSV (defaults to data.market_data)
    #[arg(long)]
    pub market_data: Option<PathBuf>,

    /// Ticker CSV (defaults to data.tickers)
    #[arg(long)]
    pub tickers_file: Option<PathBuf>,
}

impl GenerateArgs {
    pub fn execute(&self, config: &Config) -> anyhow::Result<()> {
        if self.tickers == 0 || self.tickers > synthetic::MAX_TICKERS {
            anyhow::bail!("--tickers must be between 1 and {}", synthetic::MAX_TICKERS);
        }
        let market = self.market_data.as_ref().unwrap_or(&config.data.market_data);
        let tickers = self.tickers_file.as_ref().unwrap_or(&config.data.tickers);

        let dataset = synthetic::generate(self.tickers, self.bars);
        synthetic::write_csv(&dataset, market, tickers)?;
        println!(
            "Wrote {} bars for {} tickers to {} and {}",
            dataset.bars().len(),
            dataset.tickers().len(),
            market.display(),
            tickers.display()
        );
        Ok(())
    }
}

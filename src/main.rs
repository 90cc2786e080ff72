use clap::Parser;
use ohlcv_bench::cli::{Cli, Commands};
use ohlcv_bench::config::Config;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using bundled config.toml.example");
            Config::example()?
        }
    };

    // Initialize telemetry; the guard writes the metrics snapshot on exit
    let mut telemetry = ohlcv_bench::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::RowStore(args) => {
            tracing::info!("Building SQLite row store");
            args.execute(&config)?;
        }
        Commands::ColumnStore(args) => {
            tracing::info!("Building Parquet column store");
            args.execute(&config)?;
        }
        Commands::Validate(args) => {
            tracing::info!("Validating input");
            args.execute(&config)?;
        }
        Commands::Generate(args) => {
            tracing::info!("Generating synthetic input");
            args.execute(&config)?;
        }
        Commands::Config => {
            println!("Current configuration:");
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    telemetry.flush()?;
    Ok(())
}

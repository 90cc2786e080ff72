//! End-to-end integration tests

use ohlcv_bench::cli::{ColumnStoreArgs, GenerateArgs, RowStoreArgs, ValidateArgs};
use ohlcv_bench::config::Config;
use tempfile::TempDir;

fn config_in(dir: &TempDir) -> Config {
    let root = dir.path();
    let mut config = Config::example().unwrap();
    config.data.market_data = root.join("data/market_data.csv");
    config.data.tickers = root.join("data/tickers.csv");
    config.row_store.path = root.join("output/market_data.db");
    config.column_store.root = root.join("output/market_data_parquet");
    config.column_store.row_group_size = 512;
    config.report.output_path = root.join("output/comparison.md");
    config.benchmark.iterations = 2;
    config
}

fn generate(config: &Config, tickers: usize, bars: usize) {
    GenerateArgs {
        tickers,
        bars,
        market_data: None,
        tickers_file: None,
    }
    .execute(config)
    .unwrap();
}

#[test]
fn test_config_example_exists() {
    let config = Config::example().unwrap();
    assert_eq!(config.queries.range_symbol, "TSLA");
    assert_eq!(config.benchmark.iterations, 10);
}

#[test]
fn test_full_pipeline_writes_consistent_report() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    generate(&config, 5, 1955);

    ValidateArgs { json: false }.execute(&config).unwrap();
    RowStoreArgs { db: None }.execute(&config).unwrap();
    ColumnStoreArgs {
        skip_compare: false,
        iterations: None,
    }
    .execute(&config)
    .unwrap();

    assert!(config.row_store.path.exists());
    assert!(config
        .column_store
        .root
        .join("symbol=TSLA/part-0.parquet")
        .exists());

    let markdown = std::fs::read_to_string(&config.report.output_path).unwrap();
    assert!(markdown.contains("## Query latency"));
    assert!(markdown.contains("## Single-layout queries"));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(config.json_report_path()).unwrap())
            .unwrap();
    assert_eq!(json["consistent"], true);
    assert_eq!(json["iterations"], 2);
    assert_eq!(json["queries"].as_array().unwrap().len(), 4);
    assert_eq!(json["single_layout"].as_array().unwrap().len(), 2);
    assert!(json["row_size"]["bytes"].as_u64().unwrap() > 0);
}

#[test]
fn test_column_store_requires_existing_sqlite() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    generate(&config, 2, 100);

    let err = ColumnStoreArgs {
        skip_compare: false,
        iterations: Some(1),
    }
    .execute(&config)
    .unwrap_err();
    assert!(err.to_string().contains("row-store"));

    ColumnStoreArgs {
        skip_compare: true,
        iterations: None,
    }
    .execute(&config)
    .unwrap();
    assert!(!config.report.output_path.exists());
}

#[test]
fn test_strict_loader_fails_pipeline_on_missing_ticker() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    generate(&config, 3, 50);

    // Add a listed ticker with no market data
    let mut tickers = std::fs::read_to_string(&config.data.tickers).unwrap();
    tickers.push_str("99,ZZZZ,Nothing Corp.,NYSE\n");
    std::fs::write(&config.data.tickers, tickers).unwrap();

    RowStoreArgs { db: None }.execute(&config).unwrap();

    config.loader.require_all_tickers = true;
    let err = RowStoreArgs { db: None }.execute(&config).unwrap_err();
    assert!(format!("{err:#}").contains("ZZZZ"));
}

#[test]
fn test_generate_rejects_too_many_tickers() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let result = GenerateArgs {
        tickers: 9,
        bars: 10,
        market_data: None,
        tickers_file: None,
    }
    .execute(&config);
    assert!(result.is_err());
}

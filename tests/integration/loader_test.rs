//! Integration tests for CSV loading and validation

use ohlcv_bench::loader::{
    load_validate_data, synthetic, LoaderError, LoaderOptions, RejectReason,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const TICKERS: &str = "ticker_id,symbol,name,exchange
1,AAPL,Apple Inc.,NASDAQ
2,MSFT,Microsoft Corp.,NASDAQ
";

fn write_inputs(dir: &TempDir, market: &str, tickers: &str) -> (PathBuf, PathBuf) {
    let market_path = dir.path().join("market_data.csv");
    let tickers_path = dir.path().join("tickers.csv");
    fs::write(&market_path, market).unwrap();
    fs::write(&tickers_path, tickers).unwrap();
    (market_path, tickers_path)
}

#[test]
fn test_clean_input_loads_every_row() {
    let dir = TempDir::new().unwrap();
    let (market, tickers) = write_inputs(
        &dir,
        "timestamp,symbol,open,high,low,close,volume
2025-11-17T09:30:00Z,AAPL,100.0,101.0,99.5,100.5,1200
2025-11-17T09:30:00Z,MSFT,300.0,301.0,299.0,300.5,900
2025-11-17T09:31:00Z,AAPL,100.5,101.5,100.0,101.0,1100
2025-11-17T09:31:00Z,MSFT,300.5,302.0,300.0,301.5,950
",
        TICKERS,
    );

    let (dataset, report) = load_validate_data(&market, &tickers, LoaderOptions::default()).unwrap();
    assert_eq!(report.rows_read, 4);
    assert_eq!(report.rows_accepted, 4);
    assert_eq!(report.rejected_total(), 0);
    assert!(report.missing_tickers.is_empty());
    assert_eq!(dataset.symbols(), vec!["AAPL", "MSFT"]);
    assert_eq!(dataset.bars_for("MSFT").len(), 2);
    assert_eq!(dataset.bars_for("MSFT")[0].ticker_id, 2);
}

#[test]
fn test_ticker_header_is_normalized() {
    let dir = TempDir::new().unwrap();
    let (market, tickers) = write_inputs(
        &dir,
        " Timestamp , Ticker ,Open,HIGH,low,Close,Volume
2025-11-17 09:30:00,AAPL,100.0,101.0,99.5,100.5,1200
2025-11-17 09:30:00,MSFT,300.0,301.0,299.0,300.5,900
",
        TICKERS,
    );

    let (dataset, report) = load_validate_data(&market, &tickers, LoaderOptions::default()).unwrap();
    assert!(report.renamed_ticker_column);
    assert_eq!(dataset.bars().len(), 2);
    assert_eq!(dataset.bars()[0].symbol, "AAPL");
}

#[test]
fn test_missing_close_is_counted_and_dropped() {
    let dir = TempDir::new().unwrap();
    let (market, tickers) = write_inputs(
        &dir,
        "timestamp,symbol,open,high,low,close,volume
2025-11-17T09:30:00Z,AAPL,100.0,101.0,99.5,,1200
2025-11-17T09:31:00Z,AAPL,100.5,101.5,100.0,101.0,1100
2025-11-17T09:30:00Z,MSFT,300.0,301.0,299.0,300.5,900
",
        TICKERS,
    );

    let (dataset, report) = load_validate_data(&market, &tickers, LoaderOptions::default()).unwrap();
    assert_eq!(report.rejected_for(RejectReason::MissingField), 1);
    assert_eq!(report.rows_accepted, 2);
    assert_eq!(dataset.bars_for("AAPL").len(), 1);
}

#[test]
fn test_each_rejection_reason_is_counted() {
    let dir = TempDir::new().unwrap();
    let (market, tickers) = write_inputs(
        &dir,
        "timestamp,symbol,open,high,low,close,volume
2025-11-17T09:30:00Z,AAPL,100.0,101.0,99.5,100.5,1200
2025-11-17T09:30:00Z,AAPL,100.0,101.0,99.5,100.5,1200
2025-11-17T09:29:00Z,AAPL,100.0,101.0,99.5,100.5,1200
2025-11-17T09:31:00Z,TSLA,200.0,201.0,199.0,200.5,500
not-a-time,MSFT,300.0,301.0,299.0,300.5,900
2025-11-17T09:30:00Z,MSFT,300.0,301.0,299.0,300.5,-5
2025-11-17T09:31:00Z,MSFT,300.0,301.0,299.0,abc,900
2025-11-17T09:31:30Z,MSFT,0,301.0,299.0,300.5,900
2025-11-17T09:32:00Z,MSFT,300.0,301.0,299.0,300.5,900
",
        TICKERS,
    );

    let (dataset, report) = load_validate_data(&market, &tickers, LoaderOptions::default()).unwrap();
    assert_eq!(report.rows_read, 9);
    assert_eq!(report.rejected_for(RejectReason::DuplicateKey), 1);
    assert_eq!(report.rejected_for(RejectReason::NonMonotonicTimestamp), 1);
    assert_eq!(report.rejected_for(RejectReason::UnknownSymbol), 1);
    assert_eq!(report.rejected_for(RejectReason::MalformedTimestamp), 1);
    assert_eq!(report.rejected_for(RejectReason::NegativeVolume), 1);
    assert_eq!(report.rejected_for(RejectReason::NonPositivePrice), 1);
    assert_eq!(report.rejected_for(RejectReason::MissingField), 1);
    assert_eq!(report.rows_accepted, 2);
    assert_eq!(dataset.bars().len(), 2);
}

#[test]
fn test_missing_ticker_warns_by_default() {
    let dir = TempDir::new().unwrap();
    let (market, tickers) = write_inputs(
        &dir,
        "timestamp,symbol,open,high,low,close,volume
2025-11-17T09:30:00Z,AAPL,100.0,101.0,99.5,100.5,1200
",
        TICKERS,
    );

    let (_, report) = load_validate_data(&market, &tickers, LoaderOptions::default()).unwrap();
    assert_eq!(report.missing_tickers, vec!["MSFT".to_string()]);
}

#[test]
fn test_missing_ticker_fails_in_strict_mode() {
    let dir = TempDir::new().unwrap();
    let (market, tickers) = write_inputs(
        &dir,
        "timestamp,symbol,open,high,low,close,volume
2025-11-17T09:30:00Z,AAPL,100.0,101.0,99.5,100.5,1200
",
        TICKERS,
    );

    let options = LoaderOptions {
        require_all_tickers: true,
    };
    let err = load_validate_data(&market, &tickers, options).unwrap_err();
    assert!(matches!(err, LoaderError::MissingTickers(ref m) if m == &["MSFT".to_string()]));
}

#[test]
fn test_missing_required_column_is_fatal() {
    let dir = TempDir::new().unwrap();
    let (market, tickers) = write_inputs(
        &dir,
        "timestamp,symbol,open,high,low,volume
2025-11-17T09:30:00Z,AAPL,100.0,101.0,99.5,1200
",
        TICKERS,
    );

    let err = load_validate_data(&market, &tickers, LoaderOptions::default()).unwrap_err();
    match err {
        LoaderError::MissingColumns { columns, .. } => assert_eq!(columns, vec!["close"]),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = load_validate_data(
        &dir.path().join("absent.csv"),
        &dir.path().join("absent_tickers.csv"),
        LoaderOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, LoaderError::Io { .. }));
}

#[test]
fn test_synthetic_files_round_trip_through_loader() {
    let dir = TempDir::new().unwrap();
    let market = dir.path().join("data/market_data.csv");
    let tickers = dir.path().join("data/tickers.csv");
    let generated = synthetic::generate(3, 100);
    synthetic::write_csv(&generated, &market, &tickers).unwrap();

    let (dataset, report) = load_validate_data(&market, &tickers, LoaderOptions::default()).unwrap();
    assert_eq!(report.rejected_total(), 0);
    assert_eq!(dataset.bars(), generated.bars());
    assert_eq!(dataset.tickers(), generated.tickers());
}

//! Integration tests for the row and column stores

use chrono::{DateTime, Duration, TimeZone, Utc};
use ohlcv_bench::loader::{synthetic, Dataset, PriceBar, Ticker};
use ohlcv_bench::store::column::{Column, PartitionReader};
use ohlcv_bench::store::{
    BarRow, ColumnStore, Query, QueryResult, RowStore, StorageLayout, StoreError,
};
use std::fs;
use tempfile::TempDir;

const TOLERANCE: f64 = 1e-9;

fn build(dir: &TempDir, dataset: &Dataset) -> (RowStore, ColumnStore) {
    let mut row = RowStore::open(dir.path().join("market_data.db")).unwrap();
    row.load(dataset).unwrap();
    let mut column =
        ColumnStore::new(dir.path().join("market_data_parquet")).with_row_group_size(256);
    column.load(dataset).unwrap();
    (row, column)
}

fn full_range(symbol: &str) -> Query {
    Query::Range {
        symbol: symbol.to_string(),
        start: Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).unwrap(),
    }
}

fn ticker(ticker_id: i64, symbol: &str) -> Ticker {
    Ticker {
        ticker_id,
        symbol: symbol.to_string(),
        name: format!("{symbol} Inc."),
        exchange: "NASDAQ".to_string(),
    }
}

fn bar(ticker: &Ticker, timestamp: DateTime<Utc>, open: f64, close: f64) -> PriceBar {
    PriceBar {
        timestamp,
        ticker_id: ticker.ticker_id,
        symbol: ticker.symbol.clone(),
        open,
        high: open.max(close),
        low: open.min(close),
        close,
        volume: 100,
    }
}

fn bars(result: QueryResult) -> Vec<BarRow> {
    match result {
        QueryResult::Bars(rows) => rows,
        other => panic!("expected bars, got {:?}", other.kind()),
    }
}

#[test]
fn test_full_range_returns_only_that_ticker_in_order() {
    let dir = TempDir::new().unwrap();
    let dataset = synthetic::generate(3, 500);
    let (row, column) = build(&dir, &dataset);

    for layout in [&row as &dyn StorageLayout, &column] {
        let rows = bars(layout.query(&full_range("MSFT")).unwrap());
        assert_eq!(rows.len(), 500, "{}", layout.name());
        assert!(rows.iter().all(|r| r.symbol == "MSFT"));
        assert!(rows.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }
}

#[test]
fn test_partition_holds_only_its_symbol() {
    let dir = TempDir::new().unwrap();
    let dataset = synthetic::generate(4, 120);
    let (_, column) = build(&dir, &dataset);

    for symbol in column.symbols() {
        let path = column.partition_path(symbol).unwrap();
        assert!(path.starts_with(column.root().join(format!("symbol={symbol}"))));

        let frame = PartitionReader::new(path.to_path_buf())
            .read(&[Column::TickerId], None)
            .unwrap();
        let ticker_id = dataset.ticker(symbol).unwrap().ticker_id;
        assert_eq!(frame.len(), dataset.bars_for(symbol).len());
        assert!(frame.ticker_id.iter().all(|id| *id == ticker_id));
    }
}

#[test]
fn test_interleaved_input_still_partitions_by_symbol() {
    let dir = TempDir::new().unwrap();
    let (aapl, msft) = (ticker(1, "AAPL"), ticker(2, "MSFT"));
    let t0 = Utc.with_ymd_and_hms(2025, 11, 17, 14, 30, 0).unwrap();
    let t1 = t0 + Duration::minutes(1);
    let dataset = Dataset::new(
        vec![aapl.clone(), msft.clone()],
        vec![
            bar(&msft, t1, 300.0, 301.0),
            bar(&aapl, t1, 100.0, 101.0),
            bar(&msft, t0, 299.0, 300.0),
            bar(&aapl, t0, 99.0, 100.0),
        ],
    );

    let mut column = ColumnStore::new(dir.path().join("parquet"));
    let summary = column.load(&dataset).unwrap();
    assert_eq!(summary.objects, 2);
    for (symbol, id) in [("AAPL", 1), ("MSFT", 2)] {
        let path = column.partition_path(symbol).unwrap().to_path_buf();
        let frame = PartitionReader::new(path)
            .read(&[Column::TickerId], None)
            .unwrap();
        assert_eq!(frame.ticker_id, vec![id, id]);
        assert_eq!(frame.timestamp, vec![t0, t1]);
    }
}

#[test]
fn test_layouts_agree_on_subsecond_bars() {
    let dir = TempDir::new().unwrap();
    let aapl = ticker(1, "AAPL");
    let open = Utc.with_ymd_and_hms(2025, 11, 17, 14, 30, 0).unwrap();
    let dataset = Dataset::new(
        vec![aapl.clone()],
        vec![
            bar(&aapl, open + Duration::milliseconds(250), 100.0, 100.5),
            bar(&aapl, open + Duration::milliseconds(750), 100.5, 100.25),
            bar(&aapl, open + Duration::minutes(1), 100.25, 101.0),
        ],
    );
    let (row, column) = build(&dir, &dataset);
    assert_eq!(row.count_rows("prices").unwrap(), 3);

    let first_half = Query::Range {
        symbol: "AAPL".to_string(),
        start: open,
        end: open + Duration::milliseconds(500),
    };
    for query in [full_range("AAPL"), first_half] {
        let a = row.query(&query).unwrap();
        let b = column.query(&query).unwrap();
        assert!(a.agrees_with(&b, TOLERANCE), "{}", query.describe());
    }

    let rows = bars(row.query(&full_range("AAPL")).unwrap());
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].timestamp, open + Duration::milliseconds(250));
}

#[test]
fn test_zero_base_price_is_ranked_the_same_by_both_layouts() {
    let dir = TempDir::new().unwrap();
    let good = synthetic::generate(3, 50);
    let mut bars = good.bars().to_vec();
    assert_eq!(bars[0].symbol, "AAPL");
    bars[0].open = 0.0;
    let dataset = Dataset::new(good.tickers().to_vec(), bars);
    let (row, column) = build(&dir, &dataset);

    let query = Query::TopReturns { n: 5 };
    let a = row.query(&query).unwrap();
    let b = column.query(&query).unwrap();
    assert!(a.agrees_with(&b, TOLERANCE));
    match a {
        QueryResult::TopReturns(rows) => {
            assert_eq!(rows.len(), 2);
            assert!(rows.iter().all(|r| r.symbol != "AAPL" && r.pct_return.is_finite()));
        }
        other => panic!("expected returns, got {:?}", other.kind()),
    }
}

#[test]
fn test_layouts_agree_on_common_queries() {
    let dir = TempDir::new().unwrap();
    let dataset = synthetic::generate(5, synthetic::BARS_PER_SESSION * 3);
    let (row, column) = build(&dir, &dataset);

    let queries = [
        full_range("AAPL"),
        Query::AverageDailyVolume,
        Query::TopReturns { n: 3 },
        Query::DailyFirstLast,
    ];
    for query in &queries {
        let a = row.query(query).unwrap();
        let b = column.query(query).unwrap();
        assert_eq!(a.row_count(), b.row_count(), "{}", query.describe());
        assert!(a.agrees_with(&b, TOLERANCE), "{}", query.describe());
    }
}

#[test]
fn test_top_returns_ranking_matches() {
    let dir = TempDir::new().unwrap();
    let dataset = synthetic::generate(5, 400);
    let (row, column) = build(&dir, &dataset);

    let symbols = |result: QueryResult| match result {
        QueryResult::TopReturns(rows) => rows.into_iter().map(|r| r.symbol).collect::<Vec<_>>(),
        _ => unreachable!(),
    };
    let q = Query::TopReturns { n: 3 };
    let from_row = symbols(row.query(&q).unwrap());
    assert_eq!(from_row.len(), 3);
    assert_eq!(from_row, symbols(column.query(&q).unwrap()));
}

#[test]
fn test_unknown_ticker_aborts_row_load() {
    let dir = TempDir::new().unwrap();
    let good = synthetic::generate(2, 50);
    let (mut row, _) = build(&dir, &good);

    let mut bars: Vec<PriceBar> = good.bars().to_vec();
    bars[10].ticker_id = 99;
    let bad = Dataset::new(good.tickers().to_vec(), bars);

    let err = row.load(&bad).unwrap_err();
    assert!(matches!(err, StoreError::Sqlite(_)));
    // The previous contents survive, including the dropped-then-recreated tables
    assert_eq!(row.count_rows("prices").unwrap(), 100);
    assert_eq!(row.count_rows("tickers").unwrap(), 2);
}

#[test]
fn test_unknown_ticker_into_empty_database_commits_nothing() {
    let mut row = RowStore::open_in_memory().unwrap();
    let good = synthetic::generate(1, 10);
    let mut bars = good.bars().to_vec();
    bars[0].ticker_id = 42;

    assert!(row.load(&Dataset::new(good.tickers().to_vec(), bars)).is_err());
    assert_eq!(row.count_rows("prices").unwrap(), 0);
    assert_eq!(row.count_rows("tickers").unwrap(), 0);
}

#[test]
fn test_reference_scenario_one_day_range() {
    let dir = TempDir::new().unwrap();
    let dataset = synthetic::generate(5, 1955);
    assert_eq!(dataset.bars().len(), 9775);
    let (row, column) = build(&dir, &dataset);
    assert_eq!(row.count_rows("prices").unwrap(), 9775);

    let day = Query::Range {
        symbol: "TSLA".to_string(),
        start: Utc.with_ymd_and_hms(2025, 11, 18, 0, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2025, 11, 18, 23, 59, 59).unwrap(),
    };
    let a = row.query(&day).unwrap();
    let b = column.query(&day).unwrap();
    assert_eq!(a.row_count(), synthetic::BARS_PER_SESSION);
    assert!(a.agrees_with(&b, TOLERANCE));
}

#[test]
fn test_reload_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let dataset = synthetic::generate(3, 200);
    let (mut row, mut column) = build(&dir, &dataset);

    let schema = row.schema().unwrap();
    let symbols: Vec<String> = column.symbols().iter().map(|s| s.to_string()).collect();
    let before = column.query(&Query::AverageDailyVolume).unwrap();

    row.load(&dataset).unwrap();
    column.load(&dataset).unwrap();

    assert_eq!(row.schema().unwrap(), schema);
    assert_eq!(row.count_rows("prices").unwrap(), 600);
    assert_eq!(row.count_rows("tickers").unwrap(), 3);
    assert_eq!(column.symbols(), symbols);
    assert_eq!(column.query(&Query::AverageDailyVolume).unwrap(), before);

    let reopened = ColumnStore::open(column.root()).unwrap();
    assert_eq!(reopened.symbols(), symbols);
}

#[test]
fn test_malformed_partition_fails_open() {
    let dir = TempDir::new().unwrap();
    let dataset = synthetic::generate(2, 20);
    let (_, column) = build(&dir, &dataset);

    let path = column.partition_path("AAPL").unwrap().to_path_buf();
    fs::write(&path, b"not parquet").unwrap();

    let err = ColumnStore::open(column.root()).err().unwrap();
    assert!(matches!(err, StoreError::MalformedPartition { .. }));
}

#[test]
fn test_duplicate_partition_fails_open() {
    let dir = TempDir::new().unwrap();
    let dataset = synthetic::generate(2, 20);
    let (_, column) = build(&dir, &dataset);

    let path = column.partition_path("MSFT").unwrap().to_path_buf();
    fs::copy(&path, path.with_file_name("part-1.parquet")).unwrap();

    let err = ColumnStore::open(column.root()).err().unwrap();
    assert!(matches!(err, StoreError::DuplicatePartition(ref s) if s == "MSFT"));
}

#[test]
fn test_missing_symbol_is_empty_not_error() {
    let dir = TempDir::new().unwrap();
    let dataset = synthetic::generate(2, 20);
    let (row, column) = build(&dir, &dataset);

    assert!(row.query(&full_range("NFLX")).unwrap().is_empty());
    assert!(column.query(&full_range("NFLX")).unwrap().is_empty());
}

#[test]
fn test_rolling_queries_are_column_only() {
    let dir = TempDir::new().unwrap();
    let dataset = synthetic::generate(2, synthetic::BARS_PER_SESSION * 7);
    let (row, column) = build(&dir, &dataset);

    let rolling = Query::RollingAverage {
        symbol: "AAPL".to_string(),
        window: 5,
    };
    let volatility = Query::RollingVolatility { window: 5 };
    assert!(!row.supports(rolling.kind()));
    assert!(matches!(row.query(&volatility), Err(StoreError::Unsupported { .. })));

    assert_eq!(
        column.query(&rolling).unwrap().row_count(),
        synthetic::BARS_PER_SESSION * 7
    );
    assert_eq!(column.query(&volatility).unwrap().row_count(), 14);
}

#[test]
fn test_rolling_volatility_uses_last_close_per_day() {
    let dir = TempDir::new().unwrap();
    let aapl = ticker(1, "AAPL");
    // Thursday, Friday, then Monday and Tuesday across a weekend
    let days = [(20, 100.0), (21, 110.0), (24, 99.0), (25, 108.9)];
    let mut input = Vec::new();
    for (day, last_close) in days {
        let at = |h, m| Utc.with_ymd_and_hms(2025, 11, day, h, m, 0).unwrap();
        // Intraday closes above and below the final one, fed in reverse time order
        input.push(bar(&aapl, at(20, 59), last_close + 1.0, last_close));
        input.push(bar(&aapl, at(17, 0), last_close - 4.0, last_close - 2.0));
        input.push(bar(&aapl, at(14, 30), last_close, last_close + 5.0));
    }
    let dataset = Dataset::new(vec![aapl], input);

    let mut column = ColumnStore::new(dir.path().join("parquet"));
    column.load(&dataset).unwrap();
    let rows = match column.query(&Query::RollingVolatility { window: 3 }).unwrap() {
        QueryResult::RollingVolatility(rows) => rows,
        other => panic!("expected volatility, got {:?}", other.kind()),
    };

    // Trading days only, no weekend rows
    assert_eq!(rows.len(), 4);
    let closes: Vec<f64> = rows.iter().map(|r| r.daily_close).collect();
    assert_eq!(closes, vec![100.0, 110.0, 99.0, 108.9]);
    assert_eq!(rows[2].date, chrono::NaiveDate::from_ymd_opt(2025, 11, 24).unwrap());
    assert!(rows[..3].iter().all(|r| r.volatility.is_none()));

    // Returns +10%, -10%, +10%: sample std is sqrt(0.04 / 3)
    let expected = (0.04_f64 / 3.0).sqrt();
    let actual = rows[3].volatility.unwrap();
    assert!((actual - expected).abs() < 1e-9, "{actual} vs {expected}");
}

#[test]
fn test_disk_sizes_are_reported() {
    let dir = TempDir::new().unwrap();
    let dataset = synthetic::generate(3, 300);
    let (row, column) = build(&dir, &dataset);

    let db_bytes = fs::metadata(dir.path().join("market_data.db")).unwrap().len();
    assert_eq!(row.disk_size().unwrap(), db_bytes);
    assert!(column.disk_size().unwrap() > 0);
}

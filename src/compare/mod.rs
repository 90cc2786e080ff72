//! Row vs column comparison
//!
//! Drives two [`StorageLayout`]s through the same query battery, times each
//! query over a fixed number of iterations and reconciles the results.

mod report;

pub use report::{
    SingleLayoutTiming, ComparisonReport, LayoutSize, QueryComparison, Recommendation,
};

use crate::config::QueriesConfig;
use crate::store::{Query, QueryResult, StorageLayout, StoreError};
use crate::telemetry;
use std::time::{Duration, Instant};

/// The standard query battery, in report order
pub fn query_battery(config: &QueriesConfig) -> Vec<Query> {
    vec![
        Query::Range {
            symbol: config.range_symbol.clone(),
            start: config.range_start,
            end: config.range_end,
        },
        Query::AverageDailyVolume,
        Query::TopReturns { n: config.top_n },
        Query::DailyFirstLast,
        Query::RollingAverage {
            symbol: config.rolling_symbol.clone(),
            window: config.rolling_window,
        },
        Query::RollingVolatility {
            window: config.volatility_window,
        },
    ]
}

/// One query timed against one layout
#[derive(Debug, Clone)]
pub struct TimedResult {
    pub result: QueryResult,
    /// Mean wall-clock duration per iteration
    pub mean: Duration,
}

/// Run `query` `iterations` times (at least once); keep the last result
pub fn time_query(
    layout: &dyn StorageLayout,
    query: &Query,
    iterations: usize,
) -> Result<TimedResult, StoreError> {
    let iterations = iterations.max(1);
    let mut total = Duration::ZERO;
    let mut result = QueryResult::empty(query.kind());

    for _ in 0..iterations {
        let start = Instant::now();
        result = layout.query(query)?;
        let elapsed = start.elapsed();
        telemetry::record_query_latency(layout.name(), query.kind(), elapsed);
        total += elapsed;
    }

    let mean = mean_duration(total, iterations);
    tracing::debug!(
        layout = layout.name(),
        query = %query.kind(),
        rows = result.row_count(),
        mean_ms = mean.as_secs_f64() * 1000.0,
        "Timed query"
    );
    Ok(TimedResult { result, mean })
}

/// `total / iterations` without narrowing the divisor
fn mean_duration(total: Duration, iterations: usize) -> Duration {
    total.div_f64(iterations.max(1) as f64)
}

/// Side-by-side runner for a row layout and a column layout
pub struct Comparator<'a> {
    row: &'a dyn StorageLayout,
    column: &'a dyn StorageLayout,
    iterations: usize,
    tolerance: f64,
}

impl<'a> Comparator<'a> {
    pub fn new(row: &'a dyn StorageLayout, column: &'a dyn StorageLayout) -> Self {
        Self {
            row,
            column,
            iterations: 10,
            tolerance: 1e-9,
        }
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations.max(1);
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Run every query; queries only one layout answers are timed separately
    pub fn run(&self, queries: &[Query]) -> Result<ComparisonReport, StoreError> {
        let row_size = LayoutSize::new(self.row.name(), self.row.disk_size()?);
        let column_size = LayoutSize::new(self.column.name(), self.column.disk_size()?);
        telemetry::set_store_bytes(self.row.name(), row_size.bytes);
        telemetry::set_store_bytes(self.column.name(), column_size.bytes);

        let mut compared = Vec::new();
        let mut single_layout = Vec::new();

        for query in queries {
            let kind = query.kind();
            match (self.row.supports(kind), self.column.supports(kind)) {
                (true, true) => {
                    let row = time_query(self.row, query, self.iterations)?;
                    let column = time_query(self.column, query, self.iterations)?;
                    let comparison = QueryComparison::new(query, &row, &column, self.tolerance);
                    if !comparison.consistent {
                        tracing::warn!(
                            query = %kind,
                            row_rows = comparison.row_rows,
                            column_rows = comparison.column_rows,
                            "Layouts disagree"
                        );
                    }
                    compared.push(comparison);
                }
                (false, true) => {
                    let column = time_query(self.column, query, self.iterations)?;
                    single_layout.push(SingleLayoutTiming::new(self.column.name(), query, &column));
                }
                (true, false) => {
                    let row = time_query(self.row, query, self.iterations)?;
                    single_layout.push(SingleLayoutTiming::new(self.row.name(), query, &row));
                }
                (false, false) => {
                    tracing::warn!(query = %kind, "No layout supports query; skipped");
                }
            }
        }

        Ok(ComparisonReport::new(
            row_size,
            column_size,
            self.iterations,
            self.tolerance,
            compared,
            single_layout,
        ))
    }
}

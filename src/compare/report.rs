//! Comparison report types and rendering

use super::TimedResult;
use crate::store::{to_mb, Query, QueryKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// On-disk footprint of one layout
#[derive(Debug, Clone, Serialize)]
pub struct LayoutSize {
    pub layout: String,
    pub bytes: u64,
    /// Mebibytes (1024 * 1024 bytes)
    pub mb: f64,
}

impl LayoutSize {
    pub fn new(layout: &str, bytes: u64) -> Self {
        Self {
            layout: layout.to_string(),
            bytes,
            mb: to_mb(bytes),
        }
    }
}

/// A query run against both layouts
#[derive(Debug, Clone, Serialize)]
pub struct QueryComparison {
    pub kind: QueryKind,
    pub description: String,
    pub row_ms: f64,
    pub column_ms: f64,
    /// `row_ms / column_ms`; absent when the column time rounds to zero
    pub speedup: Option<f64>,
    pub row_rows: usize,
    pub column_rows: usize,
    /// Same row count and every value within tolerance
    pub consistent: bool,
}

impl QueryComparison {
    pub fn new(query: &Query, row: &TimedResult, column: &TimedResult, tolerance: f64) -> Self {
        let row_ms = millis(row.mean);
        let column_ms = millis(column.mean);
        let row_rows = row.result.row_count();
        let column_rows = column.result.row_count();
        Self {
            kind: query.kind(),
            description: query.describe(),
            row_ms,
            column_ms,
            speedup: (column_ms > 0.0).then(|| row_ms / column_ms),
            row_rows,
            column_rows,
            consistent: row_rows == column_rows && row.result.agrees_with(&column.result, tolerance),
        }
    }

    fn speedup_text(&self) -> String {
        self.speedup
            .map(|s| format!("{s:.2}x"))
            .unwrap_or_else(|| "n/a".to_string())
    }
}

/// A query only one layout answers
#[derive(Debug, Clone, Serialize)]
pub struct SingleLayoutTiming {
    pub layout: String,
    pub kind: QueryKind,
    pub description: String,
    pub ms: f64,
    pub rows: usize,
}

impl SingleLayoutTiming {
    pub fn new(layout: &str, query: &Query, timed: &TimedResult) -> Self {
        Self {
            layout: layout.to_string(),
            kind: query.kind(),
            description: query.describe(),
            ms: millis(timed.mean),
            rows: timed.result.row_count(),
        }
    }
}

/// Workload guidance derived from the measurements
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    /// Geometric mean speedup over the aggregate queries
    pub analytical_speedup: Option<f64>,
    /// Speedup of the single-ticker range query
    pub range_speedup: Option<f64>,
    pub analytical: String,
    pub transactional: String,
}

impl Recommendation {
    fn from_queries(row: &str, column: &str, queries: &[QueryComparison]) -> Self {
        let aggregates: Vec<f64> = queries
            .iter()
            .filter(|q| q.kind != QueryKind::Range)
            .filter_map(|q| q.speedup)
            .filter(|s| *s > 0.0)
            .collect();
        let analytical_speedup = (!aggregates.is_empty()).then(|| {
            let log_sum: f64 = aggregates.iter().map(|s| s.ln()).sum();
            (log_sum / aggregates.len() as f64).exp()
        });
        let range_speedup = queries
            .iter()
            .find(|q| q.kind == QueryKind::Range)
            .and_then(|q| q.speedup);

        let analytical = match analytical_speedup {
            Some(s) if s >= 1.0 => format!(
                "Analytical workloads (scans, aggregations, rolling windows): prefer {column}; \
                 aggregates ran {s:.2}x faster on average and partitions prune by symbol."
            ),
            Some(s) => format!(
                "Analytical workloads: {row} was faster on this dataset ({:.2}x); \
                 {column} still wins on footprint and column pruning as data grows.",
                1.0 / s
            ),
            None => format!("Analytical workloads: prefer {column} for scans and aggregations."),
        };
        let transactional = format!(
            "Transactional workloads (point lookups, updates, referential integrity): \
             prefer {row}; it enforces foreign keys and supports in-place updates."
        );

        Self {
            analytical_speedup,
            range_speedup,
            analytical,
            transactional,
        }
    }
}

/// Full comparison result
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub generated_at: DateTime<Utc>,
    pub iterations: usize,
    pub tolerance: f64,
    pub row_size: LayoutSize,
    pub column_size: LayoutSize,
    pub queries: Vec<QueryComparison>,
    /// Queries answered by one layout only
    pub single_layout: Vec<SingleLayoutTiming>,
    /// Every compared query agreed
    pub consistent: bool,
    pub recommendation: Recommendation,
}

impl ComparisonReport {
    pub fn new(
        row_size: LayoutSize,
        column_size: LayoutSize,
        iterations: usize,
        tolerance: f64,
        queries: Vec<QueryComparison>,
        single_layout: Vec<SingleLayoutTiming>,
    ) -> Self {
        let recommendation =
            Recommendation::from_queries(&row_size.layout, &column_size.layout, &queries);
        Self {
            generated_at: Utc::now(),
            iterations,
            tolerance,
            consistent: queries.iter().all(|q| q.consistent),
            row_size,
            column_size,
            queries,
            single_layout,
            recommendation,
        }
    }

    /// Console rendering
    pub fn format_table(&self) -> String {
        let mut out = format!(
            r#"
══════════════════════════════════════════════════════
               FORMAT COMPARISON
══════════════════════════════════════════════════════

FILE SIZE
───────────────────────────────────────────────────────
SQLite DB Size:    {:.4} MB
Parquet Dir Size:  {:.4} MB

QUERY SPEED (avg. of {} runs)
───────────────────────────────────────────────────────
"#,
            self.row_size.mb, self.column_size.mb, self.iterations,
        );

        for q in &self.queries {
            let _ = writeln!(
                out,
                "{:<22} {:>9.2} ms {:>9.2} ms  {:>8}  {}",
                q.kind.name(),
                q.row_ms,
                q.column_ms,
                q.speedup_text(),
                if q.consistent { "OK" } else { "MISMATCH" },
            );
        }

        if !self.single_layout.is_empty() {
            let _ = write!(
                out,
                "\nSINGLE-LAYOUT QUERIES\n───────────────────────────────────────────────────────\n"
            );
            for t in &self.single_layout {
                let _ = writeln!(
                    out,
                    "{:<22} {:<8} {:>9.2} ms  {} rows",
                    t.kind.name(),
                    t.layout,
                    t.ms,
                    t.rows
                );
            }
        }

        let _ = write!(
            out,
            "\nVERDICT\n───────────────────────────────────────────────────────\n\
             Consistent:        {}\n{}\n{}\n\
             ══════════════════════════════════════════════════════\n",
            if self.consistent { "yes" } else { "NO" },
            self.recommendation.analytical,
            self.recommendation.transactional,
        );
        out
    }

    /// Markdown rendering
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Row vs Column Storage Comparison\n");
        let _ = writeln!(
            out,
            "Generated {} · {} iterations per query · tolerance {:e}\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.iterations,
            self.tolerance
        );

        let _ = writeln!(out, "## File size\n");
        let _ = writeln!(out, "| Layout | Bytes | MB |");
        let _ = writeln!(out, "|---|---:|---:|");
        for size in [&self.row_size, &self.column_size] {
            let _ = writeln!(out, "| {} | {} | {:.4} |", size.layout, size.bytes, size.mb);
        }

        let _ = writeln!(out, "\n## Query latency\n");
        let _ = writeln!(
            out,
            "| Query | {} (ms) | {} (ms) | Speedup | Rows | Consistent |",
            self.row_size.layout, self.column_size.layout
        );
        let _ = writeln!(out, "|---|---:|---:|---:|---:|:---:|");
        for q in &self.queries {
            let rows = if q.row_rows == q.column_rows {
                q.row_rows.to_string()
            } else {
                format!("{} / {}", q.row_rows, q.column_rows)
            };
            let _ = writeln!(
                out,
                "| {} | {:.2} | {:.2} | {} | {} | {} |",
                q.description,
                q.row_ms,
                q.column_ms,
                q.speedup_text(),
                rows,
                if q.consistent { "yes" } else { "**no**" }
            );
        }

        if !self.single_layout.is_empty() {
            let _ = writeln!(out, "\n## Single-layout queries\n");
            let _ = writeln!(out, "| Query | Layout | ms | Rows |");
            let _ = writeln!(out, "|---|---|---:|---:|");
            for t in &self.single_layout {
                let _ = writeln!(
                    out,
                    "| {} | {} | {:.2} | {} |",
                    t.description, t.layout, t.ms, t.rows
                );
            }
        }

        let _ = writeln!(out, "\n## Recommendation\n");
        if !self.consistent {
            let _ = writeln!(
                out,
                "> Results disagree between layouts; resolve the mismatch before relying on timings.\n"
            );
        }
        let _ = writeln!(out, "- {}", self.recommendation.analytical);
        let _ = writeln!(out, "- {}", self.recommendation.transactional);
        out
    }

    /// Write the Markdown report to `markdown_path` and JSON to `json_path`
    pub fn write(&self, markdown_path: &Path, json_path: &Path) -> anyhow::Result<()> {
        for path in [markdown_path, json_path] {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(markdown_path, self.to_markdown())?;
        std::fs::write(json_path, serde_json::to_string_pretty(self)?)?;
        tracing::info!(
            markdown = %markdown_path.display(),
            json = %json_path.display(),
            "Wrote comparison report"
        );
        Ok(())
    }
}

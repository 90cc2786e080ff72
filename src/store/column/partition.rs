//! Parquet partition files
//!
//! One file per symbol partition. The partition key lives in the directory
//! name, so the file holds only time and OHLCV columns plus the advisory
//! `ticker_id`.

use crate::loader::PriceBar;
use crate::store::StoreError;
use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, Scalar, TimestampMicrosecondArray,
};
use arrow::compute::kernels::boolean::and;
use arrow::compute::kernels::cmp::{gt_eq, lt_eq};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use parquet::arrow::arrow_reader::{ArrowPredicateFn, ParquetRecordBatchReaderBuilder, RowFilter};
use parquet::arrow::{ArrowWriter, ProjectionMask};
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use parquet::file::statistics::Statistics;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Data file name inside each `symbol=...` directory
pub const PARTITION_FILE: &str = "part-0.parquet";

/// Directory name for a symbol partition
pub fn partition_dir_name(symbol: &str) -> String {
    format!("symbol={symbol}")
}

/// Symbol encoded in a partition directory name
pub fn parse_partition_dir(name: &str) -> Option<&str> {
    name.strip_prefix("symbol=").filter(|s| !s.is_empty())
}

fn timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
}

/// Partition file schema
pub fn partition_schema() -> Schema {
    Schema::new(vec![
        Field::new(Column::Timestamp.name(), timestamp_type(), false),
        Field::new(Column::TickerId.name(), DataType::Int64, false),
        Field::new(Column::Open.name(), DataType::Float64, false),
        Field::new(Column::High.name(), DataType::Float64, false),
        Field::new(Column::Low.name(), DataType::Float64, false),
        Field::new(Column::Close.name(), DataType::Float64, false),
        Field::new(Column::Volume.name(), DataType::Int64, false),
    ])
}

/// Partition file columns, in file order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Timestamp,
    TickerId,
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl Column {
    pub fn name(&self) -> &'static str {
        match self {
            Column::Timestamp => "timestamp",
            Column::TickerId => "ticker_id",
            Column::Open => "open",
            Column::High => "high",
            Column::Low => "low",
            Column::Close => "close",
            Column::Volume => "volume",
        }
    }

    /// Root column index in the file schema
    pub fn index(&self) -> usize {
        match self {
            Column::Timestamp => 0,
            Column::TickerId => 1,
            Column::Open => 2,
            Column::High => 3,
            Column::Low => 4,
            Column::Close => 5,
            Column::Volume => 6,
        }
    }
}

/// Columns materialized from one partition; columns not requested stay empty
#[derive(Debug, Clone, Default)]
pub struct ColumnFrame {
    pub timestamp: Vec<DateTime<Utc>>,
    pub ticker_id: Vec<i64>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<i64>,
}

impl ColumnFrame {
    pub fn len(&self) -> usize {
        self.timestamp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamp.is_empty()
    }
}

/// Write one partition's bars to `dir/part-0.parquet`
pub fn write_partition(
    dir: &Path,
    bars: &[PriceBar],
    row_group_size: usize,
) -> Result<PathBuf, StoreError> {
    fs::create_dir_all(dir).map_err(StoreError::io(dir))?;
    let path = dir.join(PARTITION_FILE);

    let schema = Arc::new(partition_schema());
    let file = File::create(&path).map_err(StoreError::io(&path))?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_max_row_group_size(row_group_size.max(1))
        .build();

    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

    let timestamps: Vec<i64> = bars.iter().map(|b| b.timestamp.timestamp_micros()).collect();
    let ticker_ids: Vec<i64> = bars.iter().map(|b| b.ticker_id).collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<i64> = bars.iter().map(|b| b.volume).collect();

    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(TimestampMicrosecondArray::from(timestamps).with_timezone("UTC")) as ArrayRef,
            Arc::new(Int64Array::from(ticker_ids)) as ArrayRef,
            Arc::new(Float64Array::from(opens)) as ArrayRef,
            Arc::new(Float64Array::from(highs)) as ArrayRef,
            Arc::new(Float64Array::from(lows)) as ArrayRef,
            Arc::new(Float64Array::from(closes)) as ArrayRef,
            Arc::new(Int64Array::from(volumes)) as ArrayRef,
        ],
    )?;

    writer.write(&batch)?;
    writer.close()?;

    tracing::debug!(path = %path.display(), count = bars.len(), "Wrote partition");
    Ok(path)
}

fn ts_scalar(ts: DateTime<Utc>) -> Scalar<TimestampMicrosecondArray> {
    Scalar::new(TimestampMicrosecondArray::from(vec![ts.timestamp_micros()]).with_timezone("UTC"))
}

fn downcast<'a, T: Array + 'static>(
    batch: &'a RecordBatch,
    column: Column,
) -> Result<&'a T, StoreError> {
    batch
        .column_by_name(column.name())
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| StoreError::CorruptValue {
            column: column.name(),
            value: "unexpected array type".to_string(),
        })
}

/// Reader for one partition file
pub struct PartitionReader {
    path: PathBuf,
}

impl PartitionReader {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn malformed(&self, reason: impl Into<String>) -> StoreError {
        StoreError::MalformedPartition {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    /// Check the footer and schema, returning the row count
    pub fn validate(&self) -> Result<i64, StoreError> {
        let file = File::open(&self.path).map_err(StoreError::io(&self.path))?;
        let builder =
            ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| self.malformed(e.to_string()))?;

        let expected = partition_schema();
        let actual = builder.schema();
        if actual.fields().len() != expected.fields().len() {
            return Err(self.malformed(format!(
                "expected {} columns, found {}",
                expected.fields().len(),
                actual.fields().len()
            )));
        }
        for (want, got) in expected.fields().iter().zip(actual.fields().iter()) {
            if want.name() != got.name() || want.data_type() != got.data_type() {
                return Err(self.malformed(format!(
                    "column {} has type {:?}, expected {} {:?}",
                    got.name(),
                    got.data_type(),
                    want.name(),
                    want.data_type()
                )));
            }
        }

        Ok(builder.metadata().file_metadata().num_rows())
    }

    /// Read `columns`, keeping only rows with `start <= timestamp <= end` when a range is given.
    ///
    /// Row groups whose timestamp statistics fall outside the range are skipped
    /// before decoding; the remaining rows are filtered inside the reader.
    pub fn read(
        &self,
        columns: &[Column],
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<ColumnFrame, StoreError> {
        let file = File::open(&self.path).map_err(StoreError::io(&self.path))?;
        let mut builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

        // The timestamp column is always read; frames are indexed by it
        let mut indices: Vec<usize> = columns.iter().map(Column::index).collect();
        indices.push(Column::Timestamp.index());
        indices.sort_unstable();
        indices.dedup();
        let mask = ProjectionMask::roots(builder.parquet_schema(), indices);

        if let Some((start, end)) = range {
            let (lo, hi) = (start.timestamp_micros(), end.timestamp_micros());
            let groups: Vec<usize> = builder
                .metadata()
                .row_groups()
                .iter()
                .enumerate()
                .filter(|(_, rg)| match rg.column(Column::Timestamp.index()).statistics() {
                    Some(Statistics::Int64(stats)) => match (stats.min_opt(), stats.max_opt()) {
                        (Some(min), Some(max)) => *max >= lo && *min <= hi,
                        _ => true,
                    },
                    _ => true,
                })
                .map(|(i, _)| i)
                .collect();
            tracing::trace!(
                path = %self.path.display(),
                kept = groups.len(),
                total = builder.metadata().num_row_groups(),
                "Row group pruning"
            );

            let ts_mask = ProjectionMask::roots(builder.parquet_schema(), [Column::Timestamp.index()]);
            let lower = ts_scalar(start);
            let upper = ts_scalar(end);
            let predicate = ArrowPredicateFn::new(
                ts_mask,
                move |batch: RecordBatch| -> Result<BooleanArray, ArrowError> {
                    let ts = batch.column(0);
                    let after = gt_eq(ts, &lower)?;
                    let before = lt_eq(ts, &upper)?;
                    and(&after, &before)
                },
            );
            builder = builder
                .with_row_groups(groups)
                .with_row_filter(RowFilter::new(vec![Box::new(predicate)]));
        }

        let reader = builder.with_projection(mask).build()?;

        let mut frame = ColumnFrame::default();
        for batch in reader {
            let batch = batch?;
            let ts = downcast::<TimestampMicrosecondArray>(&batch, Column::Timestamp)?;
            for micros in ts.values().iter() {
                let value = DateTime::from_timestamp_micros(*micros).ok_or_else(|| {
                    StoreError::CorruptValue {
                        column: Column::Timestamp.name(),
                        value: micros.to_string(),
                    }
                })?;
                frame.timestamp.push(value);
            }
            for column in columns {
                match column {
                    Column::Timestamp => {}
                    Column::TickerId => frame
                        .ticker_id
                        .extend(downcast::<Int64Array>(&batch, *column)?.values().iter()),
                    Column::Open => frame
                        .open
                        .extend(downcast::<Float64Array>(&batch, *column)?.values().iter()),
                    Column::High => frame
                        .high
                        .extend(downcast::<Float64Array>(&batch, *column)?.values().iter()),
                    Column::Low => frame
                        .low
                        .extend(downcast::<Float64Array>(&batch, *column)?.values().iter()),
                    Column::Close => frame
                        .close
                        .extend(downcast::<Float64Array>(&batch, *column)?.values().iter()),
                    Column::Volume => frame
                        .volume
                        .extend(downcast::<Int64Array>(&batch, *column)?.values().iter()),
                }
            }
        }

        Ok(frame)
    }
}

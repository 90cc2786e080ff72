//! Row validation and normalization

use super::csv_input::RawTick;
use super::types::{LoadReport, PriceBar, RejectReason, Ticker};
use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use std::collections::HashMap;

const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parse an ISO 8601 timestamp; naive values are taken as UTC.
///
/// Sub-microsecond digits are truncated, the finest unit either store keeps.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    parse_any(raw).map(|ts| ts.trunc_subsecs(6))
}

fn parse_any(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(raw, fmt) {
            return Some(ts.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts.and_utc());
        }
    }
    None
}

fn parse_price(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Volumes may arrive as `1416` or `1416.0`
fn parse_volume(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(v) = raw.parse::<i64>() {
        return Some(v);
    }
    let v = raw.parse::<f64>().ok()?;
    (v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64).then_some(v as i64)
}

/// Stateful validator: remembers the last accepted timestamp per symbol
pub struct RowValidator<'a> {
    tickers: HashMap<&'a str, i64>,
    last_seen: HashMap<String, DateTime<Utc>>,
}

impl<'a> RowValidator<'a> {
    pub fn new(tickers: &'a [Ticker]) -> Self {
        Self {
            tickers: tickers
                .iter()
                .map(|t| (t.symbol.as_str(), t.ticker_id))
                .collect(),
            last_seen: HashMap::new(),
        }
    }

    /// Validate one raw row, returning the typed bar or the rejection reason
    pub fn check(&mut self, raw: &RawTick) -> Result<PriceBar, RejectReason> {
        let symbol = raw.symbol.trim();
        if symbol.is_empty() {
            return Err(RejectReason::MissingField);
        }
        let ticker_id = *self
            .tickers
            .get(symbol)
            .ok_or(RejectReason::UnknownSymbol)?;

        if raw.timestamp.trim().is_empty() {
            return Err(RejectReason::MissingField);
        }
        let timestamp = parse_timestamp(&raw.timestamp).ok_or(RejectReason::MalformedTimestamp)?;

        let open = parse_price(&raw.open).ok_or(RejectReason::MissingField)?;
        let high = parse_price(&raw.high).ok_or(RejectReason::MissingField)?;
        let low = parse_price(&raw.low).ok_or(RejectReason::MissingField)?;
        let close = parse_price(&raw.close).ok_or(RejectReason::MissingField)?;
        let volume = parse_volume(&raw.volume).ok_or(RejectReason::MissingField)?;
        if [open, high, low, close].iter().any(|p| *p <= 0.0) {
            return Err(RejectReason::NonPositivePrice);
        }
        if volume < 0 {
            return Err(RejectReason::NegativeVolume);
        }

        if let Some(last) = self.last_seen.get(symbol) {
            if timestamp == *last {
                return Err(RejectReason::DuplicateKey);
            }
            if timestamp < *last {
                return Err(RejectReason::NonMonotonicTimestamp);
            }
        }
        self.last_seen.insert(symbol.to_string(), timestamp);

        Ok(PriceBar {
            timestamp,
            ticker_id,
            symbol: symbol.to_string(),
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

/// Validate every row, counting rejections in `report`
pub fn validate_rows(tickers: &[Ticker], rows: &[RawTick], report: &mut LoadReport) -> Vec<PriceBar> {
    let mut validator = RowValidator::new(tickers);
    let mut bars = Vec::with_capacity(rows.len());

    for (i, raw) in rows.iter().enumerate() {
        report.rows_read += 1;
        match validator.check(raw) {
            Ok(bar) => bars.push(bar),
            Err(reason) => {
                tracing::debug!(line = i + 2, %reason, symbol = %raw.symbol, "Rejected row");
                report.reject(reason);
            }
        }
    }

    report.rows_accepted = bars.len();
    bars
}

//! Raw-table cleaning.
//!
//! Each source has its own submodule that maps columns, parses timestamps,
//! classifies free text and drops rows missing required fields. Every
//! cleaner returns a [`Cleaned`] table with a [`CleanMetrics`] record so that
//! no dropped row or unparsed field goes uncounted.

pub mod budget;
pub mod columns;
pub mod crime;
pub mod home_value;
pub mod keywords;
pub mod service;
pub mod timestamp;

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use tracing::info;

pub use budget::{BudgetRecord, DepartmentCategory, clean_budget};
pub use crime::{CrimeCategory, CrimeRecord, clean_crime};
pub use home_value::{HomeValueRecord, clean_home_values};
pub use keywords::{Category, CategoryTable, Flags};
pub use service::{ServiceCategory, ServiceRequest, clean_service_requests};
pub use timestamp::parse_timestamp;

use crate::loader::RawTable;

/// Origin of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Crime,
    ServiceRequests,
    HomeValues,
    Budget,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Source::Crime => "crime",
            Source::ServiceRequests => "service_requests",
            Source::HomeValues => "home_values",
            Source::Budget => "budget",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    NotACrime,
    MissingLocation,
    MissingNeighborhood,
    MissingValue,
    MissingAmount,
    OutOfScope,
}

/// Rows in, rows out, and why the difference was dropped.
#[derive(Debug, Clone, Serialize)]
pub struct CleanMetrics {
    pub source: Source,
    pub rows_in: usize,
    pub rows_out: usize,
    pub rows_dropped: usize,
    pub malformed_records: usize,
    pub dropped: BTreeMap<DropReason, usize>,
    pub unparsed_fields: BTreeMap<&'static str, usize>,
}

impl CleanMetrics {
    pub fn new(source: Source, table: &RawTable) -> Self {
        Self {
            source,
            rows_in: table.len(),
            rows_out: 0,
            rows_dropped: 0,
            malformed_records: table.metrics.rows_skipped,
            dropped: BTreeMap::new(),
            unparsed_fields: BTreeMap::new(),
        }
    }

    pub fn drop_row(&mut self, reason: DropReason) {
        self.rows_dropped += 1;
        *self.dropped.entry(reason).or_default() += 1;
    }

    pub fn unparsed(&mut self, field: &'static str) {
        *self.unparsed_fields.entry(field).or_default() += 1;
    }

    pub fn dropped_for(&self, reason: DropReason) -> usize {
        self.dropped.get(&reason).copied().unwrap_or(0)
    }

    fn finish(mut self, rows_out: usize) -> Self {
        self.rows_out = rows_out;
        info!(
            source = %self.source,
            rows_in = self.rows_in,
            rows_out = self.rows_out,
            rows_dropped = self.rows_dropped,
            "Cleaned source"
        );
        self
    }
}

/// Typed records of one source plus the metrics of how they were produced.
#[derive(Debug, Clone)]
pub struct Cleaned<T> {
    pub records: Vec<T>,
    pub metrics: CleanMetrics,
}

impl<T> Cleaned<T> {
    fn new(records: Vec<T>, metrics: CleanMetrics) -> Self {
        let metrics = metrics.finish(records.len());
        Self { records, metrics }
    }
}

/// Parses a numeric cell, tolerating currency symbols and thousands separators.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses `1`/`0`, `true`/`false`, `yes`/`no` style flags.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" => Some(true),
        "false" | "f" | "no" | "n" => Some(false),
        other => parse_number(other).map(|v| v != 0.0),
    }
}

/// Reads a numeric cell, counting it as unparsed when present but unreadable.
fn numeric_field(value: Option<&str>, field: &'static str, metrics: &mut CleanMetrics) -> Option<f64> {
    let raw = value?;
    let parsed = parse_number(raw);
    if parsed.is_none() {
        metrics.unparsed(field);
    }
    parsed
}

/// Reads a coordinate cell. Values outside `range` count as unparsed.
fn coordinate_field(
    value: Option<&str>,
    field: &'static str,
    range: &RangeInclusive<f64>,
    metrics: &mut CleanMetrics,
) -> Option<f64> {
    let raw = value?;
    let parsed = parse_number(raw).filter(|v| range.contains(v));
    if parsed.is_none() {
        metrics.unparsed(field);
    }
    parsed
}

/// Reads a timestamp cell, counting it as unparsed when present but unreadable.
fn timestamp_field(
    value: Option<&str>,
    field: &'static str,
    metrics: &mut CleanMetrics,
) -> Option<chrono::NaiveDateTime> {
    let raw = value?;
    let parsed = parse_timestamp(raw);
    if parsed.is_none() {
        metrics.unparsed(field);
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_strips_currency() {
        assert_eq!(parse_number("$1,234.50"), Some(1234.5));
        assert_eq!(parse_number("-7"), Some(-7.0));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn test_parse_flag_variants() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("1.0"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("No"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_metrics_count_drops_by_reason() {
        let table = RawTable::new(vec!["a".into()], vec![vec!["1".into()]; 3]);
        let mut metrics = CleanMetrics::new(Source::Crime, &table);
        metrics.drop_row(DropReason::NotACrime);
        metrics.drop_row(DropReason::NotACrime);
        metrics.unparsed("occurred_at");

        let cleaned = Cleaned::new(vec![()], metrics);
        assert_eq!(cleaned.metrics.rows_in, 3);
        assert_eq!(cleaned.metrics.rows_out, 1);
        assert_eq!(cleaned.metrics.rows_dropped, 2);
        assert_eq!(cleaned.metrics.dropped_for(DropReason::NotACrime), 2);
        assert_eq!(cleaned.metrics.unparsed_fields["occurred_at"], 1);
    }
}

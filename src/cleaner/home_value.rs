use chrono::NaiveDate;

use super::columns::{ColumnMap, ColumnRule, Pattern};
use super::{CleanMetrics, Cleaned, DropReason, Source, numeric_field};
use crate::loader::RawTable;
use crate::neighborhood::NeighborhoodKey;

/// Snapshots back to the year-earlier value.
pub const YOY_LOOKBACK: usize = 12;

static HOME_VALUE_COLUMNS: &[ColumnRule] = &[
    ColumnRule {
        canonical: "region_name",
        patterns: &[Pattern::Exact("REGIONNAME"), Pattern::Exact("REGION_NAME")],
    },
    ColumnRule {
        canonical: "city",
        patterns: &[Pattern::Exact("CITY")],
    },
    ColumnRule {
        canonical: "state",
        patterns: &[Pattern::Exact("STATE"), Pattern::Exact("STATENAME")],
    },
];

/// One region's latest home value.
#[derive(Debug, Clone)]
pub struct HomeValueRecord {
    pub neighborhood: NeighborhoodKey,
    pub region_name: String,
    pub snapshot: String,
    pub current_value: f64,
    pub year_ago_value: Option<f64>,
    pub yoy_appreciation: Option<f64>,
}

impl HomeValueRecord {
    pub fn new(neighborhood: NeighborhoodKey, current_value: f64, year_ago_value: Option<f64>) -> Self {
        Self {
            region_name: neighborhood.to_string(),
            neighborhood,
            snapshot: String::new(),
            current_value,
            year_ago_value,
            yoy_appreciation: year_ago_value.and_then(|prev| yoy_appreciation(current_value, prev)),
        }
    }
}

pub fn yoy_appreciation(current: f64, year_ago: f64) -> Option<f64> {
    (year_ago > 0.0).then(|| (current - year_ago) / year_ago * 100.0)
}

/// Parses a `YYYY-MM` or `YYYY-MM-DD` snapshot header.
fn snapshot_date(header: &str) -> Option<NaiveDate> {
    let h = header.trim();
    NaiveDate::parse_from_str(h, "%Y-%m-%d")
        .ok()
        .or_else(|| NaiveDate::parse_from_str(&format!("{h}-01"), "%Y-%m-%d").ok())
}

/// Snapshot columns as `(header index, date)`, oldest first.
fn snapshot_columns(headers: &[String]) -> Vec<(usize, NaiveDate)> {
    let mut cols: Vec<(usize, NaiveDate)> = headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| snapshot_date(h).map(|d| (i, d)))
        .collect();
    cols.sort_by_key(|(i, d)| (*d, *i));
    cols
}

fn matches_filter(value: Option<&str>, filter: Option<&str>) -> bool {
    match (value, filter) {
        (_, None) => true,
        (None, Some(_)) => true,
        (Some(v), Some(f)) => v.trim().eq_ignore_ascii_case(f.trim()),
    }
}

/// Cleans a wide home-value extract: one row per region, one column per snapshot.
///
/// `city` and `state` restrict rows when the extract carries those columns.
#[tracing::instrument(skip_all, fields(rows = table.len()))]
pub fn clean_home_values(
    table: &RawTable,
    city: Option<&str>,
    state: Option<&str>,
) -> Cleaned<HomeValueRecord> {
    let columns = ColumnMap::resolve(&table.headers, HOME_VALUE_COLUMNS);
    let snapshots = snapshot_columns(&table.headers);
    let mut metrics = CleanMetrics::new(Source::HomeValues, table);
    let mut records = Vec::with_capacity(table.len());

    let latest = snapshots.last().copied();
    let year_ago = snapshots
        .len()
        .checked_sub(YOY_LOOKBACK + 1)
        .map(|i| snapshots[i]);

    match latest {
        Some((col, date)) => tracing::debug!(
            snapshots = snapshots.len(),
            latest = %table.headers[col],
            %date,
            "Resolved home value snapshots"
        ),
        None if !table.is_empty() => {
            tracing::warn!("Home value extract has no snapshot columns; every row will be dropped")
        }
        None => {}
    }

    for row in 0..table.len() {
        let get = |name: &str| columns.value(table, row, name);

        if !matches_filter(get("city"), city) || !matches_filter(get("state"), state) {
            metrics.drop_row(DropReason::OutOfScope);
            continue;
        }

        let Some(region_name) = get("region_name") else {
            metrics.drop_row(DropReason::MissingNeighborhood);
            continue;
        };
        let Some(neighborhood) = NeighborhoodKey::parse(region_name) else {
            metrics.drop_row(DropReason::MissingNeighborhood);
            continue;
        };

        let current = latest
            .and_then(|(col, _)| numeric_field(table.cell(row, col), "current_value", &mut metrics));
        let (Some((latest_col, _)), Some(current_value)) = (latest, current) else {
            metrics.drop_row(DropReason::MissingValue);
            continue;
        };

        let year_ago_value = year_ago
            .and_then(|(col, _)| numeric_field(table.cell(row, col), "year_ago_value", &mut metrics));

        records.push(HomeValueRecord {
            region_name: region_name.to_string(),
            snapshot: table.headers[latest_col].clone(),
            ..HomeValueRecord::new(neighborhood, current_value, year_ago_value)
        });
    }

    Cleaned::new(records, metrics)
}

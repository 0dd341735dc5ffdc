//! Outer join of per-source metric tables.

use crate::analyzers::types::{Metric, MetricTable};
use crate::error::PipelineError;

/// Outer-joins source tables on neighborhood key.
///
/// A neighborhood present in any table appears in the result. Tables must
/// declare disjoint columns, which makes the result independent of the order
/// they are passed in.
///
/// # Errors
///
/// Returns [`PipelineError::Config`] if two tables declare the same metric.
pub fn outer_join(tables: impl IntoIterator<Item = MetricTable>) -> Result<MetricTable, PipelineError> {
    let mut joined = MetricTable::default();

    for table in tables {
        if let Some(dup) = table.columns.intersection(&joined.columns).next() {
            return Err(PipelineError::Config(format!(
                "metric {dup} is declared by more than one source"
            )));
        }
        joined.columns.extend(table.columns);

        for (key, row) in table.rows {
            joined.rows.entry(key).or_default().extend(row);
        }
    }

    Ok(joined)
}

/// Fills every empty cell of `columns` with zero.
///
/// Zero here stands in for "no data": a neighborhood absent from a source
/// reads the same as one where the source recorded nothing.
pub fn fill_missing_with_zero(table: MetricTable, columns: &[Metric]) -> MetricTable {
    let mut filled = table;
    filled.columns.extend(columns.iter().copied());
    for row in filled.rows.values_mut() {
        for metric in columns {
            row.entry(*metric).or_insert(0.0);
        }
    }
    filled
}

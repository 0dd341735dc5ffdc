//! CSV loader for raw source extracts.
//!
//! Produces an untyped [`RawTable`]; all interpretation happens in the cleaner.

use std::path::Path;

use csv::ReaderBuilder;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::PipelineError;

/// Header row plus string cells, exactly as read from disk.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub metrics: LoadMetrics,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadMetrics {
    pub rows_read: usize,
    pub rows_skipped: usize,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let rows_read = rows.len();
        Self {
            headers,
            rows,
            metrics: LoadMetrics {
                rows_read,
                rows_skipped: 0,
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Trimmed, non-empty cell at `(row, column)`.
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)?
            .get(column)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

/// Reads a CSV file into a [`RawTable`].
///
/// # Errors
///
/// Returns [`PipelineError::Input`] if the file is missing, unreadable, or
/// has no readable header row. Individual records that fail to decode are
/// skipped and counted instead.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn load_csv(path: &Path) -> Result<RawTable, PipelineError> {
    let input_err = |source| PipelineError::Input {
        path: path.to_path_buf(),
        source,
    };

    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(input_err)?;

    let headers: Vec<String> = rdr
        .headers()
        .map_err(input_err)?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    let mut skipped = 0usize;

    for (line, result) in rdr.records().enumerate() {
        match result {
            Ok(record) => rows.push(record.iter().map(str::to_string).collect()),
            Err(e) => {
                skipped += 1;
                debug!(line = line + 2, error = %e, "Skipping malformed record");
            }
        }
    }

    if skipped > 0 {
        warn!(skipped, "Malformed records skipped");
    }
    info!(rows = rows.len(), columns = headers.len(), "Loaded extract");

    Ok(RawTable {
        metrics: LoadMetrics {
            rows_read: rows.len() + skipped,
            rows_skipped: skipped,
        },
        headers,
        rows,
    })
}

//! Read-only access to the last written output bundle.
//!
//! Every call re-reads the file, so a new pipeline run is picked up without
//! restarting the server.

use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::QueryError;
use crate::neighborhood::NeighborhoodKey;
use crate::output::{RESULTS_FILE, SUMMARY_FILE};

/// Most results returned by [`BundleStore::search`].
pub const SEARCH_LIMIT: usize = 10;

#[derive(Debug, Clone)]
pub struct BundleStore {
    output_dir: PathBuf,
}

impl BundleStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn results_path(&self) -> PathBuf {
        self.output_dir.join(RESULTS_FILE)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join(SUMMARY_FILE)
    }

    pub async fn read_json(path: &Path) -> Result<Value, QueryError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(QueryError::DataUnavailable {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => {
                return Err(QueryError::Malformed {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        };
        serde_json::from_str(&content).map_err(|e| QueryError::Malformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub async fn analysis(&self) -> Result<Value, QueryError> {
        Self::read_json(&self.results_path()).await
    }

    pub async fn summary(&self) -> Result<Value, QueryError> {
        Self::read_json(&self.summary_path()).await
    }

    /// One top-level section of the analysis bundle.
    pub async fn section(&self, key: &str) -> Result<Value, QueryError> {
        let mut analysis = self.analysis().await?;
        analysis
            .get_mut(key)
            .map(Value::take)
            .ok_or_else(|| QueryError::NotFound(key.to_string()))
    }

    async fn profiles(&self) -> Result<Vec<Value>, QueryError> {
        match self.section("neighborhoods").await? {
            Value::Array(rows) => Ok(rows),
            _ => Err(QueryError::Malformed {
                path: self.results_path(),
                reason: "neighborhoods is not an array".into(),
            }),
        }
    }

    /// The profile whose key matches `name` after normalization.
    pub async fn neighborhood(&self, name: &str) -> Result<Value, QueryError> {
        let not_found = || QueryError::NotFound(format!("neighborhood '{name}'"));
        let key = NeighborhoodKey::parse(name).ok_or_else(not_found)?;
        self.profiles()
            .await?
            .into_iter()
            .find(|p| p.get("neighborhood").and_then(Value::as_str) == Some(key.as_str()))
            .ok_or_else(not_found)
    }

    /// Profiles whose key contains the normalized `query`, in bundle order.
    pub async fn search(&self, query: &str) -> Result<Vec<Value>, QueryError> {
        let Some(needle) = NeighborhoodKey::parse(query) else {
            return Ok(Vec::new());
        };
        Ok(self
            .profiles()
            .await?
            .into_iter()
            .filter(|p| {
                p.get("neighborhood")
                    .and_then(Value::as_str)
                    .is_some_and(|k| k.contains(needle.as_str()))
            })
            .take(SEARCH_LIMIT)
            .collect())
    }
}

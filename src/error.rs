//! Error types for each boundary of the pipeline.
//!
//! Only [`PipelineError`] aborts a run. Insight and query failures are
//! recoverable and are turned into placeholder values or HTTP responses by
//! their callers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to read input file {}: {source}", path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to write output {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failure of the external text-generation call.
#[derive(Error, Debug)]
pub enum InsightError {
    #[error("no credential configured ({0} is not set)")]
    MissingCredential(String),

    #[error("insight request timed out")]
    Timeout,

    #[error("insight transport error: {0}")]
    Transport(String),

    #[error("insight service returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("insight service returned no text")]
    EmptyResponse,
}

impl From<reqwest::Error> for InsightError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            InsightError::Timeout
        } else {
            InsightError::Transport(e.to_string())
        }
    }
}

/// Failure to answer a read-only query against the output bundle.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("data file '{}' not found, run the pipeline first", path.display())]
    DataUnavailable { path: PathBuf },

    #[error("data file '{}' is malformed: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("{0} not found in analysis results")]
    NotFound(String),
}

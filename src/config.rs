//! Pipeline configuration.
//!
//! Built once per run from defaults, an optional JSON file and CLI overrides,
//! validated, then passed by reference into each stage.
//!
//! ```json
//! {
//!   "crime_path": "data/raw/crime.csv",
//!   "service_requests_path": "data/raw/311_requests.csv",
//!   "home_values_path": "data/raw/home_values.csv",
//!   "output_dir": "data/output",
//!   "weights": { "safety": 0.3, "service": 0.25, "market": 0.25, "civic_value_ratio": 0.2 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::PipelineError;

/// Tolerance for the composite weights summing to one.
pub const WEIGHT_TOLERANCE: f64 = 1e-9;

/// Weights of the component scores in the Civic Value Index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub safety: f64,
    pub service: f64,
    pub market: f64,
    pub civic_value_ratio: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            safety: 0.30,
            service: 0.25,
            market: 0.25,
            civic_value_ratio: 0.20,
        }
    }
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.safety + self.service + self.market + self.civic_value_ratio
    }

    /// # Errors
    ///
    /// Fails unless every weight is non-negative and they sum to 1.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let all = [self.safety, self.service, self.market, self.civic_value_ratio];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(PipelineError::Config(format!(
                "score weights must be finite and non-negative: {self:?}"
            )));
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(PipelineError::Config(format!(
                "score weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    pub enabled: bool,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key_env: "ANTHROPIC_API_KEY".into(),
            model: "claude-sonnet-4-5-20250929".into(),
            max_tokens: 1500,
            timeout_secs: 60,
        }
    }
}

impl InsightConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The configured API key, if set and non-empty.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub crime_path: PathBuf,
    pub service_requests_path: PathBuf,
    pub home_values_path: Option<PathBuf>,
    pub budget_path: Option<PathBuf>,
    pub output_dir: PathBuf,

    pub crime_since_year: Option<i32>,
    pub budget_since_year: Option<i32>,
    pub home_value_city: Option<String>,
    pub home_value_state: Option<String>,

    pub correlation_threshold: f64,
    pub significance_level: f64,
    pub outlier_z_threshold: f64,
    /// Neighborhoods listed in each top-N statistic.
    pub top_n: usize,
    /// Neighborhoods at each end of the ranking that get a text report.
    pub sample_size: usize,

    pub weights: ScoreWeights,
    pub insights: InsightConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            crime_path: PathBuf::from("data/raw/crime.csv"),
            service_requests_path: PathBuf::from("data/raw/311_requests.csv"),
            home_values_path: None,
            budget_path: None,
            output_dir: PathBuf::from("data/output"),
            crime_since_year: None,
            budget_since_year: None,
            home_value_city: None,
            home_value_state: None,
            correlation_threshold: 0.3,
            significance_level: 0.05,
            outlier_z_threshold: 2.5,
            top_n: 5,
            sample_size: 5,
            weights: ScoreWeights::default(),
            insights: InsightConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads the config from a JSON file at `path`. Missing keys take defaults.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| PipelineError::Config(format!("invalid config {}: {e}", path.display())))
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] describing the first invalid setting.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.weights.validate()?;

        if !(0.0..1.0).contains(&self.correlation_threshold) {
            return Err(PipelineError::Config(format!(
                "correlation_threshold must be in [0, 1), got {}",
                self.correlation_threshold
            )));
        }
        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            return Err(PipelineError::Config(format!(
                "significance_level must be in (0, 1), got {}",
                self.significance_level
            )));
        }
        if self.outlier_z_threshold.is_nan() || self.outlier_z_threshold <= 0.0 {
            return Err(PipelineError::Config(format!(
                "outlier_z_threshold must be positive, got {}",
                self.outlier_z_threshold
            )));
        }
        if self.insights.enabled && self.insights.timeout_secs == 0 {
            return Err(PipelineError::Config("insights.timeout_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn results_path(&self) -> PathBuf {
        self.output_dir.join(crate::output::RESULTS_FILE)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join(crate::output::SUMMARY_FILE)
    }
}

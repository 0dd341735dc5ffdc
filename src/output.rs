//! Output bundle persistence.
//!
//! Writes `analysis_results.json`, `summary.json` and
//! `neighborhood_profiles.csv` into the configured output directory. Files
//! are rewritten from scratch on every run.

use chrono::{DateTime, Utc};
use csv::Writer;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::analyzers::score::{Component, MARKET_COMPONENTS, SAFETY_COMPONENTS, SERVICE_COMPONENTS};
use crate::analyzers::statistics::{RunStatistics, Totals};
use crate::analyzers::types::{
    ALGORITHM_VERSION, Metric, NeighborhoodProfile, SCHEMA_VERSION, Tier, round1,
};
use crate::config::{PipelineConfig, ScoreWeights};
use crate::error::PipelineError;
use crate::insights::AiInsights;
use crate::neighborhood::NeighborhoodKey;

pub const RESULTS_FILE: &str = "analysis_results.json";
pub const SUMMARY_FILE: &str = "summary.json";
pub const PROFILES_FILE: &str = "neighborhood_profiles.csv";

/// Score columns of the profile CSV, after the metric columns.
const SCORE_COLUMNS: [&str; 8] = [
    "safety_score",
    "service_score",
    "market_score",
    "civic_value_ratio",
    "civic_value_index",
    "rank",
    "percentile",
    "tier",
];

#[derive(Debug, Clone, Serialize)]
pub struct ComponentWeights {
    pub safety: &'static [Component],
    pub service: &'static [Component],
    pub market: &'static [Component],
}

impl Default for ComponentWeights {
    fn default() -> Self {
        Self {
            safety: SAFETY_COMPONENTS,
            service: SERVICE_COMPONENTS,
            market: MARKET_COMPONENTS,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Metadata {
    pub schema_version: u8,
    pub algorithm_version: u8,
    pub generated_at: DateTime<Utc>,
    pub neighborhoods_analyzed: usize,
    pub inputs: Vec<PathBuf>,
    pub weights: ScoreWeights,
    pub component_weights: ComponentWeights,
}

/// Contents of `analysis_results.json`.
#[derive(Debug, Serialize)]
pub struct AnalysisBundle<'a> {
    pub metadata: Metadata,
    pub statistics: &'a RunStatistics,
    pub ai_insights: &'a AiInsights,
    pub neighborhoods: &'a [NeighborhoodProfile],
}

#[derive(Debug, Clone, Serialize)]
pub struct TopNeighborhood {
    pub neighborhood: NeighborhoodKey,
    pub civic_value_index: f64,
    pub tier: Tier,
}

/// Contents of `summary.json`.
#[derive(Debug, Serialize)]
pub struct Summary<'a> {
    pub last_updated: DateTime<Utc>,
    pub totals: &'a Totals,
    pub neighborhoods_analyzed: usize,
    pub key_finding: String,
    pub top_neighborhood: Option<TopNeighborhood>,
    pub ai_summary: &'a str,
}

/// Paths written by [`write_outputs`].
#[derive(Debug, Clone)]
pub struct WrittenFiles {
    pub results: PathBuf,
    pub summary: PathBuf,
    pub profiles: PathBuf,
}

impl<'a> AnalysisBundle<'a> {
    pub fn new(
        config: &PipelineConfig,
        profiles: &'a [NeighborhoodProfile],
        statistics: &'a RunStatistics,
        ai_insights: &'a AiInsights,
    ) -> Self {
        let inputs = [
            Some(config.crime_path.clone()),
            Some(config.service_requests_path.clone()),
            config.home_values_path.clone(),
            config.budget_path.clone(),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self {
            metadata: Metadata {
                schema_version: SCHEMA_VERSION,
                algorithm_version: ALGORITHM_VERSION,
                generated_at: Utc::now(),
                neighborhoods_analyzed: profiles.len(),
                inputs,
                weights: config.weights,
                component_weights: ComponentWeights::default(),
            },
            statistics,
            ai_insights,
            neighborhoods: profiles,
        }
    }

    pub fn summary(&self) -> Summary<'a> {
        let pct = self.statistics.infrastructure_comparison.crime_difference_pct;
        let key_finding = if pct >= 0.0 {
            format!("Neighborhoods with more streetlight issues have {pct:.0}% more crime")
        } else {
            format!("Neighborhoods with more streetlight issues have {:.0}% less crime", -pct)
        };

        Summary {
            last_updated: self.metadata.generated_at,
            totals: &self.statistics.totals,
            neighborhoods_analyzed: self.neighborhoods.len(),
            key_finding,
            top_neighborhood: self.neighborhoods.first().map(|p| TopNeighborhood {
                neighborhood: p.neighborhood.clone(),
                civic_value_index: round1(p.scores.civic_value_index),
                tier: p.scores.tier,
            }),
            ai_summary: &self.ai_insights.summary,
        }
    }
}

fn output_error(path: &Path) -> impl FnOnce(std::io::Error) -> PipelineError + '_ {
    move |source| PipelineError::Output {
        path: path.to_path_buf(),
        source,
    }
}

fn ensure_parent(path: &Path) -> Result<(), PipelineError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(output_error(dir))?;
    }
    Ok(())
}

/// Writes `value` as pretty-printed JSON, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PipelineError> {
    ensure_parent(path)?;
    let bytes = serde_json::to_vec_pretty(value)?;
    fs::write(path, bytes).map_err(output_error(path))?;
    debug!(path = %path.display(), "Wrote JSON");
    Ok(())
}

/// Writes one CSV row per profile with every metric and score column.
pub fn write_profiles_csv(path: &Path, profiles: &[NeighborhoodProfile]) -> Result<(), PipelineError> {
    ensure_parent(path)?;
    let csv_error = |e: csv::Error| PipelineError::Output {
        path: path.to_path_buf(),
        source: e.into(),
    };

    let mut writer = Writer::from_path(path).map_err(csv_error)?;

    let header = std::iter::once("neighborhood")
        .chain(Metric::ALL.iter().map(|m| m.as_str()))
        .chain(SCORE_COLUMNS);
    writer.write_record(header).map_err(csv_error)?;

    for p in profiles {
        let s = &p.scores;
        let mut record = vec![p.neighborhood.to_string()];
        record.extend(Metric::ALL.iter().map(|m| p.metric(*m).to_string()));
        record.extend([
            round1(s.safety).to_string(),
            round1(s.service).to_string(),
            round1(s.market).to_string(),
            round1(s.civic_value_ratio).to_string(),
            round1(s.civic_value_index).to_string(),
            s.rank.to_string(),
            round1(s.percentile).to_string(),
            s.tier.to_string(),
        ]);
        writer.write_record(&record).map_err(csv_error)?;
    }

    writer.flush().map_err(output_error(path))?;
    Ok(())
}

/// Writes the whole bundle into `output_dir`.
#[tracing::instrument(skip_all, fields(output_dir = %output_dir.display()))]
pub fn write_outputs(output_dir: &Path, bundle: &AnalysisBundle<'_>) -> Result<WrittenFiles, PipelineError> {
    let files = WrittenFiles {
        results: output_dir.join(RESULTS_FILE),
        summary: output_dir.join(SUMMARY_FILE),
        profiles: output_dir.join(PROFILES_FILE),
    };

    write_json(&files.results, bundle)?;
    write_json(&files.summary, &bundle.summary())?;
    write_profiles_csv(&files.profiles, bundle.neighborhoods)?;

    info!(
        neighborhoods = bundle.neighborhoods.len(),
        results = %files.results.display(),
        "Wrote output bundle"
    );
    Ok(files)
}

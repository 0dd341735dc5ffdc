//! End-to-end batch run: load, clean, aggregate, score, explain, write.
//!
//! [`analyze`] is a pure function of the loaded tables and the config.
//! [`run`] wraps it with file input, the single awaited insight call and
//! the output writers.

use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::analyzers::aggregate::{
    aggregate_budget, aggregate_crime, aggregate_home_values, aggregate_service_requests,
};
use crate::analyzers::correlate::correlate;
use crate::analyzers::join::{fill_missing_with_zero, outer_join};
use crate::analyzers::score::score_profiles;
use crate::analyzers::statistics::{RunStatistics, StatisticsInput, compute_statistics};
use crate::analyzers::types::{Metric, NeighborhoodProfile};
use crate::cleaner::{clean_budget, clean_crime, clean_home_values, clean_service_requests};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::geo::NearestNeighborhood;
use crate::insights::{AiInsights, InsightGenerator, build_prompt, generate_insights};
use crate::loader::{RawTable, load_csv};
use crate::output::{AnalysisBundle, WrittenFiles, write_outputs};
use crate::report::write_reports;

/// Raw extracts of one run. Optional sources are `None` when not configured.
#[derive(Debug, Clone, Default)]
pub struct SourceTables {
    pub crime: RawTable,
    pub service_requests: RawTable,
    pub home_values: Option<RawTable>,
    pub budget: Option<RawTable>,
}

/// Scored profiles plus run statistics.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Ordered by rank, ties by neighborhood key.
    pub profiles: Vec<NeighborhoodProfile>,
    pub statistics: RunStatistics,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub analysis: Analysis,
    pub insights: AiInsights,
    pub files: WrittenFiles,
    pub reports: Vec<PathBuf>,
}

fn load_optional(path: Option<&Path>) -> Result<Option<RawTable>, PipelineError> {
    path.map(load_csv).transpose()
}

/// Reads every configured extract.
///
/// # Errors
///
/// Returns [`PipelineError::Input`] for the first missing or unreadable file.
pub fn load_sources(config: &PipelineConfig) -> Result<SourceTables, PipelineError> {
    Ok(SourceTables {
        crime: load_csv(&config.crime_path)?,
        service_requests: load_csv(&config.service_requests_path)?,
        home_values: load_optional(config.home_values_path.as_deref())?,
        budget: load_optional(config.budget_path.as_deref())?,
    })
}

/// Cleans, aggregates, joins, correlates and scores the loaded tables.
#[tracing::instrument(skip_all)]
pub fn analyze(sources: &SourceTables, config: &PipelineConfig) -> Result<Analysis, PipelineError> {
    config.validate()?;

    let crime = clean_crime(&sources.crime, config.crime_since_year);
    let locator = NearestNeighborhood::from_crimes(&crime.records);
    let service = clean_service_requests(&sources.service_requests, Some(&locator));
    let home_values = sources.home_values.as_ref().map(|t| {
        clean_home_values(
            t,
            config.home_value_city.as_deref(),
            config.home_value_state.as_deref(),
        )
    });
    let budget = sources
        .budget
        .as_ref()
        .map(|t| clean_budget(t, config.budget_since_year));

    let mut tables = vec![
        aggregate_crime(&crime.records),
        aggregate_service_requests(&service.records),
    ];
    if let Some(h) = &home_values {
        tables.push(aggregate_home_values(&h.records));
    }
    if let Some(b) = &budget {
        tables.push(aggregate_budget(&b.records));
    }

    let joined = outer_join(tables)?;
    let correlations = correlate(&joined, config.correlation_threshold, config.significance_level);
    let filled = fill_missing_with_zero(joined, Metric::ALL);
    let profiles = score_profiles(&filled, &config.weights)?;

    let mut cleaning = vec![crime.metrics, service.metrics];
    cleaning.extend(home_values.map(|h| h.metrics));
    cleaning.extend(budget.as_ref().map(|b| b.metrics.clone()));

    let statistics = compute_statistics(StatisticsInput {
        profiles: &profiles,
        correlations,
        budget: budget.as_ref().map(|b| b.records.as_slice()),
        cleaning,
        top_n: config.top_n,
        outlier_z_threshold: config.outlier_z_threshold,
    });

    info!(
        neighborhoods = profiles.len(),
        correlations = statistics.correlations.len(),
        outliers = statistics.outliers.len(),
        "Analysis complete"
    );
    Ok(Analysis { profiles, statistics })
}

/// Runs the whole pipeline and writes the output bundle.
///
/// `generator` is the text-generation backend; `None` yields the
/// "insights unavailable" placeholder. Insight failures never fail the run.
#[tracing::instrument(skip_all, fields(output_dir = %config.output_dir.display()))]
pub async fn run(
    config: &PipelineConfig,
    generator: Option<&dyn InsightGenerator>,
) -> Result<RunOutcome, PipelineError> {
    config.validate()?;
    let sources = load_sources(config)?;
    let analysis = analyze(&sources, config)?;

    let insights = if config.insights.enabled {
        let prompt = build_prompt(&analysis.statistics);
        generate_insights(generator, &prompt, config.insights.max_tokens).await
    } else {
        AiInsights::unavailable("insights disabled in configuration")
    };

    let bundle = AnalysisBundle::new(config, &analysis.profiles, &analysis.statistics, &insights);
    let files = write_outputs(&config.output_dir, &bundle)?;
    let reports = write_reports(
        &config.output_dir,
        &analysis.profiles,
        config.sample_size,
        Utc::now().date_naive(),
    )?;

    Ok(RunOutcome {
        analysis,
        insights,
        files,
        reports,
    })
}

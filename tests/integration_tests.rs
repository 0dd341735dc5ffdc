use async_trait::async_trait;
use civic_value_index::analyzers::types::{Metric, round1};
use civic_value_index::config::PipelineConfig;
use civic_value_index::error::InsightError;
use civic_value_index::insights::InsightGenerator;
use civic_value_index::output::{PROFILES_FILE, RESULTS_FILE, SUMMARY_FILE};
use civic_value_index::pipeline::{self, SourceTables, analyze, load_sources};
use civic_value_index::report::REPORTS_DIR;
use serde_json::Value;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CRIME_HEADER: &str =
    "INCIDENT_ID,OFFENSE_CATEGORY_ID,FIRST_OCCURRENCE_DATE,GEO_LAT,GEO_LON,NEIGHBORHOOD_ID,IS_CRIME,IS_TRAFFIC";
const SERVICE_HEADER: &str =
    "Case Summary,Case Status,Case Created Date,Case Closed Date,Neighborhood,Latitude,Longitude";

fn temp_dir(name: &str) -> PathBuf {
    let dir = env::temp_dir().join(name);
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn crime_csv() -> String {
    let mut lines = vec![CRIME_HEADER.to_string()];
    for i in 0..10 {
        lines.push(format!(
            "{i},burglary,2024-03-{:02} 14:00:00,39.755,-104.987,five-points,1,0",
            i + 1
        ));
    }
    lines.push("20,robbery,2024-03-02 23:30:00,39.716,-104.993,baker,1,0".into());
    lines.push("21,larceny,2024-03-04 09:15:00,39.716,-104.993,baker,1,0".into());
    lines.push("22,auto-theft,2024-03-06 18:00:00,39.764,-105.012,highland,1,0".into());
    lines.join("\n")
}

fn service_csv() -> String {
    let mut lines = vec![SERVICE_HEADER.to_string()];
    for day in 1..=5 {
        lines.push(format!(
            "Streetlight out,Open,2024-03-{day:02} 08:00:00,,Five Points,39.755,-104.987"
        ));
    }
    lines.push("Pothole,Closed,2024-03-01 08:00:00,2024-03-04 08:00:00,Baker,39.716,-104.993".into());
    lines.push("Graffiti removal,Closed,2024-03-02 08:00:00,2024-03-03 08:00:00,Sloan Lake,,".into());
    lines.join("\n")
}

fn home_values_csv() -> String {
    let months: Vec<String> = (1..=12)
        .map(|m| format!("2023-{m:02}"))
        .chain(["2024-01".to_string()])
        .collect();
    let row = |name: &str, start: f64, end: f64| {
        let mut cells = vec![name.to_string(), "Denver".into(), "CO".into()];
        for i in 0..months.len() {
            let v = if i == months.len() - 1 { end } else { start };
            cells.push(format!("{v}"));
        }
        cells.join(",")
    };
    [
        format!("RegionName,City,State,{}", months.join(",")),
        row("Five Points", 500000.0, 550000.0),
        row("Baker", 400000.0, 380000.0),
        row("Highland", 700000.0, 735000.0),
    ]
    .join("\n")
}

fn write_sources(dir: &Path, with_optional: bool) -> PipelineConfig {
    let input = dir.join("raw");
    fs::create_dir_all(&input).unwrap();
    fs::write(input.join("crime.csv"), crime_csv()).unwrap();
    fs::write(input.join("311.csv"), service_csv()).unwrap();

    let mut config = PipelineConfig {
        crime_path: input.join("crime.csv"),
        service_requests_path: input.join("311.csv"),
        output_dir: dir.join("output"),
        ..PipelineConfig::default()
    };
    if with_optional {
        fs::write(input.join("home_values.csv"), home_values_csv()).unwrap();
        fs::write(
            input.join("budget.csv"),
            "Department,Amount,Date\nPolice,\"$3,000\",2024-01-15\nPublic Works,1000,2024-02-01\nParks,1000,2024-02-03\n",
        )
        .unwrap();
        config.home_values_path = Some(input.join("home_values.csv"));
        config.budget_path = Some(input.join("budget.csv"));
    }
    config
}

struct CannedAnalysis;

#[async_trait]
impl InsightGenerator for CannedAnalysis {
    async fn generate(&self, prompt: &str, _max_tokens: u32) -> Result<String, InsightError> {
        assert!(prompt.contains("five-points"));
        Ok("Five Points carries most of the property crime.\n\n1. Fix the streetlights.".into())
    }
}

struct Unreachable;

#[async_trait]
impl InsightGenerator for Unreachable {
    async fn generate(&self, _prompt: &str, _max_tokens: u32) -> Result<String, InsightError> {
        Err(InsightError::Timeout)
    }
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_streetlight_and_crime_counts_per_neighborhood() {
    let dir = temp_dir("civic_value_index_it_counts");
    let config = write_sources(&dir, false);
    let analysis = analyze(&load_sources(&config).unwrap(), &config).unwrap();

    let five_points = analysis
        .profiles
        .iter()
        .find(|p| p.neighborhood.as_str() == "five-points")
        .unwrap();
    assert_eq!(five_points.metric(Metric::TotalCrimes), 10.0);
    assert_eq!(five_points.metric(Metric::PropertyCrimes), 10.0);
    assert_eq!(five_points.metric(Metric::TotalStreetlightRequests), 5.0);
    assert_eq!(five_points.metric(Metric::PendingStreetlightRequests), 5.0);

    let totals = &analysis.statistics.totals;
    assert_eq!(totals.total_crimes, 13.0);
    assert_eq!(totals.total_streetlight_requests, 5.0);
    assert_eq!(totals.pending_streetlight_requests, 5.0);
}

#[test]
fn test_crime_only_neighborhood_has_zero_service_metrics() {
    let dir = temp_dir("civic_value_index_it_zero_fill");
    let config = write_sources(&dir, false);
    let analysis = analyze(&load_sources(&config).unwrap(), &config).unwrap();

    let highland = analysis
        .profiles
        .iter()
        .find(|p| p.neighborhood.as_str() == "highland")
        .unwrap();
    assert_eq!(highland.metrics.get(&Metric::Total311Requests), Some(&0.0));
    assert_eq!(highland.metrics.get(&Metric::TotalStreetlightRequests), Some(&0.0));

    let sloan = analysis
        .profiles
        .iter()
        .find(|p| p.neighborhood.as_str() == "sloan-lake")
        .unwrap();
    assert_eq!(sloan.metrics.get(&Metric::TotalCrimes), Some(&0.0));
    assert_eq!(sloan.metric(Metric::Total311Requests), 1.0);
}

#[test]
fn test_profiles_do_not_depend_on_source_row_order() {
    let dir = temp_dir("civic_value_index_it_order");
    let config = write_sources(&dir, true);
    let sources = load_sources(&config).unwrap();
    let forward = analyze(&sources, &config).unwrap();

    let mut reversed = sources.clone();
    reversed.crime.rows.reverse();
    reversed.service_requests.rows.reverse();
    let backward = analyze(&reversed, &config).unwrap();

    assert_eq!(forward.profiles, backward.profiles);
    let keys: Vec<&str> = forward.profiles.iter().map(|p| p.neighborhood.as_str()).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(sorted, vec!["baker", "five-points", "highland", "sloan-lake"]);
}

#[test]
fn test_market_metrics_from_home_values() {
    let dir = temp_dir("civic_value_index_it_market");
    let config = write_sources(&dir, true);
    let analysis = analyze(&load_sources(&config).unwrap(), &config).unwrap();

    let highland = analysis
        .profiles
        .iter()
        .find(|p| p.neighborhood.as_str() == "highland")
        .unwrap();
    assert_eq!(highland.metric(Metric::CurrentHomeValue), 735000.0);
    assert!((highland.metric(Metric::YoyAppreciation) - 5.0).abs() < 1e-9);

    let budget = analysis.statistics.budget.as_ref().unwrap();
    assert_eq!(budget.total_spending, 5000.0);
    assert_eq!(budget.safety_spending, 3000.0);
    assert_eq!(budget.public_works_spending, 1000.0);
}

#[test]
fn test_ranks_are_a_permutation() {
    let dir = temp_dir("civic_value_index_it_ranks");
    let config = write_sources(&dir, true);
    let analysis = analyze(&load_sources(&config).unwrap(), &config).unwrap();

    let n = analysis.profiles.len();
    for p in &analysis.profiles {
        assert!(p.scores.rank >= 1 && p.scores.rank <= n);
        assert!((0.0..=100.0).contains(&p.scores.civic_value_index));
    }
    assert_eq!(analysis.profiles[0].scores.rank, 1);
}

#[test]
fn test_missing_input_file_is_an_error() {
    let dir = temp_dir("civic_value_index_it_missing");
    let config = PipelineConfig {
        crime_path: dir.join("nope.csv"),
        ..PipelineConfig::default()
    };
    assert!(load_sources(&config).is_err());
}

#[tokio::test]
async fn test_full_run_writes_bundle_and_reports() {
    let dir = temp_dir("civic_value_index_it_full_run");
    let config = write_sources(&dir, true);

    let outcome = pipeline::run(&config, Some(&CannedAnalysis)).await.unwrap();
    assert!(outcome.insights.available);
    assert_eq!(outcome.insights.summary, "Five Points carries most of the property crime.");

    let out = &config.output_dir;
    assert!(out.join(RESULTS_FILE).exists());
    assert!(out.join(SUMMARY_FILE).exists());
    assert!(out.join(PROFILES_FILE).exists());
    assert_eq!(outcome.reports.len(), 4);
    assert!(out.join(REPORTS_DIR).join("five-points_report.txt").exists());

    let bundle = read_json(&out.join(RESULTS_FILE));
    let rows = bundle["neighborhoods"].as_array().unwrap();
    assert_eq!(rows.len(), outcome.analysis.profiles.len());
    for (row, profile) in rows.iter().zip(&outcome.analysis.profiles) {
        assert_eq!(row["neighborhood"], profile.neighborhood.as_str());
        assert_eq!(row["total_crimes"].as_f64(), Some(profile.metric(Metric::TotalCrimes)));
        assert_eq!(row["civic_value_index"].as_f64(), Some(round1(profile.scores.civic_value_index)));
        assert_eq!(row["safety_score"].as_f64(), Some(round1(profile.scores.safety)));
    }
    assert_eq!(bundle["ai_insights"]["available"], true);
    assert_eq!(bundle["metadata"]["neighborhoods_analyzed"], 4);

    let summary = read_json(&out.join(SUMMARY_FILE));
    assert_eq!(summary["neighborhoods_analyzed"], 4);
    assert_eq!(
        summary["top_neighborhood"]["neighborhood"],
        outcome.analysis.profiles[0].neighborhood.as_str()
    );

    let csv = fs::read_to_string(out.join(PROFILES_FILE)).unwrap();
    assert_eq!(csv.lines().count(), 5);
}

#[tokio::test]
async fn test_run_without_credential_marks_insights_unavailable() {
    let dir = temp_dir("civic_value_index_it_no_key");
    let config = write_sources(&dir, false);

    let outcome = pipeline::run(&config, None).await.unwrap();
    assert!(!outcome.insights.available);

    let bundle = read_json(&config.output_dir.join(RESULTS_FILE));
    assert_eq!(bundle["ai_insights"]["available"], false);
    assert_eq!(bundle["ai_insights"]["summary"], "AI insights unavailable");
    assert!(!bundle["neighborhoods"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_insight_call_does_not_fail_run() {
    let dir = temp_dir("civic_value_index_it_timeout");
    let config = write_sources(&dir, false);

    let outcome = pipeline::run(&config, Some(&Unreachable)).await.unwrap();
    assert!(!outcome.insights.available);
    assert!(outcome.insights.reason.is_some());
    assert!(config.output_dir.join(RESULTS_FILE).exists());
}

#[test]
fn test_empty_tables_still_analyze() {
    let analysis = analyze(&SourceTables::default(), &PipelineConfig::default()).unwrap();
    assert!(analysis.profiles.is_empty());
}

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use civic_value_index::analyzers::types::{Metric, round1};
use civic_value_index::api::{AppState, router};
use civic_value_index::config::PipelineConfig;
use civic_value_index::output::RESULTS_FILE;
use civic_value_index::pipeline::{self, RunOutcome};
use serde_json::Value;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tower::ServiceExt;

fn temp_dir(name: &str) -> PathBuf {
    let dir = env::temp_dir().join(name);
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

async fn get(state: AppState, uri: &str) -> (StatusCode, Value) {
    let response = router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn run_pipeline(dir: &Path) -> RunOutcome {
    let raw = dir.join("raw");
    fs::create_dir_all(&raw).unwrap();
    fs::write(
        raw.join("crime.csv"),
        "OFFENSE_CATEGORY_ID,FIRST_OCCURRENCE_DATE,GEO_LAT,GEO_LON,NEIGHBORHOOD_ID\n\
         burglary,2024-03-01 10:00:00,39.755,-104.987,five-points\n\
         burglary,2024-03-02 22:00:00,39.755,-104.987,five-points\n\
         robbery,2024-03-03 13:00:00,39.716,-104.993,baker\n\
         larceny,2024-03-04 07:00:00,39.764,-105.012,highland\n",
    )
    .unwrap();
    fs::write(
        raw.join("311.csv"),
        "Case Summary,Case Status,Neighborhood\n\
         Streetlight out,Open,Five Points\n\
         Pothole,Closed,Baker\n",
    )
    .unwrap();

    let config = PipelineConfig {
        crime_path: raw.join("crime.csv"),
        service_requests_path: raw.join("311.csv"),
        output_dir: dir.join("output"),
        ..PipelineConfig::default()
    };
    pipeline::run(&config, None).await.unwrap()
}

#[tokio::test]
async fn test_no_bundle_is_data_not_available() {
    let dir = temp_dir("civic_value_index_api_empty");

    let (status, body) = get(AppState::new(&dir, false), "/api/analysis").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "data_not_available");

    let (status, body) = get(AppState::new(&dir, false), "/api/summary").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "data_not_available");

    let (status, body) = get(AppState::new(&dir, true), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "no_data");
    assert_eq!(body["data_available"]["analysis"], false);
    assert_eq!(body["api_key_configured"], true);
}

#[tokio::test]
async fn test_root_lists_endpoints() {
    let dir = temp_dir("civic_value_index_api_root");
    let (status, body) = get(AppState::new(&dir, false), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "online");
    assert!(body["endpoints"].get("GET /api/neighborhoods").is_some());
}

#[tokio::test]
async fn test_bundle_round_trips_through_api() {
    let dir = temp_dir("civic_value_index_api_bundle");
    let outcome = run_pipeline(&dir).await;
    let out = dir.join("output");

    let (status, body) = get(AppState::new(&out, false), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["data_available"]["summary"], true);

    let (status, body) = get(AppState::new(&out, false), "/api/neighborhoods").await;
    assert_eq!(status, StatusCode::OK);
    let rows = body["neighborhoods"].as_array().unwrap();
    assert_eq!(rows.len(), outcome.analysis.profiles.len());
    assert!(body["metadata"]["generated_at"].is_string());

    for (row, profile) in rows.iter().zip(&outcome.analysis.profiles) {
        assert_eq!(row["neighborhood"], profile.neighborhood.as_str());
        assert_eq!(
            row["pending_streetlight_requests"].as_f64(),
            Some(profile.metric(Metric::PendingStreetlightRequests))
        );
        assert_eq!(row["service_score"].as_f64(), Some(round1(profile.scores.service)));
        assert_eq!(row["rank"].as_u64(), Some(profile.scores.rank as u64));
    }

    let (status, body) = get(AppState::new(&out, false), "/api/insights").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], false);

    let (status, body) = get(AppState::new(&out, false), "/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totals"]["total_crimes"], 4.0);
}

#[tokio::test]
async fn test_neighborhood_lookup_and_search() {
    let dir = temp_dir("civic_value_index_api_lookup");
    run_pipeline(&dir).await;
    let out = dir.join("output");

    let (status, body) = get(AppState::new(&out, false), "/api/neighborhoods/Five%20Points").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["neighborhood"], "five-points");
    assert_eq!(body["total_crimes"], 2.0);
    assert_eq!(body["total_streetlight_requests"], 1.0);

    let (status, body) = get(AppState::new(&out, false), "/api/neighborhoods/atlantis").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = get(AppState::new(&out, false), "/api/search?q=bak").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["neighborhood"], "baker");

    let (_, body) = get(AppState::new(&out, false), "/api/search?q=zzz").await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_malformed_bundle_is_server_error() {
    let dir = temp_dir("civic_value_index_api_malformed");
    fs::write(dir.join(RESULTS_FILE), "{ \"neighborhoods\": ").unwrap();

    let (status, body) = get(AppState::new(&dir, false), "/api/analysis").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "malformed_bundle");
}

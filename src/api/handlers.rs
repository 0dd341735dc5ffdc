use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::warn;

use super::AppState;
use crate::error::QueryError;

impl QueryError {
    fn status(&self) -> StatusCode {
        match self {
            QueryError::DataUnavailable { .. } | QueryError::NotFound(_) => StatusCode::NOT_FOUND,
            QueryError::Malformed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            QueryError::DataUnavailable { .. } => "data_not_available",
            QueryError::NotFound(_) => "not_found",
            QueryError::Malformed { .. } => "malformed_bundle",
        }
    }
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        if matches!(self, QueryError::Malformed { .. }) {
            warn!(error = %self, "Output bundle could not be read");
        }
        let body = json!({ "error": self.code(), "message": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

type ApiResult = Result<Json<Value>, QueryError>;

/// GET / - service description
pub async fn root() -> Json<Value> {
    Json(json!({
        "service": "Civic Value Index API",
        "status": "online",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "GET /": "This status page",
            "GET /health": "Health check",
            "GET /api/analysis": "Full analysis results",
            "GET /api/summary": "Quick summary",
            "GET /api/neighborhoods": "All neighborhood profiles",
            "GET /api/neighborhoods/{name}": "One neighborhood profile",
            "GET /api/search?q=": "Search neighborhoods by name",
            "GET /api/stats": "Run statistics",
            "GET /api/insights": "AI-generated insights"
        }
    }))
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let analysis = tokio::fs::try_exists(state.store.results_path()).await.unwrap_or(false);
    let summary = tokio::fs::try_exists(state.store.summary_path()).await.unwrap_or(false);

    Json(json!({
        "status": if analysis { "healthy" } else { "no_data" },
        "timestamp": Utc::now().to_rfc3339(),
        "data_available": { "analysis": analysis, "summary": summary },
        "api_key_configured": state.api_key_configured,
    }))
}

/// GET /api/analysis
pub async fn analysis(State(state): State<Arc<AppState>>) -> ApiResult {
    Ok(Json(state.store.analysis().await?))
}

/// GET /api/summary
pub async fn summary(State(state): State<Arc<AppState>>) -> ApiResult {
    Ok(Json(state.store.summary().await?))
}

/// GET /api/neighborhoods
pub async fn neighborhoods(State(state): State<Arc<AppState>>) -> ApiResult {
    let mut bundle = state.store.analysis().await?;
    let neighborhoods = bundle
        .get_mut("neighborhoods")
        .map(Value::take)
        .ok_or_else(|| QueryError::NotFound("neighborhoods".into()))?;
    let metadata = bundle.get_mut("metadata").map(Value::take).unwrap_or_else(|| json!({}));
    Ok(Json(json!({ "neighborhoods": neighborhoods, "metadata": metadata })))
}

/// GET /api/neighborhoods/{name}
pub async fn neighborhood(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> ApiResult {
    Ok(Json(state.store.neighborhood(&name).await?))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    q: String,
}

/// GET /api/search?q=
pub async fn search(State(state): State<Arc<AppState>>, Query(params): Query<SearchParams>) -> ApiResult {
    let results = state.store.search(&params.q).await?;
    Ok(Json(json!({ "query": params.q, "count": results.len(), "results": results })))
}

/// GET /api/stats
pub async fn stats(State(state): State<Arc<AppState>>) -> ApiResult {
    Ok(Json(state.store.section("statistics").await?))
}

/// GET /api/insights
pub async fn insights(State(state): State<Arc<AppState>>) -> ApiResult {
    Ok(Json(state.store.section("ai_insights").await?))
}

//! HTTP request handlers

use std::sync::Arc;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::error::{Result, ServerError};
use super::state::{AppState, DateRange, PreprocessSummary};

const NO_FEATURES: &str = "No stored feature data";

pub async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "ECOS Data Preprocessing API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Load indicators, run the pipeline and persist the feature rows
pub async fn run_preprocessing(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PreprocessSummary>> {
    info!("Preprocessing requested");
    let worker = Arc::clone(&state);
    let summary = tokio::task::spawn_blocking(move || worker.preprocess())
        .await
        .map_err(|e| ServerError::Internal(format!("Preprocessing task failed: {}", e)))??;
    Ok(Json(summary))
}

/// Persist the rows of a run the store rejected, without recomputing
pub async fn persist_pending(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PreprocessSummary>> {
    let worker = Arc::clone(&state);
    let summary = tokio::task::spawn_blocking(move || worker.persist_pending())
        .await
        .map_err(|e| ServerError::Internal(format!("Persist task failed: {}", e)))??;
    Ok(Json(summary))
}

#[derive(Debug, Serialize)]
struct FeatureInfo {
    feature_name: String,
    correlation_with_targets: Option<f64>,
    selected: bool,
}

/// Describe the stored feature columns
pub async fn get_feature_info(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>> {
    let stored = state.store.load_features()?;
    let Some((start, end)) = stored.date_range() else {
        return Ok(Json(json!({ "message": NO_FEATURES, "features": [] })));
    };

    let selection = state.last_selection();
    let features: Vec<FeatureInfo> = stored
        .columns
        .iter()
        .map(|name| FeatureInfo {
            feature_name: name.clone(),
            correlation_with_targets: selection
                .as_ref()
                .and_then(|s| s.correlation.get(name).copied()),
            selected: selection.as_ref().map_or(true, |s| s.is_selected(name)),
        })
        .collect();

    Ok(Json(json!({
        "total_features": stored.columns.len(),
        "total_rows": stored.len(),
        "date_range": DateRange::new(start, end),
        "features": features,
    })))
}

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    limit: Option<usize>,
}

/// The latest stored feature rows
pub async fn get_data_preview(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<PreviewQuery>, QueryRejection>,
) -> Result<Json<serde_json::Value>> {
    let Query(query) = query.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let stored = state.store.load_features()?;
    if stored.is_empty() {
        return Ok(Json(json!({ "message": NO_FEATURES, "data": [] })));
    }

    let preview = stored.tail(query.limit.unwrap_or(10));
    Ok(Json(json!({
        "total_rows": stored.len(),
        "preview_rows": preview.len(),
        "data": stored.records(preview),
    })))
}

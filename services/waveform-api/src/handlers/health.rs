//! Health and metrics handlers.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub events: usize,
    pub stations: usize,
    pub waveforms: usize,
}

/// GET /health - Basic health check with catalog sizes
pub async fn health_handler(Extension(state): Extension<Arc<AppState>>) -> ApiResult<Json<HealthResponse>> {
    let archive = state.archive();
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        events: archive.events.count().await?,
        stations: archive.stations.count().await?,
        waveforms: archive.waveforms.count().await?,
    }))
}

/// GET /metrics - Prometheus metrics
pub async fn metrics_handler(Extension(handle): Extension<PrometheusHandle>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
        .into_response()
}

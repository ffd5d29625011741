//! Station endpoints.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::Response,
    Json,
};
use bytes::Bytes;
use seis_common::{SeisError, StationFormat, StationKey};
use serde::{Deserialize, Serialize};
use storage::FilepathId;

use super::{attachment, listing, presentation, require, ListParams};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StationUploadParams {
    /// seed, xseed or resp; detected when absent.
    pub format: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StationUploadResponse {
    pub format: String,
    pub filepath_id: FilepathId,
    pub stations: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StationParams {
    pub network: Option<String>,
    pub station: Option<String>,
    pub format: Option<String>,
}

/// POST /event_based_data/station - Upload SEED, XML-SEED or RESP metadata
pub async fn upload_station_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<StationUploadParams>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<StationUploadResponse>)> {
    if body.is_empty() {
        return Err(SeisError::MissingParameter("body".to_string()).into());
    }
    let declared = match params.format.as_deref().filter(|f| !f.is_empty()) {
        Some(name) => Some(StationFormat::from_name(name).ok_or_else(|| {
            SeisError::UnsupportedFormat(format!("'{}' is not a station format", name))
        })?),
        None => None,
    };

    let report = state.pipeline.ingest_station(declared, body).await?;
    Ok((
        StatusCode::CREATED,
        Json(StationUploadResponse {
            format: report.format.name().to_string(),
            filepath_id: report.filepath,
            stations: report.stations.iter().map(ToString::to_string).collect(),
        }),
    ))
}

/// GET /event_based_data/station
///
/// Without `format` this returns the most recently uploaded metadata file
/// of the station. With one, the decoded record is rendered instead.
/// Stations that only exist through waveform uploads have no file and are
/// always rendered.
pub async fn get_station_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<StationParams>,
) -> ApiResult<Response> {
    let key = StationKey::new(
        require("network", params.network)?,
        require("station", params.station)?,
    );
    let detail = state.lists.station(&key).await?;

    if params.format.as_deref().map_or(true, str::is_empty) {
        if let Some(latest) = detail.metadata_file.last() {
            let payload = state.negotiator.download(latest).await?;
            return Ok(attachment(payload));
        }
    }

    let format = presentation(params.format.as_deref())?;
    let body = retrieval::render(std::slice::from_ref(&detail), format, &key.to_string())?;
    Ok(listing(body, format))
}

/// GET /event_based_data/station/getList
pub async fn list_stations_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> ApiResult<Response> {
    let format = presentation(params.format.as_deref())?;
    let stations = state.lists.stations().await?;
    let body = retrieval::render(&stations, format, "Stations")?;
    Ok(listing(body, format))
}

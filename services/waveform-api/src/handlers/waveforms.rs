//! Waveform upload, fetch and listing.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::Response,
    Json,
};
use bytes::Bytes;
use ingestion::{IngestionReport, WaveformUpload};
use retrieval::WaveformQuery;
use seis_common::{ChannelId, OutputFormat, SeisError, StationKey, Tag, WaveformFormat, WaveformKey};
use serde::{Deserialize, Serialize};
use storage::{FilepathId, StorageMode};
use tracing::info;
use uuid::Uuid;

use super::{attachment, flag, listing, presentation, require, tag};
use crate::error::{status_of, ApiResult, ErrorBody};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct WaveformUploadParams {
    pub event: Option<String>,
    pub tag: Option<String>,
    pub synthetic: Option<String>,
    /// Absolute path of a file to index in place instead of a body.
    pub index_file: Option<String>,
    pub format: Option<String>,
    pub replace: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WaveformParams {
    pub event: Option<String>,
    pub channel_id: Option<String>,
    pub station_id: Option<String>,
    pub tag: Option<String>,
    pub synthetic: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentResponse {
    pub channel_id: String,
    pub trace_index: usize,
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestionResponse {
    pub event: String,
    pub tag: String,
    pub storage_mode: StorageMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filepath_id: Option<FilepathId>,
    pub registered: usize,
    /// `PARTIAL_INGESTION` when only some components registered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub components: Vec<ComponentResponse>,
}

impl From<&IngestionReport> for IngestionResponse {
    fn from(report: &IngestionReport) -> Self {
        let components = report
            .components
            .iter()
            .map(|c| {
                let (id, error) = match &c.result {
                    Ok(id) => (Some(*id), None),
                    Err(e) => (None, Some(ErrorBody::from(e))),
                };
                ComponentResponse {
                    channel_id: c.channel_id.to_string(),
                    trace_index: c.trace_index,
                    stage: c.stage.to_string(),
                    id,
                    code: error.as_ref().map(|e| e.code.to_string()),
                    error: error.map(|e| e.message),
                }
            })
            .collect();
        let partial = report.partial_error();
        Self {
            code: partial.as_ref().map(|e| e.error_code().to_string()),
            error: partial.map(|e| e.to_string()),
            event: report.event.clone(),
            tag: report.tag.to_string(),
            storage_mode: report.storage_mode,
            filepath_id: report.filepath,
            registered: report.registered(),
            components,
        }
    }
}

/// 201 when every component registered, 207 when some did, otherwise the
/// status of the first component error.
fn ingestion_status(report: &IngestionReport) -> StatusCode {
    if report.is_complete() {
        StatusCode::CREATED
    } else if let Some(partial) = report.partial_error() {
        status_of(&partial)
    } else {
        report
            .first_error()
            .map(status_of)
            .unwrap_or(StatusCode::UNSUPPORTED_MEDIA_TYPE)
    }
}

fn waveform_format(value: Option<&str>) -> Result<Option<WaveformFormat>, SeisError> {
    match value.filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(name) => WaveformFormat::from_name(name)
            .map(Some)
            .ok_or_else(|| SeisError::UnsupportedFormat(format!("'{}' is not a waveform format", name))),
    }
}

/// POST /event_based_data/waveform - Upload or index a waveform file
pub async fn upload_waveform_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<WaveformUploadParams>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<IngestionResponse>)> {
    let event = require("event", params.event)?;
    let mut upload = match params.index_file.filter(|p| !p.is_empty()) {
        Some(path) => {
            let mut upload = WaveformUpload::indexed(event, PathBuf::from(path));
            if !body.is_empty() {
                upload.body = Some(body);
            }
            upload
        }
        None => WaveformUpload::managed(event, body),
    };
    upload = upload
        .with_tag(tag(params.tag))
        .synthetic(flag("synthetic", params.synthetic.as_deref())?)
        .replacing(flag("replace", params.replace.as_deref())?);
    if let Some(format) = waveform_format(params.format.as_deref())? {
        upload = upload.with_format(format);
    }

    let report = state.pipeline.ingest_waveform(upload).await?;
    let status = ingestion_status(&report);
    info!(
        event = %report.event,
        registered = report.registered(),
        total = report.components.len(),
        status = status.as_u16(),
        "Waveform upload finished"
    );
    Ok((status, Json(IngestionResponse::from(&report))))
}

/// GET /event_based_data/waveform - Fetch one waveform
pub async fn get_waveform_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<WaveformParams>,
) -> ApiResult<Response> {
    let event = require("event", params.event)?;
    let channel = ChannelId::parse(&require("channel_id", params.channel_id)?)?;
    let synthetic = flag("synthetic", params.synthetic.as_deref())?;
    let key = WaveformKey::new(event, channel, tag(params.tag), synthetic);
    let output = OutputFormat::from_query_param(params.format.as_deref().unwrap_or_default())?;

    let payload = state.negotiator.fetch(&key, output).await?;
    Ok(attachment(payload))
}

/// GET /event_based_data/waveform/getList
pub async fn list_waveforms_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<WaveformParams>,
) -> ApiResult<Response> {
    let format = presentation(params.format.as_deref())?;
    let query = WaveformQuery {
        event: params.event.filter(|e| !e.is_empty()),
        channel_id: params
            .channel_id
            .filter(|c| !c.is_empty())
            .map(|c| ChannelId::parse(&c))
            .transpose()?,
        station_id: params
            .station_id
            .filter(|s| !s.is_empty())
            .map(|s| StationKey::parse(&s))
            .transpose()?,
        tag: params.tag.map(Tag::new),
        synthetic: match params.synthetic.as_deref() {
            None => None,
            value => Some(flag("synthetic", value)?),
        },
    };

    let rows = state.lists.waveforms(&query).await?;
    let body = retrieval::render(&rows, format, "Waveforms")?;
    Ok(listing(body, format))
}

//! HTTP request handlers for the waveform API.

pub mod events;
pub mod files;
pub mod health;
pub mod stations;
pub mod waveforms;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use retrieval::Payload;
use seis_common::{PresentationFormat, SeisError, SeisResult, Tag};
use serde::Deserialize;

/// Query of every `getList` endpoint that takes no filters.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub format: Option<String>,
}

pub(crate) fn require(param: &'static str, value: Option<String>) -> SeisResult<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(SeisError::MissingParameter(param.to_string())),
    }
}

/// Boolean query flag. Absent means false.
pub(crate) fn flag(param: &str, value: Option<&str>) -> SeisResult<bool> {
    match value.map(|v| v.trim().to_lowercase()).as_deref() {
        None | Some("") | Some("false") | Some("0") => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some(other) => Err(SeisError::invalid_parameter(
            param,
            format!("'{}' is not a boolean", other),
        )),
    }
}

/// Absent or empty tag means the raw recording.
pub(crate) fn tag(value: Option<String>) -> Tag {
    value.map(Tag::new).unwrap_or(Tag::RAW)
}

pub(crate) fn presentation(value: Option<&str>) -> SeisResult<PresentationFormat> {
    let value = value.unwrap_or_default();
    PresentationFormat::from_query_param(value).ok_or_else(|| {
        SeisError::invalid_parameter(
            "format",
            format!("'{}' is not one of xml, json, html", value),
        )
    })
}

pub(crate) fn listing(body: String, format: PresentationFormat) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, format.content_type())],
        body,
    )
        .into_response()
}

/// A payload as a download, named by its file name only.
pub(crate) fn attachment(payload: Payload) -> Response {
    let disposition = format!(
        "attachment; filename=\"{}\"",
        payload.file_name.replace('"', "")
    );
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, payload.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        payload.data,
    )
        .into_response()
}

//! Event endpoints.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use seis_common::SeisError;
use serde::{Deserialize, Serialize};

use super::{flag, listing, presentation, require, ListParams};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct EventParams {
    pub name: Option<String>,
    pub replace: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventResponse {
    pub name: String,
}

/// POST /event_based_data/event - Upload a QuakeML document
pub async fn upload_event_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<EventParams>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<EventResponse>)> {
    if body.is_empty() {
        return Err(SeisError::MissingParameter("body".to_string()).into());
    }
    let replace = flag("replace", params.replace.as_deref())?;
    let name = state
        .pipeline
        .ingest_event(params.name.as_deref().filter(|n| !n.is_empty()), body, replace)
        .await?;
    Ok((StatusCode::CREATED, Json(EventResponse { name })))
}

/// GET /event_based_data/event - The QuakeML document of one event
pub async fn get_event_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<EventParams>,
) -> ApiResult<Response> {
    let name = require("name", params.name)?;
    let event = state.archive().events.get(&name).await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml; charset=UTF-8")],
        event.payload,
    )
        .into_response())
}

/// DELETE /event_based_data/event - Remove an event. Its waveforms stay.
pub async fn delete_event_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<EventParams>,
) -> ApiResult<Json<EventResponse>> {
    let name = require("name", params.name)?;
    let event = state.archive().events.delete(&name).await?;
    Ok(Json(EventResponse { name: event.name }))
}

/// GET /event_based_data/event/getList
pub async fn list_events_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> ApiResult<Response> {
    let format = presentation(params.format.as_deref())?;
    let events = state.lists.events().await?;
    let body = retrieval::render(&events, format, "Events")?;
    Ok(listing(body, format))
}

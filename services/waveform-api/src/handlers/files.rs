//! Download indirection for opaque file references.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    response::Response,
};
use serde::Deserialize;
use storage::FilepathId;

use super::{attachment, require};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    pub filepath_id: Option<String>,
}

/// GET /event_based_data/downloadFile?filepath_id=...
pub async fn download_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<DownloadParams>,
) -> ApiResult<Response> {
    let id: FilepathId = require("filepath_id", params.filepath_id)?.parse()?;
    let payload = state.negotiator.download(&id).await?;
    Ok(attachment(payload))
}

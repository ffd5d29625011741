//! JSON error envelope for every handler.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::Serialize;
use seis_common::SeisError;
use tracing::{debug, error};

pub type ApiResult<T> = Result<T, ApiError>;

/// Body of every error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl From<&SeisError> for ErrorBody {
    fn from(err: &SeisError) -> Self {
        Self {
            code: err.error_code(),
            message: err.to_string(),
            key: err.offending_key(),
        }
    }
}

pub fn status_of(err: &SeisError) -> StatusCode {
    StatusCode::from_u16(err.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

#[derive(Debug)]
pub struct ApiError(pub SeisError);

impl From<SeisError> for ApiError {
    fn from(err: SeisError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_of(&self.0);
        if status.is_server_error() {
            error!(code = self.0.error_code(), error = %self.0, "Request failed");
        } else {
            debug!(code = self.0.error_code(), error = %self.0, "Request rejected");
        }
        counter!("http_errors_total", "code" => self.0.error_code()).increment(1);
        (status, Json(ErrorBody::from(&self.0))).into_response()
    }
}

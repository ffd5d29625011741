//! Error types for the seismic archive.

use std::fmt;

use thiserror::Error;

use crate::ids::WaveformKey;

/// Result type alias using SeisError.
pub type SeisResult<T> = Result<T, SeisError>;

/// Kind of resource a lookup was aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Event,
    Station,
    Waveform,
    File,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Event => "Event",
            ResourceKind::Station => "Station",
            ResourceKind::Waveform => "Waveform",
            ResourceKind::File => "File",
        };
        f.write_str(name)
    }
}

/// Primary error type for archive operations.
#[derive(Debug, Error)]
pub enum SeisError {
    // === Identity Errors ===
    #[error("{kind} not found: {key}")]
    NotFound { kind: ResourceKind, key: String },

    #[error("Event already exists: {0}")]
    DuplicateEvent(String),

    #[error("Waveform already registered: {0}")]
    DuplicateKey(WaveformKey),

    #[error("Identical file content is already registered (sha256 {0})")]
    DuplicateContent(String),

    #[error("Event '{0}' is not known, every waveform must be bound to an existing event")]
    UnboundEvent(String),

    // === Format Errors ===
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Cannot convert {from} data to {to}")]
    UnsupportedConversion { from: String, to: String },

    #[error("Codec error: {0}")]
    Codec(String),

    // === Request Errors ===
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Only {registered} of {total} components were registered")]
    PartialIngestion { registered: usize, total: usize },

    // === Infrastructure Errors ===
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl SeisError {
    pub fn not_found(kind: ResourceKind, key: impl Into<String>) -> Self {
        SeisError::NotFound {
            kind,
            key: key.into(),
        }
    }

    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        SeisError::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            SeisError::NotFound { .. } => "NOT_FOUND",
            SeisError::DuplicateEvent(_) => "DUPLICATE_EVENT",
            SeisError::DuplicateKey(_) => "DUPLICATE_KEY",
            SeisError::DuplicateContent(_) => "DUPLICATE_CONTENT",
            SeisError::UnboundEvent(_) => "UNBOUND_EVENT",
            SeisError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            SeisError::UnsupportedConversion { .. } => "UNSUPPORTED_CONVERSION",
            SeisError::Codec(_) => "CODEC_ERROR",
            SeisError::MissingParameter(_) => "MISSING_PARAMETER",
            SeisError::InvalidParameter { .. } => "INVALID_PARAMETER",
            SeisError::PartialIngestion { .. } => "PARTIAL_INGESTION",
            SeisError::StorageError(_) => "STORAGE_ERROR",
            SeisError::DatabaseError(_) => "DATABASE_ERROR",
            SeisError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// The offending key, when the error is about one specific resource.
    pub fn offending_key(&self) -> Option<String> {
        match self {
            SeisError::NotFound { key, .. } => Some(key.clone()),
            SeisError::DuplicateEvent(name) | SeisError::UnboundEvent(name) => Some(name.clone()),
            SeisError::DuplicateKey(key) => Some(key.to_string()),
            SeisError::DuplicateContent(checksum) => Some(checksum.clone()),
            SeisError::InvalidParameter { param, .. } => Some(param.clone()),
            SeisError::MissingParameter(param) => Some(param.clone()),
            _ => None,
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            SeisError::MissingParameter(_)
            | SeisError::InvalidParameter { .. }
            | SeisError::UnboundEvent(_) => 400,

            SeisError::NotFound { .. } => 404,

            SeisError::DuplicateEvent(_)
            | SeisError::DuplicateKey(_)
            | SeisError::DuplicateContent(_) => 409,

            SeisError::UnsupportedFormat(_)
            | SeisError::UnsupportedConversion { .. }
            | SeisError::Codec(_) => 415,

            SeisError::PartialIngestion { .. } => 207,

            SeisError::StorageError(_) | SeisError::DatabaseError(_) | SeisError::InternalError(_) => 500,
        }
    }
}

impl From<std::io::Error> for SeisError {
    fn from(err: std::io::Error) -> Self {
        SeisError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for SeisError {
    fn from(err: serde_json::Error) -> Self {
        SeisError::InternalError(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{ChannelId, Tag};

    #[test]
    fn test_status_codes() {
        assert_eq!(
            SeisError::not_found(ResourceKind::Event, "quake1").http_status_code(),
            404
        );
        assert_eq!(SeisError::DuplicateEvent("1".into()).http_status_code(), 409);
        assert_eq!(SeisError::UnboundEvent("x".into()).http_status_code(), 400);
        assert_eq!(
            SeisError::UnsupportedConversion {
                from: "SAC".into(),
                to: "SEGY".into()
            }
            .http_status_code(),
            415
        );
    }

    #[test]
    fn test_offending_key_for_duplicate() {
        let key = WaveformKey::new(
            "quake1",
            ChannelId::new("BW", "FURT", "", "EHZ"),
            Tag::RAW,
            false,
        );
        let err = SeisError::DuplicateKey(key.clone());
        assert_eq!(err.error_code(), "DUPLICATE_KEY");
        assert_eq!(err.offending_key(), Some(key.to_string()));
    }

    #[test]
    fn test_not_found_message() {
        let err = SeisError::not_found(ResourceKind::Station, "BW.FURT");
        assert_eq!(err.to_string(), "Station not found: BW.FURT");
    }
}

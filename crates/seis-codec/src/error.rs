//! Error types for codec operations.

use seis_common::SeisError;
use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Error types for decoding and encoding seismic data.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The codec has no reader for this format.
    #[error("Decoding {0} is not supported")]
    DecodeUnsupported(String),

    /// The codec has no writer for this format.
    #[error("Encoding to {0} is not supported")]
    EncodeUnsupported(String),

    /// The payload claims to be a format but does not parse as one.
    #[error("Malformed {format} data: {message}")]
    Malformed { format: String, message: String },

    /// The target format cannot hold the given number of traces.
    #[error("{format} holds exactly one trace, got {count}")]
    TraceCount { format: String, count: usize },

    /// XML syntax error.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

impl CodecError {
    pub fn malformed(format: &str, message: impl Into<String>) -> Self {
        CodecError::Malformed {
            format: format.to_string(),
            message: message.into(),
        }
    }
}

impl From<CodecError> for SeisError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::DecodeUnsupported(_)
            | CodecError::Malformed { .. }
            | CodecError::Xml(_) => SeisError::UnsupportedFormat(err.to_string()),
            CodecError::EncodeUnsupported(_) | CodecError::TraceCount { .. } => {
                SeisError::Codec(err.to_string())
            }
        }
    }
}

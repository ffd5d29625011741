//! Closed sets of the formats the archive accepts and produces.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SeisError;

/// Encodings a waveform file may arrive in or be converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WaveformFormat {
    #[serde(rename = "MSEED")]
    MiniSeed,
    Sac,
    Gse2,
    Segy,
}

impl WaveformFormat {
    pub const ALL: [WaveformFormat; 4] = [
        WaveformFormat::MiniSeed,
        WaveformFormat::Sac,
        WaveformFormat::Gse2,
        WaveformFormat::Segy,
    ];

    /// Canonical upper-case name, as stored in the registry.
    pub fn name(&self) -> &'static str {
        match self {
            WaveformFormat::MiniSeed => "MSEED",
            WaveformFormat::Sac => "SAC",
            WaveformFormat::Gse2 => "GSE2",
            WaveformFormat::Segy => "SEGY",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            WaveformFormat::MiniSeed => "mseed",
            WaveformFormat::Sac => "sac",
            WaveformFormat::Gse2 => "gse2",
            WaveformFormat::Segy => "segy",
        }
    }

    /// Parse a format name, accepting the usual aliases.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "mseed" | "miniseed" => Some(WaveformFormat::MiniSeed),
            "sac" => Some(WaveformFormat::Sac),
            "gse2" | "gse" => Some(WaveformFormat::Gse2),
            "segy" | "sgy" => Some(WaveformFormat::Segy),
            _ => None,
        }
    }
}

impl fmt::Display for WaveformFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WaveformFormat {
    type Err = SeisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| {
            SeisError::UnsupportedFormat(format!("'{}' is not a known waveform format", s))
        })
    }
}

/// Encodings accepted for station metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StationFormat {
    Seed,
    #[serde(rename = "XSEED")]
    XSeed,
    Resp,
}

impl StationFormat {
    pub fn name(&self) -> &'static str {
        match self {
            StationFormat::Seed => "SEED",
            StationFormat::XSeed => "XSEED",
            StationFormat::Resp => "RESP",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "seed" | "dataless" => Some(StationFormat::Seed),
            "xseed" | "xml-seed" | "xmlseed" => Some(StationFormat::XSeed),
            "resp" => Some(StationFormat::Resp),
            _ => None,
        }
    }
}

impl fmt::Display for StationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StationFormat {
    type Err = SeisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| {
            SeisError::UnsupportedFormat(format!(
                "'{}' is not a station format, use SEED, XSEED or RESP",
                s
            ))
        })
    }
}

/// What a waveform fetch should return. A fetch without any output format
/// returns the original upload verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Every component of the bundle in one archive of original files.
    Raw,
    /// Decoded samples as time/value pairs.
    Json,
    /// Re-encoded through the codec.
    Encoded(WaveformFormat),
}

impl OutputFormat {
    /// Parse the `format` query parameter. Empty and "original" mean no
    /// conversion and yield `Ok(None)`.
    pub fn from_query_param(f: &str) -> Result<Option<Self>, SeisError> {
        let lower = f.trim().to_lowercase();
        match lower.as_str() {
            "" | "original" => Ok(None),
            "raw" => Ok(Some(OutputFormat::Raw)),
            "json" => Ok(Some(OutputFormat::Json)),
            other => match WaveformFormat::from_name(other) {
                Some(format) => Ok(Some(OutputFormat::Encoded(format))),
                None => Err(SeisError::invalid_parameter(
                    "format",
                    format!(
                        "'{}' is an unsupported format. Supported formats: mseed, sac, gse2, segy, raw, json",
                        f
                    ),
                )),
            },
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Raw => f.write_str("raw"),
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Encoded(format) => write!(f, "{}", format),
        }
    }
}

/// Presentation of listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresentationFormat {
    #[default]
    Xml,
    Json,
    Html,
}

impl PresentationFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            PresentationFormat::Xml => "application/xml; charset=UTF-8",
            PresentationFormat::Json => "application/json; charset=UTF-8",
            PresentationFormat::Html => "text/html; charset=UTF-8",
        }
    }

    pub fn from_query_param(f: &str) -> Option<Self> {
        match f.trim().to_lowercase().as_str() {
            "" | "xml" | "xhtml" => Some(PresentationFormat::Xml),
            "json" => Some(PresentationFormat::Json),
            "html" | "admin" => Some(PresentationFormat::Html),
            _ => None,
        }
    }
}

//! Ingestion configuration.

use serde::{Deserialize, Serialize};

/// Which side wins when stored and incoming coordinates disagree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateAuthority {
    /// A stored component is never overwritten, only missing ones are filled.
    #[default]
    FirstWins,
    /// Any present incoming component replaces the stored one.
    Override,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Refuse waveform payloads whose checksum matches a registered file.
    pub reject_duplicate_content: bool,
    pub coordinate_authority: CoordinateAuthority,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            reject_duplicate_content: true,
            coordinate_authority: CoordinateAuthority::FirstWins,
        }
    }
}

impl IngestionConfig {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}

//! Service configuration, from environment variables or a YAML file.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use ingestion::{CoordinateAuthority, IngestionConfig};
use serde::{Deserialize, Serialize};
use storage::{CatalogBackend, S3Config, StorageBackend};

const DEFAULT_LISTEN: &str = "0.0.0.0:8085";
const DEFAULT_MAX_UPLOAD_MB: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub listen: String,
    /// Where events, stations, waveforms and file references are recorded.
    pub catalog: CatalogBackend,
    /// Managed root for waveform copies.
    pub waveform_storage: StorageBackend,
    /// Managed root for station metadata payloads.
    pub station_storage: StorageBackend,
    /// Largest accepted request body, in MiB.
    pub max_upload_mb: usize,
    pub ingestion: IngestionConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            catalog: CatalogBackend::default(),
            waveform_storage: StorageBackend::Local {
                root: PathBuf::from("data/waveforms"),
            },
            station_storage: StorageBackend::Local {
                root: PathBuf::from("data/stations"),
            },
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
            ingestion: IngestionConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key/value source. Setting `S3_BUCKET` switches both
    /// roots to prefixes of that bucket. `CATALOG_PATH=memory` keeps the
    /// catalog in process memory.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(listen) = lookup("WAVEFORM_API_LISTEN_ADDR") {
            config.listen = listen;
        }

        if let Some(path) = lookup("CATALOG_PATH") {
            config.catalog = match path.as_str() {
                "memory" => CatalogBackend::Memory,
                _ => CatalogBackend::Sqlite { path: path.into() },
            };
        }

        if let Some(bucket) = lookup("S3_BUCKET") {
            let defaults = S3Config::default();
            let s3 = S3Config {
                endpoint: lookup("S3_ENDPOINT").unwrap_or(defaults.endpoint),
                bucket,
                access_key_id: lookup("S3_ACCESS_KEY").unwrap_or(defaults.access_key_id),
                secret_access_key: lookup("S3_SECRET_KEY").unwrap_or(defaults.secret_access_key),
                region: lookup("S3_REGION").unwrap_or(defaults.region),
                allow_http: lookup("S3_ALLOW_HTTP").map_or(true, |v| v == "true"),
            };
            config.waveform_storage = StorageBackend::S3 {
                config: s3.clone(),
                prefix: lookup("WAVEFORM_PREFIX").unwrap_or_else(|| "waveforms".to_string()),
            };
            config.station_storage = StorageBackend::S3 {
                config: s3,
                prefix: lookup("STATION_PREFIX").unwrap_or_else(|| "stations".to_string()),
            };
        } else {
            if let Some(root) = lookup("WAVEFORM_ROOT") {
                config.waveform_storage = StorageBackend::Local { root: root.into() };
            }
            if let Some(root) = lookup("STATION_ROOT") {
                config.station_storage = StorageBackend::Local { root: root.into() };
            }
        }

        if let Some(mb) = lookup("MAX_UPLOAD_MB") {
            config.max_upload_mb = mb
                .parse()
                .with_context(|| format!("MAX_UPLOAD_MB is not a number: {}", mb))?;
        }
        if let Some(flag) = lookup("REJECT_DUPLICATE_CONTENT") {
            config.ingestion.reject_duplicate_content = parse_bool("REJECT_DUPLICATE_CONTENT", &flag)?;
        }
        if let Some(policy) = lookup("COORDINATE_AUTHORITY") {
            config.ingestion.coordinate_authority = match policy.as_str() {
                "first_wins" => CoordinateAuthority::FirstWins,
                "override" => CoordinateAuthority::Override,
                other => bail!("COORDINATE_AUTHORITY must be first_wins or override, got {}", other),
            };
        }

        Ok(config)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => bail!("{} must be a boolean, got {}", key, value),
    }
}

//! File references: every physical file known to the archive.
//!
//! Records refer to files only through an opaque [`FilepathId`]; the actual
//! location never leaves the service except through the download
//! indirection, which exposes the base name only.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use uuid::Uuid;

use seis_common::{ResourceKind, SeisError, SeisResult};

use crate::catalog::FilepathTable;

/// Opaque identifier of a stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilepathId(Uuid);

impl FilepathId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<Uuid> for FilepathId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<FilepathId> for Uuid {
    fn from(id: FilepathId) -> Self {
        id.0
    }
}

impl Default for FilepathId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FilepathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FilepathId {
    type Err = SeisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| SeisError::invalid_parameter("filepath_id", format!("'{}' is not a file id", s)))
    }
}

/// Which managed root holds a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageRoot {
    Waveforms,
    Stations,
}

/// Physical location of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum FileLocation {
    /// A copy owned by the archive, which may move or delete it.
    Managed { root: StorageRoot, object_path: String },
    /// An external file the archive only points at and never touches.
    Indexed { path: PathBuf },
}

impl FileLocation {
    pub fn is_managed(&self) -> bool {
        matches!(self, FileLocation::Managed { .. })
    }

    /// Last path component, used as download name.
    pub fn file_name(&self) -> String {
        match self {
            FileLocation::Managed { object_path, .. } => object_path
                .rsplit('/')
                .next()
                .unwrap_or(object_path)
                .to_string(),
            FileLocation::Indexed { path } => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilepathRecord {
    pub id: FilepathId,
    pub location: FileLocation,
    pub size: u64,
    /// Hex encoded SHA-256 of the content at registration time.
    pub checksum: String,
    pub registered_at: DateTime<Utc>,
    /// Format name as detected or declared on upload.
    pub format: String,
}

impl FilepathRecord {
    pub fn new(location: FileLocation, data: &[u8], format: impl Into<String>) -> Self {
        Self {
            id: FilepathId::new(),
            location,
            size: data.len() as u64,
            checksum: sha256_hex(data),
            registered_at: Utc::now(),
            format: format.into(),
        }
    }
}

/// Hex encoded SHA-256 digest.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// In-memory file reference table.
#[derive(Default)]
pub struct MemoryFilepathTable {
    files: RwLock<HashMap<FilepathId, FilepathRecord>>,
}

impl MemoryFilepathTable {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FilepathTable for MemoryFilepathTable {
    async fn insert(&self, record: FilepathRecord, reject_duplicate_content: bool) -> SeisResult<()> {
        let mut files = self.files.write().await;
        if reject_duplicate_content && files.values().any(|f| f.checksum == record.checksum) {
            return Err(SeisError::DuplicateContent(record.checksum));
        }
        files.insert(record.id, record);
        Ok(())
    }

    async fn get(&self, id: &FilepathId) -> SeisResult<FilepathRecord> {
        self.files
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SeisError::not_found(ResourceKind::File, id.to_string()))
    }

    async fn find_by_checksum(&self, checksum: &str) -> SeisResult<Option<FilepathRecord>> {
        Ok(self
            .files
            .read()
            .await
            .values()
            .find(|f| f.checksum == checksum)
            .cloned())
    }

    async fn remove(&self, id: &FilepathId) -> SeisResult<Option<FilepathRecord>> {
        Ok(self.files.write().await.remove(id))
    }

    async fn count(&self) -> SeisResult<usize> {
        Ok(self.files.read().await.len())
    }
}

//! Object storage for managed files (local filesystem, S3 compatible, or
//! in-memory).

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use object_store::{
    aws::AmazonS3Builder, local::LocalFileSystem, memory::InMemory, path::Path, ObjectStore,
    PutMode, PutOptions,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use seis_common::{ResourceKind, SeisError, SeisResult};

/// Upper bound on `.N` suffixes tried before giving up on a name.
const MAX_NAME_SUFFIX: usize = 10_000;

/// Configuration for an S3 compatible bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// S3/MinIO endpoint URL
    pub endpoint: String,
    /// Bucket name
    pub bucket: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// AWS region (use "us-east-1" for MinIO)
    pub region: String,
    /// Allow HTTP (for local MinIO)
    pub allow_http: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: "http://minio:9000".to_string(),
            bucket: "seismo-archive".to_string(),
            access_key_id: "minioadmin".to_string(),
            secret_access_key: "minioadmin".to_string(),
            region: "us-east-1".to_string(),
            allow_http: true,
        }
    }
}

/// Where a storage root keeps its bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageBackend {
    /// A directory on the local filesystem.
    Local { root: PathBuf },
    /// A prefix inside an S3 compatible bucket.
    S3 {
        #[serde(flatten)]
        config: S3Config,
        #[serde(default)]
        prefix: String,
    },
    /// Process memory, for tests.
    Memory,
}

/// Object storage client for one managed root.
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    label: String,
}

impl ObjectStorage {
    /// Create a storage client for the given backend. Local roots are
    /// created if missing.
    pub fn new(backend: &StorageBackend) -> SeisResult<Self> {
        match backend {
            StorageBackend::Local { root } => Self::local(root.clone()),
            StorageBackend::Memory => Ok(Self::in_memory()),
            StorageBackend::S3 { config, prefix } => {
                let mut builder = AmazonS3Builder::new()
                    .with_endpoint(&config.endpoint)
                    .with_bucket_name(&config.bucket)
                    .with_access_key_id(&config.access_key_id)
                    .with_secret_access_key(&config.secret_access_key)
                    .with_region(&config.region);

                if config.allow_http {
                    builder = builder.with_allow_http(true);
                }

                let store = builder.build().map_err(|e| {
                    SeisError::StorageError(format!("Failed to create S3 client: {}", e))
                })?;

                let store: Arc<dyn ObjectStore> = if prefix.is_empty() {
                    Arc::new(store)
                } else {
                    Arc::new(object_store::prefix::PrefixStore::new(store, prefix.as_str()))
                };

                Ok(Self {
                    store,
                    label: format!("s3://{}/{}", config.bucket, prefix),
                })
            }
        }
    }

    /// Storage rooted at a local directory.
    pub fn local(root: PathBuf) -> SeisResult<Self> {
        std::fs::create_dir_all(&root)?;
        let store = LocalFileSystem::new_with_prefix(&root).map_err(|e| {
            SeisError::StorageError(format!("Failed to open {}: {}", root.display(), e))
        })?;
        Ok(Self {
            store: Arc::new(store),
            label: root.display().to_string(),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(InMemory::new()),
            label: "memory".to_string(),
        }
    }

    /// Human readable name of the root, for logs.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Write bytes to a path, replacing any existing object.
    #[instrument(skip(self, data), fields(root = %self.label, path = %path))]
    pub async fn put(&self, path: &str, data: Bytes) -> SeisResult<()> {
        let location = Path::from(path);
        debug!(size = data.len(), "Writing object");

        self.store
            .put(&location, data)
            .await
            .map_err(|e| SeisError::StorageError(format!("Failed to write {}: {}", path, e)))?;

        Ok(())
    }

    /// Write bytes under `base`, or `base.1`, `base.2`, ... if taken.
    ///
    /// Names are reserved with create-only writes, so concurrent callers
    /// never overwrite each other. Returns the path actually written.
    #[instrument(skip(self, data), fields(root = %self.label, base = %base))]
    pub async fn put_unique(&self, base: &str, data: Bytes) -> SeisResult<String> {
        for suffix in 0..MAX_NAME_SUFFIX {
            let candidate = if suffix == 0 {
                base.to_string()
            } else {
                format!("{}.{}", base, suffix)
            };
            let location = Path::from(candidate.as_str());

            let result = self
                .store
                .put_opts(&location, data.clone(), PutOptions::from(PutMode::Create))
                .await;
            match result {
                Ok(_) => {
                    debug!(path = %candidate, size = data.len(), "Stored managed copy");
                    return Ok(candidate);
                }
                Err(object_store::Error::AlreadyExists { .. }) => continue,
                Err(object_store::Error::NotImplemented) => {
                    // Backends without conditional puts fall back to
                    // check-then-write, which is racy across processes.
                    if self.exists(&candidate).await? {
                        continue;
                    }
                    warn!(path = %candidate, "Backend lacks create-only writes");
                    self.put(&candidate, data).await?;
                    return Ok(candidate);
                }
                Err(e) => {
                    return Err(SeisError::StorageError(format!(
                        "Failed to write {}: {}",
                        candidate, e
                    )))
                }
            }
        }
        Err(SeisError::StorageError(format!(
            "No free name for {} after {} attempts",
            base, MAX_NAME_SUFFIX
        )))
    }

    /// Read bytes from a path.
    #[instrument(skip(self), fields(root = %self.label, path = %path))]
    pub async fn get(&self, path: &str) -> SeisResult<Bytes> {
        let location = Path::from(path);

        let result = self.store.get(&location).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => SeisError::not_found(ResourceKind::File, path),
            e => SeisError::StorageError(format!("Failed to read {}: {}", path, e)),
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| SeisError::StorageError(format!("Failed to read bytes: {}", e)))?;

        debug!(size = bytes.len(), "Read object");
        Ok(bytes)
    }

    /// Check if an object exists.
    pub async fn exists(&self, path: &str) -> SeisResult<bool> {
        let location = Path::from(path);

        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(SeisError::StorageError(format!(
                "Failed to check {}: {}",
                path, e
            ))),
        }
    }

    /// List objects with a given prefix, sorted. An empty prefix lists all.
    pub async fn list(&self, prefix: &str) -> SeisResult<Vec<String>> {
        use futures::TryStreamExt;

        let prefix_path = (!prefix.is_empty()).then(|| Path::from(prefix));
        let mut paths = Vec::new();

        let mut stream = self.store.list(prefix_path.as_ref());
        while let Some(meta) = stream
            .try_next()
            .await
            .map_err(|e| SeisError::StorageError(format!("List failed: {}", e)))?
        {
            paths.push(meta.location.to_string());
        }

        paths.sort();
        Ok(paths)
    }

    /// Delete an object. Deleting a missing object is not an error.
    #[instrument(skip(self), fields(root = %self.label, path = %path))]
    pub async fn delete(&self, path: &str) -> SeisResult<()> {
        let location = Path::from(path);

        match self.store.delete(&location).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(SeisError::StorageError(format!(
                "Failed to delete {}: {}",
                path, e
            ))),
        }
    }
}

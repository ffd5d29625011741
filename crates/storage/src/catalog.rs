//! Catalog seams for events, stations, waveforms and file references.
//!
//! Each registry is a trait with two implementations: the in-memory tables
//! used by tests and the SQLite catalog that survives restarts.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tracing::info;

use seis_codec::EventSummary;
use seis_common::{ChannelId, Coordinates, SeisError, SeisResult, StationKey, Tag, WaveformKey};

use crate::events::{EventRecord, MemoryEventCatalog};
use crate::filepaths::{FilepathId, FilepathRecord, MemoryFilepathTable};
use crate::sqlite::SqliteCatalog;
use crate::stations::{MemoryStationRegistry, StationRecord};
use crate::waveforms::{
    MemoryWaveformRegistry, Registration, StorageMode, WaveformFilter, WaveformMetadata,
    WaveformRecord,
};

/// Events keyed by name. Names are unique and never change once assigned.
#[async_trait]
pub trait EventCatalog: Send + Sync {
    /// Store a new event. Without a name the smallest unused non-negative
    /// integer is assigned, atomically with the insert.
    async fn create(&self, name: Option<&str>, summary: EventSummary, payload: Bytes) -> SeisResult<String>;

    async fn get(&self, name: &str) -> SeisResult<EventRecord>;

    async fn exists(&self, name: &str) -> SeisResult<bool>;

    /// Replace the attributes of an existing event. The name stays.
    async fn update(&self, name: &str, summary: EventSummary, payload: Bytes) -> SeisResult<()>;

    /// Remove an event. Waveforms bound to it are left in place.
    async fn delete(&self, name: &str) -> SeisResult<EventRecord>;

    /// All events in name order, from a fresh snapshot.
    async fn list(&self) -> SeisResult<BoxStream<'static, EventRecord>>;

    async fn count(&self) -> SeisResult<usize>;
}

/// Change applied to one station record inside a single transaction.
pub type StationUpdate<'a> = Box<dyn FnOnce(&mut StationRecord) + Send + 'a>;

/// Stations keyed by (network, station).
#[async_trait]
pub trait StationRegistry: Send + Sync {
    async fn get(&self, key: &StationKey) -> SeisResult<StationRecord>;

    async fn coordinates(&self, key: &StationKey) -> SeisResult<Option<Coordinates>>;

    /// Apply `update` to the record for `key`, creating an empty record
    /// first if needed. Read-modify-write per station is atomic.
    async fn apply(&self, key: &StationKey, update: StationUpdate<'_>) -> SeisResult<()>;

    /// All stations in key order, from a fresh snapshot.
    async fn list(&self) -> SeisResult<BoxStream<'static, StationRecord>>;

    async fn count(&self) -> SeisResult<usize>;
}

impl dyn StationRegistry {
    /// [`StationRegistry::apply`] with a closure that returns a value.
    pub async fn modify<R, F>(&self, key: &StationKey, f: F) -> SeisResult<R>
    where
        F: FnOnce(&mut StationRecord) -> R + Send,
        R: Send,
    {
        let mut result = None;
        self.apply(key, Box::new(|record| result = Some(f(record)))).await?;
        result.ok_or_else(|| SeisError::InternalError(format!("update of station {} did not run", key)))
    }
}

/// One record per (event, channel id, tag, synthetic).
#[async_trait]
pub trait WaveformRegistry: Send + Sync {
    /// Register a waveform. Fails with `UnboundEvent` unless the event
    /// exists when the record is inserted, and with `DuplicateKey` when the
    /// key is taken and `replace` is off.
    async fn register(
        &self,
        key: WaveformKey,
        storage_mode: StorageMode,
        filepath: FilepathId,
        metadata: WaveformMetadata,
        replace: bool,
    ) -> SeisResult<Registration>;

    /// Matching records in key order. Each call reads the current state.
    async fn find(&self, filter: &WaveformFilter) -> SeisResult<BoxStream<'static, WaveformRecord>>;

    async fn get_one(&self, key: &WaveformKey) -> SeisResult<WaveformRecord>;

    /// Every tag registered for an event and channel, sorted.
    async fn tags(&self, event: &str, channel: &ChannelId) -> SeisResult<Vec<Tag>>;

    /// Whether any record still points at `filepath`.
    async fn references(&self, filepath: &FilepathId) -> SeisResult<bool>;

    /// All components sharing `key` apart from the channel code.
    async fn bundle(&self, key: &WaveformKey) -> SeisResult<Vec<WaveformRecord>>;

    async fn count(&self) -> SeisResult<usize>;
}

/// Every physical file known to the archive.
#[async_trait]
pub trait FilepathTable: Send + Sync {
    /// Insert a file reference. With `reject_duplicate_content` the insert
    /// fails if a file with the same checksum is already known; the check
    /// and the insert are atomic.
    async fn insert(&self, record: FilepathRecord, reject_duplicate_content: bool) -> SeisResult<()>;

    async fn get(&self, id: &FilepathId) -> SeisResult<FilepathRecord>;

    async fn find_by_checksum(&self, checksum: &str) -> SeisResult<Option<FilepathRecord>>;

    async fn remove(&self, id: &FilepathId) -> SeisResult<Option<FilepathRecord>>;

    async fn count(&self) -> SeisResult<usize>;
}

/// Where the catalogs keep their records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum CatalogBackend {
    /// A SQLite database file, created if missing.
    Sqlite { path: PathBuf },
    /// Process memory, for tests.
    Memory,
}

impl Default for CatalogBackend {
    fn default() -> Self {
        CatalogBackend::Sqlite {
            path: PathBuf::from("data/catalog.sqlite"),
        }
    }
}

/// The four registries of one archive.
#[derive(Clone)]
pub struct Catalogs {
    pub events: Arc<dyn EventCatalog>,
    pub stations: Arc<dyn StationRegistry>,
    pub waveforms: Arc<dyn WaveformRegistry>,
    pub files: Arc<dyn FilepathTable>,
}

impl Catalogs {
    pub fn in_memory() -> Self {
        let events = Arc::new(MemoryEventCatalog::new());
        Self {
            waveforms: Arc::new(MemoryWaveformRegistry::new(events.clone())),
            events,
            stations: Arc::new(MemoryStationRegistry::new()),
            files: Arc::new(MemoryFilepathTable::new()),
        }
    }

    /// All four registries backed by one SQLite database.
    pub fn sqlite(catalog: SqliteCatalog) -> Self {
        let catalog = Arc::new(catalog);
        Self {
            events: catalog.clone(),
            stations: catalog.clone(),
            waveforms: catalog.clone(),
            files: catalog,
        }
    }

    pub async fn open(backend: &CatalogBackend) -> SeisResult<Self> {
        match backend {
            CatalogBackend::Memory => {
                info!("Using in-memory catalog");
                Ok(Self::in_memory())
            }
            CatalogBackend::Sqlite { path } => Ok(Self::sqlite(SqliteCatalog::open(path).await?)),
        }
    }
}

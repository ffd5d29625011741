//! Storage for the seismic archive.
//!
//! Provides:
//! - Object storage (local filesystem, S3/MinIO, memory) for managed files
//! - Catalogs for events, stations, waveforms and file references, in
//!   SQLite or in memory

pub mod archive;
pub mod catalog;
pub mod events;
pub mod filepaths;
pub mod object_store;
pub mod sqlite;
pub mod stations;
pub mod waveforms;

pub use archive::Archive;
pub use self::object_store::{ObjectStorage, S3Config, StorageBackend};
pub use catalog::{
    CatalogBackend, Catalogs, EventCatalog, FilepathTable, StationRegistry, StationUpdate,
    WaveformRegistry,
};
pub use events::{EventPin, EventRecord, MemoryEventCatalog};
pub use filepaths::{
    sha256_hex, FileLocation, FilepathId, FilepathRecord, MemoryFilepathTable, StorageRoot,
};
pub use sqlite::SqliteCatalog;
pub use stations::{ChannelEpoch, MemoryStationRegistry, StationRecord};
pub use waveforms::{
    MemoryWaveformRegistry, Registration, StorageMode, WaveformFilter, WaveformMetadata,
    WaveformRecord,
};

//! Handles to every catalog and storage root of one archive.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use seis_common::{ResourceKind, SeisError, SeisResult};

use crate::catalog::{Catalogs, EventCatalog, FilepathTable, StationRegistry, WaveformRegistry};
use crate::filepaths::{FileLocation, FilepathId, StorageRoot};
use crate::object_store::ObjectStorage;

/// Shared handles, cheap to clone. Components receive one of these
/// instead of reaching for globals.
#[derive(Clone)]
pub struct Archive {
    pub events: Arc<dyn EventCatalog>,
    pub stations: Arc<dyn StationRegistry>,
    pub waveforms: Arc<dyn WaveformRegistry>,
    pub files: Arc<dyn FilepathTable>,
    pub waveform_store: Arc<ObjectStorage>,
    pub station_store: Arc<ObjectStorage>,
}

impl Archive {
    pub fn new(catalogs: Catalogs, waveform_store: ObjectStorage, station_store: ObjectStorage) -> Self {
        Self {
            events: catalogs.events,
            stations: catalogs.stations,
            waveforms: catalogs.waveforms,
            files: catalogs.files,
            waveform_store: Arc::new(waveform_store),
            station_store: Arc::new(station_store),
        }
    }

    /// Archive with its catalogs and both roots held in memory.
    pub fn in_memory() -> Self {
        Self::new(Catalogs::in_memory(), ObjectStorage::in_memory(), ObjectStorage::in_memory())
    }

    pub fn store(&self, root: StorageRoot) -> &ObjectStorage {
        match root {
            StorageRoot::Waveforms => &self.waveform_store,
            StorageRoot::Stations => &self.station_store,
        }
    }

    /// Read the bytes behind a file reference. Indexed files are read from
    /// their external path on every call.
    pub async fn read_file(&self, id: &FilepathId) -> SeisResult<(String, Bytes)> {
        let record = self.files.get(id).await?;
        let name = record.location.file_name();
        let data = match &record.location {
            FileLocation::Managed { root, object_path } => self.store(*root).get(object_path).await?,
            FileLocation::Indexed { path } => match tokio::fs::read(path).await {
                Ok(data) => Bytes::from(data),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(SeisError::not_found(ResourceKind::File, id.to_string()))
                }
                Err(e) => return Err(e.into()),
            },
        };
        Ok((name, data))
    }

    /// Forget a file reference. Managed bytes are deleted, indexed files are
    /// left untouched.
    pub async fn release_file(&self, id: &FilepathId) -> SeisResult<()> {
        let Some(record) = self.files.remove(id).await? else {
            return Ok(());
        };
        match record.location {
            FileLocation::Managed { root, object_path } => {
                debug!(path = %object_path, "Releasing managed file");
                if let Err(e) = self.store(root).delete(&object_path).await {
                    warn!(path = %object_path, error = %e, "Failed to delete managed file");
                    return Err(e);
                }
            }
            FileLocation::Indexed { path } => {
                debug!(path = %path.display(), "Dropping index entry");
            }
        }
        Ok(())
    }
}

//! Application state for the waveform API.

use std::sync::Arc;

use anyhow::Result;
use ingestion::{IngestionConfig, IngestionPipeline};
use retrieval::{FormatNegotiator, ListService};
use seis_codec::{BuiltinCodec, SeismicCodec};
use storage::{Archive, Catalogs, ObjectStorage};
use tracing::info;

use crate::config::ServiceConfig;

/// Shared application state.
pub struct AppState {
    /// Write side: events, stations and waveforms.
    pub pipeline: IngestionPipeline,

    /// Waveform fetches and file downloads.
    pub negotiator: FormatNegotiator,

    /// Listings.
    pub lists: ListService,

    /// Largest accepted request body.
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Open the catalog and storage roots named in `config`.
    pub async fn new(config: &ServiceConfig) -> Result<Self> {
        let catalogs = Catalogs::open(&config.catalog).await?;
        let waveform_store = ObjectStorage::new(&config.waveform_storage)?;
        let station_store = ObjectStorage::new(&config.station_storage)?;
        info!(
            waveforms = waveform_store.label(),
            stations = station_store.label(),
            "Opened storage roots"
        );
        let archive = Archive::new(catalogs, waveform_store, station_store);
        Ok(Self::with_archive(
            archive,
            config.ingestion.clone(),
            config.max_upload_bytes(),
        ))
    }

    pub fn with_archive(archive: Archive, ingestion: IngestionConfig, max_upload_bytes: usize) -> Self {
        let codec: Arc<dyn SeismicCodec> = Arc::new(BuiltinCodec);
        Self {
            negotiator: FormatNegotiator::new(archive.clone(), codec.clone()),
            lists: ListService::new(archive.clone()),
            pipeline: IngestionPipeline::new(archive, codec, ingestion),
            max_upload_bytes,
        }
    }

    pub fn archive(&self) -> &Archive {
        self.pipeline.archive()
    }
}

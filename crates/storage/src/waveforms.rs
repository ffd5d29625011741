//! Waveform registry: one record per (event, channel id, tag, synthetic).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use seis_common::{
    ChannelId, ResourceKind, SeisError, SeisResult, StationKey, Tag, WaveformFormat, WaveformKey,
};

use crate::catalog::WaveformRegistry;
use crate::events::MemoryEventCatalog;
use crate::filepaths::FilepathId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Bytes copied into a storage root owned by the archive.
    Managed,
    /// Bytes left in place at an external path.
    Indexed,
}

/// Canonical metadata decoded from the waveform file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformMetadata {
    pub sampling_rate: f64,
    pub npts: usize,
    pub starttime: DateTime<Utc>,
    pub endtime: DateTime<Utc>,
    pub format: WaveformFormat,
    /// Position of this trace inside the file.
    pub trace_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveformRecord {
    pub id: Uuid,
    pub key: WaveformKey,
    pub storage_mode: StorageMode,
    pub filepath: FilepathId,
    pub metadata: WaveformMetadata,
    pub registered_at: DateTime<Utc>,
}

impl WaveformRecord {
    pub fn new(
        key: WaveformKey,
        storage_mode: StorageMode,
        filepath: FilepathId,
        metadata: WaveformMetadata,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            key,
            storage_mode,
            filepath,
            metadata,
            registered_at: Utc::now(),
        }
    }
}

/// Outcome of a successful registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub id: Uuid,
    /// The record superseded by an explicit replace.
    pub replaced: Option<WaveformRecord>,
}

/// Conjunctive filter over waveform records. Unset fields match anything.
#[derive(Debug, Clone, Default)]
pub struct WaveformFilter {
    pub event: Option<String>,
    pub channel: Option<ChannelId>,
    pub station: Option<StationKey>,
    pub tag: Option<Tag>,
    pub synthetic: Option<bool>,
}

impl WaveformFilter {
    pub fn matches(&self, key: &WaveformKey) -> bool {
        self.event.as_ref().map_or(true, |e| *e == key.event)
            && self.channel.as_ref().map_or(true, |c| *c == key.channel)
            && self
                .station
                .as_ref()
                .map_or(true, |s| *s == key.channel.station_key())
            && self.tag.as_ref().map_or(true, |t| *t == key.tag)
            && self.synthetic.map_or(true, |s| s == key.synthetic)
    }
}

/// In-memory waveform registry. Registration pins the bound event so a
/// concurrent delete cannot slip between the check and the insert.
pub struct MemoryWaveformRegistry {
    events: Arc<MemoryEventCatalog>,
    records: RwLock<BTreeMap<WaveformKey, WaveformRecord>>,
}

impl MemoryWaveformRegistry {
    pub fn new(events: Arc<MemoryEventCatalog>) -> Self {
        Self {
            events,
            records: RwLock::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl WaveformRegistry for MemoryWaveformRegistry {
    #[instrument(skip(self, metadata), fields(event = %key.event, channel_id = %key.channel, tag = %key.tag))]
    async fn register(
        &self,
        key: WaveformKey,
        storage_mode: StorageMode,
        filepath: FilepathId,
        metadata: WaveformMetadata,
        replace: bool,
    ) -> SeisResult<Registration> {
        let _pin = self.events.pin(&key.event).await?;
        let mut records = self.records.write().await;

        if records.contains_key(&key) && !replace {
            return Err(SeisError::DuplicateKey(key));
        }

        let record = WaveformRecord::new(key.clone(), storage_mode, filepath, metadata);
        let id = record.id;
        let replaced = records.insert(key, record);

        if replaced.is_some() {
            info!("Replaced waveform");
        } else {
            debug!("Registered waveform");
        }
        Ok(Registration { id, replaced })
    }

    async fn find(&self, filter: &WaveformFilter) -> SeisResult<BoxStream<'static, WaveformRecord>> {
        let snapshot: Vec<WaveformRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| filter.matches(&r.key))
            .cloned()
            .collect();
        Ok(stream::iter(snapshot).boxed())
    }

    async fn get_one(&self, key: &WaveformKey) -> SeisResult<WaveformRecord> {
        self.records
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| SeisError::not_found(ResourceKind::Waveform, key.to_string()))
    }

    async fn tags(&self, event: &str, channel: &ChannelId) -> SeisResult<Vec<Tag>> {
        let mut tags: Vec<Tag> = self
            .records
            .read()
            .await
            .keys()
            .filter(|k| k.event == event && k.channel == *channel)
            .map(|k| k.tag.clone())
            .collect();
        tags.sort();
        tags.dedup();
        Ok(tags)
    }

    async fn references(&self, filepath: &FilepathId) -> SeisResult<bool> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .any(|r| r.filepath == *filepath))
    }

    async fn bundle(&self, key: &WaveformKey) -> SeisResult<Vec<WaveformRecord>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.key.same_bundle(key))
            .cloned()
            .collect())
    }

    async fn count(&self) -> SeisResult<usize> {
        Ok(self.records.read().await.len())
    }
}

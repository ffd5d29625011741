//! Station registry keyed by (network, station).

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use seis_common::{Coordinates, ResourceKind, SeisError, SeisResult, StationKey};

use crate::catalog::{StationRegistry, StationUpdate};
use crate::filepaths::FilepathId;

/// One channel epoch of a station's inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelEpoch {
    pub location: String,
    pub channel: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationRecord {
    pub key: StationKey,
    pub coordinates: Coordinates,
    pub channels: Vec<ChannelEpoch>,
    /// Uploaded metadata payloads, oldest first.
    pub metadata_files: Vec<FilepathId>,
    pub updated_at: DateTime<Utc>,
}

impl StationRecord {
    pub fn new(key: StationKey) -> Self {
        Self {
            key,
            coordinates: Coordinates::default(),
            channels: Vec::new(),
            metadata_files: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Add a channel epoch unless an identical one is present.
    /// Returns whether the inventory changed.
    pub fn add_channel(&mut self, epoch: ChannelEpoch) -> bool {
        if self.channels.contains(&epoch) {
            return false;
        }
        self.channels.push(epoch);
        true
    }

    /// Whether a channel with this location and code is known, any epoch.
    pub fn has_channel(&self, location: &str, channel: &str) -> bool {
        self.channels
            .iter()
            .any(|c| c.location == location && c.channel == channel)
    }
}

/// In-memory station registry.
#[derive(Default)]
pub struct MemoryStationRegistry {
    stations: RwLock<BTreeMap<StationKey, StationRecord>>,
}

impl MemoryStationRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StationRegistry for MemoryStationRegistry {
    async fn get(&self, key: &StationKey) -> SeisResult<StationRecord> {
        self.stations
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| SeisError::not_found(ResourceKind::Station, key.to_string()))
    }

    async fn coordinates(&self, key: &StationKey) -> SeisResult<Option<Coordinates>> {
        Ok(self.stations.read().await.get(key).map(|s| s.coordinates))
    }

    async fn apply(&self, key: &StationKey, update: StationUpdate<'_>) -> SeisResult<()> {
        let mut stations = self.stations.write().await;
        let record = stations
            .entry(key.clone())
            .or_insert_with(|| StationRecord::new(key.clone()));
        update(record);
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn list(&self) -> SeisResult<BoxStream<'static, StationRecord>> {
        let snapshot: Vec<StationRecord> = self.stations.read().await.values().cloned().collect();
        Ok(stream::iter(snapshot).boxed())
    }

    async fn count(&self) -> SeisResult<usize> {
        Ok(self.stations.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn epoch(channel: &str) -> ChannelEpoch {
        ChannelEpoch {
            location: String::new(),
            channel: channel.to_string(),
            start_date: None,
            end_date: None,
        }
    }

    #[tokio::test]
    async fn test_modify_creates_on_demand() {
        let registry: Arc<dyn StationRegistry> = Arc::new(MemoryStationRegistry::new());
        let key = StationKey::new("BW", "FURT");
        assert!(registry.get(&key).await.is_err());

        let added = registry.modify(&key, |s| s.add_channel(epoch("EHZ"))).await.unwrap();
        assert!(added);
        let again = registry.modify(&key, |s| s.add_channel(epoch("EHZ"))).await.unwrap();
        assert!(!again);

        let record = registry.get(&key).await.unwrap();
        assert_eq!(record.channels.len(), 1);
        assert!(record.has_channel("", "EHZ"));
        assert!(record.coordinates.is_empty());
    }

    #[tokio::test]
    async fn test_list_is_sorted() {
        let registry = MemoryStationRegistry::new();
        for sta in ["WET", "FURT", "MANZ"] {
            registry.apply(&StationKey::new("BW", sta), Box::new(|_| ())).await.unwrap();
        }
        let names: Vec<String> = registry
            .list()
            .await
            .unwrap()
            .map(|s| s.key.station)
            .collect()
            .await;
        assert_eq!(names, vec!["FURT", "MANZ", "WET"]);
    }
}

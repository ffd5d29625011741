//! Listings of events, stations and waveforms.

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;

use seis_common::{ChannelId, Coordinates, SeisResult, StationKey, Tag};
use storage::{Archive, ChannelEpoch, FilepathId, StorageMode, WaveformFilter};

/// Waveform listing filters. Unset fields match anything.
#[derive(Debug, Clone, Default)]
pub struct WaveformQuery {
    pub event: Option<String>,
    pub channel_id: Option<ChannelId>,
    pub station_id: Option<StationKey>,
    pub tag: Option<Tag>,
    pub synthetic: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WaveformRow {
    pub event: String,
    pub channel_id: String,
    pub tag: String,
    pub synthetic: bool,
    pub storage_mode: StorageMode,
    pub format: String,
    pub sampling_rate: f64,
    pub npts: usize,
    pub starttime: DateTime<Utc>,
    pub endtime: DateTime<Utc>,
    pub filepath_id: FilepathId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation_in_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_depth_in_m: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventRow {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth_in_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magnitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magnitude_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StationRow {
    pub network: String,
    pub station: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation_in_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_depth_in_m: Option<f64>,
    /// Channel ids `NET.STA.LOC.CHA`, comma separated.
    pub channels: String,
}

impl StationRow {
    fn new(key: &StationKey, coordinates: &Coordinates, channels: &[ChannelEpoch]) -> Self {
        let mut ids: Vec<String> = channels
            .iter()
            .map(|c| ChannelId::new(&key.network, &key.station, &c.location, &c.channel).to_string())
            .collect();
        ids.sort();
        ids.dedup();
        Self {
            network: key.network.clone(),
            station: key.station.clone(),
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
            elevation_in_m: coordinates.elevation_in_m,
            local_depth_in_m: coordinates.local_depth_in_m,
            channels: ids.join(","),
        }
    }
}

/// Everything known about one station.
#[derive(Debug, Clone, Serialize)]
pub struct StationDetail {
    pub station: StationRow,
    pub channel: Vec<ChannelEpoch>,
    /// Uploaded metadata files, oldest first.
    pub metadata_file: Vec<FilepathId>,
}

#[derive(Clone)]
pub struct ListService {
    archive: Archive,
}

impl ListService {
    pub fn new(archive: Archive) -> Self {
        Self { archive }
    }

    /// Waveforms ordered by event name, channel id, then tag. Station
    /// coordinates are joined in when filtering by station.
    pub async fn waveforms(&self, query: &WaveformQuery) -> SeisResult<Vec<WaveformRow>> {
        let filter = WaveformFilter {
            event: query.event.clone(),
            channel: query.channel_id.clone(),
            station: query.station_id.clone(),
            tag: query.tag.clone(),
            synthetic: query.synthetic,
        };
        let coordinates = match &query.station_id {
            Some(key) => self.archive.stations.coordinates(key).await?,
            None => None,
        }
        .unwrap_or_default();

        let rows = self
            .archive
            .waveforms
            .find(&filter)
            .await?
            .map(|record| WaveformRow {
                event: record.key.event,
                channel_id: record.key.channel.to_string(),
                tag: record.key.tag.to_string(),
                synthetic: record.key.synthetic,
                storage_mode: record.storage_mode,
                format: record.metadata.format.name().to_string(),
                sampling_rate: record.metadata.sampling_rate,
                npts: record.metadata.npts,
                starttime: record.metadata.starttime,
                endtime: record.metadata.endtime,
                filepath_id: record.filepath,
                latitude: coordinates.latitude,
                longitude: coordinates.longitude,
                elevation_in_m: coordinates.elevation_in_m,
                local_depth_in_m: coordinates.local_depth_in_m,
            })
            .collect()
            .await;
        Ok(rows)
    }

    pub async fn events(&self) -> SeisResult<Vec<EventRow>> {
        let rows = self
            .archive
            .events
            .list()
            .await?
            .map(|event| EventRow {
                name: event.name,
                resource_id: event.summary.resource_id,
                origin_time: event.summary.origin_time,
                latitude: event.summary.latitude,
                longitude: event.summary.longitude,
                depth_in_m: event.summary.depth_in_m,
                magnitude: event.summary.magnitude,
                magnitude_type: event.summary.magnitude_type,
            })
            .collect()
            .await;
        Ok(rows)
    }

    pub async fn stations(&self) -> SeisResult<Vec<StationRow>> {
        let rows = self
            .archive
            .stations
            .list()
            .await?
            .map(|s| StationRow::new(&s.key, &s.coordinates, &s.channels))
            .collect()
            .await;
        Ok(rows)
    }

    pub async fn station(&self, key: &StationKey) -> SeisResult<StationDetail> {
        let record = self.archive.stations.get(key).await?;
        Ok(StationDetail {
            station: StationRow::new(&record.key, &record.coordinates, &record.channels),
            channel: record.channels,
            metadata_file: record.metadata_files,
        })
    }
}

//! Canonical in-memory representation of waveforms and station inventories.

use chrono::{DateTime, Duration, Utc};
use seis_common::{ChannelId, Coordinates};
use serde::{Deserialize, Serialize};

use crate::error::{CodecError, CodecResult};

/// Header of a single continuous trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceHeader {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub starttime: DateTime<Utc>,
    /// Samples per second.
    pub sampling_rate: f64,
    pub npts: usize,
    /// Station position, when the format embeds one.
    pub coordinates: Option<Coordinates>,
}

impl TraceHeader {
    pub fn channel_id(&self) -> ChannelId {
        ChannelId::new(&self.network, &self.station, &self.location, &self.channel)
    }

    /// Time of sample `index`, rounded to the microsecond. `None` when it
    /// falls outside the representable date range.
    pub fn sample_time(&self, index: usize) -> Option<DateTime<Utc>> {
        if self.sampling_rate <= 0.0 {
            return Some(self.starttime);
        }
        let offset_us = (index as f64 * 1_000_000.0 / self.sampling_rate).round();
        if !offset_us.is_finite() || offset_us.abs() >= i64::MAX as f64 {
            return None;
        }
        self.starttime
            .checked_add_signed(Duration::microseconds(offset_us as i64))
    }

    /// Time of the last sample.
    pub fn endtime(&self) -> Option<DateTime<Utc>> {
        self.sample_time(self.npts.saturating_sub(1))
    }

    /// The end time, or a malformed-data error naming `format` when the
    /// trace runs past the representable date range. Sample times grow with
    /// the index, so every sample is representable once the last one is.
    pub fn checked_endtime(&self, format: &str) -> CodecResult<DateTime<Utc>> {
        self.endtime().ok_or_else(|| {
            CodecError::malformed(
                format,
                format!(
                    "{} samples at {} Hz from {} end outside the supported time range",
                    self.npts, self.sampling_rate, self.starttime
                ),
            )
        })
    }
}

/// A continuous, evenly sampled time series.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub header: TraceHeader,
    pub data: Vec<f64>,
}

impl Trace {
    pub fn new(header: TraceHeader, data: Vec<f64>) -> Self {
        let mut header = header;
        header.npts = data.len();
        Self { header, data }
    }

    pub fn channel_id(&self) -> ChannelId {
        self.header.channel_id()
    }

    pub fn endtime(&self) -> Option<DateTime<Utc>> {
        self.header.endtime()
    }
}

/// Decoded station metadata payload. One payload may describe many stations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationInventory {
    pub stations: Vec<InventoryStation>,
}

impl StationInventory {
    pub fn is_empty(&self) -> bool {
        self.stations.iter().all(|s| s.channels.is_empty())
    }

    /// The first channel of the first station, used to name stored payloads.
    pub fn first_channel(&self) -> Option<(&InventoryStation, &InventoryChannel)> {
        self.stations
            .iter()
            .find_map(|s| s.channels.first().map(|c| (s, c)))
    }

    /// Append a channel, creating the station entry on first sight.
    pub fn push_channel(&mut self, network: &str, station: &str, channel: InventoryChannel) {
        match self
            .stations
            .iter_mut()
            .find(|s| s.network == network && s.station == station)
        {
            Some(existing) => existing.channels.push(channel),
            None => self.stations.push(InventoryStation {
                network: network.to_string(),
                station: station.to_string(),
                coordinates: None,
                channels: vec![channel],
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InventoryStation {
    pub network: String,
    pub station: String,
    pub coordinates: Option<Coordinates>,
    pub channels: Vec<InventoryChannel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryChannel {
    pub location: String,
    pub channel: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

//! Identifiers for channels, stations and waveform records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SeisError;

/// SEED channel identifier `NET.STA.LOC.CHA`.
///
/// The location code may be empty; the other parts usually are not but
/// nothing here enforces it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelId {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
}

impl ChannelId {
    pub fn new(
        network: impl Into<String>,
        station: impl Into<String>,
        location: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            network: network.into(),
            station: station.into(),
            location: location.into(),
            channel: channel.into(),
        }
    }

    /// Parse a dotted id like "BW.FURT..EHZ".
    pub fn parse(s: &str) -> Result<Self, SeisError> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 4 {
            return Err(SeisError::invalid_parameter(
                "channel_id",
                format!("'{}' is not of the form NET.STA.LOC.CHA", s),
            ));
        }
        Ok(Self::new(parts[0], parts[1], parts[2], parts[3]))
    }

    pub fn station_key(&self) -> StationKey {
        StationKey::new(&self.network, &self.station)
    }

    /// Whether two ids only differ in their channel code.
    pub fn same_sensor(&self, other: &ChannelId) -> bool {
        self.network == other.network
            && self.station == other.station
            && self.location == other.location
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

impl FromStr for ChannelId {
    type Err = SeisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ChannelId {
    type Error = SeisError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ChannelId> for String {
    fn from(id: ChannelId) -> Self {
        id.to_string()
    }
}

/// Station identity: network and station code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StationKey {
    pub network: String,
    pub station: String,
}

impl StationKey {
    pub fn new(network: impl Into<String>, station: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            station: station.into(),
        }
    }

    /// Parse a station id like "BW.FURT".
    pub fn parse(s: &str) -> Result<Self, SeisError> {
        match s.split_once('.') {
            Some((network, station)) if !station.contains('.') => Ok(Self::new(network, station)),
            _ => Err(SeisError::invalid_parameter(
                "station_id",
                format!("'{}' is not of the form NET.STA", s),
            )),
        }
    }
}

impl fmt::Display for StationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.network, self.station)
    }
}

/// Label disambiguating several waveforms of one event and channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    /// The tag of the unmodified recording. Processed data must use another.
    pub const RAW: Tag = Tag(String::new());

    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn is_raw(&self) -> bool {
        *self == Self::RAW
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Tag {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Composite identity of a waveform record.
///
/// Field order matters: the derived ordering sorts by event, then channel
/// id, then tag, which is the listing order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WaveformKey {
    pub event: String,
    pub channel: ChannelId,
    pub tag: Tag,
    pub synthetic: bool,
}

impl WaveformKey {
    pub fn new(event: impl Into<String>, channel: ChannelId, tag: Tag, synthetic: bool) -> Self {
        Self {
            event: event.into(),
            channel,
            tag,
            synthetic,
        }
    }

    /// Whether `other` belongs to the same multicomponent bundle, i.e. the
    /// keys are equal except for the channel code.
    pub fn same_bundle(&self, other: &WaveformKey) -> bool {
        self.event == other.event
            && self.tag == other.tag
            && self.synthetic == other.synthetic
            && self.channel.same_sensor(&other.channel)
    }
}

impl fmt::Display for WaveformKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.event, self.channel)?;
        if !self.tag.is_raw() {
            write!(f, "[{}]", self.tag)?;
        }
        if self.synthetic {
            f.write_str(" (synthetic)")?;
        }
        Ok(())
    }
}

//! Dataless SEED volumes (station control headers only).
//!
//! Control headers are split into logical records with an 8 byte header
//! (`NNNNNNT*`): sequence number, record type and a continuation flag.
//! Blockettes are ASCII and may continue into the next record. We read the
//! station identifier (050) and channel identifier (052) blockettes and
//! ignore everything else.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use seis_common::Coordinates;
use tracing::debug;

use crate::error::{CodecError, CodecResult};
use crate::trace::{InventoryChannel, StationInventory};

const FORMAT: &str = "SEED";
const RECORD_HEADER_LEN: usize = 8;

/// Whether the payload starts like a SEED volume.
pub fn is_seed_volume(data: &[u8]) -> bool {
    data.len() >= 15
        && data[..6].iter().all(u8::is_ascii_digit)
        && data[6] == b'V'
        && &data[8..11] == b"010"
}

/// Parse a SEED time string `YYYY,DDD[,HH[:MM[:SS[.FFFF]]]]`.
///
/// Returns `None` for anything that does not start with a year, such as the
/// "No Ending Time" placeholder in RESP files.
pub fn parse_seed_time(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim().trim_end_matches('~');
    if s.len() < 4 || !s.as_bytes()[..4].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let mut parts = s.splitn(3, ',');
    let year: i32 = parts.next()?.parse().ok()?;
    let jday: u32 = parts.next().map(str::parse).transpose().ok()?.unwrap_or(1);
    let clock = parts.next().unwrap_or("");

    let mut hms = clock.split(':').filter(|p| !p.is_empty());
    let hour: u32 = hms.next().map(str::parse).transpose().ok()?.unwrap_or(0);
    let minute: u32 = hms.next().map(str::parse).transpose().ok()?.unwrap_or(0);
    let seconds: f64 = hms.next().map(str::parse).transpose().ok()?.unwrap_or(0.0);

    let whole = seconds.trunc() as u32;
    let micros = ((seconds - seconds.trunc()) * 1_000_000.0).round() as u32;
    NaiveDate::from_yo_opt(year, jday.max(1))?
        .and_hms_micro_opt(hour, minute, whole, micros.min(999_999))
        .map(|ndt| Utc.from_utc_datetime(&ndt))
}

/// Cursor over the fields of one ASCII blockette.
struct FieldReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        // Skip blockette type and length.
        Self { data, pos: 7 }
    }

    fn fixed(&mut self, width: usize) -> CodecResult<String> {
        let end = self.pos + width;
        if end > self.data.len() {
            return Err(CodecError::malformed(FORMAT, "blockette ends inside a field"));
        }
        let value = String::from_utf8_lossy(&self.data[self.pos..end])
            .trim()
            .to_string();
        self.pos = end;
        Ok(value)
    }

    fn number(&mut self, width: usize) -> CodecResult<Option<f64>> {
        let raw = self.fixed(width)?;
        Ok(raw.parse::<f64>().ok())
    }

    fn variable(&mut self) -> CodecResult<String> {
        let rest = &self.data[self.pos.min(self.data.len())..];
        let len = rest
            .iter()
            .position(|&b| b == b'~')
            .ok_or_else(|| CodecError::malformed(FORMAT, "unterminated variable field"))?;
        let value = String::from_utf8_lossy(&rest[..len]).trim().to_string();
        self.pos += len + 1;
        Ok(value)
    }
}

fn ascii_number(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() || !bytes.iter().all(|b| b.is_ascii_digit() || *b == b' ') {
        return None;
    }
    std::str::from_utf8(bytes).ok()?.trim().parse().ok()
}

/// Split the volume into blockette streams. A record without the
/// continuation flag starts a new stream; trailing padding belongs to the
/// stream it ends.
fn control_streams(data: &[u8], record_len: usize) -> Vec<Vec<u8>> {
    let mut streams: Vec<Vec<u8>> = Vec::new();
    for record in data.chunks(record_len) {
        if record.len() <= RECORD_HEADER_LEN {
            break;
        }
        match record[6] {
            b'V' | b'A' | b'S' => {}
            // Data records or garbage end the control headers.
            _ => break,
        }
        let payload = &record[RECORD_HEADER_LEN..];
        match (record[7], streams.last_mut()) {
            (b'*', Some(current)) => current.extend_from_slice(payload),
            _ => streams.push(payload.to_vec()),
        }
    }
    streams
}

#[derive(Default)]
struct StationState {
    network: String,
    station: String,
    coordinates: Option<Coordinates>,
}

/// Read the station inventory from a dataless SEED volume.
pub fn read(data: &[u8]) -> CodecResult<StationInventory> {
    if !is_seed_volume(data) {
        return Err(CodecError::malformed(FORMAT, "missing volume identifier blockette"));
    }
    // Blockette 010: type(3) length(4) version(4) record length exponent(2).
    let exponent = ascii_number(&data[19..21])
        .filter(|e| (8..=16).contains(e))
        .ok_or_else(|| CodecError::malformed(FORMAT, "invalid logical record length"))?;
    let record_len = 1usize << exponent;

    let mut inventory = StationInventory::default();
    let mut current: Option<StationState> = None;

    for stream in control_streams(data, record_len) {
        let mut pos = 0;
        while pos + 7 <= stream.len() {
            let Some(kind) = ascii_number(&stream[pos..pos + 3]) else {
                break;
            };
            let len = ascii_number(&stream[pos + 3..pos + 7])
                .filter(|&l| l >= 7 && pos + l <= stream.len())
                .ok_or_else(|| CodecError::malformed(FORMAT, "invalid blockette length"))?;
            let blockette = &stream[pos..pos + len];
            pos += len;

            match kind {
                50 => {
                    if let Some(done) = current.take() {
                        finish_station(&mut inventory, done);
                    }
                    current = Some(read_station(blockette)?);
                }
                52 => {
                    let station = current.as_ref().ok_or_else(|| {
                        CodecError::malformed(FORMAT, "channel blockette outside a station")
                    })?;
                    let (channel, coords) = read_channel(blockette)?;
                    inventory.push_channel(&station.network, &station.station, channel);
                    // Channel position stands in for a station without one;
                    // otherwise it only contributes the sensor depth.
                    if let Some(st) = current.as_mut() {
                        match st.coordinates {
                            None => st.coordinates = coords,
                            Some(ref mut existing) => {
                                if existing.local_depth_in_m.is_none() {
                                    existing.local_depth_in_m =
                                        coords.and_then(|c| c.local_depth_in_m);
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }
    if let Some(done) = current.take() {
        finish_station(&mut inventory, done);
    }

    debug!(stations = inventory.stations.len(), "Parsed dataless SEED volume");
    if inventory.is_empty() {
        return Err(CodecError::malformed(FORMAT, "no channels found"));
    }
    Ok(inventory)
}

fn finish_station(inventory: &mut StationInventory, state: StationState) {
    match inventory
        .stations
        .iter_mut()
        .find(|s| s.network == state.network && s.station == state.station)
    {
        Some(existing) => {
            if existing.coordinates.is_none() {
                existing.coordinates = state.coordinates;
            }
        }
        None => inventory.stations.push(crate::trace::InventoryStation {
            network: state.network,
            station: state.station,
            coordinates: state.coordinates,
            channels: Vec::new(),
        }),
    }
}

fn read_station(blockette: &[u8]) -> CodecResult<StationState> {
    let mut r = FieldReader::new(blockette);
    let station = r.fixed(5)?;
    let latitude = r.number(10)?;
    let longitude = r.number(11)?;
    let elevation = r.number(7)?;
    let _channels = r.fixed(4)?;
    let _comments = r.fixed(3)?;
    let _site_name = r.variable()?;
    let _network_id = r.fixed(3)?;
    let _word_order_32 = r.fixed(4)?;
    let _word_order_16 = r.fixed(2)?;
    let _start = r.variable()?;
    let _end = r.variable()?;
    let _update = r.fixed(1)?;
    let network = r.fixed(2)?;

    let coordinates = match (latitude, longitude, elevation) {
        (Some(lat), Some(lon), Some(elev)) => Some(Coordinates {
            latitude: Some(lat),
            longitude: Some(lon),
            elevation_in_m: Some(elev),
            local_depth_in_m: None,
        }),
        _ => None,
    };
    Ok(StationState {
        network,
        station,
        coordinates,
    })
}

fn read_channel(blockette: &[u8]) -> CodecResult<(InventoryChannel, Option<Coordinates>)> {
    let mut r = FieldReader::new(blockette);
    let location = r.fixed(2)?;
    let channel = r.fixed(3)?;
    let _subchannel = r.fixed(4)?;
    let _instrument = r.fixed(3)?;
    let _comment = r.variable()?;
    let _signal_units = r.fixed(3)?;
    let _calibration_units = r.fixed(3)?;
    let latitude = r.number(10)?;
    let longitude = r.number(11)?;
    let elevation = r.number(7)?;
    let depth = r.number(5)?;
    let _azimuth = r.fixed(5)?;
    let _dip = r.fixed(5)?;
    let _data_format = r.fixed(4)?;
    let _record_length = r.fixed(2)?;
    let _sample_rate = r.fixed(10)?;
    let _clock_drift = r.fixed(10)?;
    let _comments = r.fixed(4)?;
    let _flags = r.variable()?;
    let start = r.variable()?;
    let end = r.variable()?;

    let coordinates = match (latitude, longitude, elevation) {
        (Some(lat), Some(lon), Some(elev)) => Some(Coordinates {
            latitude: Some(lat),
            longitude: Some(lon),
            elevation_in_m: Some(elev),
            local_depth_in_m: depth,
        }),
        _ => None,
    };
    Ok((
        InventoryChannel {
            location,
            channel,
            start_date: parse_seed_time(&start),
            end_date: parse_seed_time(&end),
        },
        coordinates,
    ))
}

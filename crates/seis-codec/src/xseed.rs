//! XML-SEED: the XML rendition of SEED control headers.

use quick_xml::events::Event;
use quick_xml::Reader;
use seis_common::{parse_datetime, Coordinates};

use crate::error::{CodecError, CodecResult};
use crate::trace::{InventoryChannel, InventoryStation, StationInventory};

const STATION_BLOCKETTE: &str = "station_identifier_blockette";
const CHANNEL_BLOCKETTE: &str = "channel_identifier_blockette";

/// Whether the payload looks like an XML-SEED document.
pub fn is_xseed(data: &[u8]) -> bool {
    let head = String::from_utf8_lossy(&data[..data.len().min(1024)]);
    head.trim_start().starts_with('<') && head.contains("xseed")
}

#[derive(Default)]
struct Fields {
    code: Option<String>,
    network: Option<String>,
    location: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    elevation: Option<f64>,
    local_depth: Option<f64>,
    start: Option<String>,
    end: Option<String>,
}

impl Fields {
    fn coordinates(&self) -> Option<Coordinates> {
        Some(Coordinates {
            latitude: Some(self.latitude?),
            longitude: Some(self.longitude?),
            elevation_in_m: Some(self.elevation?),
            local_depth_in_m: self.local_depth,
        })
    }
}

/// Read the station inventory from an XML-SEED document.
pub fn read(data: &[u8]) -> CodecResult<StationInventory> {
    let mut reader = Reader::from_reader(data);
    reader.trim_text(true);

    let mut inventory = StationInventory::default();
    let mut stack: Vec<String> = Vec::new();
    let mut fields = Fields::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == STATION_BLOCKETTE || name == CHANNEL_BLOCKETTE {
                    fields = Fields::default();
                }
                stack.push(name);
            }
            Event::Text(t) => {
                let text = t.unescape()?.trim().to_string();
                if let [.., parent, field] = stack.as_slice() {
                    assign(&mut fields, parent, field, text);
                }
            }
            Event::End(_) => {
                match stack.pop().as_deref() {
                    Some(STATION_BLOCKETTE) => finish_station(&mut inventory, &fields)?,
                    Some(CHANNEL_BLOCKETTE) => finish_channel(&mut inventory, &fields)?,
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if inventory.is_empty() {
        return Err(CodecError::malformed("XSEED", "no channels found"));
    }
    Ok(inventory)
}

fn assign(fields: &mut Fields, parent: &str, field: &str, text: String) {
    let number = text.parse::<f64>().ok();
    match (parent, field) {
        (STATION_BLOCKETTE, "station_call_letters") => fields.code = Some(text),
        (STATION_BLOCKETTE, "network_code") => fields.network = Some(text),
        (STATION_BLOCKETTE, "start_effective_date") => fields.start = Some(text),
        (STATION_BLOCKETTE, "end_effective_date") => fields.end = Some(text),
        (CHANNEL_BLOCKETTE, "channel_identifier") => fields.code = Some(text),
        (CHANNEL_BLOCKETTE, "location_identifier") => fields.location = Some(text),
        (CHANNEL_BLOCKETTE, "start_date") => fields.start = Some(text),
        (CHANNEL_BLOCKETTE, "end_date") => fields.end = Some(text),
        (CHANNEL_BLOCKETTE, "local_depth") => fields.local_depth = number,
        (_, "latitude") => fields.latitude = number,
        (_, "longitude") => fields.longitude = number,
        (_, "elevation") => fields.elevation = number,
        _ => {}
    }
}

fn finish_station(inventory: &mut StationInventory, fields: &Fields) -> CodecResult<()> {
    let (Some(network), Some(station)) = (&fields.network, &fields.code) else {
        return Err(CodecError::malformed(
            "XSEED",
            "station blockette without network or station code",
        ));
    };
    inventory.stations.push(InventoryStation {
        network: network.clone(),
        station: station.clone(),
        coordinates: fields.coordinates(),
        channels: Vec::new(),
    });
    Ok(())
}

fn finish_channel(inventory: &mut StationInventory, fields: &Fields) -> CodecResult<()> {
    let station = inventory
        .stations
        .last_mut()
        .ok_or_else(|| CodecError::malformed("XSEED", "channel blockette outside a station"))?;
    let channel = fields
        .code
        .clone()
        .ok_or_else(|| CodecError::malformed("XSEED", "channel blockette without a code"))?;

    match station.coordinates {
        None => station.coordinates = fields.coordinates(),
        Some(ref mut existing) => {
            if existing.local_depth_in_m.is_none() {
                existing.local_depth_in_m = fields.local_depth;
            }
        }
    }

    station.channels.push(InventoryChannel {
        location: fields.location.clone().unwrap_or_default(),
        channel,
        start_date: fields.start.as_deref().and_then(parse_datetime),
        end_date: fields.end.as_deref().and_then(parse_datetime),
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const XSEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<xseed version="1.0">
  <station_control_header>
    <station_identifier_blockette blockette="050">
      <station_call_letters>FURT</station_call_letters>
      <latitude>48.162899</latitude>
      <longitude>11.2752</longitude>
      <elevation>565.0</elevation>
      <start_effective_date>2006-12-16T00:00:00</start_effective_date>
      <end_effective_date></end_effective_date>
      <network_code>BW</network_code>
    </station_identifier_blockette>
    <channel_identifier_blockette blockette="052">
      <location_identifier></location_identifier>
      <channel_identifier>EHZ</channel_identifier>
      <latitude>48.162899</latitude>
      <longitude>11.2752</longitude>
      <elevation>565.0</elevation>
      <local_depth>1.5</local_depth>
      <start_date>2006-12-16T00:00:00</start_date>
      <end_date></end_date>
    </channel_identifier_blockette>
  </station_control_header>
</xseed>"#;

    #[test]
    fn test_read_station_and_channel() {
        let inv = read(XSEED.as_bytes()).unwrap();
        assert_eq!(inv.stations.len(), 1);
        let station = &inv.stations[0];
        assert_eq!(station.network, "BW");
        assert_eq!(station.station, "FURT");
        let coords = station.coordinates.unwrap();
        assert_eq!(coords.elevation_in_m, Some(565.0));
        assert_eq!(coords.local_depth_in_m, Some(1.5));
        assert_eq!(station.channels[0].channel, "EHZ");
        assert!(station.channels[0].start_date.is_some());
        assert!(station.channels[0].end_date.is_none());
    }

    #[test]
    fn test_mismatched_tags_are_rejected() {
        assert!(read(b"<xseed><station_identifier_blockette></xseed>").is_err());
    }

    #[test]
    fn test_detection() {
        assert!(is_xseed(XSEED.as_bytes()));
        assert!(!is_xseed(b"B050F03 Station: FURT"));
    }
}

//! Summary extraction from QuakeML event documents.

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use seis_common::parse_datetime;
use serde::{Deserialize, Serialize};

use crate::error::{CodecError, CodecResult};

/// Searchable fields of the first event in a QuakeML document. Missing
/// fields stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub resource_id: Option<String>,
    pub origin_time: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub depth_in_m: Option<f64>,
    pub magnitude: Option<f64>,
    pub magnitude_type: Option<String>,
}

/// Parse the first event's preferred-by-position origin and magnitude.
///
/// Only well-formedness is checked; schema validation happens elsewhere.
pub fn summarize(data: &[u8]) -> CodecResult<EventSummary> {
    let mut reader = Reader::from_reader(data);
    reader.trim_text(true);

    let mut summary = EventSummary::default();
    let mut stack: Vec<String> = Vec::new();
    let mut saw_root = false;
    let mut events = 0usize;
    let mut origins = 0usize;
    let mut magnitudes = 0usize;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                saw_root = true;
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                let parent_is_event = stack.last().map(String::as_str) == Some("event");
                match name.as_str() {
                    "event" => {
                        events += 1;
                        if events == 1 {
                            if let Some(attr) = e
                                .try_get_attribute("publicID")
                                .map_err(quick_xml::Error::from)?
                            {
                                summary.resource_id = Some(attr.unescape_value()?.into_owned());
                            }
                        }
                    }
                    "origin" if parent_is_event => origins += 1,
                    "magnitude" if parent_is_event => magnitudes += 1,
                    _ => {}
                }
                stack.push(name);
            }
            Event::Empty(_) => saw_root = true,
            Event::Text(t) if events == 1 => {
                let text = t.unescape()?.trim().to_string();
                let tail: Vec<&str> = stack
                    .iter()
                    .skip(stack.len().saturating_sub(4))
                    .map(String::as_str)
                    .collect();
                match tail.as_slice() {
                    [.., "event", "origin", field, "value"] if origins == 1 => match *field {
                        "time" => summary.origin_time = parse_datetime(&text),
                        "latitude" => summary.latitude = text.parse().ok(),
                        "longitude" => summary.longitude = text.parse().ok(),
                        "depth" => summary.depth_in_m = text.parse().ok(),
                        _ => {}
                    },
                    [.., "event", "magnitude", "mag", "value"] if magnitudes == 1 => {
                        summary.magnitude = text.parse().ok();
                    }
                    [.., "event", "magnitude", "type"] if magnitudes == 1 => {
                        summary.magnitude_type = Some(text);
                    }
                    _ => {}
                }
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(CodecError::malformed("QuakeML", "document has no root element"));
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    const QUAKEML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<q:quakeml xmlns:q="http://quakeml.org/xmlns/quakeml/1.2" xmlns="http://quakeml.org/xmlns/bed/1.2">
  <eventParameters publicID="smi:local/catalog">
    <event publicID="smi:local/event/1">
      <origin publicID="smi:local/origin/1">
        <time><value>2012-04-12T07:15:49.170000Z</value></time>
        <latitude><value>28.696</value></latitude>
        <longitude><value>-113.104</value></longitude>
        <depth><value>13000.0</value></depth>
      </origin>
      <origin publicID="smi:local/origin/2">
        <latitude><value>99.0</value></latitude>
      </origin>
      <magnitude publicID="smi:local/magnitude/1">
        <mag><value>6.9</value></mag>
        <type>Mwc</type>
      </magnitude>
    </event>
    <event publicID="smi:local/event/2">
      <magnitude><mag><value>1.0</value></mag></magnitude>
    </event>
  </eventParameters>
</q:quakeml>"#;

    #[test]
    fn test_summarize_first_event() {
        let summary = summarize(QUAKEML.as_bytes()).unwrap();
        assert_eq!(summary.resource_id.as_deref(), Some("smi:local/event/1"));
        assert_eq!(summary.origin_time.unwrap().year(), 2012);
        assert_eq!(summary.latitude, Some(28.696));
        assert_eq!(summary.longitude, Some(-113.104));
        assert_eq!(summary.depth_in_m, Some(13000.0));
        assert_eq!(summary.magnitude, Some(6.9));
        assert_eq!(summary.magnitude_type.as_deref(), Some("Mwc"));
    }

    #[test]
    fn test_missing_fields_stay_empty() {
        let summary = summarize(b"<quakeml><eventParameters/></quakeml>").unwrap();
        assert_eq!(summary, EventSummary::default());
    }

    #[test]
    fn test_broken_xml_is_rejected() {
        assert!(summarize(b"<quakeml><event></quakeml>").is_err());
        assert!(summarize(b"").is_err());
        assert!(summarize(b"just text").is_err());
    }
}

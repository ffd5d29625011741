//! Text fixtures for station and event metadata.

/// Well-known identifiers used across the test suite.
pub mod ids {
    pub const NETWORK: &str = "BW";
    pub const STATION: &str = "FURT";
    pub const CHANNEL_Z: &str = "BW.FURT..EHZ";
    pub const CHANNEL_N: &str = "BW.FURT..EHN";
    pub const EVENT: &str = "quake1";

    /// Coordinates of the fixture station: latitude, longitude, elevation.
    pub const FURT_COORDINATES: (f64, f64, f64) = (48.162899, 11.2752, 565.0);
}

/// A RESP file describing `network.station..channel` from 2006 on.
pub fn create_resp(network: &str, station: &str, channels: &[&str]) -> String {
    let mut out = String::new();
    for channel in channels {
        out.push_str(&format!(
            "#\n\
             #  << IRIS SEED Reader, Release 4.8 >>\n\
             #\n\
             B050F03     Station:     {station}\n\
             B050F16     Network:     {network}\n\
             B052F03     Location:    ??\n\
             B052F04     Channel:     {channel}\n\
             B052F22     Start date:  2006,001,00:00:00\n\
             B052F23     End date:    No Ending Time\n\
             #\n\
             B053F03     Transfer function type:                A [Laplace Transform (Rad/sec)]\n",
        ));
    }
    out
}

/// An XML-SEED document for one station with the given channels.
pub fn create_xseed(
    network: &str,
    station: &str,
    coordinates: (f64, f64, f64),
    channels: &[&str],
) -> String {
    let (lat, lon, elev) = coordinates;
    let mut blockettes = String::new();
    for channel in channels {
        blockettes.push_str(&format!(
            r#"
    <channel_identifier_blockette blockette="052">
      <location_identifier></location_identifier>
      <channel_identifier>{channel}</channel_identifier>
      <latitude>{lat}</latitude>
      <longitude>{lon}</longitude>
      <elevation>{elev}</elevation>
      <local_depth>0.0</local_depth>
      <start_date>2006-01-01T00:00:00</start_date>
      <end_date></end_date>
    </channel_identifier_blockette>"#,
        ));
    }
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<xseed version="1.0">
  <volume_index_control_header>
    <volume_identifier_blockette blockette="010">
      <version_of_format>2.4</version_of_format>
    </volume_identifier_blockette>
  </volume_index_control_header>
  <station_control_header>
    <station_identifier_blockette blockette="050">
      <station_call_letters>{station}</station_call_letters>
      <latitude>{lat}</latitude>
      <longitude>{lon}</longitude>
      <elevation>{elev}</elevation>
      <site_name>Fixture station</site_name>
      <start_effective_date>2006-01-01T00:00:00</start_effective_date>
      <end_effective_date></end_effective_date>
      <network_code>{network}</network_code>
    </station_identifier_blockette>{blockettes}
  </station_control_header>
</xseed>
"#
    )
}

/// A QuakeML document with a single event.
pub fn create_quakeml(public_id: &str, time: &str, magnitude: f64) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<q:quakeml xmlns:q="http://quakeml.org/xmlns/quakeml/1.2" xmlns="http://quakeml.org/xmlns/bed/1.2">
  <eventParameters publicID="smi:local/catalog">
    <event publicID="{public_id}">
      <origin publicID="{public_id}/origin">
        <time><value>{time}</value></time>
        <latitude><value>28.696</value></latitude>
        <longitude><value>-113.104</value></longitude>
        <depth><value>13000.0</value></depth>
      </origin>
      <magnitude publicID="{public_id}/magnitude">
        <mag><value>{magnitude}</value></mag>
        <type>Mw</type>
      </magnitude>
    </event>
  </eventParameters>
</q:quakeml>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resp_has_one_block_per_channel() {
        let text = create_resp("BW", "FURT", &["EHZ", "EHN"]);
        assert_eq!(text.matches("B052F04").count(), 2);
    }

    #[test]
    fn test_xseed_mentions_every_channel() {
        let text = create_xseed("BW", "FURT", ids::FURT_COORDINATES, &["EHZ", "EHE"]);
        assert!(text.contains("<channel_identifier>EHE</channel_identifier>"));
    }
}

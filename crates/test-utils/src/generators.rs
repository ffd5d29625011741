//! Byte-level generators for synthetic seismic files.
//!
//! These are written independently of the codec crate so that codec tests
//! check against a second implementation of each layout.

/// Deterministic sample values: a slow ramp with a superimposed sawtooth.
///
/// ```
/// use test_utils::create_test_samples;
///
/// let data = create_test_samples(10);
/// assert_eq!(data.len(), 10);
/// assert_eq!(data[0], 0.0);
/// ```
pub fn create_test_samples(npts: usize) -> Vec<f32> {
    (0..npts)
        .map(|i| (i / 10) as f32 + (i % 7) as f32 * 0.5)
        .collect()
}

/// Builder for SAC binary files.
#[derive(Debug, Clone)]
pub struct SacBuilder {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    /// Reference time as (year, julian day, hour, minute, second, millisecond).
    pub reference: (i32, i32, i32, i32, i32, i32),
    pub begin_offset: f32,
    pub delta: f32,
    pub samples: Vec<f32>,
    /// Station latitude, longitude, elevation and local depth. `None`
    /// entries are written as the undefined value.
    pub coordinates: [Option<f32>; 4],
    pub big_endian: bool,
}

impl SacBuilder {
    pub fn new(network: &str, station: &str, location: &str, channel: &str) -> Self {
        Self {
            network: network.to_string(),
            station: station.to_string(),
            location: location.to_string(),
            channel: channel.to_string(),
            reference: (2012, 240, 4, 43, 56, 35),
            begin_offset: 0.0,
            delta: 0.01,
            samples: create_test_samples(100),
            coordinates: [None; 4],
            big_endian: false,
        }
    }

    pub fn sampling_rate(mut self, rate: f32) -> Self {
        self.delta = 1.0 / rate;
        self
    }

    pub fn samples(mut self, samples: Vec<f32>) -> Self {
        self.samples = samples;
        self
    }

    pub fn npts(self, npts: usize) -> Self {
        self.samples(create_test_samples(npts))
    }

    pub fn reference(mut self, year: i32, jday: i32, hour: i32, minute: i32, second: i32) -> Self {
        self.reference = (year, jday, hour, minute, second, 0);
        self
    }

    pub fn coordinates(mut self, latitude: f32, longitude: f32, elevation: f32) -> Self {
        self.coordinates = [Some(latitude), Some(longitude), Some(elevation), None];
        self
    }

    pub fn local_depth(mut self, depth: f32) -> Self {
        self.coordinates[3] = Some(depth);
        self
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        const UNDEF: f32 = -12345.0;
        let mut floats = [UNDEF; 70];
        let mut ints = [-12345i32; 40];

        floats[0] = self.delta;
        floats[5] = self.begin_offset;
        floats[6] = self.begin_offset + self.delta * self.samples.len().saturating_sub(1) as f32;
        for (slot, value) in [31, 32, 33, 34].into_iter().zip(self.coordinates) {
            if let Some(v) = value {
                floats[slot] = v;
            }
        }

        let (year, jday, hour, minute, second, msec) = self.reference;
        ints[..6].copy_from_slice(&[year, jday, hour, minute, second, msec]);
        ints[6] = 6;
        ints[9] = self.samples.len() as i32;
        ints[15] = 1;
        ints[35] = 1;

        let mut chars = [b' '; 192];
        let mut put = |offset: usize, width: usize, value: &str| {
            let value = if value.is_empty() { "-12345" } else { value };
            let n = value.len().min(width);
            chars[offset..offset + n].copy_from_slice(&value.as_bytes()[..n]);
        };
        put(0, 8, &self.station);
        put(8, 16, "");
        put(24, 8, &self.location);
        put(160, 8, &self.channel);
        put(168, 8, &self.network);

        let mut out = Vec::with_capacity(632 + self.samples.len() * 4);
        let be = self.big_endian;
        for f in floats {
            out.extend_from_slice(&if be { f.to_be_bytes() } else { f.to_le_bytes() });
        }
        for i in ints {
            out.extend_from_slice(&if be { i.to_be_bytes() } else { i.to_le_bytes() });
        }
        out.extend_from_slice(&chars);
        for s in &self.samples {
            out.extend_from_slice(&if be { s.to_be_bytes() } else { s.to_le_bytes() });
        }
        out
    }
}

/// A channel entry of a generated dataless SEED volume.
#[derive(Debug, Clone)]
pub struct SeedChannel {
    pub location: String,
    pub channel: String,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub local_depth: f64,
    pub start: String,
}

impl SeedChannel {
    pub fn new(location: &str, channel: &str, coordinates: (f64, f64, f64)) -> Self {
        Self {
            location: location.to_string(),
            channel: channel.to_string(),
            latitude: coordinates.0,
            longitude: coordinates.1,
            elevation: coordinates.2,
            local_depth: 0.0,
            start: "2006,001,00:00:00.0000".to_string(),
        }
    }
}

fn blockette(kind: u16, body: &str) -> String {
    format!("{:03}{:04}{}", kind, body.len() + 7, body)
}

/// Build a dataless SEED volume with one station, 4096 byte records.
pub fn create_dataless_seed(
    network: &str,
    station: &str,
    coordinates: (f64, f64, f64),
    channels: &[SeedChannel],
) -> Vec<u8> {
    const RECORD_LEN: usize = 4096;

    let b010 = blockette(10, " 2.412~2006,001~~Test Volume~~");
    let b050 = blockette(
        50,
        &format!(
            "{:<5}{:+010.6}{:+011.6}{:+07.1}{:04}{:03}{}~{:03}{:04}{:02}{}~~N{:<2}",
            station,
            coordinates.0,
            coordinates.1,
            coordinates.2,
            channels.len(),
            0,
            "Test Site",
            0,
            3210,
            10,
            "2006,001",
            network
        ),
    );

    let mut station_header = b050;
    for c in channels {
        station_header.push_str(&blockette(
            52,
            &format!(
                "{:<2}{:<3}{:04}{:03}~{:03}{:03}{:+010.6}{:+011.6}{:+07.1}{:05.1}{:05.1}{:+05.1}{:04}{:02}{:10}{:10}{:04}~{}~~N",
                c.location,
                c.channel,
                0,
                0,
                1,
                2,
                c.latitude,
                c.longitude,
                c.elevation,
                c.local_depth,
                0.0,
                -90.0,
                1,
                12,
                "1.0000E+02",
                "0.0000E+00",
                0,
                c.start,
            ),
        ));
    }

    let record = |sequence: usize, kind: char, body: &str| {
        let mut r = format!("{:06}{} {}", sequence, kind, body).into_bytes();
        r.resize(RECORD_LEN, b' ');
        r
    };
    let mut out = record(1, 'V', &b010);
    out.extend(record(2, 'S', &station_header));
    out
}

/// Minimal MiniSEED file: one 512 byte record of big-endian int32 samples
/// with the given header fields.
pub fn create_mseed_record(
    network: &str,
    station: &str,
    location: &str,
    channel: &str,
    samples: &[i32],
) -> Vec<u8> {
    assert!(samples.len() <= (512 - 64) / 4, "too many samples for one record");
    let mut out = Vec::with_capacity(512);
    out.extend_from_slice(b"000001D ");
    let mut pad = |value: &str, width: usize| {
        let mut field = value.as_bytes().to_vec();
        field.resize(width, b' ');
        out.extend_from_slice(&field[..width]);
    };
    pad(station, 5);
    pad(location, 2);
    pad(channel, 3);
    pad(network, 2);
    out.extend_from_slice(&2012u16.to_be_bytes());
    out.extend_from_slice(&240u16.to_be_bytes());
    out.extend_from_slice(&[4, 43, 56, 0]);
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&(samples.len() as u16).to_be_bytes());
    out.extend_from_slice(&20i16.to_be_bytes());
    out.extend_from_slice(&1i16.to_be_bytes());
    out.extend_from_slice(&[0, 0, 0, 1]);
    out.extend_from_slice(&0i32.to_be_bytes());
    out.extend_from_slice(&64u16.to_be_bytes());
    out.extend_from_slice(&48u16.to_be_bytes());
    out.extend_from_slice(&1000u16.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&[3, 1, 9, 0]);
    out.resize(64, 0);
    for s in samples {
        out.extend_from_slice(&s.to_be_bytes());
    }
    out.resize(512, 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sac_layout() {
        let bytes = SacBuilder::new("BW", "FURT", "", "EHZ").npts(10).build();
        assert_eq!(bytes.len(), 632 + 40);
        // nvhdr
        assert_eq!(i32::from_le_bytes(bytes[304..308].try_into().unwrap()), 6);
    }

    #[test]
    fn test_seed_record_sizes() {
        let bytes = create_dataless_seed(
            "BW",
            "FURT",
            (48.16, 11.27, 565.0),
            &[SeedChannel::new("", "EHZ", (48.16, 11.27, 565.0))],
        );
        assert_eq!(bytes.len(), 8192);
        assert_eq!(&bytes[..8], b"000001V ");
        assert_eq!(&bytes[8..11], b"010");
    }

    #[test]
    fn test_mseed_record_size() {
        let bytes = create_mseed_record("BW", "FURT", "", "EHZ", &[1, 2, 3]);
        assert_eq!(bytes.len(), 512);
        assert_eq!(bytes[6], b'D');
    }
}

//! SAC binary format (header version 6).
//!
//! A file is a 632 byte header followed by `npts` 32-bit floats. The header
//! holds 70 floats, 40 integers and 192 bytes of character fields. Byte
//! order is not flagged explicitly; it is inferred from `nvhdr`, which must
//! read as 6.

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use seis_common::Coordinates;

use crate::error::{CodecError, CodecResult};
use crate::trace::{Trace, TraceHeader};

pub const HEADER_LEN: usize = 632;

const FLOAT_COUNT: usize = 70;
const INT_COUNT: usize = 40;
const INT_OFFSET: usize = FLOAT_COUNT * 4;
const CHAR_OFFSET: usize = INT_OFFSET + INT_COUNT * 4;

const UNDEF_F: f32 = -12345.0;
const UNDEF_I: i32 = -12345;
const UNDEF_K: &str = "-12345";

// Float header words.
const DELTA: usize = 0;
const DEPMIN: usize = 1;
const DEPMAX: usize = 2;
const B: usize = 5;
const E: usize = 6;
const STLA: usize = 31;
const STLO: usize = 32;
const STEL: usize = 33;
const STDP: usize = 34;
const DEPMEN: usize = 56;

// Integer header words.
const NZYEAR: usize = 0;
const NZJDAY: usize = 1;
const NZHOUR: usize = 2;
const NZMIN: usize = 3;
const NZSEC: usize = 4;
const NZMSEC: usize = 5;
const NVHDR: usize = 6;
const NPTS: usize = 9;
const IFTYPE: usize = 15;
const LEVEN: usize = 35;

const ITIME: i32 = 1;
const SAC_VERSION: i32 = 6;

// Character fields as (offset, width).
const KSTNM: (usize, usize) = (0, 8);
const KEVNM: (usize, usize) = (8, 16);
const KHOLE: (usize, usize) = (24, 8);
const KCMPNM: (usize, usize) = (160, 8);
const KNETWK: (usize, usize) = (168, 8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

struct HeaderView<'a> {
    bytes: &'a [u8],
    order: ByteOrder,
}

impl<'a> HeaderView<'a> {
    fn word(&self, offset: usize) -> [u8; 4] {
        [
            self.bytes[offset],
            self.bytes[offset + 1],
            self.bytes[offset + 2],
            self.bytes[offset + 3],
        ]
    }

    fn float(&self, index: usize) -> f32 {
        let w = self.word(index * 4);
        match self.order {
            ByteOrder::Little => f32::from_le_bytes(w),
            ByteOrder::Big => f32::from_be_bytes(w),
        }
    }

    fn int(&self, index: usize) -> i32 {
        let w = self.word(INT_OFFSET + index * 4);
        match self.order {
            ByteOrder::Little => i32::from_le_bytes(w),
            ByteOrder::Big => i32::from_be_bytes(w),
        }
    }

    fn text(&self, (offset, width): (usize, usize)) -> String {
        let start = CHAR_OFFSET + offset;
        let raw = String::from_utf8_lossy(&self.bytes[start..start + width]);
        let value = raw.trim_matches(|c: char| c == '\0' || c.is_whitespace());
        if value == UNDEF_K {
            String::new()
        } else {
            value.to_string()
        }
    }

    fn defined_float(&self, index: usize) -> Option<f64> {
        let value = self.float(index);
        (value != UNDEF_F && value.is_finite()).then_some(value as f64)
    }
}

fn detect_byte_order(data: &[u8]) -> Option<ByteOrder> {
    if data.len() < HEADER_LEN {
        return None;
    }
    let offset = INT_OFFSET + NVHDR * 4;
    let w = [data[offset], data[offset + 1], data[offset + 2], data[offset + 3]];
    if i32::from_le_bytes(w) == SAC_VERSION {
        Some(ByteOrder::Little)
    } else if i32::from_be_bytes(w) == SAC_VERSION {
        Some(ByteOrder::Big)
    } else {
        None
    }
}

/// Whether the payload looks like a SAC binary file.
pub fn is_sac(data: &[u8]) -> bool {
    let Some(order) = detect_byte_order(data) else {
        return false;
    };
    let view = HeaderView { bytes: data, order };
    let npts = view.int(NPTS);
    npts >= 0 && data.len() >= HEADER_LEN + npts as usize * 4
}

/// Decode one SAC file into a trace.
pub fn read(data: &[u8]) -> CodecResult<Trace> {
    let order = detect_byte_order(data)
        .ok_or_else(|| CodecError::malformed("SAC", "no valid version 6 header found"))?;
    let view = HeaderView { bytes: data, order };

    let npts = view.int(NPTS);
    if npts < 0 {
        return Err(CodecError::malformed("SAC", format!("negative npts {}", npts)));
    }
    let npts = npts as usize;
    let needed = HEADER_LEN + npts * 4;
    if data.len() < needed {
        return Err(CodecError::malformed(
            "SAC",
            format!("{} samples need {} bytes, file has {}", npts, needed, data.len()),
        ));
    }

    let delta = view.float(DELTA);
    if !(delta > 0.0 && delta.is_finite()) {
        return Err(CodecError::malformed("SAC", format!("invalid delta {}", delta)));
    }

    let samples = data[HEADER_LEN..needed]
        .chunks_exact(4)
        .map(|c| {
            let w = [c[0], c[1], c[2], c[3]];
            let v = match order {
                ByteOrder::Little => f32::from_le_bytes(w),
                ByteOrder::Big => f32::from_be_bytes(w),
            };
            v as f64
        })
        .collect();

    let header = TraceHeader {
        network: view.text(KNETWK),
        station: view.text(KSTNM),
        location: view.text(KHOLE),
        channel: view.text(KCMPNM),
        starttime: start_time(&view)?,
        sampling_rate: 1.0 / delta as f64,
        npts,
        coordinates: coordinates(&view),
    };
    header.checked_endtime("SAC")?;

    Ok(Trace::new(header, samples))
}

fn reference_time(view: &HeaderView<'_>) -> DateTime<Utc> {
    let fields = [
        view.int(NZYEAR),
        view.int(NZJDAY),
        view.int(NZHOUR),
        view.int(NZMIN),
        view.int(NZSEC),
        view.int(NZMSEC),
    ];
    if fields.contains(&UNDEF_I) {
        return DateTime::<Utc>::UNIX_EPOCH;
    }
    let [year, jday, hour, minute, second, msec] = fields;
    NaiveDate::from_yo_opt(year, jday.max(1) as u32)
        .and_then(|d| d.and_hms_milli_opt(hour as u32, minute as u32, second as u32, msec as u32))
        .map(|ndt| Utc.from_utc_datetime(&ndt))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn start_time(view: &HeaderView<'_>) -> CodecResult<DateTime<Utc>> {
    let b = view.defined_float(B).unwrap_or(0.0);
    let offset_us = (b * 1_000_000.0).round();
    let reference = reference_time(view);
    (offset_us.abs() < i64::MAX as f64)
        .then(|| reference.checked_add_signed(Duration::microseconds(offset_us as i64)))
        .flatten()
        .ok_or_else(|| CodecError::malformed("SAC", format!("begin offset {} s from {} is out of range", b, reference)))
}

/// Station position is only trusted when latitude, longitude and elevation
/// are all set. A missing local depth counts as surface.
fn coordinates(view: &HeaderView<'_>) -> Option<Coordinates> {
    let latitude = view.defined_float(STLA)?;
    let longitude = view.defined_float(STLO)?;
    let elevation = view.defined_float(STEL)?;
    let depth = view.defined_float(STDP).unwrap_or(0.0);
    Some(Coordinates::new(latitude, longitude, elevation, depth))
}

/// Encode a single trace as little-endian SAC.
pub fn write(traces: &[Trace]) -> CodecResult<Bytes> {
    let [trace] = traces else {
        return Err(CodecError::TraceCount {
            format: "SAC".to_string(),
            count: traces.len(),
        });
    };
    let header = &trace.header;
    if header.sampling_rate <= 0.0 {
        return Err(CodecError::malformed(
            "SAC",
            format!("cannot write sampling rate {}", header.sampling_rate),
        ));
    }

    let mut floats = [UNDEF_F; FLOAT_COUNT];
    let mut ints = [UNDEF_I; INT_COUNT];

    let delta = 1.0 / header.sampling_rate;
    floats[DELTA] = delta as f32;

    let (min, max, sum) = trace.data.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY, 0.0),
        |(min, max, sum), &v| (min.min(v), max.max(v), sum + v),
    );
    if !trace.data.is_empty() {
        floats[DEPMIN] = min as f32;
        floats[DEPMAX] = max as f32;
        floats[DEPMEN] = (sum / trace.data.len() as f64) as f32;
    }

    // The reference time carries millisecond precision, the rest goes to b.
    let start = header.starttime;
    let sub_ms_us = (start.nanosecond() % 1_000_000) / 1_000;
    let b = sub_ms_us as f64 / 1_000_000.0;
    floats[B] = b as f32;
    floats[E] = (b + delta * trace.data.len().saturating_sub(1) as f64) as f32;

    if let Some(coords) = header.coordinates.filter(|c| c.is_located()) {
        floats[STLA] = coords.latitude.unwrap_or_default() as f32;
        floats[STLO] = coords.longitude.unwrap_or_default() as f32;
        floats[STEL] = coords.elevation_in_m.unwrap_or_default() as f32;
        floats[STDP] = coords.local_depth_in_m.unwrap_or(0.0) as f32;
    }

    ints[NZYEAR] = start.year();
    ints[NZJDAY] = start.ordinal() as i32;
    ints[NZHOUR] = start.hour() as i32;
    ints[NZMIN] = start.minute() as i32;
    ints[NZSEC] = start.second() as i32;
    ints[NZMSEC] = (start.nanosecond() / 1_000_000).min(999) as i32;
    ints[NVHDR] = SAC_VERSION;
    ints[NPTS] = trace.data.len() as i32;
    ints[IFTYPE] = ITIME;
    ints[LEVEN] = 1;

    let mut buf = BytesMut::with_capacity(HEADER_LEN + trace.data.len() * 4);
    for f in floats {
        buf.put_f32_le(f);
    }
    for i in ints {
        buf.put_i32_le(i);
    }

    let mut chars = [b' '; 192];
    for field in [KSTNM, KEVNM, KHOLE, KCMPNM, KNETWK] {
        put_text(&mut chars, field, UNDEF_K);
    }
    put_text(&mut chars, KSTNM, &header.station);
    put_text(&mut chars, KHOLE, &header.location);
    put_text(&mut chars, KCMPNM, &header.channel);
    put_text(&mut chars, KNETWK, &header.network);
    // Remaining character fields are undefined as well.
    for offset in (32..160).step_by(8).chain((176..192).step_by(8)) {
        put_text(&mut chars, (offset, 8), UNDEF_K);
    }
    buf.put_slice(&chars);

    for &v in &trace.data {
        buf.put_f32_le(v as f32);
    }
    Ok(buf.freeze())
}

fn put_text(chars: &mut [u8; 192], (offset, width): (usize, usize), value: &str) {
    let value = if value.is_empty() { UNDEF_K } else { value };
    let field = &mut chars[offset..offset + width];
    field.fill(b' ');
    let n = value.len().min(width);
    field[..n].copy_from_slice(&value.as_bytes()[..n]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace() -> Trace {
        let header = TraceHeader {
            network: "BW".into(),
            station: "FURT".into(),
            location: "".into(),
            channel: "EHZ".into(),
            starttime: Utc.with_ymd_and_hms(2012, 8, 27, 4, 43, 56).unwrap()
                + Duration::microseconds(35_004),
            sampling_rate: 100.0,
            npts: 0,
            coordinates: Some(Coordinates::new(48.16, 11.27, 565.0, 0.0)),
        };
        Trace::new(header, vec![1.0, -2.0, 3.5, 0.0])
    }

    #[test]
    fn test_write_then_read_keeps_header() {
        let original = trace();
        let bytes = write(std::slice::from_ref(&original)).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + 16);
        assert!(is_sac(&bytes));

        let decoded = read(&bytes).unwrap();
        assert_eq!(decoded.channel_id(), original.channel_id());
        assert_eq!(decoded.header.starttime, original.header.starttime);
        assert_eq!(decoded.data, original.data);
        assert!((decoded.header.sampling_rate - 100.0).abs() < 1e-3);
        let coords = decoded.header.coordinates.unwrap();
        assert!((coords.latitude.unwrap() - 48.16).abs() < 1e-4);
    }

    #[test]
    fn test_write_rejects_multiple_traces() {
        let t = trace();
        assert!(matches!(
            write(&[t.clone(), t]),
            Err(CodecError::TraceCount { count: 2, .. })
        ));
    }

    #[test]
    fn test_short_payload_is_not_sac() {
        assert!(!is_sac(b"not a sac file"));
        assert!(read(&[0u8; 100]).is_err());
    }

    #[test]
    fn test_truncated_samples_are_rejected() {
        let bytes = write(&[trace()]).unwrap();
        let truncated = &bytes[..bytes.len() - 4];
        assert!(!is_sac(truncated));
        assert!(matches!(read(truncated), Err(CodecError::Malformed { .. })));
    }
}

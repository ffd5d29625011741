//! MiniSEED data records (SEED 2.4).
//!
//! Every record starts with the 48 byte fixed header and must carry a
//! blockette 1000, which gives the sample encoding, data byte order and
//! record length. Consecutive records of one channel that continue each
//! other in time are merged into a single trace.

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};

use crate::error::{CodecError, CodecResult};
use crate::trace::{Trace, TraceHeader};

const FORMAT: &str = "MSEED";
const FIXED_HEADER_LEN: usize = 48;
const BLOCKETTE_1000: u16 = 1000;

const WRITE_RECORD_EXPONENT: u8 = 12;
const WRITE_RECORD_LEN: usize = 1 << WRITE_RECORD_EXPONENT;
const WRITE_DATA_OFFSET: usize = 64;
const WRITE_SAMPLES_PER_RECORD: usize = (WRITE_RECORD_LEN - WRITE_DATA_OFFSET) / 4;

const ENC_INT16: u8 = 1;
const ENC_INT32: u8 = 3;
const ENC_FLOAT32: u8 = 4;
const ENC_FLOAT64: u8 = 5;
const ENC_STEIM1: u8 = 10;
const ENC_STEIM2: u8 = 11;

/// Whether the payload starts with a MiniSEED fixed header.
pub fn is_mseed(data: &[u8]) -> bool {
    data.len() >= FIXED_HEADER_LEN
        && data[..6].iter().all(|b| b.is_ascii_digit() || *b == b' ')
        && data[..6].iter().any(u8::is_ascii_digit)
        && matches!(data[6], b'D' | b'R' | b'Q' | b'M')
        && matches!(data[7], b' ' | 0)
}

fn word<const N: usize>(data: &[u8], offset: usize) -> CodecResult<[u8; N]> {
    data.get(offset..offset + N)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| CodecError::malformed(FORMAT, "record truncated"))
}

fn read_u16(data: &[u8], offset: usize, big: bool) -> CodecResult<u16> {
    let w = word::<2>(data, offset)?;
    Ok(if big { u16::from_be_bytes(w) } else { u16::from_le_bytes(w) })
}

fn read_i16(data: &[u8], offset: usize, big: bool) -> CodecResult<i16> {
    read_u16(data, offset, big).map(|v| v as i16)
}

fn read_u32(data: &[u8], offset: usize, big: bool) -> CodecResult<u32> {
    let w = word::<4>(data, offset)?;
    Ok(if big { u32::from_be_bytes(w) } else { u32::from_le_bytes(w) })
}

fn text(data: &[u8], range: std::ops::Range<usize>) -> String {
    String::from_utf8_lossy(&data[range]).trim().to_string()
}

struct RecordHeader {
    network: String,
    station: String,
    location: String,
    channel: String,
    start: DateTime<Utc>,
    sampling_rate: f64,
    nsamp: usize,
    encoding: u8,
    data_big_endian: bool,
    record_len: usize,
    data_offset: usize,
}

/// Sample rate from the SEED factor/multiplier pair.
fn sampling_rate(factor: i16, multiplier: i16) -> f64 {
    let (f, m) = (factor as f64, multiplier as f64);
    match (factor, multiplier) {
        (0, _) | (_, 0) => 0.0,
        (f1, m1) if f1 > 0 && m1 > 0 => f * m,
        (f1, _) if f1 > 0 => -f / m,
        (_, m1) if m1 > 0 => -m / f,
        _ => 1.0 / (f * m),
    }
}

/// Factor/multiplier pair approximating `rate`.
fn rate_factors(rate: f64) -> (i16, i16) {
    let max = i16::MAX as f64;
    if rate <= 0.0 {
        return (0, 1);
    }
    let period = 1.0 / rate;
    if rate < 1.0 && period.fract().abs() < 1e-9 && period <= max {
        (-(period as i16), 1)
    } else if rate.fract().abs() < 1e-9 && rate <= max {
        (rate as i16, 1)
    } else if rate * 10_000.0 <= max {
        ((rate * 10_000.0).round() as i16, -10_000)
    } else if rate * 10.0 <= max {
        ((rate * 10.0).round() as i16, -10)
    } else {
        (rate.round().min(max) as i16, 1)
    }
}

fn parse_record(record: &[u8]) -> CodecResult<RecordHeader> {
    if !is_mseed(record) {
        return Err(CodecError::malformed(FORMAT, "invalid fixed header"));
    }
    // The header byte order is not flagged; a sane year decides it.
    let big = if (1900..=2100).contains(&read_u16(record, 20, true)?) {
        true
    } else if (1900..=2100).contains(&read_u16(record, 20, false)?) {
        false
    } else {
        return Err(CodecError::malformed(FORMAT, "cannot determine byte order"));
    };

    let year = read_u16(record, 20, big)? as i32;
    let jday = read_u16(record, 22, big)? as u32;
    let (hour, minute, second) = (record[24] as u32, record[25] as u32, record[26] as u32);
    let fract = read_u16(record, 28, big)? as i64;
    let nsamp = read_u16(record, 30, big)? as usize;
    let factor = read_i16(record, 32, big)?;
    let multiplier = read_i16(record, 34, big)?;
    let activity = record[36];
    let blockettes = record[39];
    let correction = read_u32(record, 40, big)? as i32 as i64;
    let data_offset = read_u16(record, 44, big)? as usize;
    let mut next = read_u16(record, 46, big)? as usize;

    let mut b1000 = None;
    for _ in 0..blockettes.max(1) {
        if next == 0 || next + 8 > record.len() {
            break;
        }
        if read_u16(record, next, big)? == BLOCKETTE_1000 {
            b1000 = Some((record[next + 4], record[next + 5], record[next + 6]));
        }
        next = read_u16(record, next + 2, big)? as usize;
    }
    let (encoding, word_order, exponent) =
        b1000.ok_or_else(|| CodecError::malformed(FORMAT, "record without blockette 1000"))?;
    if !(7..=20).contains(&exponent) {
        return Err(CodecError::malformed(
            FORMAT,
            format!("invalid record length exponent {}", exponent),
        ));
    }

    // Bit 1 set means the correction is already applied to the start time.
    let correction_us = if activity & 0x02 == 0 { correction * 100 } else { 0 };
    let start = NaiveDate::from_yo_opt(year, jday.max(1))
        .and_then(|d| d.and_hms_opt(hour, minute, second.min(59)))
        .map(|ndt| Utc.from_utc_datetime(&ndt))
        .and_then(|t| t.checked_add_signed(Duration::microseconds(fract * 100)))
        .and_then(|t| t.checked_add_signed(Duration::microseconds(correction_us)))
        .ok_or_else(|| CodecError::malformed(FORMAT, "invalid record start time"))?;

    Ok(RecordHeader {
        station: text(record, 8..13),
        location: text(record, 13..15),
        channel: text(record, 15..18),
        network: text(record, 18..20),
        start,
        sampling_rate: sampling_rate(factor, multiplier),
        nsamp,
        encoding,
        data_big_endian: word_order == 1,
        record_len: 1 << exponent,
        data_offset,
    })
}

#[derive(Clone, Copy)]
enum Steim {
    One,
    Two,
}

fn sign_extend(value: u32, bits: u32) -> i32 {
    ((value << (32 - bits)) as i32) >> (32 - bits)
}

/// Push `count` packed differences of `bits` width, most significant first.
fn unpack(diffs: &mut Vec<i32>, w: u32, count: u32, bits: u32) {
    let mask = if bits == 32 { u32::MAX } else { (1u32 << bits) - 1 };
    for k in 0..count {
        let shift = bits * (count - 1 - k);
        diffs.push(sign_extend((w >> shift) & mask, bits));
    }
}

fn decode_steim(data: &[u8], nsamp: usize, big: bool, level: Steim) -> CodecResult<Vec<f64>> {
    let mut diffs: Vec<i32> = Vec::with_capacity(nsamp);
    let mut first = None;

    for (index, frame) in data.chunks_exact(64).enumerate() {
        let nibbles = read_u32(frame, 0, big)?;
        for i in 1..16 {
            let w = read_u32(frame, i * 4, big)?;
            if index == 0 && i == 1 {
                first = Some(w as i32);
                continue;
            }
            if index == 0 && i == 2 {
                // Reverse integration constant, only useful for checking.
                continue;
            }
            let nibble = (nibbles >> (30 - 2 * i)) & 0b11;
            match (level, nibble) {
                (_, 0) => {}
                (_, 1) => unpack(&mut diffs, w, 4, 8),
                (Steim::One, 2) => unpack(&mut diffs, w, 2, 16),
                (Steim::One, _) => unpack(&mut diffs, w, 1, 32),
                (Steim::Two, 2) => match w >> 30 {
                    1 => unpack(&mut diffs, w, 1, 30),
                    2 => unpack(&mut diffs, w, 2, 15),
                    3 => unpack(&mut diffs, w, 3, 10),
                    _ => return Err(CodecError::malformed(FORMAT, "invalid Steim-2 word")),
                },
                (Steim::Two, _) => match w >> 30 {
                    0 => unpack(&mut diffs, w, 5, 6),
                    1 => unpack(&mut diffs, w, 6, 5),
                    2 => unpack(&mut diffs, w, 7, 4),
                    _ => return Err(CodecError::malformed(FORMAT, "invalid Steim-2 word")),
                },
            }
        }
        if diffs.len() >= nsamp {
            break;
        }
    }

    if nsamp == 0 {
        return Ok(Vec::new());
    }
    let first = first.ok_or_else(|| CodecError::malformed(FORMAT, "empty Steim frame"))?;
    if diffs.len() < nsamp {
        return Err(CodecError::malformed(
            FORMAT,
            format!("expected {} samples, frames hold {}", nsamp, diffs.len()),
        ));
    }
    // The first difference refers to the previous record and is skipped.
    let mut current = first;
    let mut samples = Vec::with_capacity(nsamp);
    samples.push(current as f64);
    for d in &diffs[1..nsamp] {
        current = current.wrapping_add(*d);
        samples.push(current as f64);
    }
    Ok(samples)
}

fn decode_fixed<const N: usize>(
    data: &[u8],
    nsamp: usize,
    convert: impl Fn([u8; N]) -> f64,
) -> CodecResult<Vec<f64>> {
    if data.len() < nsamp * N {
        return Err(CodecError::malformed(
            FORMAT,
            format!("{} samples do not fit in {} bytes", nsamp, data.len()),
        ));
    }
    Ok(data
        .chunks_exact(N)
        .take(nsamp)
        .map(|c| {
            let mut w = [0u8; N];
            w.copy_from_slice(c);
            convert(w)
        })
        .collect())
}

fn decode_samples(data: &[u8], encoding: u8, nsamp: usize, big: bool) -> CodecResult<Vec<f64>> {
    match encoding {
        ENC_INT16 => decode_fixed::<2>(data, nsamp, |w| {
            (if big { i16::from_be_bytes(w) } else { i16::from_le_bytes(w) }) as f64
        }),
        ENC_INT32 => decode_fixed::<4>(data, nsamp, |w| {
            (if big { i32::from_be_bytes(w) } else { i32::from_le_bytes(w) }) as f64
        }),
        ENC_FLOAT32 => decode_fixed::<4>(data, nsamp, |w| {
            (if big { f32::from_be_bytes(w) } else { f32::from_le_bytes(w) }) as f64
        }),
        ENC_FLOAT64 => decode_fixed::<8>(data, nsamp, |w| {
            if big { f64::from_be_bytes(w) } else { f64::from_le_bytes(w) }
        }),
        ENC_STEIM1 => decode_steim(data, nsamp, big, Steim::One),
        ENC_STEIM2 => decode_steim(data, nsamp, big, Steim::Two),
        other => Err(CodecError::DecodeUnsupported(format!(
            "MSEED encoding {}",
            other
        ))),
    }
}

fn continues(trace: &Trace, header: &RecordHeader) -> bool {
    let h = &trace.header;
    if h.network != header.network
        || h.station != header.station
        || h.location != header.location
        || h.channel != header.channel
        || (h.sampling_rate - header.sampling_rate).abs() > 1e-9 * h.sampling_rate.max(1.0)
        || h.sampling_rate <= 0.0
    {
        return false;
    }
    let Some(expected) = h.sample_time(trace.data.len()) else {
        return false;
    };
    let half_period_us = (500_000.0 / h.sampling_rate) as i64;
    (header.start - expected)
        .num_microseconds()
        .map_or(false, |gap| gap.abs() <= half_period_us)
}

/// Decode all data records into traces.
pub fn read(data: &[u8]) -> CodecResult<Vec<Trace>> {
    let mut traces: Vec<Trace> = Vec::new();
    let mut pos = 0;

    while pos + FIXED_HEADER_LEN <= data.len() {
        let record = &data[pos..];
        let header = parse_record(record)?;
        if header.record_len > record.len() {
            return Err(CodecError::malformed(FORMAT, "last record is truncated"));
        }
        pos += header.record_len;
        if header.nsamp == 0 {
            continue;
        }

        let payload = &record[header.data_offset.min(header.record_len)..header.record_len];
        let samples = decode_samples(payload, header.encoding, header.nsamp, header.data_big_endian)?;

        match traces.last_mut() {
            Some(last) if continues(last, &header) => {
                last.data.extend(samples);
                last.header.npts = last.data.len();
            }
            _ => traces.push(Trace::new(
                TraceHeader {
                    network: header.network,
                    station: header.station,
                    location: header.location,
                    channel: header.channel,
                    starttime: header.start,
                    sampling_rate: header.sampling_rate,
                    npts: samples.len(),
                    coordinates: None,
                },
                samples,
            )),
        }
    }

    if traces.is_empty() {
        return Err(CodecError::malformed(FORMAT, "no data records"));
    }
    for trace in &traces {
        trace.header.checked_endtime(FORMAT)?;
    }
    Ok(traces)
}

fn put_padded(buf: &mut BytesMut, value: &str, width: usize) {
    let bytes = value.as_bytes();
    let n = bytes.len().min(width);
    buf.put_slice(&bytes[..n]);
    buf.put_bytes(b' ', width - n);
}

/// Encode traces as big-endian float32 records of 4096 bytes.
pub fn write(traces: &[Trace]) -> CodecResult<Bytes> {
    let mut buf = BytesMut::new();
    let mut sequence: u32 = 1;

    for trace in traces {
        let header = &trace.header;
        let (factor, multiplier) = rate_factors(header.sampling_rate);
        for (chunk_index, chunk) in trace.data.chunks(WRITE_SAMPLES_PER_RECORD).enumerate() {
            let start = header
                .sample_time(chunk_index * WRITE_SAMPLES_PER_RECORD)
                .ok_or_else(|| CodecError::malformed(FORMAT, "record start time out of range"))?;
            let record_start = buf.len();

            buf.put_slice(format!("{:06}", sequence % 1_000_000).as_bytes());
            buf.put_slice(b"D ");
            put_padded(&mut buf, &header.station, 5);
            put_padded(&mut buf, &header.location, 2);
            put_padded(&mut buf, &header.channel, 3);
            put_padded(&mut buf, &header.network, 2);

            buf.put_u16(start.year() as u16);
            buf.put_u16(start.ordinal() as u16);
            buf.put_u8(start.hour() as u8);
            buf.put_u8(start.minute() as u8);
            buf.put_u8(start.second() as u8);
            buf.put_u8(0);
            buf.put_u16((start.nanosecond() / 100_000).min(9_999) as u16);

            buf.put_u16(chunk.len() as u16);
            buf.put_i16(factor);
            buf.put_i16(multiplier);
            buf.put_u8(0); // activity flags
            buf.put_u8(0); // I/O flags
            buf.put_u8(0); // quality flags
            buf.put_u8(1); // blockettes that follow
            buf.put_i32(0); // time correction
            buf.put_u16(WRITE_DATA_OFFSET as u16);
            buf.put_u16(FIXED_HEADER_LEN as u16);

            buf.put_u16(BLOCKETTE_1000);
            buf.put_u16(0);
            buf.put_u8(ENC_FLOAT32);
            buf.put_u8(1);
            buf.put_u8(WRITE_RECORD_EXPONENT);
            buf.put_u8(0);

            buf.put_bytes(0, record_start + WRITE_DATA_OFFSET - buf.len());
            for &v in chunk {
                buf.put_f32(v as f32);
            }
            buf.put_bytes(0, record_start + WRITE_RECORD_LEN - buf.len());
            sequence += 1;
        }
    }

    if buf.is_empty() {
        return Err(CodecError::malformed(FORMAT, "nothing to write"));
    }
    Ok(buf.freeze())
}

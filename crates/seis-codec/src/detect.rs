//! Format detection from magic bytes.

use seis_common::{StationFormat, WaveformFormat};

use crate::{mseed, resp, sac, seed, xseed};

/// Guess the waveform format of a payload. SEG-Y carries no reliable magic
/// and is never guessed.
pub fn detect_waveform_format(data: &[u8]) -> Option<WaveformFormat> {
    if mseed::is_mseed(data) {
        Some(WaveformFormat::MiniSeed)
    } else if sac::is_sac(data) {
        Some(WaveformFormat::Sac)
    } else if is_gse2(data) {
        Some(WaveformFormat::Gse2)
    } else {
        None
    }
}

/// Guess the station metadata format of a payload.
pub fn detect_station_format(data: &[u8]) -> Option<StationFormat> {
    if seed::is_seed_volume(data) {
        Some(StationFormat::Seed)
    } else if xseed::is_xseed(data) {
        Some(StationFormat::XSeed)
    } else if resp::is_resp(data) {
        Some(StationFormat::Resp)
    } else {
        None
    }
}

fn is_gse2(data: &[u8]) -> bool {
    let head = String::from_utf8_lossy(&data[..data.len().min(4096)]);
    head.lines().any(|l| l.starts_with("WID2"))
}

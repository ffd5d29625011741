//! The codec seam between the archive and format implementations.

use bytes::Bytes;
use seis_common::{StationFormat, WaveformFormat};
use tracing::debug;

use crate::detect;
use crate::error::{CodecError, CodecResult};
use crate::trace::{StationInventory, Trace};
use crate::{mseed, resp, sac, seed, xseed};

/// Conversion between encoded payloads and the canonical representation.
///
/// Implementations are synchronous and CPU bound; async callers should run
/// them on a blocking thread for large payloads.
pub trait SeismicCodec: Send + Sync {
    /// Decode a waveform payload into its traces.
    fn decode(&self, format: WaveformFormat, data: &[u8]) -> CodecResult<Vec<Trace>>;

    /// Encode traces into a waveform payload.
    fn encode(&self, format: WaveformFormat, traces: &[Trace]) -> CodecResult<Bytes>;

    /// Decode a station metadata payload.
    fn decode_station(&self, format: StationFormat, data: &[u8]) -> CodecResult<StationInventory>;

    fn detect_waveform(&self, data: &[u8]) -> Option<WaveformFormat> {
        detect::detect_waveform_format(data)
    }

    fn detect_station(&self, data: &[u8]) -> Option<StationFormat> {
        detect::detect_station_format(data)
    }
}

/// Formats implemented in this crate.
///
/// | format   | decode | encode |
/// |----------|--------|--------|
/// | MiniSEED | yes    | yes    |
/// | SAC      | yes    | yes    |
/// | GSE2     | no     | no     |
/// | SEG-Y    | no     | no     |
/// | SEED     | yes    | -      |
/// | XML-SEED | yes    | -      |
/// | RESP     | yes    | -      |
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCodec;

impl SeismicCodec for BuiltinCodec {
    fn decode(&self, format: WaveformFormat, data: &[u8]) -> CodecResult<Vec<Trace>> {
        let traces = match format {
            WaveformFormat::MiniSeed => mseed::read(data)?,
            WaveformFormat::Sac => vec![sac::read(data)?],
            WaveformFormat::Gse2 | WaveformFormat::Segy => {
                return Err(CodecError::DecodeUnsupported(format.name().to_string()))
            }
        };
        debug!(format = %format, traces = traces.len(), size = data.len(), "Decoded waveform");
        Ok(traces)
    }

    fn encode(&self, format: WaveformFormat, traces: &[Trace]) -> CodecResult<Bytes> {
        match format {
            WaveformFormat::MiniSeed => mseed::write(traces),
            WaveformFormat::Sac => sac::write(traces),
            WaveformFormat::Gse2 | WaveformFormat::Segy => {
                Err(CodecError::EncodeUnsupported(format.name().to_string()))
            }
        }
    }

    fn decode_station(&self, format: StationFormat, data: &[u8]) -> CodecResult<StationInventory> {
        let inventory = match format {
            StationFormat::Seed => seed::read(data)?,
            StationFormat::XSeed => xseed::read(data)?,
            StationFormat::Resp => resp::read(data)?,
        };
        debug!(
            format = %format,
            stations = inventory.stations.len(),
            "Decoded station metadata"
        );
        Ok(inventory)
    }
}

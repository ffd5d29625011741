//! Waveform output format negotiation.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use chrono::SecondsFormat;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use seis_codec::{SeismicCodec, Trace};
use seis_common::{OutputFormat, SeisError, SeisResult, WaveformFormat, WaveformKey};
use storage::{Archive, FilepathId, WaveformRecord};

/// Bytes ready to be sent, with a suggested name and media type.
#[derive(Debug, Clone)]
pub struct Payload {
    pub file_name: String,
    pub content_type: &'static str,
    pub data: Bytes,
}

/// One trace as JSON: `data` holds `[time, value]` pairs in sample order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonTrace {
    pub channel_id: String,
    pub sampling_rate: f64,
    pub npts: usize,
    pub data: Vec<(String, f64)>,
}

impl JsonTrace {
    pub fn from_trace(trace: &Trace) -> SeisResult<Self> {
        let data = trace
            .data
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let time = trace.header.sample_time(i).ok_or_else(|| {
                    SeisError::Codec(format!("sample {} of {} is out of the time range", i, trace.channel_id()))
                })?;
                Ok((time.to_rfc3339_opts(SecondsFormat::Micros, true), *value))
            })
            .collect::<SeisResult<_>>()?;
        Ok(Self {
            channel_id: trace.channel_id().to_string(),
            sampling_rate: trace.header.sampling_rate,
            npts: trace.data.len(),
            data,
        })
    }
}

const OCTET_STREAM: &str = "application/octet-stream";

fn output_label(output: Option<OutputFormat>) -> &'static str {
    match output {
        None => "original",
        Some(OutputFormat::Raw) => "raw",
        Some(OutputFormat::Json) => "json",
        Some(OutputFormat::Encoded(format)) => format.name(),
    }
}

/// Serves waveforms in the requested output format.
#[derive(Clone)]
pub struct FormatNegotiator {
    archive: Archive,
    codec: Arc<dyn SeismicCodec>,
}

impl FormatNegotiator {
    pub fn new(archive: Archive, codec: Arc<dyn SeismicCodec>) -> Self {
        Self { archive, codec }
    }

    /// Fetch the waveform at `key`.
    ///
    /// - `None`: the uploaded bytes, unchanged
    /// - `Raw`: a tar archive of every file in the key's bundle
    /// - `Json`: the trace as [`JsonTrace`]s
    /// - `Encoded(format)`: the trace re-encoded by the codec
    #[instrument(skip(self), fields(event = %key.event, channel_id = %key.channel, tag = %key.tag))]
    pub async fn fetch(&self, key: &WaveformKey, output: Option<OutputFormat>) -> SeisResult<Payload> {
        let record = self.archive.waveforms.get_one(key).await?;
        counter!("waveform_fetches_total", "output" => output_label(output)).increment(1);

        match output {
            None => self.download(&record.filepath).await,
            Some(OutputFormat::Raw) => self.bundle(key).await,
            Some(OutputFormat::Json) => {
                let trace = self.load_trace(&record).await?;
                let body = serde_json::to_vec(&[JsonTrace::from_trace(&trace)?])?;
                Ok(Payload {
                    file_name: format!("{}.json", key.channel),
                    content_type: "application/json",
                    data: Bytes::from(body),
                })
            }
            Some(OutputFormat::Encoded(target)) => {
                let source = record.metadata.format;
                let trace = self
                    .load_trace(&record)
                    .await
                    .map_err(|e| unsupported_conversion(e, source, target))?;
                let codec = self.codec.clone();
                let data = tokio::task::spawn_blocking(move || codec.encode(target, &[trace]))
                    .await
                    .map_err(|e| SeisError::InternalError(format!("encoder task failed: {}", e)))?
                    .map_err(|e| unsupported_conversion(e.into(), source, target))?;
                debug!(from = %source, to = %target, size = data.len(), "Converted waveform");
                Ok(Payload {
                    file_name: format!("{}.{}", key.channel, target.extension()),
                    content_type: OCTET_STREAM,
                    data,
                })
            }
        }
    }

    /// Bytes behind an opaque file reference, named by base name only.
    pub async fn download(&self, id: &FilepathId) -> SeisResult<Payload> {
        let (file_name, data) = self.archive.read_file(id).await?;
        Ok(Payload {
            file_name,
            content_type: OCTET_STREAM,
            data,
        })
    }

    /// Tar every distinct file of the components sharing `key` minus the
    /// channel code.
    async fn bundle(&self, key: &WaveformKey) -> SeisResult<Payload> {
        let records = self.archive.waveforms.bundle(key).await?;
        let mut seen = HashSet::new();
        let mut names = HashSet::new();
        let mut builder = tar::Builder::new(Vec::new());

        for record in records {
            if !seen.insert(record.filepath) {
                continue;
            }
            let (name, data) = self.archive.read_file(&record.filepath).await?;
            let name = if names.contains(&name) {
                format!("{}_{}", names.len(), name)
            } else {
                name
            };
            names.insert(name.clone());

            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_mtime(record.registered_at.timestamp().max(0) as u64);
            header.set_cksum();
            builder.append_data(&mut header, &name, data.as_ref())?;
        }

        let archive = builder.into_inner()?;
        debug!(files = seen.len(), size = archive.len(), "Bundled waveform files");
        let channel = &key.channel;
        Ok(Payload {
            file_name: format!(
                "{}.{}.{}.{}.tar",
                key.event, channel.network, channel.station, channel.location
            ),
            content_type: "application/x-tar",
            data: Bytes::from(archive),
        })
    }

    /// Decode the record's file and pick the trace for its channel.
    /// Indexed files are read on every fetch and may have changed.
    async fn load_trace(&self, record: &WaveformRecord) -> SeisResult<Trace> {
        let (_, data) = self.archive.read_file(&record.filepath).await?;
        let codec = self.codec.clone();
        let format = record.metadata.format;
        let traces = tokio::task::spawn_blocking(move || codec.decode(format, &data))
            .await
            .map_err(|e| SeisError::InternalError(format!("decoder task failed: {}", e)))??;

        select_trace(traces, record).ok_or_else(|| {
            SeisError::Codec(format!(
                "{} file no longer holds a trace for {}",
                format, record.key.channel
            ))
        })
    }
}

/// The trace whose channel id matches the record. Among several, the one at
/// the registered position wins, then the one starting closest to the
/// registered start time.
fn select_trace(traces: Vec<Trace>, record: &WaveformRecord) -> Option<Trace> {
    let index = record.metadata.trace_index;
    let starttime = record.metadata.starttime;
    traces
        .into_iter()
        .enumerate()
        .filter(|(_, trace)| trace.channel_id() == record.key.channel)
        .min_by_key(|(i, trace)| {
            let drift = (trace.header.starttime - starttime).num_microseconds().map_or(i64::MAX, i64::abs);
            (*i != index, drift)
        })
        .map(|(_, trace)| trace)
}

fn unsupported_conversion(err: SeisError, from: WaveformFormat, to: WaveformFormat) -> SeisError {
    match err {
        SeisError::UnsupportedFormat(_) | SeisError::Codec(_) => SeisError::UnsupportedConversion {
            from: from.name().to_string(),
            to: to.name().to_string(),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use seis_codec::TraceHeader;

    #[test]
    fn test_json_trace_times_increase() {
        let header = TraceHeader {
            network: "BW".into(),
            station: "FURT".into(),
            location: String::new(),
            channel: "EHZ".into(),
            starttime: Utc.with_ymd_and_hms(2012, 8, 27, 4, 43, 56).unwrap(),
            sampling_rate: 2.0,
            npts: 3,
            coordinates: None,
        };
        let json = JsonTrace::from_trace(&Trace::new(header, vec![1.0, 2.0, 3.0])).unwrap();
        assert_eq!(json.channel_id, "BW.FURT..EHZ");
        assert_eq!(json.npts, 3);
        assert_eq!(json.data[0].0, "2012-08-27T04:43:56.000000Z");
        assert_eq!(json.data[1].0, "2012-08-27T04:43:56.500000Z");
        assert_eq!(json.data[2].1, 3.0);
    }

    #[test]
    fn test_codec_failures_become_conversion_errors() {
        let err = unsupported_conversion(
            SeisError::Codec("no writer".into()),
            WaveformFormat::Sac,
            WaveformFormat::Segy,
        );
        assert_eq!(err.error_code(), "UNSUPPORTED_CONVERSION");

        let err = unsupported_conversion(
            SeisError::StorageError("disk".into()),
            WaveformFormat::Sac,
            WaveformFormat::Segy,
        );
        assert_eq!(err.error_code(), "STORAGE_ERROR");
    }
}

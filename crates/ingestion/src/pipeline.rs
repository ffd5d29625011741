//! Waveform ingestion.
//!
//! Every upload walks `Received → Validated → Decoded → Enriched →
//! Registered`, or ends in `Rejected` from any step. A failure aborts the
//! remaining steps of that request only. Multicomponent files expand into
//! one record per trace, all pointing at the same stored file; each
//! component succeeds or fails on its own.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use metrics::counter;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use seis_codec::{SeismicCodec, Trace, TraceHeader};
use seis_common::{ChannelId, SeisError, SeisResult, StationKey, Tag, WaveformFormat, WaveformKey};
use storage::{
    sha256_hex, Archive, ChannelEpoch, FileLocation, FilepathId, FilepathRecord, StorageMode,
    StorageRoot, WaveformMetadata,
};

use crate::config::IngestionConfig;
use crate::coordinates::CoordinateResolver;
use crate::naming::waveform_object_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionStage {
    Received,
    Validated,
    Decoded,
    Enriched,
    Registered,
    Rejected,
}

impl fmt::Display for IngestionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestionStage::Received => "received",
            IngestionStage::Validated => "validated",
            IngestionStage::Decoded => "decoded",
            IngestionStage::Enriched => "enriched",
            IngestionStage::Registered => "registered",
            IngestionStage::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// A waveform upload request.
#[derive(Debug, Clone)]
pub struct WaveformUpload {
    pub event: String,
    pub tag: Tag,
    pub synthetic: bool,
    /// Payload to copy into managed storage.
    pub body: Option<Bytes>,
    /// External file to index in place.
    pub index_path: Option<PathBuf>,
    /// Declared format; detected from the payload when absent.
    pub format: Option<WaveformFormat>,
    pub replace: bool,
}

impl WaveformUpload {
    pub fn managed(event: impl Into<String>, body: Bytes) -> Self {
        Self {
            event: event.into(),
            tag: Tag::RAW,
            synthetic: false,
            body: Some(body),
            index_path: None,
            format: None,
            replace: false,
        }
    }

    pub fn indexed(event: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            body: None,
            index_path: Some(path.into()),
            ..Self::managed(event, Bytes::new())
        }
    }

    pub fn with_tag(mut self, tag: impl Into<Tag>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_format(mut self, format: WaveformFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn synthetic(mut self, synthetic: bool) -> Self {
        self.synthetic = synthetic;
        self
    }

    pub fn replacing(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }
}

/// Result for one trace of an upload.
#[derive(Debug)]
pub struct ComponentOutcome {
    pub channel_id: ChannelId,
    pub trace_index: usize,
    /// Last stage reached.
    pub stage: IngestionStage,
    /// Record id on success.
    pub result: Result<Uuid, SeisError>,
}

#[derive(Debug)]
pub struct IngestionReport {
    pub event: String,
    pub tag: Tag,
    pub storage_mode: StorageMode,
    /// File shared by the components; `None` once released because no
    /// component registered.
    pub filepath: Option<FilepathId>,
    pub components: Vec<ComponentOutcome>,
}

impl IngestionReport {
    pub fn registered(&self) -> usize {
        self.components.iter().filter(|c| c.result.is_ok()).count()
    }

    pub fn is_complete(&self) -> bool {
        !self.components.is_empty() && self.registered() == self.components.len()
    }

    pub fn first_error(&self) -> Option<&SeisError> {
        self.components.iter().find_map(|c| c.result.as_ref().err())
    }

    /// `PartialIngestion` when some, but not all, components registered.
    pub fn partial_error(&self) -> Option<SeisError> {
        let registered = self.registered();
        (registered > 0 && registered < self.components.len()).then(|| SeisError::PartialIngestion {
            registered,
            total: self.components.len(),
        })
    }
}

enum Source {
    Body(Bytes),
    Index(PathBuf),
}

/// Ingests events, stations and waveforms into an [`Archive`].
pub struct IngestionPipeline {
    pub(crate) archive: Archive,
    pub(crate) codec: Arc<dyn SeismicCodec>,
    pub(crate) resolver: CoordinateResolver,
    pub(crate) config: IngestionConfig,
}

impl IngestionPipeline {
    pub fn new(archive: Archive, codec: Arc<dyn SeismicCodec>, config: IngestionConfig) -> Self {
        let resolver = CoordinateResolver::new(archive.stations.clone(), config.coordinate_authority);
        Self {
            archive,
            codec,
            resolver,
            config,
        }
    }

    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    pub fn config(&self) -> &IngestionConfig {
        &self.config
    }

    pub fn resolver(&self) -> &CoordinateResolver {
        &self.resolver
    }

    /// Ingest one waveform upload.
    ///
    /// Request-level failures (unknown event, undecodable payload,
    /// duplicate content, storage faults) are returned as `Err`. Once
    /// decoding succeeded the result is a report with one outcome per
    /// trace.
    #[instrument(skip(self, upload), fields(event = %upload.event, tag = %upload.tag, synthetic = upload.synthetic))]
    pub async fn ingest_waveform(&self, upload: WaveformUpload) -> SeisResult<IngestionReport> {
        debug!(stage = %IngestionStage::Received, "Waveform upload received");
        let result = self.run_waveform(upload).await;
        match &result {
            Ok(report) => {
                counter!("waveform_registrations_total").increment(report.registered() as u64);
                let failed = report.components.len() - report.registered();
                if failed > 0 {
                    counter!("waveform_component_failures_total").increment(failed as u64);
                }
            }
            Err(e) => {
                counter!("waveform_rejections_total", "code" => e.error_code()).increment(1);
                warn!(stage = %IngestionStage::Rejected, error = %e, "Waveform upload rejected");
            }
        }
        result
    }

    async fn run_waveform(&self, upload: WaveformUpload) -> SeisResult<IngestionReport> {
        let source = self.validate(&upload).await?;
        debug!(stage = %IngestionStage::Validated, "Upload validated");

        let data = match &source {
            Source::Body(body) => body.clone(),
            Source::Index(path) => read_index_file(path).await?,
        };

        let (format, traces) = self.decode(upload.format, data.clone()).await?;
        debug!(stage = %IngestionStage::Decoded, format = %format, traces = traces.len(), "Payload decoded");

        let reject_duplicates = self.config.reject_duplicate_content && !upload.replace;
        if reject_duplicates {
            let checksum = sha256_hex(&data);
            if self.archive.files.find_by_checksum(&checksum).await?.is_some() {
                return Err(SeisError::DuplicateContent(checksum));
            }
        }

        for trace in &traces {
            self.enrich(&trace.header).await;
        }
        debug!(stage = %IngestionStage::Enriched, "Station metadata enriched");

        let (location, storage_mode) = match source {
            Source::Index(path) => (FileLocation::Indexed { path }, StorageMode::Indexed),
            Source::Body(body) => {
                let header = &traces[0].header;
                let name = waveform_object_name(
                    &upload.event,
                    &header.network,
                    &header.station,
                    &header.location,
                    &header.channel,
                    header.starttime,
                );
                let object_path = self.archive.waveform_store.put_unique(&name, body).await?;
                (
                    FileLocation::Managed {
                        root: StorageRoot::Waveforms,
                        object_path,
                    },
                    StorageMode::Managed,
                )
            }
        };

        let record = FilepathRecord::new(location.clone(), &data, format.name());
        let filepath = record.id;
        if let Err(e) = self.archive.files.insert(record, reject_duplicates).await {
            // Lost a race against an identical upload.
            if let FileLocation::Managed { object_path, .. } = &location {
                self.archive.waveform_store.delete(object_path).await?;
            }
            return Err(e);
        }

        let mut components = Vec::with_capacity(traces.len());
        let mut superseded = Vec::new();
        for (trace_index, trace) in traces.iter().enumerate() {
            let channel_id = trace.channel_id();
            let key = WaveformKey::new(&upload.event, channel_id.clone(), upload.tag.clone(), upload.synthetic);
            let metadata = waveform_metadata(trace, format, trace_index)?;

            let result = self
                .archive
                .waveforms
                .register(key, storage_mode, filepath, metadata, upload.replace)
                .await;

            let (stage, result) = match result {
                Ok(registration) => {
                    if let Some(old) = registration.replaced {
                        superseded.push(old.filepath);
                    }
                    info!(stage = %IngestionStage::Registered, channel_id = %channel_id, "Registered waveform");
                    (IngestionStage::Registered, Ok(registration.id))
                }
                Err(e) => {
                    warn!(stage = %IngestionStage::Rejected, channel_id = %channel_id, error = %e, "Component rejected");
                    (IngestionStage::Rejected, Err(e))
                }
            };
            components.push(ComponentOutcome {
                channel_id,
                trace_index,
                stage,
                result,
            });
        }

        let mut report = IngestionReport {
            event: upload.event,
            tag: upload.tag,
            storage_mode,
            filepath: Some(filepath),
            components,
        };

        if report.registered() == 0 {
            self.archive.release_file(&filepath).await?;
            report.filepath = None;
        }

        superseded.sort_by_key(|id| id.to_string());
        superseded.dedup();
        for old in superseded {
            if old != filepath && !self.archive.waveforms.references(&old).await? {
                self.archive.release_file(&old).await?;
            }
        }

        Ok(report)
    }

    async fn validate(&self, upload: &WaveformUpload) -> SeisResult<Source> {
        if !self.archive.events.exists(&upload.event).await? {
            return Err(SeisError::UnboundEvent(upload.event.clone()));
        }

        match (&upload.body, &upload.index_path) {
            (Some(_), Some(_)) => Err(SeisError::invalid_parameter(
                "index_file",
                "an index path cannot be combined with a request body",
            )),
            (None, None) => Err(SeisError::MissingParameter("body or index_file".to_string())),
            (None, Some(path)) if !path.is_absolute() => Err(SeisError::invalid_parameter(
                "index_file",
                format!("'{}' is not an absolute path", path.display()),
            )),
            (None, Some(path)) => Ok(Source::Index(path.clone())),
            (Some(body), None) if body.is_empty() => Err(SeisError::MissingParameter("body".to_string())),
            (Some(body), None) => Ok(Source::Body(body.clone())),
        }
    }

    async fn decode(
        &self,
        declared: Option<WaveformFormat>,
        data: Bytes,
    ) -> SeisResult<(WaveformFormat, Vec<Trace>)> {
        let format = match declared {
            Some(format) => format,
            None => self.codec.detect_waveform(&data).ok_or_else(|| {
                SeisError::UnsupportedFormat("could not detect the waveform format".to_string())
            })?,
        };

        let codec = self.codec.clone();
        let traces = tokio::task::spawn_blocking(move || codec.decode(format, &data))
            .await
            .map_err(|e| SeisError::InternalError(format!("decoder task failed: {}", e)))??;

        if traces.is_empty() {
            return Err(SeisError::UnsupportedFormat(format!("{} payload holds no traces", format)));
        }
        Ok((format, traces))
    }

    /// Best effort: the station gains the channel and any coordinates the
    /// header carries.
    async fn enrich(&self, header: &TraceHeader) {
        let key = StationKey::new(&header.network, &header.station);
        if let Some(coordinates) = &header.coordinates {
            if let Err(e) = self.resolver.resolve(&key, coordinates).await {
                warn!(station = %key, error = %e, "Could not resolve station coordinates");
            }
        }

        let location = header.location.clone();
        let channel = header.channel.clone();
        let added = self
            .archive
            .stations
            .modify(&key, move |record| {
                if !record.has_channel(&location, &channel) {
                    record.add_channel(ChannelEpoch {
                        location,
                        channel,
                        start_date: None,
                        end_date: None,
                    });
                }
            })
            .await;
        if let Err(e) = added {
            warn!(station = %key, error = %e, "Could not record station channel");
        }
    }
}

fn waveform_metadata(trace: &Trace, format: WaveformFormat, trace_index: usize) -> SeisResult<WaveformMetadata> {
    Ok(WaveformMetadata {
        sampling_rate: trace.header.sampling_rate,
        npts: trace.header.npts,
        starttime: trace.header.starttime,
        endtime: trace.header.checked_endtime(format.name())?,
        format,
        trace_index,
    })
}

async fn read_index_file(path: &Path) -> SeisResult<Bytes> {
    match tokio::fs::read(path).await {
        Ok(data) => Ok(Bytes::from(data)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(SeisError::invalid_parameter(
            "index_file",
            format!("'{}' does not exist", path.display()),
        )),
        Err(e) => Err(e.into()),
    }
}

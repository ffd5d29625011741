//! Ingestion for the seismic archive.
//!
//! Turns uploaded events (QuakeML), station metadata (SEED, XSEED, RESP)
//! and waveforms (MiniSEED, SAC, ...) into catalog records:
//!
//! - payload validation and format detection
//! - decoding through the [`seis_codec::SeismicCodec`] seam
//! - station enrichment and coordinate backfill
//! - managed copies or in-place indexing of waveform files
//! - atomic registration in the waveform registry

pub mod config;
pub mod coordinates;
mod events;
pub mod naming;
mod pipeline;
mod stations;

pub use config::{CoordinateAuthority, IngestionConfig};
pub use coordinates::{merge_coordinates, CoordinateResolver};
pub use pipeline::{ComponentOutcome, IngestionPipeline, IngestionReport, IngestionStage, WaveformUpload};
pub use stations::StationUploadReport;

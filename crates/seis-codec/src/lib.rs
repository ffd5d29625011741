//! Seismic format codecs.
//!
//! Everything is decoded into [`Trace`]s (waveforms) or a
//! [`StationInventory`] (station metadata) and encoded back from them.
//! The archive only talks to the [`SeismicCodec`] trait; [`BuiltinCodec`]
//! covers the formats implemented here.

pub mod codec;
pub mod detect;
pub mod error;
pub mod mseed;
pub mod quakeml;
pub mod resp;
pub mod sac;
pub mod seed;
pub mod trace;
pub mod xseed;

pub use codec::{BuiltinCodec, SeismicCodec};
pub use detect::{detect_station_format, detect_waveform_format};
pub use error::{CodecError, CodecResult};
pub use quakeml::{summarize as summarize_quakeml, EventSummary};
pub use trace::{InventoryChannel, InventoryStation, StationInventory, Trace, TraceHeader};

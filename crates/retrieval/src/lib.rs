//! Read side of the seismic archive.
//!
//! - [`FormatNegotiator`]: waveform payloads in the requested output format
//! - [`ListService`]: filtered listings of events, stations and waveforms
//! - [`presentation`]: XML, JSON and HTML rendering of listings

pub mod list;
pub mod negotiator;
pub mod presentation;

pub use list::{EventRow, ListService, StationDetail, StationRow, WaveformQuery, WaveformRow};
pub use negotiator::{FormatNegotiator, JsonTrace, Payload};
pub use presentation::render;

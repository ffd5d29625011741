//! Common types and utilities shared across the seismic archive crates.

pub mod coordinates;
pub mod error;
pub mod format;
pub mod ids;
pub mod time;

pub use coordinates::Coordinates;
pub use error::{ResourceKind, SeisError, SeisResult};
pub use format::{OutputFormat, PresentationFormat, StationFormat, WaveformFormat};
pub use ids::{ChannelId, StationKey, Tag, WaveformKey};
pub use time::parse_datetime;

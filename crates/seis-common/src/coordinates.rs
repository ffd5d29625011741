//! Station coordinates.

use serde::{Deserialize, Serialize};

/// Geographic position of a station. Every component may be unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation_in_m: Option<f64>,
    pub local_depth_in_m: Option<f64>,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64, elevation_in_m: f64, local_depth_in_m: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            elevation_in_m: Some(elevation_in_m),
            local_depth_in_m: Some(local_depth_in_m),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.latitude.is_none()
            && self.longitude.is_none()
            && self.elevation_in_m.is_none()
            && self.local_depth_in_m.is_none()
    }

    /// Horizontal position and elevation are all known.
    pub fn is_located(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some() && self.elevation_in_m.is_some()
    }
}

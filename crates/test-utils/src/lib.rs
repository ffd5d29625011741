//! Shared test utilities for the seismo-archive workspace.
//!
//! Fixtures shared by the crate test suites:
//! - Byte-level generators for SAC, MiniSEED and dataless SEED files
//! - Text fixtures for RESP, XML-SEED and QuakeML
//! - Temporary external files for index-only uploads
//!
//! # Usage
//!
//! Pull it in as a path dev-dependency and import what a test needs:
//!
//! ```ignore
//! use test_utils::{SacBuilder, fixtures::ids};
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::*;
pub use generators::*;

use std::path::PathBuf;

/// Write `data` to a file inside a fresh temporary directory.
///
/// The directory is removed when the returned guard is dropped, so keep it
/// alive for as long as the file is needed.
pub fn external_file(name: &str, data: &[u8]) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join(name);
    std::fs::write(&path, data).expect("write external file");
    (dir, path)
}

/// Assert that two numbers differ by at most `epsilon`. Both sides are
/// compared as `f64`, so sampling rates stored as `f32` can be checked
/// against literals.
///
/// ```ignore
/// assert_approx_eq!(trace.header.sampling_rate, 20.0, 1e-9);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($actual:expr, $expected:expr, $epsilon:expr) => {{
        let actual = $actual as f64;
        let expected = $expected as f64;
        let tolerance = $epsilon as f64;
        if (actual - expected).abs() > tolerance {
            panic!(
                "assertion failed: {} is not within {} of {}",
                actual, tolerance, expected
            );
        }
    }};
}

/// Approximate equality of an `Option<f64>` coordinate component.
///
/// ```ignore
/// assert_coordinate_eq!(coords.latitude, 48.16, 1e-4);
/// ```
#[macro_export]
macro_rules! assert_coordinate_eq {
    ($actual:expr, $expected:expr, $epsilon:expr) => {{
        match $actual {
            Some(value) => $crate::assert_approx_eq!(value, $expected, $epsilon),
            None => panic!("assertion failed: coordinate is not set, expected {:?}", $expected),
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampling_rate_within_tolerance() {
        let delta: f32 = 0.05;
        assert_approx_eq!(1.0 / delta, 20.0, 1e-4);
        assert_approx_eq!(-12345.0_f32, -12345.0, 0.0);
    }

    #[test]
    #[should_panic(expected = "is not within")]
    fn test_sampling_rate_out_of_tolerance() {
        assert_approx_eq!(100.5, 100.0, 0.1);
    }

    #[test]
    #[should_panic(expected = "coordinate is not set")]
    fn test_assert_coordinate_eq_on_missing_value() {
        let missing: Option<f64> = None;
        assert_coordinate_eq!(missing, 1.0, 0.1);
    }

    #[test]
    fn test_external_file_lives_with_guard() {
        let (dir, path) = external_file("a.sac", b"abc");
        assert!(path.is_absolute());
        assert_eq!(std::fs::read(&path).unwrap(), b"abc");
        drop(dir);
        assert!(!path.exists());
    }
}

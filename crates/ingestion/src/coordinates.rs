//! Coordinate resolution against the station registry.

use std::sync::Arc;

use tracing::{debug, info};

use seis_common::{Coordinates, SeisResult, StationKey};
use storage::StationRegistry;

use crate::config::CoordinateAuthority;

/// Merge `candidate` into `current`, component by component.
///
/// Returns the merged coordinates and whether anything changed.
pub fn merge_coordinates(
    current: &Coordinates,
    candidate: &Coordinates,
    authority: CoordinateAuthority,
) -> (Coordinates, bool) {
    fn pick(current: Option<f64>, candidate: Option<f64>, authority: CoordinateAuthority) -> Option<f64> {
        match (current, candidate, authority) {
            (None, c, _) => c,
            (Some(_), Some(c), CoordinateAuthority::Override) => Some(c),
            (existing, _, _) => existing,
        }
    }

    let merged = Coordinates {
        latitude: pick(current.latitude, candidate.latitude, authority),
        longitude: pick(current.longitude, candidate.longitude, authority),
        elevation_in_m: pick(current.elevation_in_m, candidate.elevation_in_m, authority),
        local_depth_in_m: pick(current.local_depth_in_m, candidate.local_depth_in_m, authority),
    };
    let changed = merged != *current;
    (merged, changed)
}

/// Backfills station coordinates from incoming data.
#[derive(Clone)]
pub struct CoordinateResolver {
    stations: Arc<dyn StationRegistry>,
    authority: CoordinateAuthority,
}

impl CoordinateResolver {
    pub fn new(stations: Arc<dyn StationRegistry>, authority: CoordinateAuthority) -> Self {
        Self { stations, authority }
    }

    pub fn authority(&self) -> CoordinateAuthority {
        self.authority
    }

    /// Merge `candidate` into the station's coordinates. The station is
    /// created if unknown; the merge is atomic per station.
    pub async fn resolve(&self, key: &StationKey, candidate: &Coordinates) -> SeisResult<(Coordinates, bool)> {
        let authority = self.authority;
        let (merged, changed) = self
            .stations
            .modify(key, |record| {
                let (merged, changed) = merge_coordinates(&record.coordinates, candidate, authority);
                if changed {
                    record.coordinates = merged;
                }
                (merged, changed)
            })
            .await?;

        if changed {
            info!(station = %key, "Updated station coordinates");
        } else {
            debug!(station = %key, "Station coordinates unchanged");
        }
        Ok((merged, changed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::MemoryStationRegistry;

    fn partial(lat: Option<f64>, lon: Option<f64>) -> Coordinates {
        Coordinates {
            latitude: lat,
            longitude: lon,
            ..Default::default()
        }
    }

    #[test]
    fn test_first_wins_only_fills_gaps() {
        let current = partial(Some(48.0), None);
        let candidate = partial(Some(10.0), Some(11.0));
        let (merged, changed) = merge_coordinates(&current, &candidate, CoordinateAuthority::FirstWins);
        assert!(changed);
        assert_eq!(merged.latitude, Some(48.0));
        assert_eq!(merged.longitude, Some(11.0));
    }

    #[test]
    fn test_override_replaces_present_values() {
        let current = partial(Some(48.0), Some(11.0));
        let candidate = partial(Some(10.0), None);
        let (merged, changed) = merge_coordinates(&current, &candidate, CoordinateAuthority::Override);
        assert!(changed);
        assert_eq!(merged.latitude, Some(10.0));
        assert_eq!(merged.longitude, Some(11.0));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let candidate = Coordinates::new(48.16, 11.27, 565.0, 0.0);
        let (once, _) = merge_coordinates(&Coordinates::default(), &candidate, CoordinateAuthority::FirstWins);
        let (twice, changed) = merge_coordinates(&once, &candidate, CoordinateAuthority::FirstWins);
        assert_eq!(once, twice);
        assert!(!changed);
    }

    #[test]
    fn test_resolve_backfills_station() {
        tokio_test::block_on(async {
            let stations: Arc<dyn StationRegistry> = Arc::new(MemoryStationRegistry::new());
            let resolver = CoordinateResolver::new(stations.clone(), CoordinateAuthority::FirstWins);
            let key = StationKey::new("BW", "FURT");

            let first = Coordinates::new(48.16, 11.27, 565.0, 0.0);
            let (_, changed) = resolver.resolve(&key, &first).await.unwrap();
            assert!(changed);

            let later = Coordinates::new(1.0, 2.0, 3.0, 4.0);
            let (merged, changed) = resolver.resolve(&key, &later).await.unwrap();
            assert!(!changed);
            assert_eq!(merged, first);
            assert_eq!(stations.get(&key).await.unwrap().coordinates, first);
        });
    }
}

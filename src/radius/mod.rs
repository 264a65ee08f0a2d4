//! Radius query engine.
//!
//! A cheap bounding-box prefilter over an R-tree narrows the regional rows,
//! then the exact Haversine distance decides membership.

mod index;

pub use index::{IndexedPlace, PlaceSpatialIndex};

use tracing::debug;

use crate::distance::{haversine_between, search_envelopes};
use crate::models::{GeoPoint, PlaceRecord};

/// Float slack on the radius comparison (one micrometer)
const RADIUS_TOLERANCE_KM: f64 = 1e-9;

/// A place row within the search radius, with its distance to the target
#[derive(Debug, Clone, PartialEq)]
pub struct RadiusMatch {
    pub record: PlaceRecord,
    pub distance_km: f64,
}

/// Select every indexed place within `radius_km` of the target.
///
/// Result order is unspecified.
pub fn select_within_radius(
    index: &PlaceSpatialIndex,
    target_lat: f64,
    target_lon: f64,
    radius_km: f64,
) -> Vec<RadiusMatch> {
    let target = GeoPoint::new(target_lat, target_lon);
    let mut prefiltered = 0usize;
    let mut matches = Vec::new();

    for envelope in search_envelopes(target, radius_km) {
        for record in index.candidates(&envelope) {
            prefiltered += 1;
            let distance_km = haversine_between(target, record.point());
            if distance_km <= radius_km + RADIUS_TOLERANCE_KM {
                matches.push(RadiusMatch {
                    record: record.clone(),
                    distance_km,
                });
            }
        }
    }

    debug!(
        "Radius query at ({}, {}) r={}km: {} prefiltered, {} within radius",
        target_lat,
        target_lon,
        radius_km,
        prefiltered,
        matches.len()
    );

    matches
}

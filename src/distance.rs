//! Great-circle distance and radius search envelopes.

use crate::models::GeoPoint;

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine great-circle distance in kilometers.
///
/// Identical points give exactly 0.0 and the result is symmetric in its
/// arguments. NaN inputs propagate.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push `a` just past 1 for antipodal points
    let c = 2.0 * a.sqrt().clamp(0.0, 1.0).asin();
    EARTH_RADIUS_KM * c
}

/// Haversine distance between two points, in kilometers
pub fn haversine_between(a: GeoPoint, b: GeoPoint) -> f64 {
    haversine_km(a.lat, a.lon, b.lat, b.lon)
}

/// Axis-aligned lat/lon box (degrees)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

/// Padding so points exactly on the radius survive the prefilter
const ENVELOPE_PAD_DEG: f64 = 1e-9;

/// Boxes that together contain every point within `radius_km` of `center`.
///
/// Longitude spread grows with latitude; near the poles (or for very large
/// radii) the box spans all longitudes. A box crossing the antimeridian is
/// split in two.
pub fn search_envelopes(center: GeoPoint, radius_km: f64) -> Vec<Envelope> {
    let angular = radius_km / EARTH_RADIUS_KM;
    let d_lat = angular.to_degrees() + ENVELOPE_PAD_DEG;

    let min_lat = (center.lat - d_lat).max(-90.0);
    let max_lat = (center.lat + d_lat).min(90.0);

    let lat_rad = center.lat.to_radians();
    let full_lon = min_lat <= -90.0 || max_lat >= 90.0 || angular.sin() >= lat_rad.cos();
    if full_lon {
        return vec![Envelope {
            min_lon: -180.0,
            min_lat,
            max_lon: 180.0,
            max_lat,
        }];
    }

    // Largest longitude offset reachable on the circle
    let d_lon = (angular.sin() / lat_rad.cos()).asin().to_degrees() + ENVELOPE_PAD_DEG;
    let min_lon = center.lon - d_lon;
    let max_lon = center.lon + d_lon;

    if min_lon < -180.0 {
        vec![
            Envelope {
                min_lon: min_lon + 360.0,
                min_lat,
                max_lon: 180.0,
                max_lat,
            },
            Envelope {
                min_lon: -180.0,
                min_lat,
                max_lon,
                max_lat,
            },
        ]
    } else if max_lon > 180.0 {
        vec![
            Envelope {
                min_lon,
                min_lat,
                max_lon: 180.0,
                max_lat,
            },
            Envelope {
                min_lon: -180.0,
                min_lat,
                max_lon: max_lon - 360.0,
                max_lat,
            },
        ]
    } else {
        vec![Envelope {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[(f64, f64)] = &[
        (0.0, 0.0),
        (25.166974, 55.259068),
        (-33.8688, 151.2093),
        (89.9999, -179.5),
        (-90.0, 180.0),
        (51.5074, -0.1278),
    ];

    #[test]
    fn test_distance_to_self_is_zero() {
        for &(lat, lon) in SAMPLES {
            assert_eq!(haversine_km(lat, lon, lat, lon), 0.0);
        }
    }

    #[test]
    fn test_symmetry() {
        for &(lat1, lon1) in SAMPLES {
            for &(lat2, lon2) in SAMPLES {
                assert_eq!(
                    haversine_km(lat1, lon1, lat2, lon2),
                    haversine_km(lat2, lon2, lat1, lon1)
                );
            }
        }
    }

    #[test]
    fn test_antipodal_points_are_half_circumference() {
        let d = haversine_km(0.0, 0.0, 0.0, 180.0);
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
        let d = haversine_km(90.0, 0.0, -90.0, 0.0);
        assert!(d.is_finite());
    }

    #[test]
    fn test_known_distance_one_tenth_degree_north() {
        // 0.1 degree of latitude is ~11.1 km
        let d = haversine_km(25.166974, 55.259068, 25.266974, 55.259068);
        assert!((d - 11.119).abs() < 0.01, "got {}", d);
    }

    #[test]
    fn test_nan_propagates() {
        assert!(haversine_km(f64::NAN, 0.0, 0.0, 0.0).is_nan());
        assert!(haversine_km(f64::NAN, 55.0, 25.0, 55.0).is_nan());
        assert!(haversine_km(25.0, 55.0, 25.0, f64::NAN).is_nan());
        assert!(haversine_between(GeoPoint::new(25.0, f64::NAN), GeoPoint::new(25.0, 55.0)).is_nan());
    }

    #[test]
    fn test_envelope_contains_circle_edge() {
        let center = GeoPoint::new(25.166974, 55.259068);
        let envelopes = search_envelopes(center, 10.0);
        assert_eq!(envelopes.len(), 1);
        let env = envelopes[0];

        let d_lat = (10.0 / EARTH_RADIUS_KM).to_degrees();
        assert!(env.max_lat >= center.lat + d_lat);
        assert!(env.min_lat <= center.lat - d_lat);
        // Longitude spread is wider than latitude spread away from the equator
        assert!(env.max_lon - center.lon > d_lat);
    }

    #[test]
    fn test_envelope_splits_at_antimeridian() {
        let envelopes = search_envelopes(GeoPoint::new(0.0, 179.99), 50.0);
        assert_eq!(envelopes.len(), 2);
        assert_eq!(envelopes[0].max_lon, 180.0);
        assert_eq!(envelopes[1].min_lon, -180.0);
        assert!(envelopes[1].max_lon < -179.0);
    }

    #[test]
    fn test_envelope_near_pole_spans_all_longitudes() {
        let envelopes = search_envelopes(GeoPoint::new(89.99, 10.0), 5.0);
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].min_lon, -180.0);
        assert_eq!(envelopes[0].max_lon, 180.0);
        assert_eq!(envelopes[0].max_lat, 90.0);
    }
}

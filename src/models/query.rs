//! Validated extraction request.

use std::path::{Path, PathBuf};

use super::{BoundingRegion, GeoPoint};
use crate::error::{ExtractError, Result};

pub const DEFAULT_RADIUS_KM: f64 = 20.0;

/// The immutable input tuple that drives one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub target: GeoPoint,
    pub radius_km: f64,
    /// Dataset source reference (local path, glob, or `s3://` prefix)
    pub source_ref: String,
    pub force_reload: bool,
    pub output_path: PathBuf,
}

impl Query {
    /// Build a query, rejecting malformed coordinates and radii.
    ///
    /// The target must also fall inside the configured region, since the
    /// regional cache holds nothing outside it.
    pub fn new(
        target_lat: f64,
        target_lon: f64,
        radius_km: f64,
        source_ref: impl Into<String>,
        force_reload: bool,
        output_path: Option<PathBuf>,
        region: &BoundingRegion,
    ) -> Result<Self> {
        if !target_lat.is_finite() || !(-90.0..=90.0).contains(&target_lat) {
            return Err(ExtractError::InvalidInput(format!(
                "latitude {} must be between -90 and 90",
                target_lat
            )));
        }
        if !target_lon.is_finite() || !(-180.0..=180.0).contains(&target_lon) {
            return Err(ExtractError::InvalidInput(format!(
                "longitude {} must be between -180 and 180",
                target_lon
            )));
        }
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(ExtractError::InvalidInput(format!(
                "radius {} must be greater than 0",
                radius_km
            )));
        }

        let source_ref = source_ref.into();
        if source_ref.trim().is_empty() {
            return Err(ExtractError::InvalidInput(
                "dataset source reference is empty".to_string(),
            ));
        }

        let target = GeoPoint::new(target_lat, target_lon);
        if !region.contains_point(target) {
            return Err(ExtractError::InvalidInput(format!(
                "target ({}, {}) is outside the '{}' region [{}, {}, {}, {}]",
                target_lat,
                target_lon,
                region.name,
                region.min_lon,
                region.min_lat,
                region.max_lon,
                region.max_lat
            )));
        }

        let output_path =
            output_path.unwrap_or_else(|| default_output_path(target_lat, target_lon, radius_km));

        Ok(Self {
            target,
            radius_km,
            source_ref,
            force_reload,
            output_path,
        })
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

/// Output file name derived from the query inputs,
/// e.g. `pois_25.166974_55.259068_20km.csv`.
pub fn default_output_path(lat: f64, lon: f64, radius_km: f64) -> PathBuf {
    PathBuf::from(format!(
        "pois_{:.6}_{:.6}_{}km.csv",
        lat,
        lon,
        trim_decimal(radius_km)
    ))
}

fn trim_decimal(value: f64) -> String {
    let text = format!("{:.3}", value);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "/data/places";

    fn query(lat: f64, lon: f64, radius: f64) -> Result<Query> {
        Query::new(lat, lon, radius, SOURCE, false, None, &BoundingRegion::dubai())
    }

    #[test]
    fn test_valid_query_gets_default_output() {
        let q = query(25.166974, 55.259068, 20.0).unwrap();
        assert_eq!(
            q.output_path(),
            Path::new("pois_25.166974_55.259068_20km.csv")
        );
        assert!(!q.force_reload);
    }

    #[test]
    fn test_fractional_radius_in_default_output() {
        assert_eq!(
            default_output_path(25.0, 55.0, 2.5),
            PathBuf::from("pois_25.000000_55.000000_2.5km.csv")
        );
    }

    #[test]
    fn test_rejects_bad_coordinates() {
        assert!(matches!(
            query(91.0, 55.0, 10.0),
            Err(ExtractError::InvalidInput(_))
        ));
        assert!(matches!(
            query(25.0, -181.0, 10.0),
            Err(ExtractError::InvalidInput(_))
        ));
        assert!(matches!(
            query(f64::NAN, 55.0, 10.0),
            Err(ExtractError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rejects_non_positive_radius() {
        assert!(matches!(
            query(25.1, 55.2, 0.0),
            Err(ExtractError::InvalidInput(_))
        ));
        assert!(matches!(
            query(25.1, 55.2, -3.0),
            Err(ExtractError::InvalidInput(_))
        ));
        assert!(matches!(
            query(25.1, 55.2, f64::INFINITY),
            Err(ExtractError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rejects_target_outside_region() {
        let err = query(48.8566, 2.3522, 10.0).unwrap_err();
        assert!(err.to_string().contains("outside the 'dubai' region"));
    }

    #[test]
    fn test_rejects_empty_source() {
        let result = Query::new(25.1, 55.2, 5.0, "  ", false, None, &BoundingRegion::dubai());
        assert!(matches!(result, Err(ExtractError::InvalidInput(_))));
    }
}

//! Territory bounding region used to scope the regional cache.

use geo::{coord, Intersects, Point, Rect};
use serde::{Deserialize, Serialize};

use super::GeoPoint;

/// A named territory box (WGS84 degrees).
///
/// The region is static configuration: one cached subset serves every
/// point/radius query that falls inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingRegion {
    pub name: String,
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingRegion {
    pub fn new(name: impl Into<String>, min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            name: name.into(),
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Dubai and its immediate surroundings
    pub fn dubai() -> Self {
        Self::new("dubai", 54.9, 24.7, 55.6, 25.4)
    }

    pub fn rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.min_lon, y: self.min_lat },
            coord! { x: self.max_lon, y: self.max_lat },
        )
    }

    /// Check that the box is well formed
    pub fn is_valid(&self) -> bool {
        let corners = [
            GeoPoint::new(self.min_lat, self.min_lon),
            GeoPoint::new(self.max_lat, self.max_lon),
        ];
        corners.iter().all(GeoPoint::is_valid)
            && self.min_lon < self.max_lon
            && self.min_lat < self.max_lat
    }

    /// Whether a point lies inside the region (edges included)
    pub fn contains_point(&self, point: GeoPoint) -> bool {
        self.rect().intersects(&Point::new(point.lon, point.lat))
    }

    /// Whether a place's whole bbox lies inside the region.
    ///
    /// Mirrors the dataset-side predicate: `xmin >= min_lon AND xmax <= max_lon ...`
    pub fn contains_bbox(&self, xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> bool {
        xmin >= self.min_lon && xmax <= self.max_lon && ymin >= self.min_lat && ymax <= self.max_lat
    }

    /// Whether a `[min, max]` column range can overlap the region on one axis.
    /// Used to prune row groups by their statistics.
    pub fn overlaps_lon(&self, min: f64, max: f64) -> bool {
        max >= self.min_lon && min <= self.max_lon
    }

    pub fn overlaps_lat(&self, min: f64, max: f64) -> bool {
        max >= self.min_lat && min <= self.max_lat
    }

    /// Stable text form used when deriving cache keys
    pub fn fingerprint(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.name, self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dubai_contains_reference_point() {
        let region = BoundingRegion::dubai();
        assert!(region.is_valid());
        assert!(region.contains_point(GeoPoint::new(25.166974, 55.259068)));
        assert!(!region.contains_point(GeoPoint::new(48.8566, 2.3522)));
    }

    #[test]
    fn test_region_edges_are_inside() {
        let region = BoundingRegion::dubai();
        assert!(region.contains_point(GeoPoint::new(24.7, 54.9)));
        assert!(region.contains_point(GeoPoint::new(25.4, 55.6)));
    }

    #[test]
    fn test_bbox_predicate() {
        let region = BoundingRegion::dubai();
        assert!(region.contains_bbox(55.0, 25.0, 55.0, 25.0));
        assert!(!region.contains_bbox(54.8, 25.0, 55.0, 25.0));
        assert!(region.overlaps_lon(50.0, 55.0));
        assert!(!region.overlaps_lat(10.0, 20.0));
    }

    #[test]
    fn test_inverted_region_is_invalid() {
        assert!(!BoundingRegion::new("bad", 55.6, 24.7, 54.9, 25.4).is_valid());
    }
}

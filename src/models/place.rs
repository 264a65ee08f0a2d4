//! Place rows as projected from the places dataset.

use serde::{Deserialize, Serialize};

use crate::taxonomy::MasterCategory;

/// Geographic point (lat/lon)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// True when both coordinates are finite and inside the WGS84 ranges
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// A single place row after projection.
///
/// Only the columns the extraction needs are kept: identity, primary name,
/// categories, and the point coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceRecord {
    /// Stable dataset identifier
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_category: Option<String>,

    /// Secondary category labels, in dataset order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternate_categories: Vec<String>,

    pub lat: f64,
    pub lon: f64,
}

impl PlaceRecord {
    /// Create a record with just an id and a coordinate
    pub fn new(id: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            id: id.into(),
            primary_name: None,
            primary_category: None,
            alternate_categories: Vec::new(),
            lat,
            lon,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.primary_name = Some(name.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.primary_category = Some(category.into());
        self
    }

    pub fn with_alternates<I, S>(mut self, alternates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alternate_categories = alternates.into_iter().map(Into::into).collect();
        self
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }

    pub fn has_valid_coordinates(&self) -> bool {
        self.point().is_valid()
    }
}

/// A place annotated with its master category and distance from the query point.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedPlace {
    pub record: PlaceRecord,
    pub master_category: MasterCategory,
    pub distance_km: f64,
    pub distance_m: f64,
}

impl EnrichedPlace {
    pub fn new(record: PlaceRecord, master_category: MasterCategory, distance_km: f64) -> Self {
        Self {
            record,
            master_category,
            distance_km,
            distance_m: distance_km * 1000.0,
        }
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_validation() {
        assert!(PlaceRecord::new("a", 25.1, 55.2).has_valid_coordinates());
        assert!(PlaceRecord::new("b", -90.0, 180.0).has_valid_coordinates());
        assert!(!PlaceRecord::new("c", 90.5, 55.2).has_valid_coordinates());
        assert!(!PlaceRecord::new("d", 25.1, -180.1).has_valid_coordinates());
        assert!(!PlaceRecord::new("e", f64::NAN, 0.0).has_valid_coordinates());
    }

    #[test]
    fn test_distance_meters_derived_from_km() {
        let place = EnrichedPlace::new(
            PlaceRecord::new("a", 25.0, 55.0),
            MasterCategory::Other,
            1.2345,
        );
        assert_eq!(place.distance_m, 1234.5);
    }

    #[test]
    fn test_cache_row_json_omits_empty_fields() {
        let record = PlaceRecord::new("08f2a", 25.0, 55.0).with_category("cafe");
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("primary_name"));
        assert!(!json.contains("alternate_categories"));

        let back: PlaceRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}

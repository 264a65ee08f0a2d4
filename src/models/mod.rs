//! Core data models for the extraction pipeline.

pub mod place;
pub mod query;
pub mod region;

pub use place::{EnrichedPlace, GeoPoint, PlaceRecord};
pub use query::{default_output_path, Query, DEFAULT_RADIUS_KM};
pub use region::BoundingRegion;

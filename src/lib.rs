//! Sextant - regional POI extraction from the Overture places dataset
//!
//! This library provides the cache, radius query, taxonomy and export
//! stages used by the `extract` binary.

pub mod cache;
pub mod distance;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod radius;
pub mod source;
pub mod taxonomy;

pub use error::{ExtractError, Result};
pub use models::{BoundingRegion, EnrichedPlace, PlaceRecord, Query};
pub use taxonomy::{classify, MasterCategory};

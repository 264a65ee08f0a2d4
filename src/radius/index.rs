//! Spatial index over cached place rows.

use rstar::{RTree, RTreeObject, AABB};
use tracing::{debug, info};

use crate::distance::Envelope;
use crate::models::PlaceRecord;

/// Wrapper for R-tree indexing of place points
pub struct IndexedPlace {
    pub record: PlaceRecord,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedPlace {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl IndexedPlace {
    /// Index a record; rows without usable coordinates are rejected
    pub fn new(record: PlaceRecord) -> Option<Self> {
        if !record.has_valid_coordinates() {
            return None;
        }
        let envelope = AABB::from_point([record.lon, record.lat]);
        Some(Self { record, envelope })
    }
}

/// R-tree over place points, keyed `[lon, lat]`
pub struct PlaceSpatialIndex {
    tree: RTree<IndexedPlace>,
    skipped: usize,
}

impl PlaceSpatialIndex {
    /// Build spatial index from place rows
    pub fn build<I>(records: I) -> Self
    where
        I: IntoIterator<Item = PlaceRecord>,
    {
        let mut skipped = 0usize;
        let indexed: Vec<IndexedPlace> = records
            .into_iter()
            .filter_map(|r| {
                let id = r.id.clone();
                let place = IndexedPlace::new(r);
                if place.is_none() {
                    debug!("Skipping place {} with invalid coordinates", id);
                    skipped += 1;
                }
                place
            })
            .collect();

        let tree = RTree::bulk_load(indexed);
        info!(
            "Spatial index built with {} places ({} skipped)",
            tree.size(),
            skipped
        );

        Self { tree, skipped }
    }

    /// Places whose point lies inside the envelope (edges included)
    pub fn candidates<'a>(&'a self, envelope: &Envelope) -> impl Iterator<Item = &'a PlaceRecord> + 'a {
        let query = AABB::from_corners(
            [envelope.min_lon, envelope.min_lat],
            [envelope.max_lon, envelope.max_lat],
        );
        self.tree
            .locate_in_envelope(&query)
            .map(|indexed| &indexed.record)
    }

    /// Get total number of indexed places
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Rows dropped during the build for invalid coordinates
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

//! sled-backed snapshot storage.
//!
//! Layout inside the database directory:
//! - tree `snapshots`: cache key -> JSON `SnapshotMeta`
//! - tree `places/{key}/{generation}`: place id -> JSON `PlaceRecord`
//!
//! A refresh writes a complete new generation tree, flushes it, and only
//! then repoints the metadata entry. Readers follow the metadata entry, so
//! they see either the old generation or the new one, never a partial one.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::{Batch, Db, Tree};
use tracing::{debug, info, warn};
use xxhash_rust::xxh64::xxh64;

use super::{resolve_cache_action, CacheAction};
use crate::error::{ExtractError, Result};
use crate::models::{BoundingRegion, PlaceRecord};
use crate::source::PlaceSource;

const SNAPSHOTS_TREE: &str = "snapshots";
const PLACES_TREE_PREFIX: &str = "places/";

/// Metadata describing one persisted snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub key: String,
    pub source_ref: String,
    pub region: BoundingRegion,
    pub generation: u64,
    pub record_count: usize,
    pub fetched_at: DateTime<Utc>,
}

impl SnapshotMeta {
    fn tree_name(&self) -> String {
        generation_tree_name(&self.key, self.generation)
    }
}

/// Cache key for a (region, source) pair
pub fn cache_key(source_ref: &str, region: &BoundingRegion) -> String {
    let material = format!("{}|{}", region.fingerprint(), source_ref);
    format!("{:016x}", xxh64(material.as_bytes(), 0))
}

fn generation_tree_name(key: &str, generation: u64) -> String {
    format!("{}{}/{:020}", PLACES_TREE_PREFIX, key, generation)
}

/// Read handle on one persisted snapshot
#[derive(Clone)]
pub struct RegionalSnapshot {
    meta: SnapshotMeta,
    tree: Tree,
}

impl RegionalSnapshot {
    pub fn meta(&self) -> &SnapshotMeta {
        &self.meta
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Decode every cached row, in id order
    pub fn records(&self) -> Result<Vec<PlaceRecord>> {
        let mut records = Vec::with_capacity(self.tree.len());
        for entry in self.tree.iter() {
            let (_, value) = entry.map_err(ExtractError::cache_read)?;
            let record: PlaceRecord = serde_json::from_slice(&value).map_err(|e| {
                ExtractError::cache_read(format!(
                    "corrupt row in snapshot {}: {}",
                    self.meta.key, e
                ))
            })?;
            records.push(record);
        }
        Ok(records)
    }
}

/// Handle on the local cache database.
///
/// sled holds an exclusive lock on the directory, so a second process
/// opening the same cache fails instead of racing a refresh.
pub struct RegionalCache {
    db: Db,
    snapshots: Tree,
    path: PathBuf,
}

impl RegionalCache {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let db = sled::open(&path)
            .map_err(|e| ExtractError::cache_write(&path, format!("failed to open cache: {}", e)))?;
        let snapshots = db
            .open_tree(SNAPSHOTS_TREE)
            .map_err(|e| ExtractError::cache_write(&path, e))?;

        debug!("Opened regional cache at {}", path.display());
        Ok(Self {
            db,
            snapshots,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up the current snapshot for a (source, region) pair
    pub fn snapshot(&self, source_ref: &str, region: &BoundingRegion) -> Result<Option<RegionalSnapshot>> {
        let key = cache_key(source_ref, region);
        let Some(raw) = self.snapshots.get(&key).map_err(ExtractError::cache_read)? else {
            return Ok(None);
        };

        let meta: SnapshotMeta = serde_json::from_slice(&raw)
            .map_err(|e| ExtractError::cache_read(format!("corrupt snapshot metadata {}: {}", key, e)))?;

        let tree_name = meta.tree_name();
        let exists = self
            .db
            .tree_names()
            .iter()
            .any(|name| &name[..] == tree_name.as_bytes());
        if !exists {
            warn!(
                "Snapshot {} points at missing generation {}; treating as absent",
                key, meta.generation
            );
            return Ok(None);
        }

        let tree = self.db.open_tree(&tree_name).map_err(ExtractError::cache_read)?;
        Ok(Some(RegionalSnapshot { meta, tree }))
    }

    /// Return the regional subset, reusing the local snapshot unless a
    /// reload is forced or no snapshot exists yet.
    ///
    /// On a refresh, a source failure leaves the previous snapshot in place.
    pub async fn get_regional_subset<S: PlaceSource>(
        &self,
        source: &S,
        region: &BoundingRegion,
        force_reload: bool,
    ) -> Result<(RegionalSnapshot, CacheAction)> {
        let existing = self.snapshot(source.reference(), region)?;
        let action = resolve_cache_action(force_reload, existing.is_some());

        if let (CacheAction::Reuse, Some(snapshot)) = (action, existing) {
            info!(
                "Using cached snapshot for '{}' ({} places, fetched {})",
                region.name,
                snapshot.meta().record_count,
                snapshot.meta().fetched_at.to_rfc3339()
            );
            return Ok((snapshot, CacheAction::Reuse));
        }

        if force_reload {
            info!("Reload requested; fetching '{}' from {}", region.name, source.reference());
        } else {
            info!("No cached snapshot for '{}'; fetching from {}", region.name, source.reference());
        }

        let records = source.fetch_region(region).await?;
        let snapshot = self.replace(source.reference(), region, records)?;
        Ok((snapshot, CacheAction::Refresh))
    }

    /// Replace the snapshot for (source, region) with `records`
    pub fn replace(
        &self,
        source_ref: &str,
        region: &BoundingRegion,
        records: Vec<PlaceRecord>,
    ) -> Result<RegionalSnapshot> {
        let key = cache_key(source_ref, region);
        let generation = self
            .db
            .generate_id()
            .map_err(|e| ExtractError::cache_write(&self.path, e))?;
        let tree_name = generation_tree_name(&key, generation);

        let tree = match self.write_generation(&tree_name, &records) {
            Ok(tree) => tree,
            Err(e) => {
                if let Err(drop_err) = self.db.drop_tree(&tree_name) {
                    warn!("Failed to discard partial generation {}: {}", tree_name, drop_err);
                }
                return Err(e);
            }
        };

        let meta = SnapshotMeta {
            key: key.clone(),
            source_ref: source_ref.to_string(),
            region: region.clone(),
            generation,
            record_count: tree.len(),
            fetched_at: Utc::now(),
        };
        let encoded =
            serde_json::to_vec(&meta).map_err(|e| ExtractError::cache_write(&self.path, e))?;

        // Single-key insert: the switch to the new generation is atomic
        if let Err(e) = self.snapshots.insert(key.as_bytes(), encoded) {
            if let Err(drop_err) = self.db.drop_tree(&tree_name) {
                warn!("Failed to discard generation {}: {}", tree_name, drop_err);
            }
            return Err(ExtractError::cache_write(&self.path, e));
        }
        self.db
            .flush()
            .map_err(|e| ExtractError::cache_write(&self.path, e))?;

        info!(
            "Cached {} places for '{}' (generation {})",
            meta.record_count, region.name, generation
        );

        self.prune_generations(&key, &tree_name);
        Ok(RegionalSnapshot { meta, tree })
    }

    fn write_generation(&self, tree_name: &str, records: &[PlaceRecord]) -> Result<Tree> {
        let tree = self
            .db
            .open_tree(tree_name)
            .map_err(|e| ExtractError::cache_write(&self.path, e))?;

        let mut batch = Batch::default();
        for record in records {
            let value =
                serde_json::to_vec(record).map_err(|e| ExtractError::cache_write(&self.path, e))?;
            batch.insert(record.id.as_bytes(), value);
        }
        tree.apply_batch(batch)
            .map_err(|e| ExtractError::cache_write(&self.path, e))?;
        tree.flush()
            .map_err(|e| ExtractError::cache_write(&self.path, e))?;

        Ok(tree)
    }

    /// Drop superseded generations, including ones orphaned by an
    /// interrupted refresh. Failures only leave garbage behind.
    fn prune_generations(&self, key: &str, keep: &str) {
        let prefix = format!("{}{}/", PLACES_TREE_PREFIX, key);
        for name in self.db.tree_names() {
            let name = String::from_utf8_lossy(&name).to_string();
            if name.starts_with(&prefix) && name != keep {
                match self.db.drop_tree(&name) {
                    Ok(_) => debug!("Dropped superseded generation {}", name),
                    Err(e) => warn!("Failed to drop superseded generation {}: {}", name, e),
                }
            }
        }
    }

    /// Generation trees currently stored for (source, region)
    pub fn generations(&self, source_ref: &str, region: &BoundingRegion) -> Vec<String> {
        let prefix = format!("{}{}/", PLACES_TREE_PREFIX, cache_key(source_ref, region));
        let mut names: Vec<String> = self
            .db
            .tree_names()
            .iter()
            .map(|n| String::from_utf8_lossy(n).to_string())
            .filter(|n| n.starts_with(&prefix))
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing::StaticSource;

    const SOURCE: &str = "s3://bucket/release/2025-12-17.0/theme=places/type=place/*.parquet";

    fn records() -> Vec<PlaceRecord> {
        vec![
            PlaceRecord::new("b", 25.2, 55.3).with_category("cafe"),
            PlaceRecord::new("a", 25.1, 55.2)
                .with_name("Burj")
                .with_alternates(["landmark"]),
            PlaceRecord::new("paris", 48.86, 2.35),
        ]
    }

    #[test]
    fn test_cache_key_depends_on_source_and_region() {
        let dubai = BoundingRegion::dubai();
        let other = BoundingRegion::new("dubai", 54.0, 24.0, 56.0, 26.0);
        assert_eq!(cache_key(SOURCE, &dubai), cache_key(SOURCE, &dubai));
        assert_ne!(cache_key(SOURCE, &dubai), cache_key("/local/places", &dubai));
        assert_ne!(cache_key(SOURCE, &dubai), cache_key(SOURCE, &other));
        assert_eq!(cache_key(SOURCE, &dubai).len(), 16);
    }

    #[tokio::test]
    async fn test_first_call_fetches_then_reuses() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RegionalCache::open(dir.path().join("cache")).unwrap();
        let source = StaticSource::new(SOURCE, records());
        let region = BoundingRegion::dubai();

        let (snapshot, action) = cache.get_regional_subset(&source, &region, false).await.unwrap();
        assert_eq!(action, CacheAction::Refresh);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.meta().record_count, 2);
        assert_eq!(source.fetch_count(), 1);

        let (snapshot, action) = cache.get_regional_subset(&source, &region, false).await.unwrap();
        assert_eq!(action, CacheAction::Reuse);
        assert_eq!(source.fetch_count(), 1);

        // Rows come back in id order with all fields intact
        let rows = snapshot.records().unwrap();
        assert_eq!(rows[0].id, "a");
        assert_eq!(rows[0].primary_name.as_deref(), Some("Burj"));
        assert_eq!(rows[0].alternate_categories, vec!["landmark".to_string()]);
        assert_eq!(rows[1].id, "b");
    }

    #[tokio::test]
    async fn test_cache_hit_never_touches_source() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RegionalCache::open(dir.path()).unwrap();
        let region = BoundingRegion::dubai();
        cache.replace(SOURCE, &region, records()).unwrap();

        let offline = StaticSource::unreachable(SOURCE);
        let (snapshot, action) = cache.get_regional_subset(&offline, &region, false).await.unwrap();
        assert_eq!(action, CacheAction::Reuse);
        assert_eq!(snapshot.len(), 3);
        assert_eq!(offline.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RegionalCache::open(dir.path()).unwrap();
        let region = BoundingRegion::dubai();

        let good = StaticSource::new(SOURCE, records());
        cache.get_regional_subset(&good, &region, false).await.unwrap();
        let before = cache.generations(SOURCE, &region);

        let offline = StaticSource::unreachable(SOURCE);
        let err = cache
            .get_regional_subset(&offline, &region, true)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ExtractError::DataSource { .. }));

        let snapshot = cache.snapshot(SOURCE, &region).unwrap().unwrap();
        assert_eq!(snapshot.records().unwrap().len(), 2);
        assert_eq!(cache.generations(SOURCE, &region), before);
    }

    #[tokio::test]
    async fn test_forced_reload_replaces_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RegionalCache::open(dir.path()).unwrap();
        let region = BoundingRegion::dubai();

        cache.replace(SOURCE, &region, records()).unwrap();
        let first_generation = cache.snapshot(SOURCE, &region).unwrap().unwrap().meta().generation;

        let newer = StaticSource::new(SOURCE, vec![PlaceRecord::new("c", 25.0, 55.0)]);
        let (snapshot, action) = cache.get_regional_subset(&newer, &region, true).await.unwrap();
        assert_eq!(action, CacheAction::Refresh);
        assert!(snapshot.meta().generation > first_generation);

        // Full replace, not a merge
        let ids: Vec<String> = snapshot.records().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["c".to_string()]);
        assert_eq!(cache.generations(SOURCE, &region).len(), 1);
    }

    #[test]
    fn test_orphaned_generation_is_invisible_and_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RegionalCache::open(dir.path()).unwrap();
        let region = BoundingRegion::dubai();
        cache.replace(SOURCE, &region, records()).unwrap();

        // A refresh that died before repointing the metadata
        let key = cache_key(SOURCE, &region);
        let orphan = cache.db.open_tree(generation_tree_name(&key, u64::MAX)).unwrap();
        orphan.insert("half", b"{".to_vec()).unwrap();

        let snapshot = cache.snapshot(SOURCE, &region).unwrap().unwrap();
        assert_eq!(snapshot.records().unwrap().len(), 3);
        assert_eq!(cache.generations(SOURCE, &region).len(), 2);

        cache
            .replace(SOURCE, &region, vec![PlaceRecord::new("x", 25.0, 55.0)])
            .unwrap();
        assert_eq!(cache.generations(SOURCE, &region).len(), 1);
    }

    #[test]
    fn test_snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let region = BoundingRegion::dubai();
        {
            let cache = RegionalCache::open(dir.path()).unwrap();
            cache.replace(SOURCE, &region, records()).unwrap();
        }
        let cache = RegionalCache::open(dir.path()).unwrap();
        assert_eq!(cache.path(), dir.path());
        let snapshot = cache.snapshot(SOURCE, &region).unwrap().unwrap();
        assert_eq!(snapshot.len(), 3);
        assert!(cache.snapshot("/other/source", &region).unwrap().is_none());
    }

    #[test]
    fn test_unwritable_location_is_cache_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let err = RegionalCache::open(blocker.join("cache")).err().unwrap();
        assert!(matches!(err, ExtractError::CacheWrite { .. }));
    }
}

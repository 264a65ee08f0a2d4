//! Regional cache of place rows.
//!
//! The cache holds one snapshot per (region, dataset source) pair. A
//! snapshot is reused as-is until the caller explicitly asks for a reload;
//! there is no time-based expiry.

mod store;

pub use store::{cache_key, RegionalCache, RegionalSnapshot, SnapshotMeta};

pub const DEFAULT_CACHE_DIR: &str = "overture_cache";

/// What the cache did to satisfy a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    /// Served the existing local snapshot; the source was not touched
    Reuse,
    /// Fetched the region from the source and replaced the snapshot
    Refresh,
}

impl std::fmt::Display for CacheAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheAction::Reuse => write!(f, "reuse"),
            CacheAction::Refresh => write!(f, "refresh"),
        }
    }
}

/// Decide between reusing and refreshing a snapshot
pub fn resolve_cache_action(force_reload: bool, snapshot_exists: bool) -> CacheAction {
    if snapshot_exists && !force_reload {
        CacheAction::Reuse
    } else {
        CacheAction::Refresh
    }
}

//! Place dataset sources.
//!
//! A source reference names a set of hive-partitioned parquet files, either
//! on local disk or under an `s3://` prefix:
//!
//! - `/data/overture/theme=places/type=place/*.parquet`
//! - `/data/overture/theme=places` (every `*.parquet` below it)
//! - `s3://overturemaps-us-west-2/release/2025-12-17.0/theme=places/type=place/*.parquet`
//!
//! Sources return every place whose bbox lies inside the bounding region.

pub mod object_store;
pub mod parquet;

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use tempfile::Builder;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{ExtractError, Result};
use crate::models::{BoundingRegion, PlaceRecord};

use self::object_store::{key_file_name, ObjectStoreClient};
use self::parquet::{scan_file, FileScan};

/// Default dataset: Overture Maps places, pinned to one release
pub const DEFAULT_SOURCE: &str =
    "s3://overturemaps-us-west-2/release/2025-12-17.0/theme=places/type=place/*.parquet";

pub const DEFAULT_S3_REGION: &str = "us-west-2";

/// Anything that can produce the place rows inside a region.
///
/// This is the seam between the cache and the remote dataset: the cache
/// only needs a stable reference string (its key) and a bulk fetch.
#[allow(async_fn_in_trait)]
pub trait PlaceSource {
    /// Stable reference used to key cached snapshots
    fn reference(&self) -> &str;

    /// Fetch every place inside `region`
    async fn fetch_region(&self, region: &BoundingRegion) -> Result<Vec<PlaceRecord>>;
}

/// File-name glob such as `*.parquet` or `part-*.zstd.parquet`
#[derive(Debug, Clone)]
pub struct FilePattern {
    glob: String,
    re: Regex,
}

impl FilePattern {
    pub fn new(glob: &str) -> std::result::Result<Self, regex::Error> {
        let mut pattern = String::from("^");
        for c in glob.chars() {
            match c {
                '*' => pattern.push_str("[^/]*"),
                '?' => pattern.push_str("[^/]"),
                other => pattern.push_str(&regex::escape(&other.to_string())),
            }
        }
        pattern.push('$');
        Ok(Self {
            glob: glob.to_string(),
            re: Regex::new(&pattern)?,
        })
    }

    pub fn parquet() -> std::result::Result<Self, regex::Error> {
        Self::new("*.parquet")
    }

    pub fn matches(&self, file_name: &str) -> bool {
        self.re.is_match(file_name)
    }

    pub fn as_str(&self) -> &str {
        &self.glob
    }
}

/// Parsed form of a source reference
#[derive(Debug, Clone)]
pub enum SourceLocation {
    Local {
        root: PathBuf,
        pattern: FilePattern,
    },
    ObjectStore {
        bucket: String,
        prefix: String,
        pattern: FilePattern,
    },
}

impl SourceLocation {
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        let invalid = |reason: String| ExtractError::InvalidInput(format!(
            "source reference '{}': {}",
            reference, reason
        ));

        if let Some(rest) = reference.strip_prefix("s3://") {
            let (bucket, path) = rest.split_once('/').unwrap_or((rest, ""));
            if bucket.is_empty() {
                return Err(invalid("missing bucket name".to_string()));
            }
            let (prefix, pattern) = split_glob(path).map_err(|e| invalid(e.to_string()))?;
            return Ok(SourceLocation::ObjectStore {
                bucket: bucket.to_string(),
                prefix,
                pattern,
            });
        }

        if reference.contains("://") {
            return Err(invalid("only local paths and s3:// prefixes are supported".to_string()));
        }

        let (root, pattern) = split_glob(reference).map_err(|e| invalid(e.to_string()))?;
        // A bare glob such as `*.parquet` is relative to the working directory
        let root = if root.is_empty() { PathBuf::from(".") } else { PathBuf::from(root) };
        Ok(SourceLocation::Local { root, pattern })
    }
}

/// Split `dir/sub/*.parquet` into (`dir/sub/`, `*.parquet`).
/// A path without a glob keeps the default `*.parquet` pattern, unless it
/// names a single `.parquet` file.
fn split_glob(path: &str) -> std::result::Result<(String, FilePattern), regex::Error> {
    let (dir, last) = match path.rsplit_once('/') {
        Some((dir, last)) => (format!("{}/", dir), last),
        None => (String::new(), path),
    };

    if last.contains('*') || last.contains('?') {
        Ok((dir, FilePattern::new(last)?))
    } else if last.ends_with(".parquet") {
        Ok((dir, FilePattern::new(last)?))
    } else if last.is_empty() {
        Ok((dir, FilePattern::parquet()?))
    } else {
        Ok((format!("{}{}/", dir, last), FilePattern::parquet()?))
    }
}

/// The parquet-backed source used by the extraction binary
pub struct DatasetSource {
    reference: String,
    location: SourceLocation,
    s3_region: String,
}

impl DatasetSource {
    pub fn new(reference: impl Into<String>, s3_region: impl Into<String>) -> Result<Self> {
        let reference = reference.into();
        let location = SourceLocation::parse(&reference)?;
        Ok(Self {
            reference,
            location,
            s3_region: s3_region.into(),
        })
    }

    fn fail(&self, reason: impl std::fmt::Display) -> ExtractError {
        ExtractError::data_source(&self.reference, reason)
    }

    /// Matching partition files below a local root, in path order
    fn local_files(&self, root: &Path, pattern: &FilePattern) -> Result<Vec<PathBuf>> {
        if !root.exists() {
            return Err(self.fail(format!("path {} does not exist", root.display())));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.map_err(|e| self.fail(e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| pattern.matches(n));
            if matches {
                files.push(path.to_path_buf());
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(self.fail(format!(
                "no files matching '{}' under {}",
                pattern.as_str(),
                root.display()
            )));
        }
        Ok(files)
    }

    async fn fetch_local(
        &self,
        root: &Path,
        pattern: &FilePattern,
        region: &BoundingRegion,
    ) -> Result<Vec<PlaceRecord>> {
        let files = self.local_files(root, pattern)?;
        info!("Scanning {} local partition files under {}", files.len(), root.display());

        let pb = progress_bar(files.len() as u64);
        let mut records = Vec::new();
        for path in files {
            let scan = self.scan_blocking(path, region).await?;
            records.extend(scan.records);
            pb.inc(1);
        }
        pb.finish_and_clear();

        Ok(records)
    }

    async fn fetch_object_store(
        &self,
        bucket: &str,
        prefix: &str,
        pattern: &FilePattern,
        region: &BoundingRegion,
    ) -> Result<Vec<PlaceRecord>> {
        let client = ObjectStoreClient::new(bucket, &self.s3_region).map_err(|e| self.fail(e))?;

        info!("Listing s3://{}/{}", bucket, prefix);
        let objects: Vec<_> = client
            .list(prefix)
            .await
            .map_err(|e| self.fail(e))?
            .into_iter()
            .filter(|o| pattern.matches(key_file_name(&o.key)))
            .collect();

        if objects.is_empty() {
            return Err(self.fail(format!(
                "no objects matching '{}' under s3://{}/{}",
                pattern.as_str(),
                bucket,
                prefix
            )));
        }

        let total_bytes: u64 = objects.iter().map(|o| o.size).sum();
        info!(
            "Downloading {} partition files ({:.1} MiB); this may take a few minutes",
            objects.len(),
            total_bytes as f64 / (1024.0 * 1024.0)
        );

        let pb = progress_bar(objects.len() as u64);
        let mut records = Vec::new();
        for object in objects {
            let mut temp = Builder::new()
                .prefix("sextant-part-")
                .suffix(".parquet")
                .tempfile()
                .map_err(|e| self.fail(format!("failed creating download buffer: {}", e)))?;

            let bytes = client
                .download(&object.key, temp.as_file_mut())
                .await
                .map_err(|e| self.fail(e))?;
            debug!("Downloaded {} ({} bytes)", object.key, bytes);

            // Removed from disk when dropped at the end of the iteration
            let path = temp.into_temp_path();
            let scan = self.scan_blocking(path.to_path_buf(), region).await?;
            records.extend(scan.records);
            pb.inc(1);
        }
        pb.finish_and_clear();

        Ok(records)
    }

    /// Run the CPU-bound parquet scan off the async workers
    async fn scan_blocking(&self, path: PathBuf, region: &BoundingRegion) -> Result<FileScan> {
        let region = region.clone();
        let shown = path.display().to_string();
        let scan = tokio::task::spawn_blocking(move || scan_file(&path, &region))
            .await
            .map_err(|e| self.fail(format!("scan task for {} failed: {}", shown, e)))?
            .map_err(|e| self.fail(e))?;

        debug!(
            "{}: {}/{} row groups scanned, {} rows read, {} places kept",
            shown,
            scan.row_groups_scanned,
            scan.row_groups_total,
            scan.rows_read,
            scan.records.len()
        );
        if scan.row_groups_total > 0 && scan.row_groups_scanned == 0 {
            debug!("{} has no row groups overlapping the region", shown);
        }
        Ok(scan)
    }
}

impl PlaceSource for DatasetSource {
    fn reference(&self) -> &str {
        &self.reference
    }

    async fn fetch_region(&self, region: &BoundingRegion) -> Result<Vec<PlaceRecord>> {
        let records = match &self.location {
            SourceLocation::Local { root, pattern } => {
                self.fetch_local(root, pattern, region).await?
            }
            SourceLocation::ObjectStore {
                bucket,
                prefix,
                pattern,
            } => {
                self.fetch_object_store(bucket, prefix, pattern, region)
                    .await?
            }
        };

        if records.is_empty() {
            warn!(
                "Source {} has no places inside region '{}'",
                self.reference, region.name
            );
        }
        info!("Fetched {} places for region '{}'", records.len(), region.name);
        Ok(records)
    }
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::parquet::tests::write_fixture;

    #[test]
    fn test_parse_default_s3_reference() {
        match SourceLocation::parse(DEFAULT_SOURCE).unwrap() {
            SourceLocation::ObjectStore {
                bucket,
                prefix,
                pattern,
            } => {
                assert_eq!(bucket, "overturemaps-us-west-2");
                assert_eq!(prefix, "release/2025-12-17.0/theme=places/type=place/");
                assert!(pattern.matches("part-00001-abc.zstd.parquet"));
                assert!(!pattern.matches("_SUCCESS"));
            }
            other => panic!("unexpected location {:?}", other),
        }
    }

    #[test]
    fn test_parse_local_directory_defaults_to_parquet_glob() {
        match SourceLocation::parse("/data/overture/theme=places").unwrap() {
            SourceLocation::Local { root, pattern } => {
                assert_eq!(root, PathBuf::from("/data/overture/theme=places/"));
                assert_eq!(pattern.as_str(), "*.parquet");
            }
            other => panic!("unexpected location {:?}", other),
        }
    }

    #[test]
    fn test_parse_single_file() {
        match SourceLocation::parse("places/part-1.parquet").unwrap() {
            SourceLocation::Local { root, pattern } => {
                assert_eq!(root, PathBuf::from("places/"));
                assert!(pattern.matches("part-1.parquet"));
                assert!(!pattern.matches("part-10.parquet"));
            }
            other => panic!("unexpected location {:?}", other),
        }
    }

    #[test]
    fn test_parse_bare_glob_uses_working_directory() {
        match SourceLocation::parse("*.parquet").unwrap() {
            SourceLocation::Local { root, pattern } => {
                assert_eq!(root, PathBuf::from("."));
                assert!(root.exists());
                assert!(pattern.matches("part-0.parquet"));
            }
            other => panic!("unexpected location {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_other_schemes() {
        assert!(matches!(
            SourceLocation::parse("gs://bucket/places"),
            Err(ExtractError::InvalidInput(_))
        ));
        assert!(matches!(
            SourceLocation::parse("s3:///no-bucket"),
            Err(ExtractError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_glob_escapes_literal_characters() {
        let pattern = FilePattern::new("part-?.zstd.parquet").unwrap();
        assert!(pattern.matches("part-1.zstd.parquet"));
        assert!(!pattern.matches("part-1xzstd.parquet"));
    }

    #[tokio::test]
    async fn test_local_source_scans_hive_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let partition = dir.path().join("theme=places").join("type=place");
        std::fs::create_dir_all(&partition).unwrap();
        write_fixture(
            &partition.join("part-0.parquet"),
            &[&[("a", Some("A"), Some("cafe"), 25.1, 55.2)]],
        );
        write_fixture(
            &partition.join("part-1.parquet"),
            &[&[("b", Some("B"), Some("hotel"), 25.15, 55.25)]],
        );
        std::fs::write(partition.join("_SUCCESS"), b"").unwrap();

        let reference = format!("{}/*.parquet", partition.display());
        let source = DatasetSource::new(reference, DEFAULT_S3_REGION).unwrap();
        let records = source.fetch_region(&BoundingRegion::dubai()).await.unwrap();

        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_missing_local_path_is_data_source_error() {
        let source = DatasetSource::new("/definitely/not/here/*.parquet", DEFAULT_S3_REGION).unwrap();
        let err = source.fetch_region(&BoundingRegion::dubai()).await.unwrap_err();
        assert!(matches!(err, ExtractError::DataSource { .. }));
    }

    #[tokio::test]
    async fn test_corrupt_partition_is_data_source_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("part-0.parquet"), b"garbage").unwrap();

        let source = DatasetSource::new(dir.path().display().to_string(), DEFAULT_S3_REGION).unwrap();
        let err = source.fetch_region(&BoundingRegion::dubai()).await.unwrap_err();
        assert!(matches!(err, ExtractError::DataSource { .. }));
    }
}

//! Parquet scanning with row-group pruning.
//!
//! Place partitions carry a `bbox` struct (`xmin`, `xmax`, `ymin`, `ymax`).
//! Row groups whose column statistics cannot satisfy the region predicate
//! are skipped without decoding.

use std::fs::File;
use std::path::Path;

use parquet::file::metadata::RowGroupMetaData;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::file::statistics::Statistics;
use parquet::record::reader::RowIter;
use parquet::record::{Field, Row};
use tracing::debug;

use crate::models::{BoundingRegion, PlaceRecord};

/// Outcome of scanning one partition file
#[derive(Debug, Default)]
pub struct FileScan {
    pub records: Vec<PlaceRecord>,
    pub row_groups_total: usize,
    pub row_groups_scanned: usize,
    pub rows_read: usize,
}

/// Scan one parquet file, returning the places whose bbox lies inside the region
pub fn scan_file(path: &Path, region: &BoundingRegion) -> Result<FileScan, String> {
    let file = File::open(path).map_err(|e| format!("failed opening {}: {}", path.display(), e))?;
    let reader = SerializedFileReader::new(file)
        .map_err(|e| format!("failed reading parquet footer of {}: {}", path.display(), e))?;

    let mut scan = FileScan {
        row_groups_total: reader.num_row_groups(),
        ..FileScan::default()
    };

    for (idx, meta) in reader.metadata().row_groups().iter().enumerate() {
        if !BboxStats::from_row_group(meta).may_match(region) {
            debug!("Pruned row group {} of {}", idx, path.display());
            continue;
        }
        scan.row_groups_scanned += 1;

        let row_group = reader.get_row_group(idx).map_err(|e| {
            format!(
                "failed opening row group {} of {}: {}",
                idx,
                path.display(),
                e
            )
        })?;
        let rows = RowIter::from_row_group(None, row_group.as_ref()).map_err(|e| {
            format!(
                "failed iterating row group {} of {}: {}",
                idx,
                path.display(),
                e
            )
        })?;

        for row in rows {
            let row = row.map_err(|e| {
                format!(
                    "failed decoding row in group {} of {}: {}",
                    idx,
                    path.display(),
                    e
                )
            })?;
            scan.rows_read += 1;
            if let Some(record) = decode_row(&row, region)? {
                scan.records.push(record);
            }
        }
    }

    Ok(scan)
}

/// Project a dataset row into a `PlaceRecord`.
///
/// Returns `Ok(None)` for rows outside the region or without a usable point,
/// and an error when the row lacks the columns every place must carry.
pub fn decode_row(row: &Row, region: &BoundingRegion) -> Result<Option<PlaceRecord>, String> {
    let mut id = None;
    let mut primary_name = None;
    let mut primary_category = None;
    let mut alternate_categories = Vec::new();
    let mut bbox = None;
    let mut saw_bbox = false;

    for (name, field) in row.get_column_iter() {
        match name.as_str() {
            "id" => id = as_string(field),
            "names" => primary_name = group_field(field, "primary").and_then(as_string),
            "categories" => {
                primary_category = group_field(field, "primary").and_then(as_string);
                if let Some(alternates) = group_field(field, "alternate") {
                    alternate_categories = as_string_list(alternates);
                }
            }
            "bbox" => {
                saw_bbox = true;
                bbox = as_bbox(field);
            }
            _ => {}
        }
    }

    if !saw_bbox {
        return Err("row has no bbox column".to_string());
    }
    let id = id.ok_or_else(|| "row has no id".to_string())?;

    let Some((xmin, ymin, xmax, ymax)) = bbox else {
        return Ok(None);
    };
    if !region.contains_bbox(xmin, ymin, xmax, ymax) {
        return Ok(None);
    }

    let record = PlaceRecord {
        id,
        primary_name,
        primary_category,
        alternate_categories,
        lat: (ymin + ymax) / 2.0,
        lon: (xmin + xmax) / 2.0,
    };
    Ok(record.has_valid_coordinates().then_some(record))
}

fn as_string(field: &Field) -> Option<String> {
    match field {
        Field::Str(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn as_f64(field: &Field) -> Option<f64> {
    match field {
        Field::Double(v) => Some(*v),
        Field::Float(v) => Some(f64::from(*v)),
        _ => None,
    }
}

fn group_field<'a>(field: &'a Field, key: &str) -> Option<&'a Field> {
    match field {
        Field::Group(row) => row
            .get_column_iter()
            .find(|(name, _)| name.as_str() == key)
            .map(|(_, f)| f),
        _ => None,
    }
}

fn as_string_list(field: &Field) -> Vec<String> {
    match field {
        Field::ListInternal(list) => list.elements().iter().filter_map(as_string).collect(),
        _ => Vec::new(),
    }
}

fn as_bbox(field: &Field) -> Option<(f64, f64, f64, f64)> {
    let get = |key| group_field(field, key).and_then(as_f64);
    Some((get("xmin")?, get("ymin")?, get("xmax")?, get("ymax")?))
}

/// Min/max statistics of the bbox columns for one row group
#[derive(Debug, Default, Clone, Copy)]
struct BboxStats {
    xmin: Option<(f64, f64)>,
    xmax: Option<(f64, f64)>,
    ymin: Option<(f64, f64)>,
    ymax: Option<(f64, f64)>,
}

impl BboxStats {
    fn from_row_group(meta: &RowGroupMetaData) -> Self {
        let mut stats = Self::default();
        for column in meta.columns() {
            let range = column.statistics().and_then(min_max);
            match column.column_path().string().as_str() {
                "bbox.xmin" => stats.xmin = range,
                "bbox.xmax" => stats.xmax = range,
                "bbox.ymin" => stats.ymin = range,
                "bbox.ymax" => stats.ymax = range,
                _ => {}
            }
        }
        stats
    }

    /// False only when no row in the group can satisfy
    /// `xmin >= min_lon AND xmax <= max_lon AND ymin >= min_lat AND ymax <= max_lat`.
    /// Missing statistics never prune.
    fn may_match(&self, region: &BoundingRegion) -> bool {
        let lon_ok = |range: Option<(f64, f64)>| {
            range.map_or(true, |(lo, hi)| region.overlaps_lon(lo, hi))
        };
        let lat_ok = |range: Option<(f64, f64)>| {
            range.map_or(true, |(lo, hi)| region.overlaps_lat(lo, hi))
        };
        lon_ok(self.xmin) && lon_ok(self.xmax) && lat_ok(self.ymin) && lat_ok(self.ymax)
    }
}

fn min_max(stats: &Statistics) -> Option<(f64, f64)> {
    match stats {
        Statistics::Float(s) => Some((f64::from(*s.min_opt()?), f64::from(*s.max_opt()?))),
        Statistics::Double(s) => Some((*s.min_opt()?, *s.max_opt()?)),
        _ => None,
    }
}

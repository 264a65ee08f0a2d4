//! CSV sink for enriched places.
//!
//! The file is written to a temporary sibling of the destination and
//! renamed into place once complete, so an interrupted run never leaves a
//! truncated export behind.

use std::path::Path;

use csv::Writer;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{ExtractError, Result};
use crate::models::EnrichedPlace;

pub const CSV_HEADER: [&str; 9] = [
    "id",
    "primary_name",
    "primary_category",
    "master_category",
    "lat",
    "lon",
    "distance_km",
    "distance_m",
    "alternate_categories",
];

pub const ALTERNATES_SEPARATOR: &str = ";";

/// Render one place as CSV fields, in header order
pub fn render_row(place: &EnrichedPlace) -> [String; 9] {
    let record = &place.record;
    [
        record.id.clone(),
        record.primary_name.clone().unwrap_or_default(),
        record.primary_category.clone().unwrap_or_default(),
        place.master_category.as_str().to_string(),
        format!("{:.7}", record.lat),
        format!("{:.7}", record.lon),
        format!("{:.3}", place.distance_km),
        format!("{:.1}", place.distance_m),
        record.alternate_categories.join(ALTERNATES_SEPARATOR),
    ]
}

/// Write `places` to `path` in the given order. An empty slice produces a
/// header-only file.
pub fn write_csv(path: &Path, places: &[EnrichedPlace]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| ExtractError::export(path, e))?;
    {
        let mut writer = Writer::from_writer(temp.as_file_mut());
        writer
            .write_record(CSV_HEADER)
            .map_err(|e| ExtractError::export(path, e))?;
        for place in places {
            writer
                .write_record(render_row(place))
                .map_err(|e| ExtractError::export(path, e))?;
        }
        writer.flush().map_err(|e| ExtractError::export(path, e))?;
    }
    temp.as_file()
        .sync_all()
        .map_err(|e| ExtractError::export(path, e))?;

    temp.persist(path)
        .map_err(|e| ExtractError::export(path, e.error))?;

    debug!("Wrote {} rows to {}", places.len(), path.display());
    Ok(())
}

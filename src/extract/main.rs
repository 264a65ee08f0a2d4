//! POI extraction CLI.
//!
//! Resolves the regional snapshot of the places dataset (reusing the local
//! cache unless `--reload` is given), selects every place within the radius
//! of the target, and writes a categorized CSV sorted by distance.

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use sextant::cache::RegionalCache;
use sextant::models::{Query, DEFAULT_RADIUS_KM};
use sextant::pipeline::{ExtractionReport, Pipeline};
use sextant::source::DatasetSource;

use crate::config::Config;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "extract")]
#[command(about = "Extract points of interest around a coordinate from the Overture places dataset")]
struct Args {
    /// Target latitude
    #[arg(allow_negative_numbers = true)]
    latitude: f64,

    /// Target longitude
    #[arg(allow_negative_numbers = true)]
    longitude: f64,

    /// Search radius in kilometers
    #[arg(short, long, default_value_t = DEFAULT_RADIUS_KM)]
    radius: f64,

    /// Output CSV (default: pois_<lat>_<lon>_<radius>km.csv)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Regional cache directory
    #[arg(short = 'd', long)]
    cache_dir: Option<PathBuf>,

    /// Dataset source: local parquet directory/glob or s3:// release prefix
    #[arg(long)]
    source: Option<String>,

    /// Refetch the region from the source even if a snapshot is cached
    #[arg(long)]
    reload: bool,

    /// TOML config with region, source and cache defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    let region = config.bounding_region()?;
    let source_ref = args.source.clone().unwrap_or_else(|| config.source.clone());
    let cache_dir = args.cache_dir.clone().unwrap_or_else(|| config.cache_dir.clone());

    let query = Query::new(
        args.latitude,
        args.longitude,
        args.radius,
        source_ref,
        args.reload,
        args.output.clone(),
        &region,
    )?;

    info!("Sextant POI extraction");
    info!("Region: {} | Source: {}", region.name, query.source_ref);

    let source = DatasetSource::new(query.source_ref.clone(), config.s3_region.clone())?;
    let cache = RegionalCache::open(&cache_dir)
        .with_context(|| format!("Cache at {} is unavailable", cache_dir.display()))?;
    info!("Cache: {}", cache.path().display());

    let mut pipeline = Pipeline::new(&cache, &source, &region);
    let report = pipeline.run(&query).await?;

    log_report(&report);
    Ok(())
}

fn log_report(report: &ExtractionReport) {
    info!(
        "Found {} places ({} in regional snapshot, cache {})",
        report.row_count, report.snapshot_size, report.cache_action
    );
    if report.is_empty() {
        return;
    }

    info!("Category breakdown:");
    for (category, count) in &report.categories {
        info!("  {:<22} {}", category.as_str(), count);
    }

    info!("Top {} nearest places:", report.nearest.len());
    for place in &report.nearest {
        info!(
            "  {:>8.3} km  {:<22} {}",
            place.distance_km,
            place.master_category.as_str(),
            place.record.primary_name.as_deref().unwrap_or("(unnamed)")
        );
    }
    info!("Saved to {}", report.output_path.display());
}

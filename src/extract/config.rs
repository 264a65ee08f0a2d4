use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use sextant::cache::DEFAULT_CACHE_DIR;
use sextant::models::BoundingRegion;
use sextant::source::{DEFAULT_S3_REGION, DEFAULT_SOURCE};

/// Optional TOML configuration. Every key has a default, so an absent
/// file behaves exactly like an empty one.
#[derive(Debug, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub source: String,
    pub cache_dir: PathBuf,
    pub s3_region: String,
    pub region: RegionConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RegionConfig {
    pub name: String,
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            s3_region: DEFAULT_S3_REGION.to_string(),
            region: RegionConfig::default(),
        }
    }
}

impl Default for RegionConfig {
    fn default() -> Self {
        let dubai = BoundingRegion::dubai();
        Self {
            name: dubai.name,
            min_lon: dubai.min_lon,
            min_lat: dubai.min_lat,
            max_lon: dubai.max_lon,
            max_lat: dubai.max_lat,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;
        config.bounding_region()?;
        Ok(config)
    }

    pub fn bounding_region(&self) -> Result<BoundingRegion> {
        let r = &self.region;
        let region = BoundingRegion::new(r.name.clone(), r.min_lon, r.min_lat, r.max_lon, r.max_lat);
        if r.name.trim().is_empty() {
            bail!("region name must not be empty");
        }
        if !region.is_valid() {
            bail!(
                "region '{}' bounds [{}, {}, {}, {}] are not a valid lon/lat box",
                r.name,
                r.min_lon,
                r.min_lat,
                r.max_lon,
                r.max_lat
            );
        }
        Ok(region)
    }
}

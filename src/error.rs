//! Error types for the extraction pipeline.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by the extraction stages.
///
/// An empty result set is not an error; it is reported by the pipeline and
/// still produces a header-only export.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Malformed coordinates, radius, or region. Raised before any cache or
    /// network access.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Remote fetch failure, unreadable partition, or malformed rows
    #[error("data source '{source_ref}' failed: {reason}")]
    DataSource { source_ref: String, reason: String },

    #[error("failed writing regional cache at {}: {reason}", path.display())]
    CacheWrite { path: PathBuf, reason: String },

    #[error("failed reading regional cache: {reason}")]
    CacheRead { reason: String },

    #[error("failed writing export {}: {reason}", path.display())]
    Export { path: PathBuf, reason: String },
}

impl ExtractError {
    pub fn data_source(source_ref: &str, reason: impl fmt::Display) -> Self {
        Self::DataSource {
            source_ref: source_ref.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn cache_write(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::CacheWrite {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn cache_read(reason: impl fmt::Display) -> Self {
        Self::CacheRead {
            reason: reason.to_string(),
        }
    }

    pub fn export(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::Export {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = ExtractError> = std::result::Result<T, E>;

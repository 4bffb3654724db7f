// src/error.rs
//! Error taxonomy for the collection / cache pipeline.
//!
//! Data-quality gaps (a record without a price, a zero area) are not errors:
//! those records are dropped during cleaning and never reach this type.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RealEstateError {
    /// Missing credential or unusable configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Network / timeout / non-2xx from the fetch collaborator.
    #[error("upstream fetch failed on page {page}: {cause}")]
    Fetch { page: u32, cause: String },

    /// The upstream answered, but with a non-success result code.
    #[error("upstream returned error {code}: {message}")]
    Upstream { code: String, message: String },

    #[error("malformed XML on page {page}: {message}")]
    Parse { page: u32, message: String },

    #[error("cache I/O error at {}: {source}", path.display())]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A background task panicked or was cancelled.
    #[error("internal error: {0}")]
    Internal(String),

    #[error("cache serialization error at {}: {source}", path.display())]
    CacheFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, RealEstateError>;

impl RealEstateError {
    pub(crate) fn cache_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CacheIo {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn cache_format(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::CacheFormat {
            path: path.into(),
            source,
        }
    }

    /// Short machine-friendly kind, used in tool error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "configuration",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Fetch { .. } => "upstream_fetch",
            Self::Upstream { .. } => "upstream_result",
            Self::Parse { .. } => "parse",
            Self::CacheIo { .. } | Self::CacheFormat { .. } => "cache_io",
            Self::Internal(_) => "internal",
        }
    }
}

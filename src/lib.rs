// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod cache;
pub mod config;
pub mod dataset;
pub mod ecos;
pub mod error;
pub mod metrics;
pub mod region;
pub mod service;

// Pipeline stages: record normalization, upstream collection, statistics
pub mod analyze;
pub mod ingest;
pub mod record;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::dataset::{AssetType, Dataset, TradeType};
pub use crate::error::{RealEstateError, Result};
pub use crate::service::RealEstateService;

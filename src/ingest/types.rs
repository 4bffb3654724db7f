// src/ingest/types.rs
use anyhow::Result;

use crate::record::RawRecord;

/// One page request against a transaction endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Path below the upstream base, e.g. `RTMSDataSvcAptTrade/getRTMSDataSvcAptTrade`.
    pub endpoint: String,
    pub region_code: String, // 5 digits
    pub year_month: String,  // YYYYMM
    pub page_no: u32,        // 1-based
    pub page_size: u32,
}

/// Fetch collaborator: returns the full page text or fails.
/// Transport strategy and retries are the implementor's business.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, req: &PageRequest) -> Result<String>;
    fn name(&self) -> &'static str;
}

/// A parsed upstream page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Reported `totalCount`; `None` when absent or unparseable.
    pub total_count: Option<u64>,
    pub items: Vec<RawRecord>,
}

/// Every item collected for one key, in page order then within-page order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collected {
    pub items: Vec<RawRecord>,
    /// Latest reported total (0 when never reported).
    pub total_count: u64,
    pub pages_fetched: u32,
}

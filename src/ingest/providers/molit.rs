// src/ingest/providers/molit.rs
//! Page fetchers for the public-data real-estate transaction APIs
//! (`apis.data.go.kr/1613000/RTMSDataSvc*`).

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use metrics::counter;
use parking_lot::Mutex;

use crate::ingest::types::{PageFetcher, PageRequest};

const USER_AGENT: &str = "kr-realestate-analyzer/0.1";

/// Plain reqwest fetcher against one base URL.
pub struct HttpFetcher {
    base_url: String,
    /// Already URL-encoded service key, sent verbatim.
    service_key: String,
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(base_url: &str, service_key: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(5).min(timeout))
            .timeout(timeout)
            .build()
            .context("building reqwest client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            client,
        })
    }

    /// The key is pre-encoded, so it goes into the URL text directly instead
    /// of through `.query()`, which would encode it a second time.
    fn page_url(&self, req: &PageRequest) -> String {
        format!("{}/{}?serviceKey={}", self.base_url, req.endpoint, self.service_key)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_page(&self, req: &PageRequest) -> Result<String> {
        let page_no = req.page_no.to_string();
        let rows = req.page_size.to_string();
        let resp = self
            .client
            .get(self.page_url(req))
            .query(&[
                ("LAWD_CD", req.region_code.as_str()),
                ("DEAL_YMD", req.year_month.as_str()),
                ("numOfRows", rows.as_str()),
                ("pageNo", page_no.as_str()),
            ])
            .send()
            .await
            .with_context(|| format!("GET {} page {}", req.endpoint, req.page_no))?
            .error_for_status()
            .with_context(|| format!("{} page {} non-2xx", req.endpoint, req.page_no))?;
        let body = resp.text().await.context("reading response body")?;
        if body.trim().is_empty() {
            bail!("empty response body for {} page {}", req.endpoint, req.page_no);
        }
        Ok(body)
    }

    fn name(&self) -> &'static str {
        "molit-http"
    }
}

/// Tries each fetcher in order and returns the first success.
/// Used for the HTTPS then HTTP transport chain.
pub struct FallbackFetcher {
    chain: Vec<Box<dyn PageFetcher>>,
}

impl FallbackFetcher {
    pub fn new(chain: Vec<Box<dyn PageFetcher>>) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl PageFetcher for FallbackFetcher {
    async fn fetch_page(&self, req: &PageRequest) -> Result<String> {
        let mut last_err = None;
        for (i, f) in self.chain.iter().enumerate() {
            match f.fetch_page(req).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    let cause = format!("{e:#}");
                    tracing::warn!(target: "ingest", error = %cause, transport = i, page = req.page_no, "transport failed, trying next");
                    counter!("ingest_transport_failures_total").increment(1);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow!("no transport configured")))
    }

    fn name(&self) -> &'static str {
        "molit-fallback"
    }
}

/// In-memory pages served by page number (1-based). A page number past the
/// end is a fetch failure. Every request is recorded for inspection.
pub struct FixtureFetcher {
    pages: Vec<String>,
    seen: Mutex<Vec<PageRequest>>,
}

impl FixtureFetcher {
    pub fn new(pages: Vec<String>) -> Self {
        Self {
            pages,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl PageFetcher for FixtureFetcher {
    async fn fetch_page(&self, req: &PageRequest) -> Result<String> {
        self.seen.lock().push(req.clone());
        let idx = req.page_no.checked_sub(1).map(|i| i as usize);
        idx.and_then(|i| self.pages.get(i))
            .cloned()
            .ok_or_else(|| anyhow!("fixture has no page {}", req.page_no))
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

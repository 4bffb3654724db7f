// src/service.rs
//! Tool-facing operations.
//!
//! Every public operation returns a JSON value and never an `Err`: failures
//! become `{ "error": ..., "errorKind": ..., <context> }` so the calling agent
//! always gets something it can read. The `try_*` functions hold the logic
//! and use the crate error type.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Datelike;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::OnceCell;

use crate::analyze::{analyze, is_no_data};
use crate::cache::{source_matches, write_atomic, CacheKey, CacheManager};
use crate::config::RealEstateConfig;
use crate::dataset::Dataset;
use crate::ecos::{EcosClient, EcosQuery, JsonFetcher, ReqwestJson};
use crate::error::{RealEstateError, Result};
use crate::ingest::collect_all;
use crate::ingest::providers::molit::{FallbackFetcher, HttpFetcher};
use crate::ingest::types::PageFetcher;
use crate::region::{fetch_odcloud, RegionTable, ODCLOUD_PER_PAGE};

/// First five digits of a legal district code. Longer codes (10-digit
/// legal-dong codes) are truncated; anything non-numeric is rejected.
pub fn normalize_region_code(raw: &str) -> Result<String> {
    let s = raw.trim();
    if s.len() < 5 || !s.chars().all(|c| c.is_ascii_digit()) {
        return Err(RealEstateError::InvalidArgument(format!(
            "region code must be at least 5 digits, got {raw:?}"
        )));
    }
    Ok(s[..5].to_string())
}

/// `YYYYMM` with a month between 01 and 12.
pub fn validate_year_month(raw: &str) -> Result<String> {
    let s = raw.trim();
    let month = (s.len() == 6 && s.chars().all(|c| c.is_ascii_digit()))
        .then(|| s[4..].parse::<u32>().ok())
        .flatten();
    match month {
        Some(1..=12) => Ok(s.to_string()),
        _ => Err(RealEstateError::InvalidArgument(format!(
            "year-month must be YYYYMM, got {raw:?}"
        ))),
    }
}

pub struct RealEstateService {
    config: RealEstateConfig,
    cache: CacheManager,
    fetcher: Option<Arc<dyn PageFetcher>>,
    /// Resolved on first lookup; see [`RealEstateService::regions`].
    regions: OnceCell<RegionTable>,
    region_http: Option<Box<dyn JsonFetcher>>,
    seed: RegionTable,
    ecos: Option<EcosClient>,
}

impl RealEstateService {
    /// Builds the HTTP transports when the keys are configured. A missing
    /// key is not an error here; it surfaces when a fetch is attempted.
    pub fn new(config: RealEstateConfig) -> anyhow::Result<Self> {
        let fetcher: Option<Arc<dyn PageFetcher>> = match config.api_key.as_deref() {
            Some(key) => {
                let mut chain: Vec<Box<dyn PageFetcher>> = vec![Box::new(HttpFetcher::new(
                    &config.base_url,
                    key,
                    config.http_timeout(),
                )?)];
                if let Some(fb) = config.fallback_base_url.as_deref() {
                    chain.push(Box::new(HttpFetcher::new(fb, key, config.http_timeout())?));
                }
                Some(Arc::new(FallbackFetcher::new(chain)))
            }
            None => None,
        };
        let ecos_http: Box<dyn JsonFetcher> = Box::new(ReqwestJson::new(config.http_timeout())?);
        let region_http: Box<dyn JsonFetcher> = Box::new(ReqwestJson::new(config.http_timeout())?);
        let cache = CacheManager::new(&config.cache_dir);
        let ecos = ecos_client(&config, &cache, ecos_http);
        Ok(Self {
            config,
            cache,
            fetcher,
            regions: OnceCell::new(),
            region_http: Some(region_http),
            seed: RegionTable::default_seed(),
            ecos,
        })
    }

    /// Offline construction: caller-supplied page fetcher, no ECOS or
    /// region-code transport.
    pub fn with_fetcher(config: RealEstateConfig, fetcher: Arc<dyn PageFetcher>) -> Self {
        let cache = CacheManager::new(&config.cache_dir);
        Self {
            config,
            cache,
            fetcher: Some(fetcher),
            regions: OnceCell::new(),
            region_http: None,
            seed: RegionTable::default_seed(),
            ecos: None,
        }
    }

    /// Replace the odcloud region-code transport.
    pub fn with_region_transport(mut self, http: Box<dyn JsonFetcher>) -> Self {
        self.region_http = Some(http);
        self
    }

    /// Replace the ECOS transport (tests serve canned JSON through this).
    pub fn with_ecos_transport(mut self, http: Box<dyn JsonFetcher>) -> Self {
        self.ecos = ecos_client(&self.config, &self.cache, http);
        self
    }

    pub fn config(&self) -> &RealEstateConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    pub async fn get_transaction_data(&self, dataset: Dataset, region_code: &str, year_month: &str) -> Value {
        match self.try_get_transaction_data(dataset, region_code, year_month).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(target: "api", %dataset, region_code, year_month, error = %e, "get transaction data failed");
                error_json(&e, |m| {
                    m.insert("regionCode".into(), json!(region_code));
                    m.insert("yearMonth".into(), json!(year_month));
                    dataset_context(m, dataset);
                })
            }
        }
    }

    pub async fn try_get_transaction_data(
        &self,
        dataset: Dataset,
        region_code: &str,
        year_month: &str,
    ) -> Result<Value> {
        let region = normalize_region_code(region_code)?;
        let ym = validate_year_month(year_month)?;
        let key = CacheKey::new(dataset, region.clone(), ym.clone());
        let path = self.cache.raw_path(&key);

        let describe = |record_count: usize, extra: &[(&str, Value)]| {
            let mut m = Map::new();
            m.insert("filePath".into(), json!(path.display().to_string()));
            m.insert("recordCount".into(), json!(record_count));
            for (k, v) in extra {
                m.insert((*k).to_string(), v.clone());
            }
            m.insert("regionCode".into(), json!(region));
            m.insert("yearMonth".into(), json!(ym));
            dataset_context(&mut m, dataset);
            Value::Object(m)
        };

        if self.config.reuse_raw_cache && path.exists() {
            let set = CacheManager::read_raw(&path)?;
            tracing::info!(target: "cache", path = %path.display(), "raw cache reused");
            return Ok(describe(set.len(), &[("fromCache", json!(true))]));
        }

        let fetcher = self.fetcher.as_ref().ok_or_else(|| {
            RealEstateError::Config(format!(
                "environment variable {} is not set",
                crate::config::realestate::ENV_API_KEY
            ))
        })?;
        let collected = collect_all(fetcher.as_ref(), dataset, &region, &ym, self.config.page_size).await?;

        if collected.items.is_empty() {
            let mut m = Map::new();
            m.insert("status".into(), json!("no_data"));
            m.insert(
                "error".into(),
                json!(format!("No {} transactions found for region {region} in {ym}.", dataset.label())),
            );
            m.insert("regionCode".into(), json!(region));
            m.insert("yearMonth".into(), json!(ym));
            dataset_context(&mut m, dataset);
            return Ok(Value::Object(m));
        }

        let set = crate::record::RecordSet::new(collected.items);
        self.cache.write_raw(&key, &set)?;
        Ok(describe(
            set.len(),
            &[
                ("totalCount", json!(collected.total_count)),
                ("pagesFetched", json!(collected.pages_fetched)),
                ("fromCache", json!(false)),
            ],
        ))
    }

    pub async fn analyze_transaction_data(&self, dataset: Dataset, file_path: &str) -> Value {
        match self.try_analyze_transaction_data(dataset, file_path).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(target: "api", %dataset, file_path, error = %e, "analysis failed");
                error_json(&e, |m| {
                    m.insert("filePath".into(), json!(file_path));
                    dataset_context(m, dataset);
                })
            }
        }
    }

    /// Reading the raw file and computing the report run on the blocking pool.
    pub async fn try_analyze_transaction_data(&self, dataset: Dataset, file_path: &str) -> Result<Value> {
        let cache = self.cache.clone();
        let source = PathBuf::from(file_path);
        tokio::task::spawn_blocking(move || analyze_file(&cache, dataset, &source))
            .await
            .map_err(|e| RealEstateError::Internal(format!("analysis task failed: {e}")))?
    }

    // ------------------------------------------------------------------
    // Region codes
    // ------------------------------------------------------------------

    pub async fn search_region_codes(&self, query: &str) -> Value {
        let hits: Vec<Value> = self
            .regions()
            .await
            .lookup_region_codes(query)
            .into_iter()
            .map(|e| {
                json!({
                    "lawdCd": e.lawd_cd(),
                    "code": e.code,
                    "province": e.province,
                    "cityDistrict": e.city_district,
                    "neighborhood": e.neighborhood,
                    "name": e.full_name(),
                })
            })
            .collect();
        json!({ "query": query, "count": hits.len(), "results": hits })
    }

    /// The region table, resolved once: the configured file, then the
    /// cached download, then the odcloud API (needs the public-data key).
    /// Until one of those succeeds each lookup retries and falls back to the
    /// Seoul seed.
    pub async fn regions(&self) -> &RegionTable {
        match self.regions.get_or_try_init(|| self.load_regions()).await {
            Ok(table) => table,
            Err(e) => {
                tracing::warn!(target: "region", error = %format!("{e:#}"), "region codes unavailable, using built-in seed");
                &self.seed
            }
        }
    }

    async fn load_regions(&self) -> anyhow::Result<RegionTable> {
        let configured = &self.config.region_codes_path;
        if configured.exists() {
            return RegionTable::read_file(configured);
        }
        let cached = self.cache.region_codes_path();
        if cached.exists() {
            match RegionTable::read_file(&cached) {
                Ok(table) => return Ok(table),
                Err(e) => {
                    tracing::warn!(target: "region", path = %cached.display(), error = %format!("{e:#}"), "ignoring unreadable region cache")
                }
            }
        }
        let (Some(http), Some(key)) = (self.region_http.as_deref(), self.config.api_key.as_deref()) else {
            anyhow::bail!("no region code file and no API key to download one");
        };
        let entries = fetch_odcloud(http, &self.config.region_api_url, key, ODCLOUD_PER_PAGE).await?;
        if entries.is_empty() {
            anyhow::bail!("region code API returned no entries");
        }
        let body = serde_json::to_vec_pretty(&entries)?;
        write_atomic(&cached, &body)?;
        tracing::info!(target: "region", path = %cached.display(), entries = entries.len(), "region codes cached");
        Ok(RegionTable::new(entries))
    }

    // ------------------------------------------------------------------
    // ECOS
    // ------------------------------------------------------------------

    pub async fn ecos(&self, query: EcosQuery) -> Value {
        match self.try_ecos(&query).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(target: "api", api = query.api, error = %e, "ecos call failed");
                error_json(&e, |m| {
                    m.insert("api".into(), json!(query.api));
                })
            }
        }
    }

    async fn try_ecos(&self, query: &EcosQuery) -> Result<Value> {
        let client = match &self.ecos {
            Some(c) => c,
            None => {
                self.config.require_ecos_api_key()?;
                return Err(RealEstateError::Config("ECOS transport is not configured".into()));
            }
        };
        let res = client.fetch(query).await.map_err(|e| RealEstateError::Upstream {
            code: "ECOS".into(),
            message: format!("{e:#}"),
        })?;
        Ok(json!({
            "api": query.api,
            "filePath": res.path.display().to_string(),
            "fromCache": res.from_cache,
            "data": res.data,
        }))
    }

    // ------------------------------------------------------------------
    // Tool dispatch
    // ------------------------------------------------------------------

    /// Run the named tool. `None` when no tool has that name.
    pub async fn call_tool(&self, name: &str, args: Value) -> Option<Value> {
        if let Some(d) = Dataset::ALL.iter().copied().find(|d| d.fetch_tool_name() == name) {
            return Some(match parse_args::<FetchArgs>(args) {
                Ok(a) => self.get_transaction_data(d, &a.region_code, &a.year_month).await,
                Err(e) => error_json(&e, |m| dataset_context(m, d)),
            });
        }
        if let Some(d) = Dataset::ALL.iter().copied().find(|d| d.analyze_tool_name() == name) {
            return Some(match parse_args::<AnalyzeArgs>(args) {
                Ok(a) => self.analyze_transaction_data(d, &a.file_path).await,
                Err(e) => error_json(&e, |m| dataset_context(m, d)),
            });
        }
        let out = match name {
            "search_region_codes" => match parse_args::<SearchArgs>(args) {
                Ok(a) => self.search_region_codes(&a.query).await,
                Err(e) => error_json(&e, |_| {}),
            },
            "get_ecos_key_statistics" => match parse_args::<EcosPageArgs>(args) {
                Ok(a) => self.ecos(EcosQuery::key_statistics(a.start, a.end)).await,
                Err(e) => error_json(&e, |_| {}),
            },
            "get_ecos_statistic_search" => match parse_args::<EcosSearchArgs>(args) {
                Ok(a) => {
                    let q = EcosQuery::statistic_search(
                        &a.stat_code,
                        &a.cycle,
                        &a.start_time,
                        &a.end_time,
                        &a.item_codes,
                        a.start,
                        a.end,
                    );
                    self.ecos(q).await
                }
                Err(e) => error_json(&e, |_| {}),
            },
            _ => return None,
        };
        Some(out)
    }
}

/// Summary for one raw file, served from or written to the summary cache.
fn analyze_file(cache: &CacheManager, dataset: Dataset, source: &Path) -> Result<Value> {
    if !source.is_file() {
        return Err(RealEstateError::InvalidArgument(format!(
            "file not found: {}",
            source.display()
        )));
    }
    if !source_matches(source, dataset) {
        return Err(RealEstateError::InvalidArgument(format!(
            "{} is not a {} file (expected a {}_* raw file)",
            source.display(),
            dataset.label(),
            dataset.cache_prefix()
        )));
    }
    let artifact_path = cache.summary_path(source, dataset);
    let current_year = chrono::Local::now().year();
    let artifact = cache.get_or_compute(source, &artifact_path, || {
        let set = CacheManager::read_raw(source)?;
        Ok(analyze(&set, dataset, current_year))
    })?;

    let mut value = artifact.value;
    if artifact.recomputed && !is_no_data(&value) {
        if let Value::Object(m) = &mut value {
            m.insert(
                "summaryCachedPath".into(),
                json!(artifact.path.display().to_string()),
            );
        }
    }
    Ok(value)
}

fn ecos_client(config: &RealEstateConfig, cache: &CacheManager, http: Box<dyn JsonFetcher>) -> Option<EcosClient> {
    config
        .ecos_api_key
        .as_deref()
        .map(|key| EcosClient::new(&config.ecos_base_url, key, cache.ecos_dir(), http))
}

fn dataset_context(m: &mut Map<String, Value>, dataset: Dataset) {
    m.insert("assetType".into(), json!(dataset.asset));
    m.insert("tradeType".into(), json!(dataset.trade));
}

fn error_json(e: &RealEstateError, context: impl FnOnce(&mut Map<String, Value>)) -> Value {
    let mut m = Map::new();
    m.insert("error".into(), json!(e.to_string()));
    m.insert("errorKind".into(), json!(e.kind()));
    context(&mut m);
    Value::Object(m)
}

fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| RealEstateError::InvalidArgument(e.to_string()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FetchArgs {
    #[serde(alias = "lawd_cd", alias = "region_code")]
    region_code: String,
    #[serde(alias = "deal_ymd", alias = "year_month")]
    year_month: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeArgs {
    #[serde(alias = "file_path")]
    file_path: String,
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
}

fn default_start() -> u32 {
    1
}
fn default_end() -> u32 {
    100
}

#[derive(Deserialize)]
struct EcosPageArgs {
    #[serde(default = "default_start")]
    start: u32,
    #[serde(default = "default_end")]
    end: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EcosSearchArgs {
    #[serde(alias = "stat_code")]
    stat_code: String,
    cycle: String,
    #[serde(alias = "start_time")]
    start_time: String,
    #[serde(alias = "end_time")]
    end_time: String,
    #[serde(default, alias = "item_codes")]
    item_codes: Vec<String>,
    #[serde(default = "default_start")]
    start: u32,
    #[serde(default = "default_end")]
    end: u32,
}

/// Name, description and argument names of one tool.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub arguments: Vec<&'static str>,
}

pub fn tool_descriptors() -> Vec<ToolDescriptor> {
    let mut out = Vec::new();
    for d in Dataset::ALL {
        out.push(ToolDescriptor {
            name: d.fetch_tool_name(),
            description: format!(
                "Fetch all {} for a 5-digit legal district code and a YYYYMM month; returns the path of the cached raw records. Look the code up with search_region_codes first.",
                d.label()
            ),
            arguments: vec!["regionCode", "yearMonth"],
        });
        out.push(ToolDescriptor {
            name: d.analyze_tool_name(),
            description: format!(
                "Summarize a raw {} file produced by {}: overall, price level, price per pyeong and grouped statistics.",
                d.label(),
                d.fetch_tool_name()
            ),
            arguments: vec!["filePath"],
        });
    }
    out.push(ToolDescriptor {
        name: "search_region_codes".into(),
        description: "Find legal district codes (LAWD_CD) by place name or code prefix.".into(),
        arguments: vec!["query"],
    });
    out.push(ToolDescriptor {
        name: "get_ecos_key_statistics".into(),
        description: "Bank of Korea ECOS key statistics (the 100 headline indicators).".into(),
        arguments: vec!["start", "end"],
    });
    out.push(ToolDescriptor {
        name: "get_ecos_statistic_search".into(),
        description: "Bank of Korea ECOS series lookup by stat code, cycle (A/Q/M/D) and period, with up to four item codes.".into(),
        arguments: vec!["statCode", "cycle", "startTime", "endTime", "itemCodes", "start", "end"],
    });
    out
}

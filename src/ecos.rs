// src/ecos.rs
//! Bank of Korea ECOS open-API client with a parameter-keyed file cache.
//!
//! URLs are path-segment based:
//! `{base}/{Api}/{key}/json/kr/{start}/{end}/{extra...}`.
//! A response carrying `RESULT.CODE` other than `INFO-000` / `INFO-200`
//! (the latter means "no rows") is an error. Cached files are returned as-is
//! without refetching; ECOS series for closed periods do not change.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::cache::write_atomic;

/// Transport seam so tests can serve canned JSON.
#[async_trait]
pub trait JsonFetcher: Send + Sync {
    async fn get_json(&self, url: &str) -> Result<Value>;
}

pub struct ReqwestJson {
    client: reqwest::Client,
}

impl ReqwestJson {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("kr-realestate-analyzer/0.1")
            .timeout(timeout)
            .build()
            .context("building reqwest client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl JsonFetcher for ReqwestJson {
    async fn get_json(&self, url: &str) -> Result<Value> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .context("ecos GET")?
            .error_for_status()
            .context("ecos non-2xx")?;
        resp.json().await.context("ecos response is not JSON")
    }
}

/// One ECOS call: API name, ordered path segments after `start/end`, and
/// the parameters that identify it in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcosQuery {
    pub api: &'static str,
    pub start: u32,
    pub end: u32,
    segments: Vec<String>,
    params: BTreeMap<&'static str, String>,
}

impl EcosQuery {
    /// The 100 key statistics.
    pub fn key_statistics(start: u32, end: u32) -> Self {
        let mut params = BTreeMap::new();
        params.insert("start", start.to_string());
        params.insert("end", end.to_string());
        Self {
            api: "KeyStatisticList",
            start,
            end,
            segments: Vec::new(),
            params,
        }
    }

    /// A series lookup. Up to four item codes; blanks are skipped.
    pub fn statistic_search(
        stat_code: &str,
        cycle: &str,
        start_time: &str,
        end_time: &str,
        item_codes: &[String],
        start: u32,
        end: u32,
    ) -> Self {
        let mut params = BTreeMap::new();
        params.insert("start", start.to_string());
        params.insert("end", end.to_string());
        params.insert("stat_code", stat_code.to_string());
        params.insert("cycle", cycle.to_string());
        params.insert("start_time", start_time.to_string());
        params.insert("end_time", end_time.to_string());
        let mut segments = vec![
            stat_code.to_string(),
            cycle.to_string(),
            start_time.to_string(),
            end_time.to_string(),
        ];
        const ITEM_KEYS: [&str; 4] = ["item_code1", "item_code2", "item_code3", "item_code4"];
        for (&k, code) in ITEM_KEYS
            .iter()
            .zip(item_codes.iter().filter(|c| !c.trim().is_empty()))
        {
            params.insert(k, code.trim().to_string());
            segments.push(code.trim().to_string());
        }
        Self {
            api: "StatisticSearch",
            start,
            end,
            segments,
            params,
        }
    }

    pub fn url(&self, base: &str, key: &str) -> String {
        let mut url = format!(
            "{}/{}/{key}/json/kr/{}/{}",
            base.trim_end_matches('/'),
            self.api,
            self.start,
            self.end
        );
        for s in &self.segments {
            url.push('/');
            url.push_str(s);
        }
        url
    }

    /// `<Api>_<k>-<v>_...json`, params sorted by key.
    pub fn cache_file_name(&self) -> String {
        let mut name = self.api.to_string();
        for (k, v) in &self.params {
            name.push('_');
            name.push_str(k);
            name.push('-');
            name.extend(v.chars().map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' }));
        }
        name.push_str(".json");
        name
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EcosResult {
    pub path: PathBuf,
    pub data: Value,
    pub from_cache: bool,
}

pub struct EcosClient {
    base_url: String,
    api_key: String,
    cache_dir: PathBuf,
    http: Box<dyn JsonFetcher>,
}

impl EcosClient {
    pub fn new(base_url: &str, api_key: &str, cache_dir: PathBuf, http: Box<dyn JsonFetcher>) -> Self {
        Self {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            cache_dir,
            http,
        }
    }

    pub async fn fetch(&self, query: &EcosQuery) -> Result<EcosResult> {
        let path = self.cache_dir.join(query.cache_file_name());
        if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let data = serde_json::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            tracing::debug!(target: "cache", path = %path.display(), "ecos cache hit");
            return Ok(EcosResult { path, data, from_cache: true });
        }

        let data = self
            .http
            .get_json(&query.url(&self.base_url, &self.api_key))
            .await
            .with_context(|| format!("ECOS {} request", query.api))?;
        check_result(&data)?;

        let body = serde_json::to_string_pretty(&data)?;
        write_atomic(&path, body.as_bytes())?;
        tracing::info!(target: "ecos", api = query.api, path = %path.display(), "ecos response cached");
        Ok(EcosResult { path, data, from_cache: false })
    }
}

/// Top-level or nested `RESULT` with a failure code.
fn check_result(data: &Value) -> Result<()> {
    let result = data
        .get("RESULT")
        .or_else(|| data.as_object().and_then(|o| o.values().find_map(|v| v.get("RESULT"))));
    if let Some(r) = result {
        let code = r.get("CODE").and_then(Value::as_str).unwrap_or_default();
        if !matches!(code, "INFO-000" | "INFO-200") {
            let msg = r.get("MESSAGE").and_then(Value::as_str).unwrap_or_default();
            bail!("ECOS error {code}: {msg}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    struct Canned {
        body: Value,
        urls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl JsonFetcher for Canned {
        async fn get_json(&self, url: &str) -> Result<Value> {
            self.urls.lock().push(url.to_string());
            Ok(self.body.clone())
        }
    }

    #[test]
    fn search_url_and_cache_name() {
        let q = EcosQuery::statistic_search("722Y001", "M", "202401", "202406", &["0101000".into(), " ".into()], 1, 100);
        assert_eq!(
            q.url("https://ecos.bok.or.kr/api/", "KEY"),
            "https://ecos.bok.or.kr/api/StatisticSearch/KEY/json/kr/1/100/722Y001/M/202401/202406/0101000"
        );
        assert_eq!(
            q.cache_file_name(),
            "StatisticSearch_cycle-M_end-100_end_time-202406_item_code1-0101000_start-1_start_time-202401_stat_code-722Y001.json"
        );
    }

    #[tokio::test]
    async fn second_fetch_comes_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let urls = Arc::new(Mutex::new(Vec::new()));
        let http = Canned {
            body: json!({"KeyStatisticList": {"list_total_count": 1, "row": [{"KEYSTAT_NAME": "한국은행 기준금리"}]}}),
            urls: urls.clone(),
        };
        let client = EcosClient::new("https://ecos", "KEY", dir.path().join("ecos"), Box::new(http));
        let q = EcosQuery::key_statistics(1, 100);

        let first = client.fetch(&q).await.unwrap();
        assert!(!first.from_cache);
        let second = client.fetch(&q).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.data, first.data);
        assert_eq!(urls.lock().len(), 1);
    }

    #[tokio::test]
    async fn error_result_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let http = Canned {
            body: json!({"RESULT": {"CODE": "INFO-100", "MESSAGE": "인증키가 유효하지 않습니다."}}),
            urls: Arc::new(Mutex::new(Vec::new())),
        };
        let client = EcosClient::new("https://ecos", "bad", dir.path().to_path_buf(), Box::new(http));
        let q = EcosQuery::key_statistics(1, 10);
        let err = client.fetch(&q).await.unwrap_err();
        assert!(format!("{err:#}").contains("INFO-100"));
        assert!(!dir.path().join(q.cache_file_name()).exists());
    }

    #[test]
    fn no_rows_is_not_an_error() {
        assert!(check_result(&json!({"RESULT": {"CODE": "INFO-200"}})).is_ok());
        assert!(check_result(&json!({"StatisticSearch": {"RESULT": {"CODE": "ERROR-101"}}})).is_err());
    }
}

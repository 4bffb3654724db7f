//! # Region Codes
//!
//! Legal-district code table used to turn a place name ("강남구", "역삼동")
//! into the 5-digit `LAWD_CD` every transaction query needs.
//!
//! - Sources, in order: a configured JSON file, the JSON cached under the
//!   cache dir, the nationwide list from the odcloud API (paginated, then
//!   cached), and finally a built-in Seoul seed.
//! - Korean column names from the public code list (`법정동코드`, `시도명`,
//!   `시군구명`, `읍면동명`) are accepted; codes may be strings or numbers.
//! - Lookup is a whitespace-insensitive substring match over the full name,
//!   or a prefix match when the query is all digits.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::{fs, path::Path};

use crate::ecos::JsonFetcher;

/// Rows requested per odcloud page.
pub const ODCLOUD_PER_PAGE: u32 = 1000;
/// Upper bound on pages; the nationwide list is roughly 50k rows.
pub const ODCLOUD_MAX_PAGES: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionEntry {
    /// 5- or 10-digit legal district code.
    #[serde(alias = "법정동코드", deserialize_with = "code_text")]
    pub code: String,
    #[serde(alias = "시도명")]
    pub province: String,
    #[serde(default, alias = "시군구명")]
    pub city_district: Option<String>,
    #[serde(default, alias = "읍면동명")]
    pub neighborhood: Option<String>,
}

impl RegionEntry {
    /// The 5-digit code the transaction APIs take.
    pub fn lawd_cd(&self) -> &str {
        self.code.get(..5).unwrap_or(&self.code)
    }

    pub fn full_name(&self) -> String {
        [
            Some(self.province.as_str()),
            self.city_district.as_deref(),
            self.neighborhood.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// The code list publishes `법정동코드` as a JSON number.
fn code_text<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("unexpected region code {other}"))),
    }
}

/// One row of the odcloud legal-district dataset.
#[derive(Debug, Deserialize)]
struct OdcloudRow {
    #[serde(rename = "법정동코드", deserialize_with = "code_text")]
    code: String,
    #[serde(rename = "시도명", default)]
    province: Option<String>,
    #[serde(rename = "시군구명", default)]
    city_district: Option<String>,
    #[serde(rename = "읍면동명", default)]
    neighborhood: Option<String>,
    #[serde(rename = "리명", default)]
    village: Option<String>,
    #[serde(rename = "삭제일자", default)]
    deleted_on: Option<Value>,
}

impl OdcloudRow {
    /// Abolished codes (a deletion date is set) are skipped.
    fn into_entry(self) -> Option<RegionEntry> {
        let deleted = match &self.deleted_on {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        };
        let province = self.province.filter(|p| !p.trim().is_empty())?;
        if deleted || self.code.is_empty() {
            return None;
        }
        let neighborhood = match (nonblank(self.neighborhood), nonblank(self.village)) {
            (Some(n), Some(v)) => Some(format!("{n} {v}")),
            (n, v) => n.or(v),
        };
        Some(RegionEntry {
            code: self.code,
            province,
            city_district: nonblank(self.city_district),
            neighborhood,
        })
    }
}

fn nonblank(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

/// Page through the odcloud legal-district list. Stops at the first short or
/// empty page, or after [`ODCLOUD_MAX_PAGES`]. The service key is sent
/// verbatim (already URL-encoded).
pub async fn fetch_odcloud(
    http: &dyn JsonFetcher,
    base_url: &str,
    service_key: &str,
    per_page: u32,
) -> Result<Vec<RegionEntry>> {
    let mut entries = Vec::new();
    for page in 1..=ODCLOUD_MAX_PAGES {
        let url = format!(
            "{base_url}?serviceKey={service_key}&page={page}&perPage={per_page}&returnType=JSON"
        );
        let body = http
            .get_json(&url)
            .await
            .with_context(|| format!("region code page {page}"))?;
        let rows: Vec<OdcloudRow> = match body.get("data") {
            Some(data) => serde_json::from_value(data.clone())
                .with_context(|| format!("region code page {page} rows"))?,
            None => break,
        };
        let n = rows.len();
        entries.extend(rows.into_iter().filter_map(OdcloudRow::into_entry));
        if n < per_page as usize {
            break;
        }
    }
    tracing::info!(target: "region", entries = entries.len(), "region codes fetched");
    Ok(entries)
}

#[derive(Debug, Clone, Default)]
pub struct RegionTable {
    entries: Vec<RegionEntry>,
}

impl RegionTable {
    pub fn new(entries: Vec<RegionEntry>) -> Self {
        Self { entries }
    }

    /// Read a JSON array of entries. An empty array is an error so a broken
    /// download never shadows the next source.
    pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading region codes from {}", path.display()))?;
        let entries: Vec<RegionEntry> = serde_json::from_str(&text)
            .with_context(|| format!("parsing region codes in {}", path.display()))?;
        if entries.is_empty() {
            bail!("{} holds no region codes", path.display());
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[RegionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose name contains `query` (spaces ignored), or whose code
    /// starts with it when the query is numeric. Table order is kept.
    pub fn lookup_region_codes(&self, query: &str) -> Vec<&RegionEntry> {
        let q = squash(query);
        if q.is_empty() {
            return Vec::new();
        }
        if q.chars().all(|c| c.is_ascii_digit()) {
            return self.entries.iter().filter(|e| e.code.starts_with(&q)).collect();
        }
        self.entries
            .iter()
            .filter(|e| squash(&e.full_name()).contains(&q))
            .collect()
    }

    /// Built-in seed: Seoul's 25 autonomous districts. Last resort when no
    /// file or API source is available.
    pub fn default_seed() -> Self {
        let entries = [
            ("11110", "종로구"),
            ("11140", "중구"),
            ("11170", "용산구"),
            ("11200", "성동구"),
            ("11215", "광진구"),
            ("11230", "동대문구"),
            ("11260", "중랑구"),
            ("11290", "성북구"),
            ("11305", "강북구"),
            ("11320", "도봉구"),
            ("11350", "노원구"),
            ("11380", "은평구"),
            ("11410", "서대문구"),
            ("11440", "마포구"),
            ("11470", "양천구"),
            ("11500", "강서구"),
            ("11530", "구로구"),
            ("11545", "금천구"),
            ("11560", "영등포구"),
            ("11590", "동작구"),
            ("11620", "관악구"),
            ("11650", "서초구"),
            ("11680", "강남구"),
            ("11710", "송파구"),
            ("11740", "강동구"),
        ]
        .into_iter()
        .map(|(code, gu)| RegionEntry {
            code: code.to_string(),
            province: "서울특별시".to_string(),
            city_district: Some(gu.to_string()),
            neighborhood: None,
        })
        .collect();
        Self { entries }
    }
}

fn squash(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    #[test]
    fn seed_lookup_by_name_and_code() {
        let t = RegionTable::default_seed();
        assert_eq!(t.len(), 25);
        let hits = t.lookup_region_codes("강남");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].lawd_cd(), "11680");

        let hits = t.lookup_region_codes("서울 특별시 강동구");
        assert_eq!(hits[0].code, "11740");

        assert_eq!(t.lookup_region_codes("1168").len(), 1);
        assert!(t.lookup_region_codes("  ").is_empty());
    }

    #[test]
    fn reads_korean_columns_and_numeric_codes() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("codes.json");
        fs::write(
            &p,
            r#"[{"법정동코드":1168010100,"시도명":"서울특별시","시군구명":"강남구","읍면동명":"역삼동"},
                {"code":"2644000000","province":"부산광역시","cityDistrict":"강서구"}]"#,
        )
        .unwrap();
        let t = RegionTable::read_file(&p).unwrap();
        let hits = t.lookup_region_codes("역삼");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].lawd_cd(), "11680");
        assert_eq!(hits[0].full_name(), "서울특별시 강남구 역삼동");
        assert_eq!(t.lookup_region_codes("부산")[0].lawd_cd(), "26440");
    }

    #[test]
    fn bad_or_empty_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("codes.json");
        fs::write(&p, "not json").unwrap();
        assert!(RegionTable::read_file(&p).is_err());
        fs::write(&p, "[]").unwrap();
        assert!(RegionTable::read_file(&p).is_err());
        assert!(RegionTable::read_file(dir.path().join("none.json")).is_err());
    }

    /// Serves odcloud pages keyed by the `page=` query value.
    struct Pages {
        pages: Vec<Value>,
        urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl JsonFetcher for Pages {
        async fn get_json(&self, url: &str) -> Result<Value> {
            self.urls.lock().push(url.to_string());
            let page: usize = url
                .split('&')
                .find_map(|kv| kv.strip_prefix("page="))
                .and_then(|p| p.parse().ok())
                .unwrap_or(1);
            Ok(self.pages.get(page - 1).cloned().unwrap_or_else(|| json!({"data": []})))
        }
    }

    fn row(code: u64, sido: &str, sigungu: Option<&str>, dong: Option<&str>) -> Value {
        json!({"법정동코드": code, "시도명": sido, "시군구명": sigungu, "읍면동명": dong, "리명": null, "삭제일자": null, "순위": 1})
    }

    #[tokio::test]
    async fn odcloud_pages_until_short_page() {
        let http = Pages {
            pages: vec![
                json!({"page": 1, "perPage": 2, "data": [
                    row(2600000000, "부산광역시", None, None),
                    row(2644000000, "부산광역시", Some("강서구"), None),
                ]}),
                json!({"page": 2, "perPage": 2, "data": [
                    {"법정동코드": 2644010100u64, "시도명": "부산광역시", "시군구명": "강서구", "읍면동명": "대저1동", "삭제일자": "2020-01-01"},
                ]}),
            ],
            urls: Mutex::new(Vec::new()),
        };
        let entries = fetch_odcloud(&http, "https://api.odcloud.kr/api/x", "k%2B", 2).await.unwrap();
        assert_eq!(entries.len(), 2, "abolished code skipped");
        let urls = http.urls.lock().clone();
        assert_eq!(urls.len(), 2);
        assert_eq!(
            urls[0],
            "https://api.odcloud.kr/api/x?serviceKey=k%2B&page=1&perPage=2&returnType=JSON"
        );

        let t = RegionTable::new(entries);
        let hits = t.lookup_region_codes("부산광역시 강서구");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].lawd_cd(), "26440");
    }

    #[tokio::test]
    async fn odcloud_without_data_key_stops() {
        let http = Pages {
            pages: vec![json!({"currentCount": 0})],
            urls: Mutex::new(Vec::new()),
        };
        let entries = fetch_odcloud(&http, "u", "k", 2).await.unwrap();
        assert!(entries.is_empty());
        assert_eq!(http.urls.lock().len(), 1);
    }
}

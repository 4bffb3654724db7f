// src/cache.rs
//! On-disk cache: raw record sets (NDJSON) and derived summaries (JSON).
//!
//! Layout under the cache root:
//!   raw_data/<PREFIX>_<region>_<yyyymm>.raw.data.json
//!   <stem>[_<trade>]_summary.json
//!   ecos/<ApiName>_<k-v>....json
//!
//! A summary is fresh iff its mtime is strictly newer than its source's.
//! There is no locking: concurrent recomputes of the same stale artifact each
//! write a private temp file and rename it into place, so the last rename
//! wins and every reader sees a complete document.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde_json::Value;

use crate::dataset::Dataset;
use crate::error::{RealEstateError, Result};
use crate::record::RecordSet;

pub const RAW_DIR: &str = "raw_data";
pub const RAW_SUFFIX: &str = ".raw.data.json";

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("cache_summary_hits_total", "Summaries served from a fresh cache file.");
        describe_counter!(
            "cache_summary_misses_total",
            "Summaries recomputed because the cache was absent or stale."
        );
        describe_counter!("cache_raw_writes_total", "Raw record sets written to disk.");
    });
}

/// Identity of one raw record set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub dataset: Dataset,
    pub region_code: String,
    pub year_month: String,
}

impl CacheKey {
    pub fn new(dataset: Dataset, region_code: impl Into<String>, year_month: impl Into<String>) -> Self {
        Self {
            dataset,
            region_code: region_code.into(),
            year_month: year_month.into(),
        }
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}{RAW_SUFFIX}",
            self.dataset.cache_prefix(),
            self.region_code,
            self.year_month
        )
    }
}

/// `APT_TRADE_11680_202406.raw.data.json` → `APT_TRADE_11680_202406`.
pub fn source_stem(source: &Path) -> String {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.strip_suffix(RAW_SUFFIX) {
        Some(stem) => stem.to_string(),
        None => source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or(name),
    }
}

/// Trade-only asset types have a single summary per source.
pub fn summary_file_name(source: &Path, dataset: Dataset) -> String {
    let stem = source_stem(source);
    if dataset.asset.is_trade_only() {
        format!("{stem}_summary.json")
    } else {
        format!("{stem}_{}_summary.json", dataset.trade)
    }
}

/// True when `source` is a raw file of `dataset` (its stem carries the
/// dataset's cache prefix). Summary names only encode the trade type, so a
/// file must never be analyzed as another asset type.
pub fn source_matches(source: &Path, dataset: Dataset) -> bool {
    source_stem(source).starts_with(&format!("{}_", dataset.cache_prefix()))
}

/// A summary returned by [`CacheManager::get_or_compute`].
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub value: Value,
    pub path: PathBuf,
    /// False when served from a fresh cache file.
    pub recomputed: bool,
}

#[derive(Debug, Clone)]
pub struct CacheManager {
    root: PathBuf,
}

impl CacheManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ensure_metrics_described();
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(RAW_DIR).join(key.file_name())
    }

    pub fn summary_path(&self, source: &Path, dataset: Dataset) -> PathBuf {
        self.root.join(summary_file_name(source, dataset))
    }

    pub fn ecos_dir(&self) -> PathBuf {
        self.root.join("ecos")
    }

    /// Nationwide region codes downloaded from the odcloud API.
    pub fn region_codes_path(&self) -> PathBuf {
        self.root.join("region_codes.json")
    }

    /// Persist a record set verbatim, one JSON object per line.
    pub fn write_raw(&self, key: &CacheKey, set: &RecordSet) -> Result<PathBuf> {
        let path = self.raw_path(key);
        let body = set
            .to_ndjson()
            .map_err(|e| RealEstateError::cache_format(&path, e))?;
        write_atomic(&path, body.as_bytes())?;
        counter!("cache_raw_writes_total").increment(1);
        tracing::info!(target: "cache", path = %path.display(), records = set.len(), "raw cache written");
        Ok(path)
    }

    pub fn read_raw(path: &Path) -> Result<RecordSet> {
        let text = fs::read_to_string(path).map_err(|e| RealEstateError::cache_io(path, e))?;
        RecordSet::from_ndjson(&text).map_err(|e| RealEstateError::cache_format(path, e))
    }

    /// Serve `artifact` if it is newer than `source`; otherwise run `compute`
    /// and overwrite it. The target directory is created on every call.
    pub fn get_or_compute<F>(&self, source: &Path, artifact: &Path, compute: F) -> Result<Artifact>
    where
        F: FnOnce() -> Result<Value>,
    {
        if let Some(dir) = artifact.parent() {
            fs::create_dir_all(dir).map_err(|e| RealEstateError::cache_io(dir, e))?;
        }
        let source_mtime = modified(source)?;

        if let Ok(artifact_mtime) = modified(artifact) {
            if artifact_mtime > source_mtime {
                let text = fs::read_to_string(artifact)
                    .map_err(|e| RealEstateError::cache_io(artifact, e))?;
                match serde_json::from_str(&text) {
                    Ok(value) => {
                        counter!("cache_summary_hits_total").increment(1);
                        tracing::debug!(target: "cache", path = %artifact.display(), "summary cache hit");
                        return Ok(Artifact {
                            value,
                            path: artifact.to_path_buf(),
                            recomputed: false,
                        });
                    }
                    Err(e) => {
                        tracing::warn!(target: "cache", path = %artifact.display(), error = %e, "unreadable summary, recomputing");
                    }
                }
            }
        }

        counter!("cache_summary_misses_total").increment(1);
        let value = compute()?;
        let body = serde_json::to_string_pretty(&value)
            .map_err(|e| RealEstateError::cache_format(artifact, e))?;
        write_atomic(artifact, body.as_bytes())?;
        tracing::info!(target: "cache", path = %artifact.display(), "summary cache written");
        Ok(Artifact {
            value,
            path: artifact.to_path_buf(),
            recomputed: true,
        })
    }
}

fn modified(path: &Path) -> Result<SystemTime> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| RealEstateError::cache_io(path, e))
}

/// Write to a private temp file next to `path`, then rename over it.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| RealEstateError::cache_io(dir, e))?;
    }
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp = path.with_extension(format!("tmp.{}.{seq}", std::process::id()));
    let write = || -> std::io::Result<()> {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
        fs::rename(&tmp, path)
    };
    write().map_err(|e| {
        let _ = fs::remove_file(&tmp);
        RealEstateError::cache_io(path, e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{AssetType, TradeType};
    use std::cell::Cell;
    use std::time::Duration;

    fn ds(asset: AssetType, trade: TradeType) -> Dataset {
        Dataset::new(asset, trade).unwrap()
    }

    fn backdate(path: &Path, secs: u64) {
        let f = fs::File::options().write(true).open(path).unwrap();
        f.set_modified(SystemTime::now() - Duration::from_secs(secs)).unwrap();
    }

    #[test]
    fn paths_follow_layout() {
        let cm = CacheManager::new("/cache");
        let key = CacheKey::new(ds(AssetType::Apartment, TradeType::Trade), "11680", "202406");
        let raw = cm.raw_path(&key);
        assert_eq!(raw, Path::new("/cache/raw_data/APT_TRADE_11680_202406.raw.data.json"));
        assert_eq!(
            cm.summary_path(&raw, key.dataset),
            Path::new("/cache/APT_TRADE_11680_202406_trade_summary.json")
        );

        let land = Path::new("/x/LAND_TRADE_11110_202401.raw.data.json");
        assert_eq!(
            summary_file_name(land, ds(AssetType::Land, TradeType::Trade)),
            "LAND_TRADE_11110_202401_summary.json"
        );
        assert_eq!(source_stem(Path::new("/x/other.json")), "other");
    }

    #[test]
    fn source_must_carry_the_dataset_prefix() {
        let apt = Path::new("/c/raw_data/APT_TRADE_11680_202406.raw.data.json");
        assert!(source_matches(apt, ds(AssetType::Apartment, TradeType::Trade)));
        assert!(!source_matches(apt, ds(AssetType::Officetel, TradeType::Trade)));
        assert!(!source_matches(apt, ds(AssetType::Apartment, TradeType::Rent)));

        let land = Path::new("/c/raw_data/LAND_TRADE_11110_202401.raw.data.json");
        assert!(source_matches(land, ds(AssetType::Land, TradeType::Trade)));
        assert!(!source_matches(land, ds(AssetType::Industrial, TradeType::Trade)));
        assert!(!source_matches(land, ds(AssetType::Commercial, TradeType::Trade)));
        assert!(!source_matches(Path::new("/c/other.json"), ds(AssetType::Land, TradeType::Trade)));
    }

    #[test]
    fn raw_roundtrip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cm = CacheManager::new(dir.path());
        let key = CacheKey::new(ds(AssetType::Officetel, TradeType::Rent), "11110", "202501");
        let set = RecordSet::new(vec![[("offiNm", Some("A".to_string()))].into_iter().collect()]);
        let path = cm.write_raw(&key, &set).unwrap();
        assert!(path.starts_with(dir.path().join(RAW_DIR)));
        assert_eq!(CacheManager::read_raw(&path).unwrap(), set);
        assert!(matches!(
            CacheManager::read_raw(&dir.path().join("missing.json")),
            Err(RealEstateError::CacheIo { .. })
        ));
    }

    #[test]
    fn second_call_is_a_hit_and_does_not_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src.raw.data.json");
        fs::write(&source, "{}\n").unwrap();
        backdate(&source, 60);
        let artifact = dir.path().join("nested").join("src_summary.json");
        let cm = CacheManager::new(dir.path());
        let calls = Cell::new(0);

        let first = cm
            .get_or_compute(&source, &artifact, || {
                calls.set(calls.get() + 1);
                Ok(serde_json::json!({"n": 1}))
            })
            .unwrap();
        assert!(first.recomputed);
        let m1 = fs::metadata(&artifact).unwrap().modified().unwrap();
        let bytes1 = fs::read(&artifact).unwrap();

        let second = cm
            .get_or_compute(&source, &artifact, || {
                calls.set(calls.get() + 1);
                Ok(serde_json::json!({"n": 2}))
            })
            .unwrap();
        assert!(!second.recomputed);
        assert_eq!(second.value, first.value);
        assert_eq!(calls.get(), 1);
        assert!(fs::metadata(&artifact).unwrap().modified().unwrap() <= m1);
        assert_eq!(fs::read(&artifact).unwrap(), bytes1);
    }

    #[test]
    fn newer_source_invalidates() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("s.raw.data.json");
        let artifact = dir.path().join("s_summary.json");
        fs::write(&source, "").unwrap();
        fs::write(&artifact, r#"{"old": true}"#).unwrap();
        backdate(&artifact, 120);

        let cm = CacheManager::new(dir.path());
        let got = cm
            .get_or_compute(&source, &artifact, || Ok(serde_json::json!({"old": false})))
            .unwrap();
        assert!(got.recomputed);
        assert_eq!(got.value["old"], false);
        let on_disk: Value = serde_json::from_str(&fs::read_to_string(&artifact).unwrap()).unwrap();
        assert_eq!(on_disk["old"], false);
    }

    #[test]
    fn missing_source_is_cache_io() {
        let dir = tempfile::tempdir().unwrap();
        let cm = CacheManager::new(dir.path());
        let err = cm
            .get_or_compute(&dir.path().join("nope"), &dir.path().join("a.json"), || Ok(Value::Null))
            .unwrap_err();
        assert_eq!(err.kind(), "cache_io");
    }
}

// src/config/realestate.rs
//! Service configuration: defaults → optional TOML file → environment.
//!
//! The file is `$REALESTATE_CONFIG_PATH`, else `config/realestate.toml` when
//! present. A key field set to `"ENV"` is read from its environment variable.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::RealEstateError;

const ENV_CONFIG_PATH: &str = "REALESTATE_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config/realestate.toml";

pub const ENV_API_KEY: &str = "PUBLIC_DATA_API_KEY_ENCODED";
pub const ENV_ECOS_API_KEY: &str = "ECOS_API_KEY";

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct RealEstateConfig {
    /// Pre-encoded public-data service key.
    pub api_key: Option<String>,
    pub ecos_api_key: Option<String>,
    pub base_url: String,
    /// Second transport tried after `base_url`; empty disables it.
    pub fallback_base_url: Option<String>,
    pub ecos_base_url: String,
    pub cache_dir: PathBuf,
    pub page_size: u32,
    pub http_timeout_secs: u64,
    /// Return an existing raw cache file instead of refetching.
    pub reuse_raw_cache: bool,
    pub region_codes_path: PathBuf,
    /// odcloud legal-district list, used when no region code file exists.
    pub region_api_url: String,
}

impl Default for RealEstateConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            ecos_api_key: None,
            base_url: "https://apis.data.go.kr/1613000".into(),
            fallback_base_url: Some("http://apis.data.go.kr/1613000".into()),
            ecos_base_url: "https://ecos.bok.or.kr/api".into(),
            cache_dir: default_cache_dir(),
            page_size: 1000,
            http_timeout_secs: 30,
            reuse_raw_cache: true,
            region_codes_path: PathBuf::from("config/region_codes.json"),
            region_api_url:
                "https://api.odcloud.kr/api/15063424/v1/uddi:257e1510-0eeb-44de-8883-8295c94dadf7"
                    .into(),
        }
    }
}

/// Keys are never printed, only whether they are set.
impl fmt::Debug for RealEstateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealEstateConfig")
            .field("api_key", &self.api_key.as_ref().map(|k| format!("<{} chars>", k.len())))
            .field("ecos_api_key", &self.ecos_api_key.as_ref().map(|k| format!("<{} chars>", k.len())))
            .field("base_url", &self.base_url)
            .field("fallback_base_url", &self.fallback_base_url)
            .field("ecos_base_url", &self.ecos_base_url)
            .field("cache_dir", &self.cache_dir)
            .field("page_size", &self.page_size)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("reuse_raw_cache", &self.reuse_raw_cache)
            .field("region_codes_path", &self.region_codes_path)
            .field("region_api_url", &self.region_api_url)
            .finish()
    }
}

/// OS user cache dir + `mcp-kr-realestate`, else the temp dir.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join("mcp-kr-realestate"))
        .unwrap_or_else(|| env::temp_dir().join("mcp-kr-realestate-cache"))
}

impl RealEstateConfig {
    /// Full resolution used by the binary.
    pub fn load() -> Result<Self> {
        let base = match env::var(ENV_CONFIG_PATH) {
            Ok(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
                }
                Self::load_from_file(&pb)?
            }
            Err(_) => {
                let p = Path::new(DEFAULT_CONFIG_PATH);
                if p.exists() {
                    Self::load_from_file(p)?
                } else {
                    Self::default()
                }
            }
        };
        base.with_env_overrides()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let mut cfg: RealEstateConfig =
            toml::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;

        cfg.api_key = resolve_env_marker(cfg.api_key, ENV_API_KEY)?;
        cfg.ecos_api_key = resolve_env_marker(cfg.ecos_api_key, ENV_ECOS_API_KEY)?;
        cfg.normalize();
        Ok(cfg)
    }

    /// Environment variables win over file values.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(v) = env_nonempty(ENV_API_KEY) {
            self.api_key = Some(v);
        }
        if let Some(v) = env_nonempty(ENV_ECOS_API_KEY) {
            self.ecos_api_key = Some(v);
        }
        if let Some(v) = env_nonempty("REALESTATE_BASE_URL") {
            self.base_url = v;
        }
        if let Ok(v) = env::var("REALESTATE_FALLBACK_BASE_URL") {
            self.fallback_base_url = Some(v);
        }
        if let Some(v) = env_nonempty("ECOS_BASE_URL") {
            self.ecos_base_url = v;
        }
        if let Some(v) = env_nonempty("MCP_REAL_ESTATE_CACHE_DIR") {
            self.cache_dir = PathBuf::from(v);
        }
        if let Some(v) = env_nonempty("REALESTATE_PAGE_SIZE") {
            self.page_size = v
                .parse()
                .with_context(|| format!("REALESTATE_PAGE_SIZE={v:?} is not a number"))?;
        }
        if let Some(v) = env_nonempty("REALESTATE_HTTP_TIMEOUT_SECS") {
            self.http_timeout_secs = v
                .parse()
                .with_context(|| format!("REALESTATE_HTTP_TIMEOUT_SECS={v:?} is not a number"))?;
        }
        if let Some(v) = env_nonempty("REALESTATE_REUSE_RAW_CACHE") {
            self.reuse_raw_cache = parse_bool(&v)
                .ok_or_else(|| anyhow!("REALESTATE_REUSE_RAW_CACHE={v:?} is not a boolean"))?;
        }
        if let Some(v) = env_nonempty("REGION_CODES_PATH") {
            self.region_codes_path = PathBuf::from(v);
        }
        if let Some(v) = env_nonempty("REGION_API_URL") {
            self.region_api_url = v;
        }
        self.normalize();
        Ok(self)
    }

    fn normalize(&mut self) {
        if self.page_size == 0 {
            self.page_size = 1000;
        }
        if self.http_timeout_secs == 0 {
            self.http_timeout_secs = 30;
        }
        self.fallback_base_url = self
            .fallback_base_url
            .take()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self.api_key = self.api_key.take().filter(|k| !k.trim().is_empty());
        self.ecos_api_key = self.ecos_api_key.take().filter(|k| !k.trim().is_empty());
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// The public-data key, or a configuration error naming the variable.
    pub fn require_api_key(&self) -> Result<&str, RealEstateError> {
        self.api_key.as_deref().ok_or_else(|| {
            RealEstateError::Config(format!("environment variable {ENV_API_KEY} is not set"))
        })
    }

    pub fn require_ecos_api_key(&self) -> Result<&str, RealEstateError> {
        self.ecos_api_key.as_deref().ok_or_else(|| {
            RealEstateError::Config(format!("environment variable {ENV_ECOS_API_KEY} is not set"))
        })
    }
}

fn resolve_env_marker(value: Option<String>, var: &str) -> Result<Option<String>> {
    match value {
        Some(v) if v.trim().eq_ignore_ascii_case("env") => env::var(var)
            .map(Some)
            .map_err(|_| anyhow!("Missing {var} env var")),
        other => Ok(other),
    }
}

fn env_nonempty(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

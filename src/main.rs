//! Korean real-estate transaction service: binary entrypoint.
//! Boots the Axum HTTP server with the tool router and `/metrics`.

use std::sync::Arc;

use kr_realestate_analyzer::config::RealEstateConfig;
use kr_realestate_analyzer::metrics::Metrics;
use kr_realestate_analyzer::{router, RealEstateService};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs; JSON lines when `LOG_FORMAT=json`. Safe to call when a
/// subscriber is already installed.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("kr_realestate_analyzer=info,warn"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = RealEstateConfig::load()?;
    if config.api_key.is_none() {
        tracing::warn!("public-data API key not set; fetch tools will return configuration errors");
    }
    tracing::info!(cache_dir = %config.cache_dir.display(), page_size = config.page_size, "config loaded");

    let service = Arc::new(RealEstateService::new(config)?);
    let mut app = router(service);

    match Metrics::init() {
        Ok(m) => app = app.merge(m.router()),
        Err(e) => tracing::warn!(error = %e, "prometheus recorder not installed; /metrics disabled"),
    }

    Ok(app.into())
}

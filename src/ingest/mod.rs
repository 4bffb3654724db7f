// src/ingest/mod.rs
pub mod providers;
pub mod types;
pub mod xml;

use crate::dataset::Dataset;
use crate::error::{RealEstateError, Result};
use crate::ingest::types::{Collected, PageFetcher, PageRequest};
use crate::ingest::xml::{parse_page, PageError};
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_pages_total", "Upstream pages fetched and parsed.");
        describe_counter!(
            "ingest_records_total",
            "Raw transaction records collected across all pages."
        );
        describe_counter!(
            "ingest_items_parsed_total",
            "Items flattened out of upstream XML pages."
        );
        describe_counter!(
            "ingest_fetch_errors_total",
            "Collections aborted by a fetch, parse or upstream error."
        );
        describe_counter!(
            "ingest_transport_failures_total",
            "Page requests that failed on one transport before the next was tried."
        );
        describe_histogram!("ingest_parse_ms", "Page parse time in milliseconds.");
    });
}

/// Fetch every page for one (dataset, region, month) key.
///
/// Pages are requested strictly in order starting from 1. The loop stops as
/// soon as the accumulated item count reaches the reported total, or a page
/// comes back empty (covers an absent or wrong `totalCount`). Any failing
/// page aborts the whole collection; nothing partial is returned.
pub async fn collect_all(
    fetcher: &dyn PageFetcher,
    dataset: Dataset,
    region_code: &str,
    year_month: &str,
    page_size: u32,
) -> Result<Collected> {
    ensure_metrics_described();
    if page_size == 0 {
        return Err(RealEstateError::InvalidArgument(
            "page size must be at least 1".into(),
        ));
    }

    let endpoint = dataset.endpoint_path();
    let mut out = Collected::default();
    let mut page_no: u32 = 1;

    loop {
        let req = PageRequest {
            endpoint: endpoint.clone(),
            region_code: region_code.to_string(),
            year_month: year_month.to_string(),
            page_no,
            page_size,
        };

        let body = match fetcher.fetch_page(&req).await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, fetcher = fetcher.name(), page = page_no, %dataset, "page fetch failed");
                counter!("ingest_fetch_errors_total").increment(1);
                return Err(RealEstateError::Fetch {
                    page: page_no,
                    cause: format!("{e:#}"),
                });
            }
        };

        let page = parse_page(&body).map_err(|e| {
            counter!("ingest_fetch_errors_total").increment(1);
            match e {
                PageError::Malformed(message) => RealEstateError::Parse {
                    page: page_no,
                    message,
                },
                PageError::Upstream { code, message } => {
                    RealEstateError::Upstream { code, message }
                }
            }
        })?;
        counter!("ingest_pages_total").increment(1);
        out.pages_fetched = page_no;

        if let Some(total) = page.total_count {
            out.total_count = total;
        }
        if page.items.is_empty() {
            break;
        }
        out.items.extend(page.items);
        if out.items.len() as u64 >= out.total_count {
            break;
        }
        page_no += 1;
    }

    counter!("ingest_records_total").increment(out.items.len() as u64);
    tracing::info!(
        target: "ingest",
        %dataset,
        region_code,
        year_month,
        pages = out.pages_fetched,
        records = out.items.len(),
        total = out.total_count,
        "collection finished"
    );
    Ok(out)
}

// tests/api_router.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::sync::Arc;

use serde_json::{json, Value};
use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt as _; // for `oneshot`

use kr_realestate_analyzer::config::RealEstateConfig;
use kr_realestate_analyzer::ingest::providers::molit::FixtureFetcher;
use kr_realestate_analyzer::{router, RealEstateService};

const BODY_LIMIT: usize = 1024 * 1024;

const PAGE: &str = "<response><header><resultCode>000</resultCode></header><body><items>\
    <item><aptNm>은마</aptNm><umdNm>대치동</umdNm><dealAmount>250,000</dealAmount><excluUseAr>76.79</excluUseAr><buildYear>1979</buildYear></item>\
    </items><totalCount>1</totalCount></body></response>";

fn test_router(dir: &std::path::Path) -> Router {
    let cfg = RealEstateConfig {
        cache_dir: dir.to_path_buf(),
        region_codes_path: dir.join("codes.json"),
        ..RealEstateConfig::default()
    };
    let svc = RealEstateService::with_fetcher(cfg, Arc::new(FixtureFetcher::new(vec![PAGE.to_string()])));
    router(Arc::new(svc))
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.expect("read body");
    (status, bytes.to_vec())
}

fn post_json(uri: &str, payload: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST")
}

#[tokio::test]
async fn health_returns_ok() {
    let dir = tempfile::tempdir().unwrap();
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(test_router(dir.path()), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).unwrap(), "ok");
}

#[tokio::test]
async fn tools_lists_every_operation() {
    let dir = tempfile::tempdir().unwrap();
    let req = Request::builder().uri("/tools").body(Body::empty()).unwrap();
    let (status, body) = send(test_router(dir.path()), req).await;
    assert_eq!(status, StatusCode::OK);
    let tools: Vec<Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(tools.len(), 25);
    let fetch = tools
        .iter()
        .find(|t| t["name"] == "get_officetel_rent_data")
        .expect("officetel rent tool");
    assert_eq!(fetch["arguments"], json!(["regionCode", "yearMonth"]));
    assert!(tools.iter().any(|t| t["name"] == "analyze_industrial_property_trade"));
}

#[tokio::test]
async fn unknown_tool_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = send(test_router(dir.path()), post_json("/tools/nope", &json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let v: Value = serde_json::from_slice(&body).unwrap();
    assert!(v["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn invalid_json_body_is_400() {
    let dir = tempfile::tempdir().unwrap();
    let req = Request::builder()
        .method("POST")
        .uri("/tools/search_region_codes")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = send(test_router(dir.path()), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn fetch_and_analyze_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_router(dir.path());

    let (status, body) = send(
        app.clone(),
        post_json("/tools/get_apartment_trade_data", &json!({"regionCode": "11680", "yearMonth": "202406"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let fetched: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(fetched["recordCount"], 1, "{fetched}");

    let (status, body) = send(
        app,
        post_json("/tools/analyze_apartment_trade", &json!({"filePath": fetched["filePath"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let report: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(report["overallStatistics"]["totalTransactionCount"], 1);
    assert_eq!(report["statisticsByApartmentComplex"]["은마"]["transactionCount"], 1);
    assert_eq!(
        report["priceLevelStatistics"]["overallAveragePrice"],
        json!({"value": 2_500_000_000i64, "unit": "KRW"})
    );
}

#[tokio::test]
async fn tool_errors_are_200_with_error_field() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = send(
        test_router(dir.path()),
        post_json("/tools/analyze_land_trade", &json!({"filePath": "/definitely/missing.raw.data.json"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["errorKind"], "invalid_argument");
    assert_eq!(v["assetType"], "land");
}

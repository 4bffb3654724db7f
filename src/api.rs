use std::sync::Arc;

use serde_json::{json, Value};
use shuttle_axum::axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::service::{tool_descriptors, RealEstateService, ToolDescriptor};

#[derive(Clone)]
pub struct AppState {
    service: Arc<RealEstateService>,
}

/// Router exposing the tool catalogue. Tool results are always 200 with a
/// JSON body; failures are reported inside it. Unknown tool names are 404.
pub fn router(service: Arc<RealEstateService>) -> Router {
    let state = AppState { service };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/tools", get(list_tools))
        .route("/tools/{name}", post(call_tool))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn list_tools() -> Json<Vec<ToolDescriptor>> {
    Json(tool_descriptors())
}

async fn call_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let args = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        match serde_json::from_slice(&body) {
            Ok(v) => v,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": format!("invalid JSON body: {e}"), "errorKind": "invalid_argument" })),
                )
            }
        }
    };
    tracing::debug!(target: "api", tool = %name, "tool call");
    match state.service.call_tool(&name, args).await {
        Some(v) => (StatusCode::OK, Json(v)),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown tool: {name}"), "errorKind": "invalid_argument" })),
        ),
    }
}

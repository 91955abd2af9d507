//! Admin API (operator port) — traffic introspection, live config, metrics,
//! and manual blocklist control. Kept on a separate listener from the edge
//! router so it can be firewalled independently (`main.rs` binds it to
//! `config.server.admin_port`).

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::api::health;
use crate::metrics;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/admin/traffic", get(traffic))
        .route("/admin/config", get(config))
        .route("/admin/metrics", get(prometheus_metrics))
        .route("/admin/block", post(block_ip))
        .route("/admin/unblock", post(unblock_ip))
        .with_state(state)
}

#[derive(Deserialize)]
struct TrafficQuery {
    #[serde(default = "default_limit")]
    limit: usize,
}
fn default_limit() -> usize {
    100
}

/// `GET /admin/traffic?limit=N` — recent traffic entries plus window stats.
async fn traffic(State(state): State<Arc<AppState>>, Query(q): Query<TrafficQuery>) -> impl IntoResponse {
    let entries = state.traffic.recent(q.limit).await;
    let stats = state.traffic.stats().await;
    Json(json!({ "stats": stats, "entries": entries }))
}

/// `GET /admin/config` — the live config. `Config` holds no literal secrets
/// (only env-var *names*, e.g. `admin_token_env`), so it's safe to serialize
/// verbatim rather than field-by-field redact.
async fn config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.config())
}

/// `GET /admin/metrics` — Prometheus text exposition format.
async fn prometheus_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.traffic.stats().await;
    (
        [("content-type", "text/plain; version=0.0.4")],
        metrics::render_prometheus(&stats),
    )
}

#[derive(Deserialize)]
struct BlockRequest {
    ip: String,
    #[serde(default = "default_block_ttl_seconds")]
    ttl_seconds: u64,
    #[serde(default = "default_block_reason")]
    reason: String,
}
fn default_block_ttl_seconds() -> u64 {
    3600
}
fn default_block_reason() -> String {
    "operator".to_string()
}

/// `POST /admin/block {"ip": "...", "ttl_seconds": 3600, "reason": "..."}`
async fn block_ip(State(state): State<Arc<AppState>>, Json(req): Json<BlockRequest>) -> impl IntoResponse {
    let ttl = std::time::Duration::from_secs(req.ttl_seconds.max(1));
    match state.store.block(&req.ip, ttl, &req.reason).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "blocked": req.ip }))).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, ip = %req.ip, "admin block request failed");
            (StatusCode::BAD_GATEWAY, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

#[derive(Deserialize)]
struct UnblockRequest {
    ip: String,
}

/// `POST /admin/unblock {"ip": "..."}`
async fn unblock_ip(State(state): State<Arc<AppState>>, Json(req): Json<UnblockRequest>) -> impl IntoResponse {
    match state.store.unblock(&req.ip).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "unblocked": req.ip }))).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, ip = %req.ip, "admin unblock request failed");
            (StatusCode::BAD_GATEWAY, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

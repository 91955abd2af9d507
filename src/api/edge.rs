//! Edge-facing API (client port) — the boundary every Internet request
//! crosses before it ever reaches the real origin.
//!
//! Intentionally a thin layer: all decision logic lives in [`crate::gate`];
//! handlers translate the gate's [`Decision`] into the four HTTP shapes
//! named in `spec.md` §6 — pass-through, 403, 307-to-challenge, or a slow
//! tarpit stream.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::gate::{self, RequestContext};
use crate::scorer::FeatureVector;
use crate::state::AppState;
use crate::traffic::{Decision, TrafficEntry};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(crate::api::health::healthz))
        .route("/__tarwall/challenge/verify", get(verify_challenge))
        .fallback(handle_request)
        .with_state(state)
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

/// Handles every request not matched by a more specific route. This is the
/// Edge Gate's single point of entry.
async fn handle_request(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request<Body>,
) -> Response {
    let t0 = Instant::now();
    let ip = addr.ip();
    let path = req.uri().path().to_string();
    let headers = req.headers().clone();
    let user_agent = header_str(&headers, header::USER_AGENT).unwrap_or_default();

    let ctx = RequestContext {
        ip: ip.to_string(),
        user_agent: user_agent.clone(),
        path: path.clone(),
        accept_language: header_str(&headers, header::ACCEPT_LANGUAGE),
        referrer: header_str(&headers, header::REFERER),
        accept_encoding: header_str(&headers, header::ACCEPT_ENCODING),
    };

    let config = state.config();
    let robots = state.robots();
    let verdict = gate::decide(
        &state.store,
        &robots,
        &config.robots,
        &config.rate_limit,
        &config.heuristics,
        config.challenge.enable_captcha_trigger,
        &ctx,
    )
    .await;

    let response = match verdict.decision {
        Decision::Block => block_response(),
        Decision::Pass => match state.origin.proxy(req, ip).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(error = %e, %path, "origin proxy failed");
                (StatusCode::BAD_GATEWAY, "origin unavailable").into_response()
            }
        },
        Decision::Challenge => challenge_response(&state, &ctx.ip).await,
        Decision::Tarpit => {
            maybe_escalate(&state, &ctx, verdict.requests_last_minute, verdict.reason);
            tarpit_response(&state, &path, &ctx.ip).await
        }
    };

    let latency_ms = t0.elapsed().as_millis() as u64;
    state.metrics.record_decision(verdict.decision, latency_ms);
    let entry = TrafficEntry::new(Some(ip), path, verdict.decision, latency_ms).with_reason(verdict.reason);
    state.traffic.push(entry);

    response
}

fn block_response() -> Response {
    (StatusCode::FORBIDDEN, "Forbidden.").into_response()
}

/// Mints a single-use challenge token and redirects to the interstitial
/// verification endpoint (`spec.md` §6: "a 307 to a challenge page").
async fn challenge_response(state: &AppState, ip: &str) -> Response {
    let ttl = std::time::Duration::from_secs(state.config().challenge.challenge_ttl_seconds);
    match state.store.mint_challenge(ip, ttl).await {
        Ok(token) => Redirect::temporary(&format!("/__tarwall/challenge/verify?token={token}")).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, ip, "failed to mint challenge token, tarpitting instead");
            (StatusCode::FORBIDDEN, "Forbidden.").into_response()
        }
    }
}

async fn tarpit_response(state: &AppState, path: &str, ip: &str) -> Response {
    let rendered = state.tarpit.render(path, ip).await;
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .body(Body::from_stream(rendered.stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// A tarpit decision driven by rate-limit or heuristic anomalies (rather
/// than a fixed rule like blocklist/hostile-UA) also escalates to the
/// Scorer, which may turn it into a durable block. Fire-and-forget: the
/// current response is never delayed by this.
fn maybe_escalate(state: &Arc<AppState>, ctx: &RequestContext, requests_last_minute: u64, reason: &'static str) {
    if reason != "rate_limit" && reason != "heuristic" {
        return;
    }
    let state = Arc::clone(state);
    let features = FeatureVector {
        ip: ctx.ip.clone(),
        user_agent: ctx.user_agent.clone(),
        path: ctx.path.clone(),
        requests_last_minute,
        missing_accept_language: ctx.accept_language.as_deref().unwrap_or("").is_empty(),
        missing_referrer: ctx.referrer.as_deref().unwrap_or("").is_empty(),
    };
    tokio::spawn(async move {
        let config = state.config();
        let currently_blocked = state.store.is_blocked(&features.ip).await;
        let verdict = state.scorer.score(&features, &config.robots.hostile_uas, currently_blocked).await;
        state.metrics.record_escalation(verdict.score);
        tracing::debug!(ip = %features.ip, score = verdict.score, action = ?verdict.action, "escalation scored");
    });
}

#[derive(Deserialize)]
struct VerifyQuery {
    token: String,
}

/// `GET /__tarwall/challenge/verify?token=...` — consumes a challenge token
/// and, on success, marks the requesting IP trusted for the configured
/// window (Open Question #3).
async fn verify_challenge(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(q): Query<VerifyQuery>,
) -> impl IntoResponse {
    let ip = addr.ip().to_string();
    if state.store.consume_challenge(&ip, &q.token).await {
        let ttl = std::time::Duration::from_secs(state.config().challenge.trust_window_seconds);
        if let Err(e) = state.store.mark_trusted(&ip, ttl).await {
            tracing::warn!(error = %e, ip, "failed to mark IP trusted after challenge verification");
        }
        (StatusCode::OK, "Verified.").into_response()
    } else {
        (StatusCode::FORBIDDEN, "Invalid or expired challenge.").into_response()
    }
}

//! Edge Gate — the per-request decision of `{pass, block, tarpit, challenge}`,
//! executed on every request at line rate.

mod error;
pub mod robots;

use std::time::Duration;

pub use error::GateError;
use robots::RobotsRules;

use crate::config::{RateLimitConfig, RobotsConfig};
use crate::config::HeuristicsConfig;
use crate::store::Store;
use crate::traffic::Decision;

/// The request-shaped facts the Gate needs. Built once per request from raw
/// headers; never stored (matches the Request Fingerprint entity's
/// "discarded after decision" lifecycle).
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub ip: String,
    pub user_agent: String,
    pub path: String,
    pub accept_language: Option<String>,
    pub referrer: Option<String>,
    pub accept_encoding: Option<String>,
}

/// Outcome of a single gate evaluation: the decision plus the step that
/// produced it, for logging/admin introspection.
#[derive(Debug, Clone)]
pub struct GateVerdict {
    pub decision: Decision,
    pub reason: &'static str,
    /// Rolling 1-minute request count observed at step 4, when reached.
    /// Lets callers feed the Escalation Scorer without re-querying the Store.
    pub requests_last_minute: u64,
}

/// Evaluates the 6-step algorithm in order; first match wins. Each step is
/// fail-open: a `Store` error is treated as "no data" rather than propagated.
pub async fn decide(
    store: &Store,
    robots: &RobotsRules,
    robots_cfg: &RobotsConfig,
    rate_limit_cfg: &RateLimitConfig,
    heuristics_cfg: &HeuristicsConfig,
    challenges_enabled: bool,
    ctx: &RequestContext,
) -> GateVerdict {
    // 1. Blocklist always wins.
    if store.is_blocked(&ctx.ip).await {
        return GateVerdict { decision: Decision::Block, reason: "blocklist", requests_last_minute: 0 };
    }

    // 2. robots.txt policy for recognised benign bots.
    if is_benign_bot(&ctx.user_agent, &robots_cfg.benign_bot_uas) {
        return if robots.is_allowed(&ctx.user_agent, &ctx.path) {
            GateVerdict { decision: Decision::Pass, reason: "robots_allow", requests_last_minute: 0 }
        } else {
            GateVerdict { decision: Decision::Tarpit, reason: "robots_disallow", requests_last_minute: 0 }
        };
    }

    // 3. Hard deny UAs — tarpit, not block, so the bot burns time.
    if is_hostile_ua(&ctx.user_agent, &robots_cfg.hostile_uas) {
        return GateVerdict { decision: Decision::Tarpit, reason: "hostile_ua", requests_last_minute: 0 };
    }

    // 4. Rate limit.
    let count = store.record_hit(&ctx.ip, Duration::from_secs(60)).await;
    if count > rate_limit_cfg.rate_limit_per_minute as u64 {
        return GateVerdict { decision: Decision::Tarpit, reason: "rate_limit", requests_last_minute: count };
    }

    // 5. Heuristic gate — skipped for IPs holding a trusted-window marker
    // from a recently-verified challenge (Open Question #3, `DESIGN.md`).
    if store.is_trusted(&ctx.ip).await {
        return GateVerdict { decision: Decision::Pass, reason: "trusted", requests_last_minute: count };
    }
    let score = heuristic_score(ctx);
    if score > heuristics_cfg.edge_heuristic_threshold {
        return if challenges_enabled {
            GateVerdict { decision: Decision::Challenge, reason: "heuristic", requests_last_minute: count }
        } else {
            GateVerdict { decision: Decision::Tarpit, reason: "heuristic", requests_last_minute: count }
        };
    }

    // 6. Default.
    GateVerdict { decision: Decision::Pass, reason: "default", requests_last_minute: count }
}

/// Empty UA is itself a hard-deny signal (§8 boundary behavior).
fn is_hostile_ua(user_agent: &str, hostile_uas: &[String]) -> bool {
    if user_agent.trim().is_empty() {
        return true;
    }
    let lower = user_agent.to_lowercase();
    hostile_uas.iter().any(|h| !h.is_empty() && lower.contains(&h.to_lowercase()))
}

fn is_benign_bot(user_agent: &str, benign_bot_uas: &[String]) -> bool {
    if user_agent.trim().is_empty() {
        return false;
    }
    let lower = user_agent.to_lowercase();
    benign_bot_uas.iter().any(|b| !b.is_empty() && lower.contains(&b.to_lowercase()))
}

/// Cheap per-request heuristic score — distinct from (and cheaper than) the
/// Escalation Scorer's fused signals; this only decides whether the Gate
/// itself should challenge/tarpit up front.
fn heuristic_score(ctx: &RequestContext) -> f32 {
    let mut score = 0.0;
    if ctx.accept_language.as_deref().unwrap_or("").is_empty() {
        score += 0.3;
    }
    if is_deep_link(&ctx.path) && ctx.referrer.as_deref().unwrap_or("").is_empty() {
        score += 0.3;
    }
    if accept_encoding_anomaly(ctx.accept_encoding.as_deref()) {
        score += 0.4;
    }
    score.min(1.0)
}

fn is_deep_link(path: &str) -> bool {
    path.trim_matches('/').matches('/').count() >= 2
}

fn accept_encoding_anomaly(accept_encoding: Option<&str>) -> bool {
    match accept_encoding {
        None => true,
        Some(v) => !v.to_lowercase().contains("gzip"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(ip: &str, ua: &str, path: &str) -> RequestContext {
        RequestContext {
            ip: ip.into(),
            user_agent: ua.into(),
            path: path.into(),
            accept_language: Some("en-US".into()),
            referrer: Some("https://example.com".into()),
            accept_encoding: Some("gzip, deflate".into()),
        }
    }

    #[test]
    fn empty_user_agent_is_hostile() {
        assert!(is_hostile_ua("", &["curl".to_string()]));
    }

    #[test]
    fn known_scraper_signature_is_hostile() {
        assert!(is_hostile_ua("python-requests/2.31", &["python-requests".to_string()]));
    }

    #[test]
    fn ordinary_browser_ua_is_not_hostile() {
        assert!(!is_hostile_ua("Mozilla/5.0 (Windows NT 10.0)", &["curl".to_string()]));
    }

    #[test]
    fn heuristic_score_is_zero_for_clean_request() {
        let c = ctx("1.2.3.4", "Mozilla/5.0", "/");
        assert_eq!(heuristic_score(&c), 0.0);
    }

    #[test]
    fn heuristic_score_accumulates_each_anomaly() {
        let mut c = ctx("1.2.3.4", "Mozilla/5.0", "/a/b/c");
        c.accept_language = None;
        c.referrer = None;
        c.accept_encoding = None;
        assert!((heuristic_score(&c) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn shallow_path_does_not_need_a_referrer() {
        let mut c = ctx("1.2.3.4", "Mozilla/5.0", "/");
        c.referrer = None;
        assert_eq!(heuristic_score(&c), 0.0);
    }

    #[test]
    fn deep_link_detection() {
        assert!(is_deep_link("/about/team/members"));
        assert!(!is_deep_link("/about"));
    }
}

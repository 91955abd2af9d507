//! End-to-end coverage for the six concrete scenarios from spec.md §8 that
//! need more than one component wired together. Determinism and score
//! fusion (scenarios 2 and 5) are pure-function properties already covered
//! by unit tests next to the code (`tarpit::render_html_is_pure`,
//! `scorer::score_fusion_matches_scenario_five`); the scenarios below need
//! a live Store and are gated behind `REDIS_URL`, same as `e2e_store.rs`.

use std::sync::Arc;
use std::time::Duration;

use tarwall::config::{HeuristicsConfig, RateLimitConfig, RobotsConfig, TarpitConfig};
use tarwall::gate::robots::RobotsRules;
use tarwall::gate::{self, RequestContext};
use tarwall::markov::Backend as MarkovBackend;
use tarwall::store::Store;
use tarwall::tarpit::Generator;
use tarwall::traffic::Decision;

async fn store(tenant: &str) -> Option<Store> {
    let url = std::env::var("REDIS_URL").ok()?;
    Store::connect(&url, Duration::from_millis(200), tenant).await.ok()
}

fn ctx(ip: &str, path: &str) -> RequestContext {
    RequestContext {
        ip: ip.into(),
        user_agent: "curl/8.0".into(),
        path: path.into(),
        accept_language: None,
        referrer: None,
        accept_encoding: None,
    }
}

/// Scenario 1: hop-limit block. Four tarpit hops from the same IP with
/// `max_hops = 3` blocks the IP; the fifth request is rejected outright.
#[tokio::test]
async fn scenario_1_hop_limit_blocks_after_max_hops() {
    let Some(store) = store("scenario1").await else { return };
    let store = Arc::new(store);
    let ip = format!("198.51.100.{}", std::process::id() % 250);

    let markov = Arc::new(MarkovBackend::open(":memory:", 50).await.expect("markov backend"));
    let tarpit_cfg = TarpitConfig { max_hops: 3, hop_window_seconds: 60, block_ttl_seconds: 600, ..Default::default() };
    let generator = Generator::new("seed-x".into(), tarpit_cfg, markov, Arc::clone(&store));

    for path in ["/a", "/b", "/c", "/d"] {
        let _ = generator.render(path, &ip).await;
    }

    assert!(store.is_blocked(&ip).await, "IP should be blocked after exceeding max_hops");
}

/// Scenario 3: a recognised benign bot following robots.txt is passed
/// straight through without a rate-limit bump.
#[tokio::test]
async fn scenario_3_robots_allowed_benign_bot_passes() {
    let Some(store) = store("scenario3").await else { return };
    let robots = RobotsRules::parse("User-agent: *\nAllow: /\n");
    let robots_cfg = RobotsConfig::default();
    let rate_cfg = RateLimitConfig::default();
    let heuristics_cfg = HeuristicsConfig::default();

    let mut c = ctx("203.0.113.9", "/");
    c.user_agent = "Googlebot/2.1".into();

    let verdict = gate::decide(&store, &robots, &robots_cfg, &rate_cfg, &heuristics_cfg, false, &c).await;
    assert_eq!(verdict.decision, Decision::Pass);
    assert_eq!(verdict.reason, "robots_allow");
}

/// Scenario 4: fail-open on store outage. Drives the deadline path directly
/// rather than assuming `connect` fails against a dead address (it doesn't —
/// `ConnectionManager::new` only errors on a genuinely unreachable server,
/// which a loopback port-refused connection may not reliably reproduce): a
/// deadline far shorter than any real round trip forces every subsequent
/// call down the timeout branch, which must fail open to `Pass` even for an
/// IP that is genuinely blocked.
#[tokio::test]
async fn scenario_4_fail_open_when_store_times_out() {
    let Some(url) = std::env::var("REDIS_URL").ok() else { return };
    let ip = format!("203.0.113.{}", std::process::id() % 250);

    let blocking_store = Store::connect(&url, Duration::from_millis(200), "scenario4")
        .await
        .expect("connecting with a realistic deadline should succeed");
    blocking_store.block(&ip, Duration::from_secs(60), "test").await.expect("block should succeed");
    assert!(blocking_store.is_blocked(&ip).await);

    let starved_store = Store::connect(&url, Duration::from_nanos(1), "scenario4")
        .await
        .expect("connecting itself does not depend on the deadline");

    let robots = RobotsRules::empty();
    let robots_cfg = RobotsConfig::default();
    let rate_cfg = RateLimitConfig::default();
    let heuristics_cfg = HeuristicsConfig::default();
    let c = ctx(&ip, "/");

    let verdict = gate::decide(&starved_store, &robots, &robots_cfg, &rate_cfg, &heuristics_cfg, false, &c).await;
    assert_ne!(verdict.decision, Decision::Block, "a starved store must fail open even for a genuinely blocked IP");
}

//! Integration tests for the Blocklist & Hop Store against a live Redis.
//!
//! Gated behind `REDIS_URL` so `cargo test` doesn't require Redis to be
//! running by default — referenced from `store::mod`'s module docs.

use std::time::Duration;

use tarwall::store::Store;

async fn store() -> Option<Store> {
    let url = std::env::var("REDIS_URL").ok()?;
    Store::connect(&url, Duration::from_millis(200), "e2e-test").await.ok()
}

#[tokio::test]
async fn record_hit_increments_and_resets_after_ttl() {
    let Some(store) = store().await else { return };
    let ip = format!("10.0.0.{}", std::process::id() % 250);

    let first = store.record_hit(&ip, Duration::from_secs(1)).await;
    let second = store.record_hit(&ip, Duration::from_secs(1)).await;
    assert_eq!(second, first + 1);
}

#[tokio::test]
async fn block_then_is_blocked_round_trip() {
    let Some(store) = store().await else { return };
    let ip = format!("10.0.1.{}", std::process::id() % 250);

    assert!(!store.is_blocked(&ip).await);
    store.block(&ip, Duration::from_secs(5), "test").await.expect("block should succeed");
    assert!(store.is_blocked(&ip).await);
    store.unblock(&ip).await.expect("unblock should succeed");
    assert!(!store.is_blocked(&ip).await);
}

#[tokio::test]
async fn challenge_token_is_single_use() {
    let Some(store) = store().await else { return };
    let ip = format!("10.0.2.{}", std::process::id() % 250);

    let token = store.mint_challenge(&ip, Duration::from_secs(30)).await.expect("mint should succeed");
    assert!(store.consume_challenge(&ip, &token).await);
    assert!(!store.consume_challenge(&ip, &token).await, "a consumed token must not verify twice");
}

#[tokio::test]
async fn trusted_marker_round_trip() {
    let Some(store) = store().await else { return };
    let ip = format!("10.0.3.{}", std::process::id() % 250);

    assert!(!store.is_trusted(&ip).await);
    store.mark_trusted(&ip, Duration::from_secs(5)).await.expect("mark_trusted should succeed");
    assert!(store.is_trusted(&ip).await);
}

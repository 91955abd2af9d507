//! Fire-and-forget community blocklist reporting.
//!
//! On a `block` verdict with category `hostile`, optionally POST a report to
//! a configured community endpoint. This must never gate the decision — the
//! call is spawned onto its own task and its result only ever reaches a log
//! line.

use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub ip: String,
    pub reason: String,
    pub score: f32,
}

/// Spawns the report POST in the background. Returns immediately; the
/// caller never awaits the network call.
pub fn report(client: reqwest::Client, endpoint: String, timeout: Duration, report: Report) {
    tokio::spawn(async move {
        let call = client.post(&endpoint).json(&report).send();
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(response)) if response.status().is_success() => {
                tracing::debug!(ip = %report.ip, "community blocklist report accepted");
            }
            Ok(Ok(response)) => {
                tracing::warn!(ip = %report.ip, status = %response.status(), "community blocklist report rejected");
            }
            Ok(Err(e)) => {
                tracing::warn!(ip = %report.ip, error = %e, "community blocklist report failed");
            }
            Err(_) => {
                tracing::warn!(ip = %report.ip, "community blocklist report timed out");
            }
        }
    });
}

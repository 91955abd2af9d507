//! In-memory traffic log exposed through the admin API.
//!
//! [`TrafficLog`] is a fixed-capacity ring-buffer: once full, the oldest entry
//! is evicted to make room for the newest. This gives a bounded, O(1) memory
//! footprint regardless of request volume.

use std::collections::VecDeque;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Fixed-capacity ring-buffer of recent [`TrafficEntry`] records.
///
/// Safe to share across threads via `Arc<TrafficLog>`. [`push`][Self::push] uses
/// a non-blocking `try_lock` so it never delays request handling; in the
/// unlikely event of lock contention the entry is silently dropped.
pub struct TrafficLog {
    capacity: usize,
    entries: Mutex<VecDeque<TrafficEntry>>,
}

impl TrafficLog {
    /// Create a new log with the given capacity.
    ///
    /// `capacity` is the maximum number of entries retained. Older entries are
    /// silently dropped once the buffer is full.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Record a completed request.
    ///
    /// This is a best-effort, non-blocking operation: if the mutex is contended
    /// the entry is dropped rather than blocking the request path.
    pub fn push(&self, entry: TrafficEntry) {
        if let Ok(mut entries) = self.entries.try_lock() {
            if entries.len() == self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry);
        }
    }

    /// Return up to `limit` recent entries, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<TrafficEntry> {
        let entries = self.entries.lock().await;
        entries.iter().rev().take(limit).cloned().collect()
    }

    /// Compute aggregate statistics over all buffered entries.
    pub async fn stats(&self) -> TrafficStats {
        let entries = self.entries.lock().await;
        let total = entries.len();
        let avg_latency_ms = if total == 0 {
            0.0
        } else {
            entries.iter().map(|e| e.latency_ms as f64).sum::<f64>() / total as f64
        };

        let mut decision_counts: std::collections::HashMap<String, usize> =
            std::collections::HashMap::new();
        for entry in entries.iter() {
            *decision_counts.entry(entry.decision.label().to_string()).or_default() += 1;
        }

        TrafficStats {
            total_requests: total,
            avg_latency_ms,
            decision_counts,
        }
    }
}

/// The outcome the Edge Gate or Escalation Scorer reached for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Forwarded to the real origin.
    Pass,
    /// Served a tarpit page/stream.
    Tarpit,
    /// Served an interstitial challenge.
    Challenge,
    /// Rejected outright (already blocked).
    Block,
}

impl Decision {
    fn label(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Tarpit => "tarpit",
            Self::Challenge => "challenge",
            Self::Block => "block",
        }
    }
}

/// A single request record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficEntry {
    /// Unique request ID.
    pub id: String,
    /// Timestamp of the request.
    pub timestamp: DateTime<Utc>,
    /// Client IP address as resolved by the Edge Gate's extraction chain.
    pub ip: Option<IpAddr>,
    /// Request path.
    pub path: String,
    /// Final routing decision.
    pub decision: Decision,
    /// Short machine-readable reason the decision was made
    /// (e.g. `"hop-limit"`, `"hostile-ua"`, `"scorer:hostile"`, `"robots-allow"`).
    pub reason: String,
    /// Escalation Scorer's fused score, when the scorer ran.
    pub score: Option<f32>,
    /// End-to-end latency in milliseconds (time to first byte for tarpit streams).
    pub latency_ms: u64,
    /// Whether the request completed without an internal error.
    pub success: bool,
    /// Error description when `success` is `false`.
    pub error: Option<String>,
}

impl TrafficEntry {
    pub fn new(ip: Option<IpAddr>, path: String, decision: Decision, latency_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            ip,
            path,
            decision,
            reason: String::new(),
            score: None,
            latency_ms,
            success: true,
            error: None,
        }
    }

    /// Attach the reason string for the decision.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Attach the Scorer's fused score.
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    /// Attach an error description and clear the success flag.
    pub fn with_error(mut self, err: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(err.into());
        self
    }
}

/// Aggregate statistics derived from all buffered [`TrafficEntry`] records.
#[derive(Debug, Serialize)]
pub struct TrafficStats {
    pub total_requests: usize,
    pub avg_latency_ms: f64,
    pub decision_counts: std::collections::HashMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn test_ip() -> Option<IpAddr> {
        Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)))
    }

    fn make_entry(decision: Decision, latency_ms: u64) -> TrafficEntry {
        TrafficEntry::new(test_ip(), "/wp-login.php".into(), decision, latency_ms)
    }

    #[tokio::test]
    async fn push_and_retrieve_single_entry() {
        let log = TrafficLog::new(10);
        log.push(make_entry(Decision::Tarpit, 42));

        let recent = log.recent(10).await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].decision, Decision::Tarpit);
        assert_eq!(recent[0].latency_ms, 42);
    }

    #[tokio::test]
    async fn recent_returns_entries_newest_first() {
        let log = TrafficLog::new(10);
        log.push(make_entry(Decision::Pass, 1));
        log.push(make_entry(Decision::Tarpit, 2));
        log.push(make_entry(Decision::Block, 3));

        let recent = log.recent(10).await;
        assert_eq!(recent[0].decision, Decision::Block);
        assert_eq!(recent[1].decision, Decision::Tarpit);
        assert_eq!(recent[2].decision, Decision::Pass);
    }

    #[tokio::test]
    async fn recent_limits_result_count() {
        let log = TrafficLog::new(20);
        for i in 0..10u64 {
            log.push(make_entry(Decision::Pass, i));
        }
        let recent = log.recent(3).await;
        assert_eq!(recent.len(), 3);
    }

    #[tokio::test]
    async fn oldest_entry_evicted_when_capacity_exceeded() {
        let log = TrafficLog::new(3);
        log.push(make_entry(Decision::Pass, 1).with_reason("oldest"));
        log.push(make_entry(Decision::Pass, 2).with_reason("middle"));
        log.push(make_entry(Decision::Pass, 3).with_reason("newest"));
        log.push(make_entry(Decision::Pass, 4).with_reason("extra"));

        let all = log.recent(100).await;
        assert_eq!(all.len(), 3);
        assert!(!all.iter().any(|e| e.reason == "oldest"));
        assert!(all.iter().any(|e| e.reason == "extra"));
    }

    #[tokio::test]
    async fn stats_on_empty_log() {
        let log = TrafficLog::new(10);
        let stats = log.stats().await;
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.avg_latency_ms, 0.0);
        assert!(stats.decision_counts.is_empty());
    }

    #[tokio::test]
    async fn stats_averages_latency_correctly() {
        let log = TrafficLog::new(10);
        log.push(make_entry(Decision::Pass, 100));
        log.push(make_entry(Decision::Pass, 200));
        log.push(make_entry(Decision::Tarpit, 300));

        let stats = log.stats().await;
        assert_eq!(stats.total_requests, 3);
        assert!((stats.avg_latency_ms - 200.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn stats_counts_requests_per_decision() {
        let log = TrafficLog::new(10);
        log.push(make_entry(Decision::Pass, 10));
        log.push(make_entry(Decision::Pass, 20));
        log.push(make_entry(Decision::Block, 30));

        let stats = log.stats().await;
        assert_eq!(stats.decision_counts["pass"], 2);
        assert_eq!(stats.decision_counts["block"], 1);
    }

    #[test]
    fn entry_has_unique_ids() {
        let a = make_entry(Decision::Pass, 1);
        let b = make_entry(Decision::Pass, 1);
        assert_ne!(a.id, b.id, "every entry must have a unique UUID");
    }

    #[test]
    fn with_error_clears_success_flag() {
        let ok = make_entry(Decision::Pass, 0);
        let err = make_entry(Decision::Pass, 0).with_error("redis timeout");
        assert!(ok.success);
        assert!(!err.success);
        assert_eq!(err.error.as_deref(), Some("redis timeout"));
    }
}

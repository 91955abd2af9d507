//! Process-wide metrics sink and the Prometheus text-format renderer for
//! `/admin/metrics`.
//!
//! The core never depends on a specific telemetry backend — it emits events
//! through the [`MetricsSink`] trait, injected once at startup. The default
//! [`TracingMetricsSink`] just logs a structured event per decision, leaving
//! actual aggregation/export (the admin dashboard, alerting fan-out) as an
//! external collaborator per `spec.md` §1.

use crate::traffic::{Decision, TrafficStats};

/// Capability interface for recording gate/scorer outcomes. Implementations
/// must be cheap and non-blocking — this is called on every request.
pub trait MetricsSink: Send + Sync {
    fn record_decision(&self, decision: Decision, latency_ms: u64);
    fn record_escalation(&self, score: f32);
}

/// Default sink: every event becomes one structured `tracing` line. Real
/// aggregation lives in whatever scrapes the logs (or `/admin/metrics`,
/// which reads straight from the in-memory [`crate::traffic::TrafficLog`]
/// instead of this sink).
pub struct TracingMetricsSink;

impl MetricsSink for TracingMetricsSink {
    fn record_decision(&self, decision: Decision, latency_ms: u64) {
        tracing::debug!(decision = ?decision, latency_ms, "gate decision recorded");
    }

    fn record_escalation(&self, score: f32) {
        tracing::debug!(score, "escalation scored");
    }
}

/// Renders the current [`TrafficStats`] window as Prometheus text format.
/// Grounded on the teacher gateway's `/metrics` renderer — same
/// `# HELP` / `# TYPE` / gauge shape, relabelled for tarwall's decision
/// vocabulary instead of tier/backend.
pub fn render_prometheus(stats: &TrafficStats) -> String {
    let mut out = String::with_capacity(512);

    out.push_str("# HELP tarwall_window_size Number of requests currently held in the ring-buffer window.\n");
    out.push_str("# TYPE tarwall_window_size gauge\n");
    out.push_str(&format!("tarwall_window_size {}\n\n", stats.total_requests));

    out.push_str("# HELP tarwall_decisions Request count in the current window, labelled by decision.\n");
    out.push_str("# TYPE tarwall_decisions gauge\n");
    let mut rows: Vec<_> = stats.decision_counts.iter().collect();
    rows.sort_by(|a, b| a.0.cmp(b.0));
    for (decision, count) in rows {
        out.push_str(&format!("tarwall_decisions{{decision=\"{decision}\"}} {count}\n"));
    }
    out.push('\n');

    out.push_str("# HELP tarwall_avg_latency_ms Average latency (ms) across the current window.\n");
    out.push_str("# TYPE tarwall_avg_latency_ms gauge\n");
    out.push_str(&format!("tarwall_avg_latency_ms {}\n", stats.avg_latency_ms));

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn render_includes_window_size_and_decisions() {
        let mut decision_counts = HashMap::new();
        decision_counts.insert("pass".to_string(), 3usize);
        decision_counts.insert("tarpit".to_string(), 1usize);
        let stats = TrafficStats { total_requests: 4, avg_latency_ms: 12.5, decision_counts };

        let out = render_prometheus(&stats);
        assert!(out.contains("tarwall_window_size 4"));
        assert!(out.contains(r#"tarwall_decisions{decision="pass"} 3"#));
        assert!(out.contains("tarwall_avg_latency_ms 12.5"));
    }

    #[test]
    fn tracing_sink_does_not_panic() {
        let sink = TracingMetricsSink;
        sink.record_decision(Decision::Tarpit, 10);
        sink.record_escalation(0.5);
    }
}

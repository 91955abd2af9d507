//! Escalation Scorer — fuses multiple weak signals into one verdict and
//! recommends an action.

pub mod classify;
pub mod community_report;
mod error;

use std::sync::Arc;
use std::time::Duration;

pub use classify::{Classify, FeatureVector, HttpClassifier, NoopClassifier};
pub use error::{ClassifyError, ScorerError};

use crate::config::{ClassifierConfig, HeuristicsConfig, LlmConfig, ReputationConfig};
use crate::store::Store;

/// One weak signal's contribution to the fused score.
#[derive(Debug, Clone)]
pub struct Signal {
    pub name: &'static str,
    pub contribution: f32,
    pub detail: Option<String>,
}

impl Signal {
    fn new(name: &'static str, contribution: f32) -> Self {
        Self { name, contribution, detail: None }
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Benign,
    Suspicious,
    Hostile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    Challenge,
    Tarpit,
    Block,
}

/// The Escalation Verdict data-model entity.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub score: f32,
    pub category: Category,
    pub action: Action,
    pub signals: Vec<Signal>,
}

/// UA-reputation signal: static substring match against the hostile-UA list,
/// `+0.0..+0.5`.
pub fn ua_reputation_signal(ua: &str, hostile_uas: &[String]) -> Signal {
    let matched = ua.is_empty() || hostile_uas.iter().any(|h| !h.is_empty() && ua.to_lowercase().contains(&h.to_lowercase()));
    if matched {
        Signal::new("ua_reputation", 0.5).with_detail("matched hostile UA table")
    } else {
        Signal::new("ua_reputation", 0.0)
    }
}

/// Header-anomaly signal: missing Accept-Language, absent referrer on a deep
/// link, and Accept-Encoding anomalies each contribute a slice of the
/// `+0.0..+0.3` band.
pub fn header_anomaly_signal(missing_accept_language: bool, missing_referrer_deep_link: bool, accept_encoding_anomaly: bool) -> Signal {
    let mut contribution = 0.0;
    if missing_accept_language {
        contribution += 0.1;
    }
    if missing_referrer_deep_link {
        contribution += 0.1;
    }
    if accept_encoding_anomaly {
        contribution += 0.1;
    }
    Signal::new("header_anomalies", contribution.min(0.3))
}

/// Frequency signal: rolling 1-minute request count, scaled into
/// `+0.0..+0.4`. `baseline` is the count above which the signal saturates.
pub fn frequency_signal(requests_last_minute: u64, baseline: u64) -> Signal {
    let ratio = requests_last_minute as f32 / baseline.max(1) as f32;
    Signal::new("frequency", ratio.min(1.0) * 0.4)
}

/// Maps a fused score to a coarse category.
pub fn classify_category(score: f32, cfg: &HeuristicsConfig) -> Category {
    if score >= cfg.hostile_t {
        Category::Hostile
    } else if score >= cfg.suspicious_t {
        Category::Suspicious
    } else {
        Category::Benign
    }
}

/// Pure action-mapping function over `(score, thresholds, existing block)`.
/// Strictness tie-break is expressed by evaluation order (block > challenge
/// > tarpit > none); an existing live block is never downgraded.
pub fn decide_action(
    score: f32,
    cfg: &HeuristicsConfig,
    challenges_enabled: bool,
    existing_block_ttl: Option<Duration>,
) -> Action {
    if existing_block_ttl.is_some() {
        return Action::Block;
    }
    if score >= cfg.hostile_t {
        Action::Block
    } else if score >= cfg.captcha_lo {
        if challenges_enabled { Action::Challenge } else { Action::Tarpit }
    } else if score >= cfg.suspicious_t {
        Action::Tarpit
    } else {
        Action::None
    }
}

pub struct Scorer {
    heuristics: HeuristicsConfig,
    reputation: ReputationConfig,
    classifier_cfg: ClassifierConfig,
    llm_cfg: LlmConfig,
    challenges_enabled: bool,
    classifier: Arc<dyn Classify>,
    http: reqwest::Client,
    store: Arc<Store>,
    community_endpoint: Option<String>,
    community_timeout: Duration,
    block_ttl: Duration,
}

pub struct ScorerParams {
    pub heuristics: HeuristicsConfig,
    pub reputation: ReputationConfig,
    pub classifier_cfg: ClassifierConfig,
    pub llm_cfg: LlmConfig,
    pub challenges_enabled: bool,
    pub community_endpoint: Option<String>,
    pub community_timeout: Duration,
    pub block_ttl: Duration,
}

impl Scorer {
    pub fn new(params: ScorerParams, store: Arc<Store>) -> Self {
        let classifier: Arc<dyn Classify> = match &params.classifier_cfg.external_classification_api_url {
            Some(url) => Arc::new(HttpClassifier::new(
                url.clone(),
                Duration::from_millis(params.classifier_cfg.external_api_timeout_ms),
            )),
            None => Arc::new(NoopClassifier),
        };

        Self {
            heuristics: params.heuristics,
            reputation: params.reputation,
            classifier_cfg: params.classifier_cfg,
            llm_cfg: params.llm_cfg,
            challenges_enabled: params.challenges_enabled,
            classifier,
            http: reqwest::Client::new(),
            store,
            community_endpoint: params.community_endpoint,
            community_timeout: params.community_timeout,
            block_ttl: params.block_ttl,
            // existing_block_ttl is threaded through `score()` from the
            // caller's `is_blocked` check, not stored here.
        }
    }

    /// Fuses signals into a [`Verdict`] and, on a `Block` action, writes the
    /// blocklist entry and (for hostile verdicts) fires the community
    /// report. `currently_blocked` should come from the Gate's own
    /// `is_blocked` check so an already-blocked IP's verdict never
    /// downgrades the existing block.
    pub async fn score(&self, features: &FeatureVector, hostile_uas: &[String], currently_blocked: bool) -> Verdict {
        let ua = ua_reputation_signal(&features.user_agent, hostile_uas);
        let headers = header_anomaly_signal(features.missing_accept_language, features.missing_referrer, false);
        let frequency = frequency_signal(features.requests_last_minute, 60);

        let mut score = (ua.contribution + headers.contribution + frequency.contribution).clamp(0.0, 1.0);
        let mut signals = vec![ua, headers, frequency];

        if score >= self.heuristics.score_unsure_lo && score <= self.heuristics.score_unsure_hi {
            if self.reputation.enable_ip_reputation {
                if let Some(url) = &self.reputation.ip_reputation_api_url {
                    let timeout = Duration::from_millis(self.reputation.ip_reputation_timeout_ms);
                    match classify::ip_reputation(&self.http, url, timeout, &features.ip).await {
                        Ok(malicious_score) if malicious_score >= self.reputation.min_malicious_threshold => {
                            score = (score + self.reputation.malicious_score_bonus).clamp(0.0, 1.0);
                            signals.push(Signal::new("ip_reputation", self.reputation.malicious_score_bonus));
                        }
                        Ok(_) => signals.push(Signal::new("ip_reputation", 0.0)),
                        Err(e) => signals.push(Signal::new("ip_reputation", 0.0).with_detail(e.to_string())),
                    }
                }
            }

            if self.classifier_cfg.external_classification_api_url.is_some() {
                match self.classifier.classify(features).await {
                    Ok(probability) => {
                        let contribution = probability * self.classifier_cfg.classifier_weight;
                        score = (score + contribution).clamp(0.0, 1.0);
                        signals.push(Signal::new("classifier", contribution));
                    }
                    Err(e) => signals.push(Signal::new("classifier", 0.0).with_detail(e.to_string())),
                }
            }

            if let Some(url) = &self.llm_cfg.local_llm_api_url {
                let timeout = Duration::from_millis(self.llm_cfg.local_llm_timeout_ms);
                match classify::llm_second_opinion(&self.http, url, self.llm_cfg.local_llm_model.as_deref(), timeout, features).await {
                    Ok(nudge) => {
                        score = (score + nudge).clamp(0.0, 1.0);
                        signals.push(Signal::new("llm_opinion", nudge));
                    }
                    Err(e) => signals.push(Signal::new("llm_opinion", 0.0).with_detail(e.to_string())),
                }
            }
        }

        let category = classify_category(score, &self.heuristics);
        let existing_block_ttl = currently_blocked.then_some(Duration::from_secs(1));
        let action = decide_action(score, &self.heuristics, self.challenges_enabled, existing_block_ttl);

        if action == Action::Block && !currently_blocked {
            if let Err(e) = self.store.block(&features.ip, self.block_ttl, "scorer_verdict").await {
                tracing::warn!(error = %e, ip = %features.ip, "scorer failed to write block entry");
            }
            if category == Category::Hostile {
                if let Some(endpoint) = &self.community_endpoint {
                    community_report::report(
                        self.http.clone(),
                        endpoint.clone(),
                        self.community_timeout,
                        community_report::Report { ip: features.ip.clone(), reason: "scorer_verdict".into(), score },
                    );
                }
            }
        }

        Verdict { score, category, action, signals }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heuristics() -> HeuristicsConfig {
        HeuristicsConfig {
            edge_heuristic_threshold: 0.6,
            suspicious_t: 0.3,
            captcha_lo: 0.5,
            hostile_t: 0.7,
            score_unsure_lo: 0.3,
            score_unsure_hi: 0.65,
        }
    }

    #[test]
    fn ua_reputation_flags_empty_and_known_hostile_agents() {
        let hostile = vec!["curl".to_string(), "scrapy".to_string()];
        assert_eq!(ua_reputation_signal("", &hostile).contribution, 0.5);
        assert_eq!(ua_reputation_signal("curl/8.0", &hostile).contribution, 0.5);
        assert_eq!(ua_reputation_signal("Mozilla/5.0 (Macintosh)", &hostile).contribution, 0.0);
    }

    #[test]
    fn header_anomalies_cap_at_point_three() {
        let signal = header_anomaly_signal(true, true, true);
        assert!((signal.contribution - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn frequency_saturates_at_baseline() {
        assert!((frequency_signal(1000, 60).contribution - 0.4).abs() < f32::EPSILON);
        assert!(frequency_signal(0, 60).contribution < 0.01);
    }

    #[test]
    fn decide_action_boundary_hostile_blocks() {
        let cfg = heuristics();
        assert_eq!(decide_action(0.7, &cfg, true, None), Action::Block);
    }

    #[test]
    fn decide_action_boundary_suspicious_tarpits() {
        let cfg = heuristics();
        assert_eq!(decide_action(0.3, &cfg, true, None), Action::Tarpit);
    }

    #[test]
    fn decide_action_boundary_captcha_lo_challenges_when_enabled() {
        let cfg = heuristics();
        assert_eq!(decide_action(0.5, &cfg, true, None), Action::Challenge);
        assert_eq!(decide_action(0.5, &cfg, false, None), Action::Tarpit);
    }

    #[test]
    fn decide_action_never_downgrades_existing_block() {
        let cfg = heuristics();
        assert_eq!(decide_action(0.0, &cfg, true, Some(Duration::from_secs(10))), Action::Block);
    }

    #[test]
    fn decide_action_below_suspicious_is_none() {
        let cfg = heuristics();
        assert_eq!(decide_action(0.1, &cfg, true, None), Action::None);
    }

    #[test]
    fn classify_category_matches_thresholds() {
        let cfg = heuristics();
        assert_eq!(classify_category(0.8, &cfg), Category::Hostile);
        assert_eq!(classify_category(0.4, &cfg), Category::Suspicious);
        assert_eq!(classify_category(0.1, &cfg), Category::Benign);
    }

    #[test]
    fn score_fusion_matches_scenario_five() {
        // classifier 0.6 * weight 0.5 = 0.3; heuristic adds 0.2; frequency adds 0.1
        let cfg = heuristics();
        let fused = 0.3 + 0.2 + 0.1_f32;
        assert_eq!(classify_category(fused, &cfg), Category::Suspicious);
        assert_eq!(decide_action(fused, &cfg, false, None), Action::Tarpit);
        assert_eq!(decide_action(fused, &cfg, true, None), Action::Challenge);
    }
}

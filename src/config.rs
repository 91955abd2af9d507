//! Configuration types for tarwall.
//!
//! Config is loaded once at startup from a TOML file (plus a handful of
//! `*_env` indirections for secrets) and validated before the server opens
//! any ports. Invalid configs are rejected with a clear error rather than
//! silently falling back to defaults — this is the one place in the whole
//! crate where a failure is allowed to be fatal (see `SPEC_FULL.md` §7).
//!
//! # Example
//! ```toml
//! [determinism]
//! system_seed = "prod-seed-2026"
//!
//! [origin]
//! real_backend_host = "http://127.0.0.1:3000"
//!
//! [tarpit]
//! max_hops = 12
//! hop_window_seconds = 600
//! ```

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Top-level configuration, loaded once at startup and hot-reloaded on change
/// (same polling-`mtime` mechanism as the teacher gateway's config watcher).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub tenant: TenantConfig,
    pub determinism: DeterminismConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub tarpit: TarpitConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub heuristics: HeuristicsConfig,
    #[serde(default)]
    pub challenge: ChallengeConfig,
    #[serde(default)]
    pub reputation: ReputationConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    pub origin: OriginConfig,
    #[serde(default)]
    pub robots: RobotsConfig,
    #[serde(default)]
    pub markov: MarkovConfig,
    #[serde(default)]
    pub community: CommunityConfig,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config: Self = toml::from_str(&content).context("parsing config TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.determinism.system_seed.is_empty(),
            "determinism.system_seed must not be empty"
        );
        anyhow::ensure!(
            !self.origin.real_backend_host.is_empty(),
            "origin.real_backend_host is required"
        );

        let h = &self.heuristics;
        anyhow::ensure!(
            (0.0..=1.0).contains(&h.edge_heuristic_threshold),
            "heuristics.edge_heuristic_threshold must be in [0, 1]"
        );
        for (name, v) in [
            ("suspicious_t", h.suspicious_t),
            ("captcha_lo", h.captcha_lo),
            ("hostile_t", h.hostile_t),
        ] {
            anyhow::ensure!((0.0..=1.0).contains(&v), "heuristics.{name} must be in [0, 1]");
        }
        anyhow::ensure!(
            h.suspicious_t <= h.captcha_lo,
            "heuristics.suspicious_t ({}) must be <= heuristics.captcha_lo ({})",
            h.suspicious_t,
            h.captcha_lo
        );
        anyhow::ensure!(
            h.captcha_lo <= h.hostile_t,
            "heuristics.captcha_lo ({}) must be <= heuristics.hostile_t ({})",
            h.captcha_lo,
            h.hostile_t
        );
        anyhow::ensure!(
            h.score_unsure_lo <= h.score_unsure_hi,
            "heuristics.score_unsure_lo must be <= heuristics.score_unsure_hi"
        );

        anyhow::ensure!(self.tarpit.max_hops > 0, "tarpit.max_hops must be > 0");
        anyhow::ensure!(
            self.tarpit.chunk_bytes_min > 0 && self.tarpit.chunk_bytes_min <= self.tarpit.chunk_bytes_max,
            "tarpit.chunk_bytes_min must be > 0 and <= chunk_bytes_max"
        );
        anyhow::ensure!(
            self.tarpit.delay_ms_min <= self.tarpit.delay_ms_max,
            "tarpit.delay_ms_min must be <= delay_ms_max"
        );
        anyhow::ensure!(
            self.tarpit.block_ttl_seconds > 0,
            "blocklist TTL must be > 0 (an entry with TTL 0 is absent)"
        );

        Ok(())
    }
}

/// Multi-tenancy namespace. `TENANT_ID` is treated as a mandatory Store-key
/// prefix — see `DESIGN.md` for the Open Question resolution.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TenantConfig {
    #[serde(default = "defaults::tenant_id")]
    pub tenant_id: String,
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self { tenant_id: defaults::tenant_id() }
    }
}

/// Primary determinism seed for all tarpit/content generation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeterminismConfig {
    pub system_seed: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "defaults::listen_port")]
    pub listen_port: u16,
    #[serde(default = "defaults::admin_port")]
    pub admin_port: u16,
    #[serde(default)]
    pub admin_token_env: Option<String>,
    #[serde(default = "defaults::traffic_log_capacity")]
    pub traffic_log_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_port: defaults::listen_port(),
            admin_port: defaults::admin_port(),
            admin_token_env: None,
            traffic_log_capacity: defaults::traffic_log_capacity(),
        }
    }
}

impl ServerConfig {
    pub fn admin_token(&self) -> Option<String> {
        self.admin_token_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|t| !t.is_empty())
    }
}

/// Shared Redis-backed Blocklist & Hop Store.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "defaults::redis_url")]
    pub redis_url: String,
    #[serde(default = "defaults::store_deadline_ms")]
    pub deadline_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: defaults::redis_url(),
            deadline_ms: defaults::store_deadline_ms(),
        }
    }
}

/// `TAR_PIT_MAX_HOPS`, `TAR_PIT_HOP_WINDOW_SECONDS`, `BLOCKLIST_TTL_SECONDS`,
/// and the slow-stream/page-size knobs from §4.3.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TarpitConfig {
    #[serde(default = "defaults::max_hops")]
    pub max_hops: u32,
    #[serde(default = "defaults::hop_window_seconds")]
    pub hop_window_seconds: u64,
    #[serde(default = "defaults::block_ttl_seconds")]
    pub block_ttl_seconds: u64,
    #[serde(default = "defaults::chunk_bytes_min")]
    pub chunk_bytes_min: usize,
    #[serde(default = "defaults::chunk_bytes_max")]
    pub chunk_bytes_max: usize,
    #[serde(default = "defaults::delay_ms_min")]
    pub delay_ms_min: u64,
    #[serde(default = "defaults::delay_ms_max")]
    pub delay_ms_max: u64,
    #[serde(default = "defaults::page_max_bytes")]
    pub page_max_bytes: usize,
    #[serde(default = "defaults::paragraph_count_min")]
    pub paragraph_count_min: u32,
    #[serde(default = "defaults::paragraph_count_max")]
    pub paragraph_count_max: u32,
    #[serde(default = "defaults::words_per_paragraph")]
    pub words_per_paragraph: u32,
    #[serde(default = "defaults::outbound_links_per_page")]
    pub outbound_links_per_page: u32,
    #[serde(default = "defaults::slug_space")]
    pub slug_space: u64,
    /// Whether a Scorer-issued block also clears this IP's hop/rate counters.
    /// Open Question in `spec.md` §9 — resolved `false` by default.
    #[serde(default)]
    pub clear_counters_on_scorer_block: bool,
}

impl Default for TarpitConfig {
    fn default() -> Self {
        Self {
            max_hops: defaults::max_hops(),
            hop_window_seconds: defaults::hop_window_seconds(),
            block_ttl_seconds: defaults::block_ttl_seconds(),
            chunk_bytes_min: defaults::chunk_bytes_min(),
            chunk_bytes_max: defaults::chunk_bytes_max(),
            delay_ms_min: defaults::delay_ms_min(),
            delay_ms_max: defaults::delay_ms_max(),
            page_max_bytes: defaults::page_max_bytes(),
            paragraph_count_min: defaults::paragraph_count_min(),
            paragraph_count_max: defaults::paragraph_count_max(),
            words_per_paragraph: defaults::words_per_paragraph(),
            outbound_links_per_page: defaults::outbound_links_per_page(),
            slug_space: defaults::slug_space(),
            clear_counters_on_scorer_block: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "defaults::rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { rate_limit_per_minute: defaults::rate_limit_per_minute() }
    }
}

/// `EDGE_HEURISTIC_THRESHOLD`, `SUSPICIOUS_T`, `CAPTCHA_LO`, `HOSTILE_T`, and
/// the uncertainty band gating external scorer signals.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HeuristicsConfig {
    #[serde(default = "defaults::edge_heuristic_threshold")]
    pub edge_heuristic_threshold: f32,
    #[serde(default = "defaults::suspicious_t")]
    pub suspicious_t: f32,
    #[serde(default = "defaults::captcha_lo")]
    pub captcha_lo: f32,
    #[serde(default = "defaults::hostile_t")]
    pub hostile_t: f32,
    #[serde(default = "defaults::score_unsure_lo")]
    pub score_unsure_lo: f32,
    #[serde(default = "defaults::score_unsure_hi")]
    pub score_unsure_hi: f32,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            edge_heuristic_threshold: defaults::edge_heuristic_threshold(),
            suspicious_t: defaults::suspicious_t(),
            captcha_lo: defaults::captcha_lo(),
            hostile_t: defaults::hostile_t(),
            score_unsure_lo: defaults::score_unsure_lo(),
            score_unsure_hi: defaults::score_unsure_hi(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChallengeConfig {
    #[serde(default)]
    pub enable_captcha_trigger: bool,
    #[serde(default = "defaults::challenge_ttl_seconds")]
    pub challenge_ttl_seconds: u64,
    #[serde(default = "defaults::challenge_trust_window_seconds")]
    pub trust_window_seconds: u64,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            enable_captcha_trigger: false,
            challenge_ttl_seconds: defaults::challenge_ttl_seconds(),
            trust_window_seconds: defaults::challenge_trust_window_seconds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReputationConfig {
    #[serde(default)]
    pub enable_ip_reputation: bool,
    #[serde(default)]
    pub ip_reputation_api_url: Option<String>,
    #[serde(default = "defaults::external_timeout_ms")]
    pub ip_reputation_timeout_ms: u64,
    #[serde(default = "defaults::ip_rep_bonus")]
    pub malicious_score_bonus: f32,
    #[serde(default = "defaults::ip_rep_min_malicious_threshold")]
    pub min_malicious_threshold: f32,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            enable_ip_reputation: false,
            ip_reputation_api_url: None,
            ip_reputation_timeout_ms: defaults::external_timeout_ms(),
            malicious_score_bonus: defaults::ip_rep_bonus(),
            min_malicious_threshold: defaults::ip_rep_min_malicious_threshold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub external_classification_api_url: Option<String>,
    #[serde(default = "defaults::external_timeout_ms")]
    pub external_api_timeout_ms: u64,
    #[serde(default = "defaults::classifier_weight")]
    pub classifier_weight: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            external_classification_api_url: None,
            external_api_timeout_ms: defaults::external_timeout_ms(),
            classifier_weight: defaults::classifier_weight(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub local_llm_api_url: Option<String>,
    #[serde(default)]
    pub local_llm_model: Option<String>,
    #[serde(default = "defaults::external_timeout_ms")]
    pub local_llm_timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            local_llm_api_url: None,
            local_llm_model: None,
            local_llm_timeout_ms: defaults::external_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OriginConfig {
    pub real_backend_host: String,
    #[serde(default = "defaults::origin_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RobotsConfig {
    #[serde(default = "defaults::robots_path")]
    pub path: String,
    #[serde(default = "defaults::robots_reload_sec")]
    pub reload_sec: u64,
    /// User-Agent substrings recognised as benign/approved bots (e.g. search
    /// engine crawlers) — matched case-insensitively, substring match.
    #[serde(default = "defaults::benign_bot_uas")]
    pub benign_bot_uas: Vec<String>,
    /// User-Agent substrings that are immediately tarpitted (§4.2 step 3).
    #[serde(default = "defaults::hostile_uas")]
    pub hostile_uas: Vec<String>,
}

impl Default for RobotsConfig {
    fn default() -> Self {
        Self {
            path: defaults::robots_path(),
            reload_sec: defaults::robots_reload_sec(),
            benign_bot_uas: defaults::benign_bot_uas(),
            hostile_uas: defaults::hostile_uas(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarkovConfig {
    #[serde(default = "defaults::markov_db_path")]
    pub db_path: String,
    #[serde(default = "defaults::max_walk_steps")]
    pub max_walk_steps: u32,
    #[serde(default = "defaults::max_distinct_words")]
    pub max_distinct_words: u64,
}

impl Default for MarkovConfig {
    fn default() -> Self {
        Self {
            db_path: defaults::markov_db_path(),
            max_walk_steps: defaults::max_walk_steps(),
            max_distinct_words: defaults::max_distinct_words(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommunityConfig {
    #[serde(default)]
    pub report_endpoint: Option<String>,
    #[serde(default = "defaults::external_timeout_ms")]
    pub report_timeout_ms: u64,
}

impl Default for CommunityConfig {
    fn default() -> Self {
        Self {
            report_endpoint: None,
            report_timeout_ms: defaults::external_timeout_ms(),
        }
    }
}

mod defaults {
    pub fn tenant_id() -> String { "default".into() }
    pub fn listen_port() -> u16 { 8080 }
    pub fn admin_port() -> u16 { 9090 }
    pub fn traffic_log_capacity() -> usize { 500 }
    pub fn redis_url() -> String { "redis://127.0.0.1:6379".into() }
    pub fn store_deadline_ms() -> u64 { 20 }
    pub fn max_hops() -> u32 { 12 }
    pub fn hop_window_seconds() -> u64 { 600 }
    pub fn block_ttl_seconds() -> u64 { 3600 }
    pub fn chunk_bytes_min() -> usize { 64 }
    pub fn chunk_bytes_max() -> usize { 256 }
    pub fn delay_ms_min() -> u64 { 50 }
    pub fn delay_ms_max() -> u64 { 400 }
    pub fn page_max_bytes() -> usize { 256 * 1024 }
    pub fn paragraph_count_min() -> u32 { 3 }
    pub fn paragraph_count_max() -> u32 { 12 }
    pub fn words_per_paragraph() -> u32 { 60 }
    pub fn outbound_links_per_page() -> u32 { 8 }
    pub fn slug_space() -> u64 { 1_000_000 }
    pub fn rate_limit_per_minute() -> u32 { 120 }
    pub fn edge_heuristic_threshold() -> f32 { 0.6 }
    pub fn suspicious_t() -> f32 { 0.3 }
    pub fn captcha_lo() -> f32 { 0.5 }
    pub fn hostile_t() -> f32 { 0.7 }
    pub fn score_unsure_lo() -> f32 { 0.3 }
    pub fn score_unsure_hi() -> f32 { 0.65 }
    pub fn challenge_ttl_seconds() -> u64 { 300 }
    pub fn challenge_trust_window_seconds() -> u64 { 600 }
    pub fn external_timeout_ms() -> u64 { 2_000 }
    pub fn ip_rep_bonus() -> f32 { 0.3 }
    pub fn ip_rep_min_malicious_threshold() -> f32 { 0.8 }
    pub fn classifier_weight() -> f32 { 0.5 }
    pub fn origin_timeout_ms() -> u64 { 30_000 }
    pub fn robots_path() -> String { "/etc/tarwall/robots.txt".into() }
    pub fn robots_reload_sec() -> u64 { 60 }
    pub fn markov_db_path() -> String { "/var/lib/tarwall/markov.sqlite".into() }
    pub fn max_walk_steps() -> u32 { 200 }
    pub fn max_distinct_words() -> u64 { 200_000 }

    pub fn benign_bot_uas() -> Vec<String> {
        vec![
            "Googlebot".into(),
            "Bingbot".into(),
            "Slurp".into(),
            "DuckDuckBot".into(),
            "Baiduspider".into(),
        ]
    }

    pub fn hostile_uas() -> Vec<String> {
        vec![
            "curl".into(),
            "wget".into(),
            "python-requests".into(),
            "scrapy".into(),
            "GPTBot".into(),
            "CCBot".into(),
            "ClaudeBot".into(),
            "Bytespider".into(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config() -> Config {
        toml::from_str(
            r#"
            [determinism]
            system_seed = "test-seed"

            [origin]
            real_backend_host = "http://localhost:3000"
            "#,
        )
        .expect("minimal config should parse")
    }

    #[test]
    fn minimal_config_parses_and_validates() {
        let config = minimal_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.tenant.tenant_id, "default");
        assert_eq!(config.tarpit.max_hops, 12);
    }

    #[test]
    fn validation_rejects_inverted_thresholds() {
        let mut config = minimal_config();
        config.heuristics.hostile_t = 0.2;
        config.heuristics.captcha_lo = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_missing_seed() {
        let mut config = minimal_config();
        config.determinism.system_seed.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_inverted_chunk_bounds() {
        let mut config = minimal_config();
        config.tarpit.chunk_bytes_min = 500;
        config.tarpit.chunk_bytes_max = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn boundary_thresholds_are_accepted_when_equal() {
        let mut config = minimal_config();
        config.heuristics.suspicious_t = 0.5;
        config.heuristics.captcha_lo = 0.5;
        config.heuristics.hostile_t = 0.5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_tenant_is_default_string() {
        assert_eq!(TenantConfig::default().tenant_id, "default");
    }

    #[test]
    fn missing_origin_section_fails_to_parse() {
        let result: Result<Config, _> = toml::from_str(
            r#"
            [determinism]
            system_seed = "test-seed"
            "#,
        );
        assert!(result.is_err());
    }
}

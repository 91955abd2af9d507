//! Shared application state injected into every handler via [`axum::extract::State`].
//!
//! Mirrors the teacher gateway's `RouterState`: an atomically-swappable live
//! config behind an `RwLock<Arc<Config>>` (the lock is held only for the
//! duration of an `Arc::clone`), plus the long-lived handles every component
//! needs — the Store, Markov backend, Tarpit generator, Escalation Scorer,
//! robots.txt snapshot, traffic log, and resolved admin token.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::config::Config;
use crate::gate::robots::RobotsRules;
use crate::metrics::MetricsSink;
use crate::origin::Origin;
use crate::scorer::Scorer;
use crate::store::Store;
use crate::tarpit::Generator as TarpitGenerator;
use crate::traffic::TrafficLog;

pub struct AppState {
    config_lock: RwLock<Arc<Config>>,
    /// Path to the config file on disk — used by the hot-reload background task.
    pub config_path: PathBuf,
    pub traffic: Arc<TrafficLog>,
    pub started_at: std::time::Instant,
    pub admin_token: Option<String>,
    pub store: Arc<Store>,
    pub tarpit: Arc<TarpitGenerator>,
    pub scorer: Arc<Scorer>,
    pub origin: Arc<Origin>,
    pub metrics: Arc<dyn MetricsSink>,
    /// Process-wide read-only robots.txt snapshot; reloads swap this `Arc`
    /// atomically, never mutate in place (`SPEC_FULL.md` §5).
    robots_lock: RwLock<Arc<RobotsRules>>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<Config>,
        config_path: PathBuf,
        traffic: Arc<TrafficLog>,
        store: Arc<Store>,
        tarpit: Arc<TarpitGenerator>,
        scorer: Arc<Scorer>,
        origin: Arc<Origin>,
        metrics: Arc<dyn MetricsSink>,
        robots: Arc<RobotsRules>,
    ) -> Self {
        let admin_token = config.server.admin_token();
        Self {
            config_lock: RwLock::new(config),
            config_path,
            traffic,
            started_at: std::time::Instant::now(),
            admin_token,
            store,
            tarpit,
            scorer,
            origin,
            metrics,
            robots_lock: RwLock::new(robots),
        }
    }

    /// Returns a snapshot of the current live config. The lock is held only
    /// for the duration of `Arc::clone` (nanoseconds), so callers get a
    /// stable reference with no contention risk.
    pub fn config(&self) -> Arc<Config> {
        self.config_lock.read().expect("config lock poisoned").clone()
    }

    /// Atomically replaces the live config. Called only from the hot-reload task.
    pub fn replace_config(&self, new: Arc<Config>) {
        *self.config_lock.write().expect("config lock poisoned") = new;
    }

    pub fn robots(&self) -> Arc<RobotsRules> {
        self.robots_lock.read().expect("robots lock poisoned").clone()
    }

    pub fn replace_robots(&self, new: Arc<RobotsRules>) {
        *self.robots_lock.write().expect("robots lock poisoned") = new;
    }
}

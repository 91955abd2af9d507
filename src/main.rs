use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};

use tarwall::api;
use tarwall::config::Config;
use tarwall::gate::robots::RobotsRules;
use tarwall::markov::Backend as MarkovBackend;
use tarwall::metrics::TracingMetricsSink;
use tarwall::origin::Origin;
use tarwall::scorer::{Scorer, ScorerParams};
use tarwall::state::AppState;
use tarwall::store::Store;
use tarwall::tarpit::Generator as TarpitGenerator;
use tarwall::traffic::TrafficLog;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // When invoked as a Docker HEALTHCHECK, hit /healthz and exit immediately.
    if std::env::args().nth(1).as_deref() == Some("--healthcheck") {
        return healthcheck().await;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tarwall=info,tower_http=warn".into()),
        )
        .init();

    let config_path = std::env::var("TARWALL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/etc/tarwall/config.toml"));

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!(
        client_port = config.server.listen_port,
        admin_port = config.server.admin_port,
        tenant = %config.tenant.tenant_id,
        "tarwall starting"
    );

    // Leaves-first init order: Store -> Markov Backend -> Tarpit Generator
    // -> Scorer -> robots.txt -> AppState.
    let store = Arc::new(
        Store::connect(
            &config.store.redis_url,
            Duration::from_millis(config.store.deadline_ms),
            config.tenant.tenant_id.clone(),
        )
        .await
        .context("connecting to the Blocklist & Hop Store")?,
    );

    let markov = Arc::new(
        MarkovBackend::open(&config.markov.db_path, config.markov.max_walk_steps)
            .await
            .context("opening the Markov Content Backend")?,
    );

    let tarpit = Arc::new(TarpitGenerator::new(
        config.determinism.system_seed.clone(),
        config.tarpit.clone(),
        Arc::clone(&markov),
        Arc::clone(&store),
    ));

    let scorer = Arc::new(Scorer::new(
        ScorerParams {
            heuristics: config.heuristics.clone(),
            reputation: config.reputation.clone(),
            classifier_cfg: config.classifier.clone(),
            llm_cfg: config.llm.clone(),
            challenges_enabled: config.challenge.enable_captcha_trigger,
            community_endpoint: config.community.report_endpoint.clone(),
            community_timeout: Duration::from_millis(config.community.report_timeout_ms),
            block_ttl: Duration::from_secs(config.tarpit.block_ttl_seconds),
        },
        Arc::clone(&store),
    ));

    let origin = Arc::new(
        Origin::new(config.origin.real_backend_host.clone(), config.origin.timeout_ms)
            .context("building the origin reverse-proxy client")?,
    );

    let robots = Arc::new(load_robots(&config.robots.path));

    let traffic_log = Arc::new(TrafficLog::new(config.server.traffic_log_capacity));
    let metrics: Arc<dyn tarwall::metrics::MetricsSink> = Arc::new(TracingMetricsSink);
    let config = Arc::new(config);

    let state = Arc::new(AppState::new(
        Arc::clone(&config),
        config_path.clone(),
        Arc::clone(&traffic_log),
        Arc::clone(&store),
        Arc::clone(&tarpit),
        Arc::clone(&scorer),
        Arc::clone(&origin),
        Arc::clone(&metrics),
        Arc::clone(&robots),
    ));

    tokio::spawn(config_watcher(Arc::clone(&state)));
    tokio::spawn(robots_watcher(Arc::clone(&state)));

    let client_addr: SocketAddr = format!("0.0.0.0:{}", config.server.listen_port).parse()?;
    let admin_addr: SocketAddr = format!("0.0.0.0:{}", config.server.admin_port).parse()?;

    info!(%client_addr, "edge API listening");
    info!(%admin_addr, "admin API listening");

    let client_listener = tokio::net::TcpListener::bind(client_addr).await?;
    let admin_listener = tokio::net::TcpListener::bind(admin_addr).await?;

    let trace_layer = || {
        tower_http::trace::TraceLayer::new_for_http()
            .make_span_with(tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO))
            .on_response(tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO))
    };

    let client_app = api::edge::router(Arc::clone(&state))
        .layer(axum::middleware::from_fn(api::request_id::request_id_middleware))
        .layer(trace_layer());

    let admin_app = api::admin::router(Arc::clone(&state))
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state),
            api::admin_auth::admin_auth_middleware,
        ))
        .layer(axum::middleware::from_fn(api::request_id::request_id_middleware))
        .layer(trace_layer());

    tokio::select! {
        result = axum::serve(client_listener, client_app.into_make_service_with_connect_info::<SocketAddr>()) => {
            result.context("edge API server error")?;
        }
        result = axum::serve(admin_listener, admin_app.into_make_service_with_connect_info::<SocketAddr>()) => {
            result.context("admin API server error")?;
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

fn load_robots(path: &str) -> RobotsRules {
    match std::fs::read_to_string(path) {
        Ok(content) => RobotsRules::parse(&content),
        Err(e) => {
            warn!(path, error = %e, "robots.txt unreadable at startup, defaulting to an empty (allow-all) ruleset");
            RobotsRules::empty()
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Lightweight healthcheck: GET /healthz and exit 0 on 200, 1 otherwise.
/// Invoked via `tarwall --healthcheck` from Docker HEALTHCHECK.
async fn healthcheck() -> anyhow::Result<()> {
    let port = std::env::var("TARWALL_CLIENT_PORT")
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(8080);

    let url = format!("http://127.0.0.1:{port}/healthz");
    let resp = reqwest::get(&url).await?;

    if resp.status().is_success() {
        std::process::exit(0);
    } else {
        std::process::exit(1);
    }
}

/// Background task: polls the config file every 5 seconds and hot-reloads on
/// change, using filesystem `mtime` for change detection. Parse/validation
/// failures are logged and ignored; the running config is unchanged.
async fn config_watcher(state: Arc<AppState>) {
    let path = state.config_path.clone();

    let mut last_mtime = std::fs::metadata(&path).and_then(|m| m.modified()).ok();

    let mut interval = tokio::time::interval(Duration::from_secs(5));
    interval.tick().await;

    loop {
        interval.tick().await;

        let mtime = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
        if mtime == last_mtime {
            continue;
        }

        match Config::load(&path) {
            Ok(new_cfg) => {
                state.replace_config(Arc::new(new_cfg));
                info!(path = %path.display(), "config hot-reloaded");
                last_mtime = mtime;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config reload failed — keeping previous config");
            }
        }
    }
}

/// Background task: reloads robots.txt every `config.robots.reload_sec`. A
/// reload that fails to read the file is logged and ignored — the previous
/// ruleset keeps serving.
async fn robots_watcher(state: Arc<AppState>) {
    loop {
        let reload_sec = state.config().robots.reload_sec.max(1);
        tokio::time::sleep(Duration::from_secs(reload_sec)).await;

        let path = state.config().robots.path.clone();
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                state.replace_robots(Arc::new(RobotsRules::parse(&content)));
                info!(path, "robots.txt reloaded");
            }
            Err(e) => {
                warn!(path, error = %e, "robots.txt reload failed — keeping previous ruleset");
            }
        }
    }
}

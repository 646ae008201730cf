//! Fact-of-the-day service: binary entrypoint.
//! Loads configuration, starts the collector loop and serves the HTTP API.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use shuttle_axum::ShuttleAxum;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use daily_facts::api::{self, AppState};
use daily_facts::cache::DailyFactCache;
use daily_facts::chat::build_chat_client;
use daily_facts::config::{chat::ChatConfig, AppConfig};
use daily_facts::ingest::providers::build_sources;
use daily_facts::ingest::{Collector, Validator};
use daily_facts::metrics::Metrics;
use daily_facts::seed;
use daily_facts::store::{FactStore, MemoryFactStore};

/// Compact logs by default, JSON lines with `LOG_FORMAT=json`.
/// The platform may already have installed a subscriber; that one wins.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("daily_facts=info,ingest=info,warn"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        info!("tracing subscriber already installed");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::from_env().context("loading configuration")?;

    let enabled = cfg.enabled_sources().context("loading enabled sources")?;
    let sources =
        build_sources(&cfg.source_settings(), enabled.kinds()).context("building sources")?;

    let store: Arc<dyn FactStore> = Arc::new(MemoryFactStore::new(cfg.dedup_content));
    let collector = Arc::new(
        Collector::new(sources, Arc::clone(&store))
            .with_validator(Validator::new(cfg.content_policy()))
            .with_settings(cfg.collector_settings()),
    );

    if cfg.seed_facts {
        let report = seed::seed_store(store.as_ref(), collector.validator(), Utc::now())
            .await
            .context("seeding store")?;
        info!(inserted = report.inserted, existing = report.existing, "seed facts");
    }

    let metrics = Metrics::init(
        cfg.collect_interval.as_secs(),
        cfg.daily_cache_ttl.as_millis() as u64,
    )?;

    let chat_cfg = ChatConfig::load_or_disabled(&cfg.chat_config_path)
        .with_context(|| format!("loading {}", cfg.chat_config_path.display()))?;
    let chat = build_chat_client(&chat_cfg);

    // Lives as long as the process; the collector loop ends with it.
    let shutdown = CancellationToken::new();
    if cfg.collect_on_start {
        Arc::clone(&collector).spawn(shutdown.clone());
    } else {
        warn!("COLLECT_ON_START is off; use POST /admin/collect to run a pass");
    }

    info!(
        sources = ?collector.source_names(),
        interval_secs = cfg.collect_interval.as_secs(),
        threshold = cfg.score_threshold,
        chat = chat.provider_name(),
        "service configured"
    );

    let state = AppState {
        store,
        cache: Arc::new(DailyFactCache::new(cfg.daily_cache_ttl)),
        collector,
        chat,
    };
    let router = api::router(state).merge(metrics.router());

    Ok(router.into())
}

//! Runs one simulated new-tab session against the virtual media backend.
//!
//! Usage: `wxloop-sim [weather] [--force-refresh | --settings-change]`
//!
//! Environment:
//! - `WXLOOP_STATE_PATH`: JSON file persisting gate state across runs (in-memory otherwise)
//! - `WXLOOP_CATALOG_MANIFEST`: clip manifest (built-in table otherwise)
//! - `WXLOOP_SEED`: seed for reproducible draws
//! - `WXLOOP_PRINT_METRICS`: print the Prometheus snapshot on exit
//! - `WXLOOP_CLIP_SECS`: simulated clip length
//! - `LOG_FORMAT=json`: JSON logs

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wxloop_engine::{
    load_settings, metrics, Catalog, EngineConfig, EngineContext, ManifestMappingSource,
    PlaybackOrchestrator, RecordingCallbacks, SampleSource, SeededSource, StaticWeatherService,
    ThreadRngSource, VideoMappingSource,
};
use wxloop_media::VirtualMediaFactory;
use wxloop_models::{Theme, TriggerEvent, WeatherSnapshot, WeatherType};
use wxloop_storage::{JsonFileStore, KeyValueStore, MemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    let metrics_handle = if std::env::var("WXLOOP_PRINT_METRICS").is_ok() {
        Some(metrics::init_metrics().context("failed to install metrics recorder")?)
    } else {
        None
    };

    let mut weather = WeatherType::Clear;
    let mut event = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--force-refresh" => event = Some(TriggerEvent::ForceRefresh { weather_type: None }),
            "--settings-change" => event = Some(TriggerEvent::SettingsChanged),
            other => {
                weather = other
                    .parse()
                    .with_context(|| format!("unrecognised weather '{other}'"))?
            }
        }
    }

    let config = EngineConfig::from_env();
    info!("Engine config: {:?}", config);

    let store: Arc<dyn KeyValueStore> = match std::env::var("WXLOOP_STATE_PATH") {
        Ok(path) => Arc::new(JsonFileStore::new(path)),
        Err(_) => Arc::new(MemoryStore::new()),
    };

    let catalog = match std::env::var("WXLOOP_CATALOG_MANIFEST") {
        Ok(path) => match ManifestMappingSource::from_file(&path) {
            Ok(source) => Catalog::build_pools(
                WeatherType::ALL,
                Some(&source as &dyn VideoMappingSource),
                &config.tier_weights,
            ),
            Err(e) => {
                warn!(path = %path, error = %e, "Manifest unreadable, using built-in table");
                Catalog::build_pools(WeatherType::ALL, None, &config.tier_weights)
            }
        },
        Err(_) => Catalog::static_table(),
    };

    let clip_secs = std::env::var("WXLOOP_CLIP_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(2);
    let media = Arc::new(VirtualMediaFactory::new(
        Duration::from_secs(clip_secs),
        12 * 1024 * 1024,
    ));

    let rng: Box<dyn SampleSource> = match std::env::var("WXLOOP_SEED").ok().and_then(|s| s.parse().ok()) {
        Some(seed) => Box::new(SeededSource::new(seed)),
        None => Box::new(ThreadRngSource),
    };

    let ctx = EngineContext::builder(Arc::clone(&store), media)
        .with_config(config)
        .with_catalog(catalog)
        .with_rng(rng)
        .build();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = ctx.start_sweeper(shutdown_rx);

    let orchestrator = PlaybackOrchestrator::new(Arc::clone(&ctx));
    let settings = load_settings(store.as_ref()).await;
    let service = StaticWeatherService::new(Some(WeatherSnapshot::of(weather)));
    let callbacks = RecordingCallbacks::new();

    ctx.gate.begin_session().await?;
    let outcome = orchestrator
        .initialize_from_service(&service, Theme::Auto, settings, event, &callbacks)
        .await;
    ctx.gate.end_session().await?;

    let _ = shutdown_tx.send(true);
    sweeper.await.context("sweeper task failed")?;

    let report = serde_json::json!({
        "outcome": outcome.as_ref().ok(),
        "error": outcome.as_ref().err().map(|e| e.to_string()),
        "callbacks": callbacks.events(),
        "gate": ctx.gate.state().await,
        "pool": {
            "activeHandles": ctx.optimizer.stats().active_handles,
            "memoryBytes": ctx.optimizer.stats().memory_bytes,
        },
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(handle) = metrics_handle {
        println!("{}", handle.render());
    }

    outcome?;
    Ok(())
}

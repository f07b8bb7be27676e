//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use wxloop_engine::{
    Catalog, EngineConfig, EngineContext, ManualClock, PlaybackOrchestrator, SampleSource,
    SequenceSource,
};
use wxloop_media::VirtualMediaFactory;
use wxloop_models::{ClipDescriptor, ClipTier, WeatherPool, WeatherType};
use wxloop_storage::{Entries, KeyValueStore, MemoryStore, StorageError, StorageResult};

pub fn clip(weather: WeatherType, name: &str, weight: u32) -> ClipDescriptor {
    let path = format!("video/tab/{weather}/{name}.mp4");
    ClipDescriptor::new(name, path.clone(), weight, ClipTier::from_path(&path), "")
}

/// `clear = [a:80, b:20]`, `rain = [r1:50, r2:50]`.
pub fn small_catalog() -> Catalog {
    Catalog::from_pools(vec![
        WeatherPool::new(
            WeatherType::Clear,
            vec![clip(WeatherType::Clear, "a", 80), clip(WeatherType::Clear, "b", 20)],
        ),
        WeatherPool::new(
            WeatherType::Rain,
            vec![clip(WeatherType::Rain, "r1", 50), clip(WeatherType::Rain, "r2", 50)],
        ),
    ])
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        playback_timeout: Duration::from_secs(120),
        store_retry_base_delay: Duration::from_millis(1),
        ..Default::default()
    }
}

pub struct Harness {
    pub orchestrator: Arc<PlaybackOrchestrator>,
    pub ctx: Arc<EngineContext>,
    pub clock: Arc<ManualClock>,
}

pub fn harness_with(
    store: Arc<dyn KeyValueStore>,
    factory: VirtualMediaFactory,
    catalog: Catalog,
    rng: Box<dyn SampleSource>,
) -> Harness {
    let clock = Arc::new(ManualClock::default());
    let ctx = EngineContext::builder(store, Arc::new(factory))
        .with_config(test_config())
        .with_catalog(catalog)
        .with_clock(clock.clone())
        .with_rng(rng)
        .build();
    Harness {
        orchestrator: Arc::new(PlaybackOrchestrator::new(Arc::clone(&ctx))),
        ctx,
        clock,
    }
}

/// Small catalog, in-memory store, 5 second clips, first-candidate draws.
pub fn harness() -> Harness {
    harness_with(
        Arc::new(MemoryStore::new()),
        VirtualMediaFactory::new(Duration::from_secs(5), 1024 * 1024),
        small_catalog(),
        Box::new(SequenceSource::constant(0.0)),
    )
}

/// Store whose reads and writes can be switched off.
#[derive(Default)]
pub struct SwitchableStore {
    inner: MemoryStore,
    pub reads_fail: AtomicBool,
    pub writes_fail: AtomicBool,
}

impl SwitchableStore {
    pub fn failing() -> Self {
        Self {
            inner: MemoryStore::new(),
            reads_fail: AtomicBool::new(true),
            writes_fail: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl KeyValueStore for SwitchableStore {
    fn name(&self) -> &'static str {
        "switchable"
    }

    async fn get(&self, keys: &[&str]) -> StorageResult<Entries> {
        if self.reads_fail.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable("storage offline"));
        }
        self.inner.get(keys).await
    }

    async fn set(&self, entries: Entries) -> StorageResult<()> {
        if self.writes_fail.load(Ordering::SeqCst) {
            return Err(StorageError::write_failed("quota exceeded"));
        }
        self.inner.set(entries).await
    }

    async fn remove(&self, keys: &[&str]) -> StorageResult<()> {
        if self.writes_fail.load(Ordering::SeqCst) {
            return Err(StorageError::write_failed("quota exceeded"));
        }
        self.inner.remove(keys).await
    }
}

/// In-memory store whose reads take `delay` on the tokio clock.
pub struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryStore::new(),
            delay,
        }
    }
}

#[async_trait]
impl KeyValueStore for SlowStore {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn get(&self, keys: &[&str]) -> StorageResult<Entries> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(keys).await
    }

    async fn set(&self, entries: Entries) -> StorageResult<()> {
        self.inner.set(entries).await
    }

    async fn remove(&self, keys: &[&str]) -> StorageResult<()> {
        self.inner.remove(keys).await
    }
}

//! Stream optimizer: the pool of prepared media resources.
//!
//! Every resource that is about to play, or is being warmed speculatively,
//! passes through `StreamOptimizer::optimize`. The optimizer applies the
//! baseline playback flags, picks a preload strategy from the request priority
//! and the network condition, attaches stall observers and a liveness timer,
//! and tracks the result as an `ActiveVideoHandle`.
//!
//! # Reclamation
//!
//! Handles are reclaimed only under memory pressure (aggregate footprint above
//! `PoolConfig::memory_threshold_bytes`), and only when the resource is paused,
//! was optimized more than `PoolConfig::handle_ttl` ago, and is not the handle
//! currently playing. Two paths apply that rule:
//! 1. the per-handle liveness timer, checking its own handle
//! 2. the background sweep started with `start_sweeper`, checking all handles

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::{broadcast, watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use wxloop_models::{ClipDescriptor, WeatherPool};

use crate::error::{MediaError, MediaResult};
use crate::metrics;
use crate::options::{OptimizeOptions, PoolConfig, Priority};
use crate::resource::{MediaEvent, MediaFactory, MediaResource, PlaybackFlags, PreloadStrategy};

const MIN_TIMER_PERIOD: Duration = Duration::from_millis(10);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One in-flight media resource tracked by the pool.
pub struct ActiveVideoHandle {
    pub id: String,
    pub resource: Arc<dyn MediaResource>,
    pub optimized_at: Instant,
    pub priority: Priority,
    timers: Vec<JoinHandle<()>>,
}

impl ActiveVideoHandle {
    fn is_reclaimable(&self, now: Instant, ttl: Duration, playing: Option<&str>) -> bool {
        playing != Some(self.id.as_str())
            && self.resource.is_paused()
            && now.saturating_duration_since(self.optimized_at) > ttl
    }

    fn info(&self) -> HandleInfo {
        HandleInfo {
            id: self.id.clone(),
            source: self.resource.source().to_string(),
            optimized_at: self.optimized_at,
            priority: self.priority,
            preload: self.resource.preload(),
            paused: self.resource.is_paused(),
        }
    }
}

/// Read-only view of a pooled handle.
#[derive(Debug, Clone, PartialEq)]
pub struct HandleInfo {
    pub id: String,
    pub source: String,
    pub optimized_at: Instant,
    pub priority: Priority,
    pub preload: PreloadStrategy,
    pub paused: bool,
}

/// Pool statistics for monitoring.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolStats {
    pub active_handles: usize,
    pub memory_bytes: u64,
    pub buffer_events: u64,
    pub resume_events: u64,
    pub reclaimed: u64,
    pub low_bandwidth: bool,
}

/// Pool of prepared media resources with bounded lifetime.
#[derive(Clone)]
pub struct StreamOptimizer {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    config: PoolConfig,
    handles: Mutex<HashMap<String, ActiveVideoHandle>>,
    playing: Mutex<Option<String>>,
    /// Single permit: optimizations run strictly one after another
    queue: Semaphore,
    low_bandwidth: AtomicBool,
    buffer_events: AtomicU64,
    resume_events: AtomicU64,
    reclaimed: AtomicU64,
}

impl StreamOptimizer {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                config,
                handles: Mutex::new(HashMap::new()),
                playing: Mutex::new(None),
                queue: Semaphore::new(1),
                low_bandwidth: AtomicBool::new(false),
                buffer_events: AtomicU64::new(0),
                resume_events: AtomicU64::new(0),
                reclaimed: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Report the network condition. Low bandwidth forces `preload=none`.
    pub fn set_low_bandwidth(&self, low: bool) {
        if self.inner.low_bandwidth.swap(low, Ordering::SeqCst) != low {
            info!(low_bandwidth = low, "Network condition changed");
        }
    }

    pub fn is_low_bandwidth(&self) -> bool {
        self.inner.low_bandwidth.load(Ordering::SeqCst)
    }

    /// Preload strategy for a priority under the current network condition.
    pub fn preload_for(&self, priority: Priority) -> PreloadStrategy {
        if self.is_low_bandwidth() {
            PreloadStrategy::None
        } else {
            priority.preload()
        }
    }

    /// Prepare a resource for playback and track it in the pool.
    ///
    /// Requests are funneled through a single-permit queue and yield to the
    /// runtime after each item.
    pub async fn optimize(
        &self,
        resource: Arc<dyn MediaResource>,
        options: OptimizeOptions,
    ) -> MediaResult<Arc<dyn MediaResource>> {
        let _permit = self
            .inner
            .queue
            .acquire()
            .await
            .map_err(|_| MediaError::QueueClosed)?;

        self.prepare(&resource, options);
        tokio::task::yield_now().await;

        Ok(resource)
    }

    /// Optimize several resources in order, one at a time.
    pub async fn optimize_batch(
        &self,
        items: Vec<(Arc<dyn MediaResource>, OptimizeOptions)>,
    ) -> Vec<MediaResult<Arc<dyn MediaResource>>> {
        let mut results = Vec::with_capacity(items.len());
        for (resource, options) in items {
            results.push(self.optimize(resource, options).await);
        }
        results
    }

    fn prepare(&self, resource: &Arc<dyn MediaResource>, options: OptimizeOptions) {
        resource.apply_flags(PlaybackFlags::BASELINE);
        let preload = self.preload_for(options.priority);
        resource.set_preload(preload);
        if let Some(ahead) = options.buffer_ahead {
            resource.set_buffer_ahead(ahead);
        }

        let id = resource.id().to_string();
        let now = Instant::now();

        let mut handles = lock(&self.inner.handles);
        match handles.get_mut(&id) {
            Some(existing) => {
                existing.optimized_at = now;
                existing.priority = options.priority;
            }
            None => {
                let timers = vec![
                    spawn_stall_observer(Arc::downgrade(&self.inner), id.clone(), resource.subscribe()),
                    spawn_liveness_timer(
                        Arc::downgrade(&self.inner),
                        id.clone(),
                        self.inner.config.liveness_interval,
                    ),
                ];
                handles.insert(
                    id.clone(),
                    ActiveVideoHandle {
                        id: id.clone(),
                        resource: Arc::clone(resource),
                        optimized_at: now,
                        priority: options.priority,
                        timers,
                    },
                );
            }
        }
        let (count, memory) = (handles.len(), aggregate_memory(&handles));
        drop(handles);

        metrics::record_optimized(options.priority.as_str(), preload.as_str());
        metrics::set_pool_gauges(count, memory);
        debug!(
            handle_id = %id,
            source = %resource.source(),
            priority = %options.priority,
            preload = %preload,
            "Optimized media resource"
        );
    }

    /// Warm up to `max_related_preloads` other clips of the same pool at low
    /// priority. Clips that fail to load are skipped.
    pub async fn preload_related(
        &self,
        pool: &WeatherPool,
        exclude_source: &str,
        factory: &dyn MediaFactory,
    ) -> Vec<Arc<dyn MediaResource>> {
        let pooled: HashSet<String> = lock(&self.inner.handles)
            .values()
            .map(|h| h.resource.source().to_string())
            .collect();

        let mut candidates: Vec<&ClipDescriptor> = pool
            .clips
            .iter()
            .filter(|c| c.path != exclude_source && !pooled.contains(&c.path))
            .collect();
        // Most likely next picks first
        candidates.sort_by(|a, b| b.weight.cmp(&a.weight));

        let mut prepared = Vec::new();
        for clip in candidates.into_iter().take(self.inner.config.max_related_preloads) {
            let resource = match factory.create(&clip.path) {
                Ok(r) => r,
                Err(e) => {
                    debug!(clip_id = %clip.id, error = %e, "Skipping related preload");
                    metrics::record_preload_skipped();
                    continue;
                }
            };
            match self.optimize(resource, OptimizeOptions::low()).await {
                Ok(r) => prepared.push(r),
                Err(e) => {
                    debug!(clip_id = %clip.id, error = %e, "Skipping related preload");
                    metrics::record_preload_skipped();
                }
            }
        }

        if !prepared.is_empty() {
            debug!(
                weather_type = %pool.weather_type,
                count = prepared.len(),
                "Preloaded related clips"
            );
        }
        prepared
    }

    /// Mark the handle currently playing. It is never reclaimed while marked.
    pub fn mark_playing(&self, id: &str) {
        *lock(&self.inner.playing) = Some(id.to_string());
    }

    /// Clear the playing mark if it still points at `id`.
    pub fn clear_playing(&self, id: &str) {
        let mut playing = lock(&self.inner.playing);
        if playing.as_deref() == Some(id) {
            *playing = None;
        }
    }

    pub fn playing_id(&self) -> Option<String> {
        lock(&self.inner.playing).clone()
    }

    /// Dispose a handle explicitly, whatever its age or state.
    pub fn dispose(&self, id: &str) -> bool {
        let handle = lock(&self.inner.handles).remove(id);
        match handle {
            Some(handle) => {
                self.inner.finish_disposal(handle, "explicit");
                true
            }
            None => false,
        }
    }

    /// Run one reclamation pass as of `now`. Returns the disposed handle ids.
    pub fn sweep_at(&self, now: Instant) -> Vec<String> {
        self.inner.sweep_at(now)
    }

    /// Run one reclamation pass now.
    pub fn sweep(&self) -> Vec<String> {
        self.inner.sweep_at(Instant::now())
    }

    /// Start the background reclamation sweep. Stops when `shutdown` flips to
    /// `true`, its sender is dropped, or the optimizer is dropped.
    pub fn start_sweeper(&self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let inner = Arc::downgrade(&self.inner);
        let period = self.inner.config.sweep_interval.max(MIN_TIMER_PERIOD);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        let Some(inner) = inner.upgrade() else { break };
                        let reclaimed = inner.sweep_at(Instant::now());
                        if !reclaimed.is_empty() {
                            info!(count = reclaimed.len(), "Reclamation sweep disposed idle handles");
                        }
                    }
                }
            }
            debug!("Reclamation sweeper stopped");
        })
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn MediaResource>> {
        lock(&self.inner.handles).get(id).map(|h| Arc::clone(&h.resource))
    }

    /// Pooled resource playing `source`, if any.
    pub fn find_by_source(&self, source: &str) -> Option<Arc<dyn MediaResource>> {
        lock(&self.inner.handles)
            .values()
            .find(|h| h.resource.source() == source)
            .map(|h| Arc::clone(&h.resource))
    }

    pub fn handle_info(&self, id: &str) -> Option<HandleInfo> {
        lock(&self.inner.handles).get(id).map(ActiveVideoHandle::info)
    }

    pub fn handle_ids(&self) -> Vec<String> {
        lock(&self.inner.handles).keys().cloned().collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        lock(&self.inner.handles).contains_key(id)
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.handles).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn memory_usage(&self) -> u64 {
        aggregate_memory(&lock(&self.inner.handles))
    }

    pub fn stats(&self) -> PoolStats {
        let handles = lock(&self.inner.handles);
        PoolStats {
            active_handles: handles.len(),
            memory_bytes: aggregate_memory(&handles),
            buffer_events: self.inner.buffer_events.load(Ordering::SeqCst),
            resume_events: self.inner.resume_events.load(Ordering::SeqCst),
            reclaimed: self.inner.reclaimed.load(Ordering::SeqCst),
            low_bandwidth: self.is_low_bandwidth(),
        }
    }
}

impl Default for StreamOptimizer {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl PoolInner {
    fn is_under_pressure(&self, handles: &HashMap<String, ActiveVideoHandle>) -> bool {
        aggregate_memory(handles) > self.config.memory_threshold_bytes
    }

    /// Remove `id` if it is reclaimable as of `now`. The playing mark is read
    /// under the handles lock so a concurrent `mark_playing` is never missed.
    fn take_if_reclaimable(&self, id: &str, now: Instant) -> Option<ActiveVideoHandle> {
        let mut handles = lock(&self.handles);
        let playing = lock(&self.playing);
        let reclaimable = handles
            .get(id)
            .is_some_and(|h| h.is_reclaimable(now, self.config.handle_ttl, playing.as_deref()));
        if reclaimable {
            handles.remove(id)
        } else {
            None
        }
    }

    fn sweep_at(&self, now: Instant) -> Vec<String> {
        let candidates: Vec<String> = {
            let handles = lock(&self.handles);
            if !self.is_under_pressure(&handles) {
                return Vec::new();
            }
            let playing = lock(&self.playing);
            handles
                .values()
                .filter(|h| h.is_reclaimable(now, self.config.handle_ttl, playing.as_deref()))
                .map(|h| h.id.clone())
                .collect()
        };

        let mut reclaimed = Vec::with_capacity(candidates.len());
        for id in candidates {
            if let Some(handle) = self.take_if_reclaimable(&id, now) {
                self.finish_disposal(handle, "sweep");
                reclaimed.push(id);
            }
        }
        reclaimed
    }

    /// Liveness check for a single handle. Returns `true` if it was reclaimed.
    fn reclaim_if_pressured(&self, id: &str) -> bool {
        if !self.is_under_pressure(&lock(&self.handles)) {
            return false;
        }
        match self.take_if_reclaimable(id, Instant::now()) {
            Some(handle) => {
                self.finish_disposal(handle, "liveness");
                true
            }
            None => false,
        }
    }

    fn finish_disposal(&self, handle: ActiveVideoHandle, reason: &'static str) {
        handle.resource.pause();
        handle.resource.dispose();
        for timer in &handle.timers {
            timer.abort();
        }

        {
            let mut playing = lock(&self.playing);
            if playing.as_deref() == Some(handle.id.as_str()) {
                *playing = None;
            }
        }

        if reason != "explicit" {
            self.reclaimed.fetch_add(1, Ordering::SeqCst);
        }
        metrics::record_reclaimed(reason);

        let (count, memory) = {
            let handles = lock(&self.handles);
            (handles.len(), aggregate_memory(&handles))
        };
        metrics::set_pool_gauges(count, memory);

        debug!(
            handle_id = %handle.id,
            source = %handle.resource.source(),
            reason = reason,
            "Disposed media handle"
        );
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        let handles = self.handles.get_mut().unwrap_or_else(PoisonError::into_inner);
        for handle in handles.values() {
            for timer in &handle.timers {
                timer.abort();
            }
        }
    }
}

fn aggregate_memory(handles: &HashMap<String, ActiveVideoHandle>) -> u64 {
    handles.values().map(|h| h.resource.memory_footprint()).sum()
}

fn spawn_stall_observer(
    inner: Weak<PoolInner>,
    id: String,
    mut events: broadcast::Receiver<MediaEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stalled = false;
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            };
            let Some(inner) = inner.upgrade() else { break };

            if event.is_stall() {
                inner.buffer_events.fetch_add(1, Ordering::SeqCst);
                metrics::record_buffer_event("stall");
                debug!(handle_id = %id, event = ?event, "Media buffering stalled");
                stalled = true;
            } else if event == MediaEvent::Playing && stalled {
                inner.resume_events.fetch_add(1, Ordering::SeqCst);
                metrics::record_buffer_event("resume");
                stalled = false;
            }
        }
    })
}

fn spawn_liveness_timer(inner: Weak<PoolInner>, id: String, period: Duration) -> JoinHandle<()> {
    let period = period.max(MIN_TIMER_PERIOD);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        loop {
            interval.tick().await;
            let Some(inner) = inner.upgrade() else { break };
            if inner.reclaim_if_pressured(&id) {
                break;
            }
        }
    })
}

//! Playback orchestrator.
//!
//! Sequences one tab initialization: settings check, trigger gate, card draw,
//! resource preparation and playback, reporting progress through
//! `PlaybackCallbacks`. At most one playback is in flight; a concurrent
//! request fails fast with `EngineError::Busy`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, warn, Instrument};

use wxloop_media::{MediaEvent, MediaResource, OptimizeOptions};
use wxloop_models::{
    ClipDescriptor, PlaybackOutcome, Settings, TabContext, Theme, TriggerEvent, TriggerType,
    WeatherRequest, WeatherSnapshot, WeatherType,
};

use crate::callbacks::PlaybackCallbacks;
use crate::context::EngineContext;
use crate::error::{EngineError, EngineResult};
use crate::logging::PlaybackLogger;
use crate::metrics;
use crate::weather_service::WeatherService;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn is_cancelled(cancel_rx: &watch::Receiver<bool>) -> bool {
    *cancel_rx.borrow()
}

struct ActivePlayback {
    session: u64,
    cancel: watch::Sender<bool>,
    resource: Option<Arc<dyn MediaResource>>,
}

/// Holds the playback mutex for one session and releases it on drop, unless
/// `stop()` already did.
struct SessionGuard<'a> {
    orchestrator: &'a PlaybackOrchestrator,
    session: u64,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        let _ = self.orchestrator.playing.compare_exchange(
            self.session,
            0,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        let mut active = lock(&self.orchestrator.active);
        if active.as_ref().is_some_and(|a| a.session == self.session) {
            *active = None;
        }
    }
}

enum ClipEnd {
    Ended,
    Cancelled,
    Failed(String),
}

pub struct PlaybackOrchestrator {
    ctx: Arc<EngineContext>,
    /// Session id of the playback in flight, 0 when idle
    playing: AtomicU64,
    next_session: AtomicU64,
    active: Mutex<Option<ActivePlayback>>,
}

impl PlaybackOrchestrator {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self {
            ctx,
            playing: AtomicU64::new(0),
            next_session: AtomicU64::new(0),
            active: Mutex::new(None),
        }
    }

    pub fn context(&self) -> &Arc<EngineContext> {
        &self.ctx
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst) != 0
    }

    fn acquire(&self) -> EngineResult<(SessionGuard<'_>, watch::Receiver<bool>)> {
        let session = self.next_session.fetch_add(1, Ordering::SeqCst) + 1;
        if self
            .playing
            .compare_exchange(0, session, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            metrics::record_busy_rejection();
            return Err(EngineError::Busy);
        }

        let (cancel, cancel_rx) = watch::channel(false);
        *lock(&self.active) = Some(ActivePlayback {
            session,
            cancel,
            resource: None,
        });

        Ok((
            SessionGuard {
                orchestrator: self,
                session,
            },
            cancel_rx,
        ))
    }

    /// Run one tab initialization to completion.
    pub async fn initialize_tab(
        &self,
        tab: TabContext,
        callbacks: &dyn PlaybackCallbacks,
    ) -> EngineResult<PlaybackOutcome> {
        let (guard, cancel_rx) = self.acquire()?;
        let started = Instant::now();
        let logger = PlaybackLogger::new(
            guard.session,
            tab.weather.weather_type.as_deref().unwrap_or("unknown"),
        );
        let span = logger.create_span();

        let result = self
            .run(tab, callbacks, cancel_rx, &guard, &logger)
            .instrument(span)
            .await;

        let label = match &result {
            Ok(outcome) if outcome.cancelled => "cancelled",
            Ok(outcome) if outcome.played => "played",
            Ok(outcome) if outcome.success => "skipped",
            Ok(_) => "data_missing",
            Err(e) => e.kind(),
        };
        metrics::record_playback(label, started.elapsed().as_secs_f64());
        result
    }

    async fn run(
        &self,
        tab: TabContext,
        callbacks: &dyn PlaybackCallbacks,
        mut cancel_rx: watch::Receiver<bool>,
        guard: &SessionGuard<'_>,
        logger: &PlaybackLogger,
    ) -> EngineResult<PlaybackOutcome> {
        let weather = match tab.weather.weather_type.as_deref().map(str::trim) {
            None | Some("") => {
                let err = EngineError::data_missing("weather type absent");
                logger.log_error(&err.to_string());
                callbacks.on_error(&err);
                return Ok(PlaybackOutcome::failed());
            }
            Some(raw) => raw.parse::<WeatherType>().unwrap_or_else(|e| {
                logger.log_warning(&format!("{e}, using {}", self.ctx.config.fallback_weather));
                self.ctx.config.fallback_weather
            }),
        };

        if !tab.settings.animation_enabled {
            debug!("Animation disabled in settings");
            callbacks.on_animation_complete();
            return Ok(PlaybackOutcome::skipped());
        }

        let event = tab.event.unwrap_or(TriggerEvent::TabOpened);
        let decision = self.ctx.gate.check_should_trigger(&event).await;
        if is_cancelled(&cancel_rx) {
            return Ok(self.finish_cancelled(weather, Vec::new(), callbacks, logger));
        }
        if !decision.should_trigger {
            debug!(reason = %decision.reason, "Trigger gate closed");
            callbacks.on_animation_complete();
            return Ok(PlaybackOutcome::skipped());
        }

        let trigger_type = decision.trigger_type.unwrap_or(TriggerType::TabOpen);
        if let Err(e) = self.ctx.gate.record_trigger(trigger_type, &decision.reason).await {
            logger.log_warning(&format!("trigger not persisted: {e}"));
        }
        if is_cancelled(&cancel_rx) {
            return Ok(self.finish_cancelled(weather, Vec::new(), callbacks, logger));
        }

        let weather = decision.weather_type.unwrap_or(weather);
        let clips = {
            let mut draw = lock(&self.ctx.draw);
            if decision.needs_carousel {
                draw.draw_sequence(weather, self.ctx.config.carousel_length)
            } else {
                vec![draw.draw_card(weather)]
            }
        };
        logger.log_start(&format!(
            "{} clip(s), trigger {}",
            clips.len(),
            trigger_type
        ));

        let mut played: Vec<ClipDescriptor> = Vec::with_capacity(clips.len());
        for clip in &clips {
            if is_cancelled(&cancel_rx) {
                return Ok(self.finish_cancelled(weather, played, callbacks, logger));
            }

            let resource = match self.prepare(weather, clip, clips.len() == 1).await {
                Ok(resource) => resource,
                Err(e) => {
                    let err = EngineError::playback_failed(format!("{}: {}", clip.id, e));
                    return Err(self.fail(err, callbacks, logger));
                }
            };
            // Stopped while preparing; the next playback may own this resource now
            if is_cancelled(&cancel_rx) {
                return Ok(self.finish_cancelled(weather, played, callbacks, logger));
            }
            self.attach(guard.session, &resource);

            if played.is_empty() {
                callbacks.on_video_start(weather, clip);
            }

            match self.play_clip(&resource, &mut cancel_rx).await {
                ClipEnd::Ended => played.push(clip.clone()),
                ClipEnd::Cancelled => {
                    resource.pause();
                    self.ctx.optimizer.clear_playing(resource.id());
                    played.push(clip.clone());
                    return Ok(self.finish_cancelled(weather, played, callbacks, logger));
                }
                ClipEnd::Failed(message) => {
                    resource.pause();
                    self.ctx.optimizer.clear_playing(resource.id());
                    let err = EngineError::playback_failed(format!("{}: {}", clip.id, message));
                    return Err(self.fail(err, callbacks, logger));
                }
            }
            self.ctx.optimizer.clear_playing(resource.id());
            logger.log_progress(&format!("clip {} ended", clip.id));
        }

        if let Some(last) = played.last() {
            callbacks.on_video_end(weather, last);
        }
        callbacks.on_animation_complete();
        logger.log_completion(&format!("{} clip(s) played", played.len()));
        Ok(PlaybackOutcome::played(played, false))
    }

    /// Create (or reuse) the resource for `clip` and optimize it for
    /// immediate playback.
    async fn prepare(
        &self,
        weather: WeatherType,
        clip: &ClipDescriptor,
        warm_siblings: bool,
    ) -> EngineResult<Arc<dyn MediaResource>> {
        let resource = match self.ctx.optimizer.find_by_source(&clip.path) {
            Some(existing) => existing,
            None => self.ctx.media.create(&clip.path)?,
        };

        let options = OptimizeOptions::high().with_buffer_ahead(self.ctx.config.buffer_ahead);
        let resource = self.ctx.optimizer.optimize(resource, options).await?;

        if warm_siblings {
            if let Some(pool) = self
                .ctx
                .catalog
                .pool(weather)
                .or_else(|| self.ctx.catalog.pool(self.ctx.config.fallback_weather))
            {
                self.ctx
                    .optimizer
                    .preload_related(pool, &clip.path, self.ctx.media.as_ref())
                    .await;
            }
        }
        Ok(resource)
    }

    fn attach(&self, session: u64, resource: &Arc<dyn MediaResource>) {
        if let Some(active) = lock(&self.active).as_mut() {
            if active.session == session {
                active.resource = Some(Arc::clone(resource));
            }
        }
        self.ctx.optimizer.mark_playing(resource.id());
    }

    async fn play_clip(
        &self,
        resource: &Arc<dyn MediaResource>,
        cancel_rx: &mut watch::Receiver<bool>,
    ) -> ClipEnd {
        let mut events = resource.subscribe();
        if let Err(e) = resource.play().await {
            return ClipEnd::Failed(e.to_string());
        }

        let timeout = tokio::time::sleep(self.ctx.config.playback_timeout);
        tokio::pin!(timeout);

        loop {
            tokio::select! {
                changed = cancel_rx.changed() => {
                    if changed.is_err() || *cancel_rx.borrow() {
                        return ClipEnd::Cancelled;
                    }
                }
                event = events.recv() => match event {
                    Ok(MediaEvent::Ended) => return ClipEnd::Ended,
                    Ok(MediaEvent::Error(message)) => return ClipEnd::Failed(message),
                    Ok(MediaEvent::Abort) => return ClipEnd::Failed("loading aborted".to_string()),
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => {
                        return ClipEnd::Failed("media event stream closed".to_string());
                    }
                },
                _ = &mut timeout => {
                    return ClipEnd::Failed(format!(
                        "no end event within {:?}",
                        self.ctx.config.playback_timeout
                    ));
                }
            }
        }
    }

    fn finish_cancelled(
        &self,
        weather: WeatherType,
        played: Vec<ClipDescriptor>,
        callbacks: &dyn PlaybackCallbacks,
        logger: &PlaybackLogger,
    ) -> PlaybackOutcome {
        logger.log_progress("stopped");
        if let Some(last) = played.last() {
            callbacks.on_video_end(weather, last);
        }
        callbacks.on_animation_complete();

        if played.is_empty() {
            PlaybackOutcome {
                success: true,
                cancelled: true,
                ..Default::default()
            }
        } else {
            PlaybackOutcome::played(played, true)
        }
    }

    fn fail(&self, err: EngineError, callbacks: &dyn PlaybackCallbacks, logger: &PlaybackLogger) -> EngineError {
        logger.log_error(&err.to_string());
        callbacks.on_error(&err);
        err
    }

    /// Stop the playback in flight. Synchronous: the resource is paused and the
    /// mutex released before this returns; the pending `initialize_tab`
    /// resolves with `cancelled: true` at its next step, without recording a
    /// trigger or drawing if it had not got that far.
    pub fn stop(&self) -> bool {
        let active = lock(&self.active).take();
        self.playing.store(0, Ordering::SeqCst);

        match active {
            Some(active) => {
                if let Some(resource) = &active.resource {
                    resource.pause();
                    self.ctx.optimizer.clear_playing(resource.id());
                }
                let _ = active.cancel.send(true);
                debug!(session = active.session, "Playback stopped");
                true
            }
            None => false,
        }
    }

    /// Clear draw history and gate state together.
    pub async fn reset(&self) -> EngineResult<()> {
        lock(&self.ctx.draw).reset();
        self.ctx.gate.reset().await
    }

    /// Resolve the current weather through `service`, then initialize the tab.
    ///
    /// A forced refresh asks for `weather.forceUpdate`; everything else for
    /// `weather.getCurrent`. A failed or empty answer takes the data-missing
    /// path.
    pub async fn initialize_from_service(
        &self,
        service: &dyn WeatherService,
        theme: Theme,
        settings: Settings,
        event: Option<TriggerEvent>,
        callbacks: &dyn PlaybackCallbacks,
    ) -> EngineResult<PlaybackOutcome> {
        let request = match event {
            Some(TriggerEvent::ForceRefresh { .. }) => WeatherRequest::ForceUpdateWeather,
            _ => WeatherRequest::GetCurrentWeather,
        };

        let weather = match service.query(request.clone()).await {
            Ok(envelope) => {
                let error = envelope.error.clone();
                envelope.into_weather().unwrap_or_else(|| {
                    warn!(
                        request = request.type_name(),
                        error = error.as_deref().unwrap_or("empty response"),
                        "Weather query returned no data"
                    );
                    WeatherSnapshot::default()
                })
            }
            Err(e) => {
                warn!(request = request.type_name(), error = %e, "Weather query failed");
                WeatherSnapshot::default()
            }
        };

        let tab = TabContext {
            weather,
            theme,
            settings,
            event,
        };
        self.initialize_tab(tab, callbacks).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::{CallbackEvent, RecordingCallbacks};
    use crate::catalog::Catalog;
    use crate::clock::ManualClock;
    use crate::config::EngineConfig;
    use crate::random::SequenceSource;
    use std::time::Duration;
    use wxloop_media::VirtualMediaFactory;
    use wxloop_models::{ClipTier, WeatherPool};
    use wxloop_storage::MemoryStore;

    fn orchestrator(factory: VirtualMediaFactory) -> Arc<PlaybackOrchestrator> {
        let catalog = Catalog::from_pools(vec![WeatherPool::new(
            WeatherType::Clear,
            vec![
                ClipDescriptor::new("a", "video/tab/clear/a.mp4", 80, ClipTier::Normal, ""),
                ClipDescriptor::new("b", "video/tab/clear/b.mp4", 20, ClipTier::Normal, ""),
            ],
        )]);
        let ctx = EngineContext::builder(Arc::new(MemoryStore::new()), Arc::new(factory))
            .with_config(EngineConfig {
                playback_timeout: Duration::from_secs(30),
                ..Default::default()
            })
            .with_catalog(catalog)
            .with_clock(Arc::new(ManualClock::default()))
            .with_rng(Box::new(SequenceSource::constant(0.0)))
            .build();
        Arc::new(PlaybackOrchestrator::new(ctx))
    }

    fn clear_tab() -> TabContext {
        TabContext::new(WeatherSnapshot::of(WeatherType::Clear))
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tab_plays_carousel() {
        let orchestrator = orchestrator(VirtualMediaFactory::new(Duration::from_secs(5), 1024));
        let callbacks = RecordingCallbacks::new();

        let outcome = orchestrator.initialize_tab(clear_tab(), &callbacks).await.unwrap();
        assert!(outcome.success && outcome.played && !outcome.cancelled);
        assert_eq!(outcome.clips.len(), 3);
        assert!(!orchestrator.is_playing());

        let events = callbacks.events();
        assert_eq!(
            events.first(),
            Some(&CallbackEvent::VideoStart {
                weather: WeatherType::Clear,
                clip_id: "a".to_string()
            })
        );
        assert_eq!(events.last(), Some(&CallbackEvent::AnimationComplete));
        assert_eq!(events.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_weather_uses_fallback() {
        let orchestrator = orchestrator(VirtualMediaFactory::new(Duration::from_secs(1), 1024));
        let mut tab = clear_tab();
        tab.weather.weather_type = Some("volcanic_ash".to_string());

        let outcome = orchestrator.initialize_tab(tab, &RecordingCallbacks::new()).await.unwrap();
        assert!(outcome.played);
        assert_eq!(outcome.video.unwrap().id, "a");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_clip_times_out() {
        let orchestrator = orchestrator(VirtualMediaFactory::new(Duration::from_secs(3600), 1024));
        let callbacks = RecordingCallbacks::new();

        let err = orchestrator.initialize_tab(clear_tab(), &callbacks).await.unwrap_err();
        assert!(matches!(err, EngineError::PlaybackFailed(_)));
        assert!(!orchestrator.is_playing());
        assert!(matches!(callbacks.events().last(), Some(CallbackEvent::Error { .. })));
    }

    #[tokio::test]
    async fn test_stop_without_playback() {
        let orchestrator = orchestrator(VirtualMediaFactory::default());
        assert!(!orchestrator.stop());
        assert!(!orchestrator.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_history_and_gate() {
        let orchestrator = orchestrator(VirtualMediaFactory::new(Duration::from_secs(1), 1024));
        orchestrator.initialize_tab(clear_tab(), &RecordingCallbacks::new()).await.unwrap();
        assert!(lock(&orchestrator.context().draw).history().last_clip_id.is_some());

        orchestrator.reset().await.unwrap();
        assert!(lock(&orchestrator.context().draw).history().last_clip_id.is_none());
        assert_eq!(orchestrator.context().gate.state().await.start_count, 0);
    }
}

//! In-process media backend.
//!
//! `VirtualMediaResource` simulates the timing of a real media element: `play`
//! emits `Playing`, then `Ended` (or `Error`) once the clip duration elapses on
//! the tokio clock. Its memory footprint follows the preload strategy, which
//! makes it suitable for exercising the stream optimizer end to end.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{MediaError, MediaResult};
use crate::resource::{MediaEvent, MediaFactory, MediaResource, PlaybackFlags, PreloadStrategy};

const EVENT_CAPACITY: usize = 32;

#[derive(Debug, Default)]
struct VirtualState {
    paused: bool,
    detached: bool,
    preload: PreloadStrategy,
    flags: Option<PlaybackFlags>,
    buffer_ahead: Option<Duration>,
    playback: Option<JoinHandle<()>>,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<VirtualState>,
    events: broadcast::Sender<MediaEvent>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, VirtualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: MediaEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Simulated media resource.
#[derive(Debug)]
pub struct VirtualMediaResource {
    id: String,
    source: String,
    duration: Duration,
    size_bytes: u64,
    failure: Option<String>,
    shared: Arc<Shared>,
}

impl VirtualMediaResource {
    pub fn new(source: impl Into<String>, duration: Duration, size_bytes: u64) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source: source.into(),
            duration,
            size_bytes,
            failure: None,
            shared: Arc::new(Shared {
                state: Mutex::new(VirtualState {
                    paused: true,
                    ..Default::default()
                }),
                events,
            }),
        }
    }

    /// Make playback end with an error event instead of `Ended`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Inject an event, e.g. a buffering stall.
    pub fn emit(&self, event: MediaEvent) {
        self.shared.emit(event);
    }

    pub fn flags(&self) -> Option<PlaybackFlags> {
        self.shared.state().flags
    }

    pub fn buffer_ahead(&self) -> Option<Duration> {
        self.shared.state().buffer_ahead
    }

    pub fn is_detached(&self) -> bool {
        self.shared.state().detached
    }
}

#[async_trait]
impl MediaResource for VirtualMediaResource {
    fn id(&self) -> &str {
        &self.id
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn apply_flags(&self, flags: PlaybackFlags) {
        self.shared.state().flags = Some(flags);
    }

    fn set_preload(&self, preload: PreloadStrategy) {
        self.shared.state().preload = preload;
    }

    fn preload(&self) -> PreloadStrategy {
        self.shared.state().preload
    }

    fn set_buffer_ahead(&self, ahead: Duration) {
        self.shared.state().buffer_ahead = Some(ahead);
    }

    fn is_paused(&self) -> bool {
        self.shared.state().paused
    }

    fn memory_footprint(&self) -> u64 {
        let state = self.shared.state();
        if state.detached {
            return 0;
        }
        if !state.paused {
            return self.size_bytes;
        }
        match state.preload {
            PreloadStrategy::Auto => self.size_bytes,
            PreloadStrategy::Metadata => self.size_bytes / 16,
            PreloadStrategy::None => 0,
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<MediaEvent> {
        self.shared.events.subscribe()
    }

    async fn play(&self) -> MediaResult<()> {
        let mut state = self.shared.state();
        if state.detached {
            return Err(MediaError::Detached(self.id.clone()));
        }
        if let Some(previous) = state.playback.take() {
            previous.abort();
        }
        state.paused = false;

        let shared = Arc::clone(&self.shared);
        let duration = self.duration;
        let failure = self.failure.clone();
        state.playback = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            shared.state().paused = true;
            match failure {
                Some(message) => shared.emit(MediaEvent::Error(message)),
                None => shared.emit(MediaEvent::Ended),
            }
        }));
        drop(state);

        self.shared.emit(MediaEvent::Playing);
        debug!(media_id = %self.id, source = %self.source, "Virtual playback started");
        Ok(())
    }

    fn pause(&self) {
        let mut state = self.shared.state();
        state.paused = true;
        if let Some(playback) = state.playback.take() {
            playback.abort();
        }
    }

    fn dispose(&self) {
        self.pause();
        let mut state = self.shared.state();
        state.detached = true;
        state.preload = PreloadStrategy::None;
    }
}

/// Factory producing `VirtualMediaResource`s.
#[derive(Debug, Clone)]
pub struct VirtualMediaFactory {
    clip_duration: Duration,
    size_bytes: u64,
    playback_failures: HashMap<String, String>,
    unavailable: Vec<String>,
}

impl Default for VirtualMediaFactory {
    fn default() -> Self {
        Self {
            clip_duration: Duration::from_secs(8),
            size_bytes: 12 * 1024 * 1024,
            playback_failures: HashMap::new(),
            unavailable: Vec::new(),
        }
    }
}

impl VirtualMediaFactory {
    pub fn new(clip_duration: Duration, size_bytes: u64) -> Self {
        Self {
            clip_duration,
            size_bytes,
            ..Default::default()
        }
    }

    /// Resources for `path` fail during playback.
    pub fn with_playback_failure(mut self, path: impl Into<String>, message: impl Into<String>) -> Self {
        self.playback_failures.insert(path.into(), message.into());
        self
    }

    /// Creating a resource for `path` fails.
    pub fn with_unavailable(mut self, path: impl Into<String>) -> Self {
        self.unavailable.push(path.into());
        self
    }

    /// Concrete constructor, for callers that need the virtual handle itself.
    pub fn create_virtual(&self, path: &str) -> MediaResult<Arc<VirtualMediaResource>> {
        if self.unavailable.iter().any(|p| p == path) {
            return Err(MediaError::create_failed(path, "source unavailable"));
        }
        let mut resource = VirtualMediaResource::new(path, self.clip_duration, self.size_bytes);
        if let Some(message) = self.playback_failures.get(path) {
            resource = resource.failing(message.clone());
        }
        Ok(Arc::new(resource))
    }
}

impl MediaFactory for VirtualMediaFactory {
    fn create(&self, path: &str) -> MediaResult<Arc<dyn MediaResource>> {
        let resource: Arc<dyn MediaResource> = self.create_virtual(path)?;
        Ok(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_play_emits_playing_then_ended() {
        let resource = VirtualMediaResource::new("video/tab/clear/a.mp4", Duration::from_secs(5), 100);
        let mut events = resource.subscribe();

        resource.play().await.unwrap();
        assert!(!resource.is_paused());
        assert_eq!(events.recv().await.unwrap(), MediaEvent::Playing);
        assert_eq!(events.recv().await.unwrap(), MediaEvent::Ended);
        assert!(resource.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_resource_emits_error() {
        let resource = VirtualMediaResource::new("x", Duration::from_millis(10), 100).failing("decode");
        let mut events = resource.subscribe();
        resource.play().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), MediaEvent::Playing);
        assert_eq!(events.recv().await.unwrap(), MediaEvent::Error("decode".to_string()));
    }

    #[tokio::test]
    async fn test_disposed_resource_refuses_play() {
        let resource = VirtualMediaResource::new("x", Duration::from_secs(1), 100);
        resource.set_preload(PreloadStrategy::Auto);
        assert_eq!(resource.memory_footprint(), 100);

        resource.dispose();
        assert!(resource.is_detached());
        assert_eq!(resource.memory_footprint(), 0);
        assert!(matches!(resource.play().await, Err(MediaError::Detached(_))));
    }

    #[test]
    fn test_footprint_follows_preload() {
        let resource = VirtualMediaResource::new("x", Duration::from_secs(1), 1600);
        resource.set_preload(PreloadStrategy::Metadata);
        assert_eq!(resource.memory_footprint(), 100);
        resource.set_preload(PreloadStrategy::None);
        assert_eq!(resource.memory_footprint(), 0);
    }

    #[test]
    fn test_factory_unavailable_path() {
        let factory = VirtualMediaFactory::default().with_unavailable("video/tab/rain/a.mp4");
        assert!(factory.create("video/tab/rain/a.mp4").is_err());
        assert!(factory.create("video/tab/rain/b.mp4").is_ok());
    }
}

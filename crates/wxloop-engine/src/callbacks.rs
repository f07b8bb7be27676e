//! Playback lifecycle callbacks.

use std::sync::Mutex;

use serde::Serialize;

use wxloop_models::{ClipDescriptor, WeatherType};

use crate::error::EngineError;

/// Host hooks for one `initialize_tab` call. Each fires at most once per
/// call; start and end only on the played path.
pub trait PlaybackCallbacks: Send + Sync {
    fn on_video_start(&self, _weather: WeatherType, _clip: &ClipDescriptor) {}

    fn on_video_end(&self, _weather: WeatherType, _clip: &ClipDescriptor) {}

    fn on_animation_complete(&self) {}

    fn on_error(&self, _error: &EngineError) {}
}

/// Ignores every callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCallbacks;

impl PlaybackCallbacks for NoopCallbacks {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CallbackEvent {
    VideoStart { weather: WeatherType, clip_id: String },
    VideoEnd { weather: WeatherType, clip_id: String },
    AnimationComplete,
    Error { kind: String, message: String },
}

/// Keeps every callback in order, for the simulator and tests.
#[derive(Debug, Default)]
pub struct RecordingCallbacks {
    events: Mutex<Vec<CallbackEvent>>,
}

impl RecordingCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CallbackEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn push(&self, event: CallbackEvent) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event);
    }
}

impl PlaybackCallbacks for RecordingCallbacks {
    fn on_video_start(&self, weather: WeatherType, clip: &ClipDescriptor) {
        self.push(CallbackEvent::VideoStart {
            weather,
            clip_id: clip.id.clone(),
        });
    }

    fn on_video_end(&self, weather: WeatherType, clip: &ClipDescriptor) {
        self.push(CallbackEvent::VideoEnd {
            weather,
            clip_id: clip.id.clone(),
        });
    }

    fn on_animation_complete(&self) {
        self.push(CallbackEvent::AnimationComplete);
    }

    fn on_error(&self, error: &EngineError) {
        self.push(CallbackEvent::Error {
            kind: error.kind().to_string(),
            message: error.to_string(),
        });
    }
}

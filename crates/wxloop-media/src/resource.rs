//! Media resource handle abstraction.
//!
//! The pool and the orchestrator only ever talk to a `MediaResource`; whether
//! it wraps a browser video element, a native decoder or the in-process
//! virtual backend is up to the implementation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::MediaResult;

/// Lifecycle events emitted by a media resource.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// Enough data is buffered to start
    CanPlay,
    /// Playback started or resumed
    Playing,
    /// Playback paused waiting for data
    Waiting,
    /// Network fetch stalled
    Stalled,
    /// Reached the end of the clip
    Ended,
    /// Decoding or network error
    Error(String),
    /// Loading aborted
    Abort,
}

impl MediaEvent {
    /// Whether the event signals a buffering stall.
    pub fn is_stall(&self) -> bool {
        matches!(self, MediaEvent::Waiting | MediaEvent::Stalled)
    }
}

/// How much of a resource to fetch ahead of playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PreloadStrategy {
    /// Fetch the whole resource
    Auto,
    /// Fetch dimensions and duration only
    #[default]
    Metadata,
    /// Fetch nothing until playback
    None,
}

impl PreloadStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreloadStrategy::Auto => "auto",
            PreloadStrategy::Metadata => "metadata",
            PreloadStrategy::None => "none",
        }
    }
}

impl fmt::Display for PreloadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Playback flags applied to every pooled resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackFlags {
    pub muted: bool,
    pub plays_inline: bool,
    pub disable_picture_in_picture: bool,
    pub hardware_acceleration: bool,
}

impl PlaybackFlags {
    /// Ambient loops are silent, inline and never popped out.
    pub const BASELINE: PlaybackFlags = PlaybackFlags {
        muted: true,
        plays_inline: true,
        disable_picture_in_picture: true,
        hardware_acceleration: true,
    };
}

impl Default for PlaybackFlags {
    fn default() -> Self {
        Self::BASELINE
    }
}

/// Capability set of a playable media resource.
#[async_trait]
pub trait MediaResource: Send + Sync + fmt::Debug {
    /// Stable identifier, used as the pool key.
    fn id(&self) -> &str;

    /// Source path or URL.
    fn source(&self) -> &str;

    fn apply_flags(&self, flags: PlaybackFlags);

    fn set_preload(&self, preload: PreloadStrategy);

    fn preload(&self) -> PreloadStrategy;

    /// Hint for how far ahead to buffer. Ignored by backends that cannot honour it.
    fn set_buffer_ahead(&self, _ahead: Duration) {}

    /// Paused or never started.
    fn is_paused(&self) -> bool;

    /// Estimated bytes held by this resource.
    fn memory_footprint(&self) -> u64;

    /// Subscribe to lifecycle events. Subscribe before `play` to observe the end.
    fn subscribe(&self) -> broadcast::Receiver<MediaEvent>;

    /// Start playback.
    async fn play(&self) -> MediaResult<()>;

    /// Pause synchronously.
    fn pause(&self);

    /// Pause and detach the source, releasing buffered data.
    fn dispose(&self);
}

/// Creates media resources for catalog paths.
pub trait MediaFactory: Send + Sync {
    fn create(&self, path: &str) -> MediaResult<Arc<dyn MediaResource>>;
}

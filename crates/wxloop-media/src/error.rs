//! Error types for media operations.

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while preparing or playing media.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Failed to create media resource for {path}: {message}")]
    CreateFailed { path: String, message: String },

    #[error("Media resource {0} has been disposed")]
    Detached(String),

    #[error("Playback failed: {0}")]
    PlaybackFailed(String),

    #[error("Optimization queue closed")]
    QueueClosed,

    #[error("Unsupported source: {0}")]
    Unsupported(String),
}

impl MediaError {
    pub fn create_failed(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CreateFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn playback_failed(message: impl Into<String>) -> Self {
        Self::PlaybackFailed(message.into())
    }
}

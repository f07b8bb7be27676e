//! Engine error types.

use thiserror::Error;

use crate::catalog::CatalogError;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Weather data missing: {0}")]
    DataMissing(String),

    #[error("Playback already in progress")]
    Busy,

    #[error("Playback failed: {0}")]
    PlaybackFailed(String),

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Weather service error: {0}")]
    WeatherService(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Media error: {0}")]
    Media(#[from] wxloop_media::MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] wxloop_storage::StorageError),
}

impl EngineError {
    pub fn data_missing(msg: impl Into<String>) -> Self {
        Self::DataMissing(msg.into())
    }

    pub fn playback_failed(msg: impl Into<String>) -> Self {
        Self::PlaybackFailed(msg.into())
    }

    pub fn storage_failure(msg: impl Into<String>) -> Self {
        Self::StorageFailure(msg.into())
    }

    pub fn weather_service(msg: impl Into<String>) -> Self {
        Self::WeatherService(msg.into())
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::DataMissing(_) => "data_missing",
            EngineError::Busy => "busy",
            EngineError::PlaybackFailed(_) | EngineError::Media(_) => "playback_failed",
            EngineError::StorageFailure(_) | EngineError::Storage(_) => "storage_failure",
            EngineError::WeatherService(_) => "weather_service",
            EngineError::Catalog(_) => "catalog",
        }
    }
}

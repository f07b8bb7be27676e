//! Structured playback logging.

use tracing::{error, info, warn, Span};

/// Logger carrying the playback id and weather type on every event.
#[derive(Debug, Clone)]
pub struct PlaybackLogger {
    playback_id: String,
    weather_type: String,
}

impl PlaybackLogger {
    pub fn new(session: u64, weather_type: &str) -> Self {
        Self {
            playback_id: format!("pb-{session}"),
            weather_type: weather_type.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            playback_id = %self.playback_id,
            weather_type = %self.weather_type,
            "Playback started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            playback_id = %self.playback_id,
            weather_type = %self.weather_type,
            "Playback progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            playback_id = %self.playback_id,
            weather_type = %self.weather_type,
            "Playback warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            playback_id = %self.playback_id,
            weather_type = %self.weather_type,
            "Playback error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            playback_id = %self.playback_id,
            weather_type = %self.weather_type,
            "Playback completed: {}", message
        );
    }

    pub fn playback_id(&self) -> &str {
        &self.playback_id
    }

    pub fn weather_type(&self) -> &str {
        &self.weather_type
    }

    /// Span wrapping one `initialize_tab` call.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "playback",
            playback_id = %self.playback_id,
            weather_type = %self.weather_type
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_logger_fields() {
        let logger = PlaybackLogger::new(7, "rain");
        assert_eq!(logger.playback_id(), "pb-7");
        assert_eq!(logger.weather_type(), "rain");
        logger.log_start("single clip");
        let _guard = logger.create_span().entered();
    }
}

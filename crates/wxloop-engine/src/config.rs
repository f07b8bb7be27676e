//! Engine configuration.

use std::time::Duration;

use wxloop_media::PoolConfig;
use wxloop_models::WeatherType;

use crate::catalog::TierWeights;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Startup sessions that may auto-trigger a playback
    pub max_auto_start_sessions: u32,
    /// Idle time after `last_session_end` that starts a new session
    pub session_gap: Duration,
    /// Consecutive plays of one clip before it is excluded
    pub repeat_limit: u32,
    /// Pool used when a weather type has none
    pub fallback_weather: WeatherType,
    /// Clips in the first-load carousel
    pub carousel_length: usize,
    /// A clip that neither ends nor errors within this window fails
    pub playback_timeout: Duration,
    /// Buffer-ahead hint for the clip about to play
    pub buffer_ahead: Duration,
    pub tier_weights: TierWeights,
    /// Retries for persisted-state writes
    pub store_write_retries: u32,
    pub store_retry_base_delay: Duration,
    pub pool: PoolConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_auto_start_sessions: 2,
            session_gap: Duration::from_secs(30 * 60),
            repeat_limit: 3,
            fallback_weather: WeatherType::Clear,
            carousel_length: 3,
            playback_timeout: Duration::from_secs(60),
            buffer_ahead: Duration::from_secs(10),
            tier_weights: TierWeights::default(),
            store_write_retries: 3,
            store_retry_base_delay: Duration::from_millis(50),
            pool: PoolConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_auto_start_sessions: std::env::var("WXLOOP_MAX_AUTO_STARTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_auto_start_sessions),
            session_gap: Duration::from_secs(
                std::env::var("WXLOOP_SESSION_GAP_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.session_gap.as_secs()),
            ),
            repeat_limit: std::env::var("WXLOOP_REPEAT_LIMIT")
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
                .map(|n| n.max(1))
                .unwrap_or(defaults.repeat_limit),
            fallback_weather: std::env::var("WXLOOP_FALLBACK_WEATHER")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.fallback_weather),
            carousel_length: std::env::var("WXLOOP_CAROUSEL_LENGTH")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .map(|n| n.max(1))
                .unwrap_or(defaults.carousel_length),
            playback_timeout: Duration::from_secs(
                std::env::var("WXLOOP_PLAYBACK_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.playback_timeout.as_secs()),
            ),
            buffer_ahead: Duration::from_secs(
                std::env::var("WXLOOP_BUFFER_AHEAD_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.buffer_ahead.as_secs()),
            ),
            tier_weights: std::env::var("WXLOOP_RARE_WEIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|rare| defaults.tier_weights.with_rare(rare))
                .unwrap_or(defaults.tier_weights),
            store_write_retries: std::env::var("WXLOOP_STORE_WRITE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.store_write_retries),
            store_retry_base_delay: defaults.store_retry_base_delay,
            pool: PoolConfig::from_env(),
        }
    }
}

//! Optimization options and pool configuration.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resource::PreloadStrategy;

/// Preparation priority of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// About to play
    High,
    #[default]
    Normal,
    /// Speculative preload
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }

    /// Preload strategy for this priority on a healthy network.
    pub fn preload(&self) -> PreloadStrategy {
        match self {
            Priority::High => PreloadStrategy::Auto,
            Priority::Normal => PreloadStrategy::Metadata,
            Priority::Low => PreloadStrategy::None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Options for a single `optimize` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OptimizeOptions {
    pub priority: Priority,
    /// How far ahead to buffer once playing
    pub buffer_ahead: Option<Duration>,
}

impl OptimizeOptions {
    pub fn high() -> Self {
        Self {
            priority: Priority::High,
            buffer_ahead: None,
        }
    }

    pub fn low() -> Self {
        Self {
            priority: Priority::Low,
            buffer_ahead: None,
        }
    }

    pub fn with_buffer_ahead(mut self, ahead: Duration) -> Self {
        self.buffer_ahead = Some(ahead);
        self
    }
}

/// Stream optimizer configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Idle handles older than this are reclaimable
    pub handle_ttl: Duration,
    /// Aggregate footprint above which reclamation kicks in
    pub memory_threshold_bytes: u64,
    /// Interval of the background reclamation sweep
    pub sweep_interval: Duration,
    /// Interval of the per-handle liveness check
    pub liveness_interval: Duration,
    /// Upper bound of related clips warmed by `preload_related`
    pub max_related_preloads: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            handle_ttl: Duration::from_secs(300), // 5 minutes
            memory_threshold_bytes: 256 * 1024 * 1024,
            sweep_interval: Duration::from_secs(60),
            liveness_interval: Duration::from_secs(30),
            max_related_preloads: 2,
        }
    }
}

impl PoolConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            handle_ttl: Duration::from_secs(
                std::env::var("WXLOOP_HANDLE_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.handle_ttl.as_secs()),
            ),
            memory_threshold_bytes: std::env::var("WXLOOP_MEMORY_THRESHOLD_MB")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(|mb| mb * 1024 * 1024)
                .unwrap_or(defaults.memory_threshold_bytes),
            sweep_interval: Duration::from_secs(
                std::env::var("WXLOOP_SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.sweep_interval.as_secs()),
            ),
            liveness_interval: Duration::from_secs(
                std::env::var("WXLOOP_LIVENESS_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.liveness_interval.as_secs()),
            ),
            max_related_preloads: std::env::var("WXLOOP_MAX_RELATED_PRELOADS")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .map(|n| n.clamp(1, 2))
                .unwrap_or(defaults.max_related_preloads),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_preload_mapping() {
        assert_eq!(Priority::High.preload(), PreloadStrategy::Auto);
        assert_eq!(Priority::Normal.preload(), PreloadStrategy::Metadata);
        assert_eq!(Priority::Low.preload(), PreloadStrategy::None);
    }

    #[test]
    fn test_pool_config_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.handle_ttl, Duration::from_secs(300));
        assert_eq!(config.max_related_preloads, 2);
    }
}

//! Card draw engine: weighted clip selection with a consecutive-play guard.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use wxloop_models::{ClipDescriptor, WeatherType};

use crate::catalog::{default_clip, Catalog};
use crate::config::EngineConfig;
use crate::metrics;
use crate::random::SampleSource;

/// What the engine remembers between draws.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlaybackHistory {
    pub last_clip_id: Option<String>,
    /// Consecutive draws of `last_clip_id`, per weather type
    pub consecutive: HashMap<WeatherType, u32>,
}

impl PlaybackHistory {
    pub fn consecutive_count(&self, weather: WeatherType) -> u32 {
        self.consecutive.get(&weather).copied().unwrap_or(0)
    }

    fn record(&mut self, weather: WeatherType, clip_id: &str) {
        let count = self.consecutive.entry(weather).or_insert(0);
        if self.last_clip_id.as_deref() == Some(clip_id) {
            *count += 1;
        } else {
            *count = 1;
            self.last_clip_id = Some(clip_id.to_string());
        }
    }
}

pub struct CardDrawEngine {
    catalog: Arc<Catalog>,
    rng: Box<dyn SampleSource>,
    history: PlaybackHistory,
    repeat_limit: u32,
    fallback: WeatherType,
}

impl CardDrawEngine {
    pub fn new(catalog: Arc<Catalog>, rng: Box<dyn SampleSource>) -> Self {
        Self {
            catalog,
            rng,
            history: PlaybackHistory::default(),
            repeat_limit: 3,
            fallback: WeatherType::Clear,
        }
    }

    pub fn from_config(catalog: Arc<Catalog>, rng: Box<dyn SampleSource>, config: &EngineConfig) -> Self {
        Self::new(catalog, rng)
            .with_repeat_limit(config.repeat_limit)
            .with_fallback(config.fallback_weather)
    }

    pub fn with_repeat_limit(mut self, limit: u32) -> Self {
        self.repeat_limit = limit.max(1);
        self
    }

    pub fn with_fallback(mut self, weather: WeatherType) -> Self {
        self.fallback = weather;
        self
    }

    /// Draw one clip for `weather` and record it in the history.
    ///
    /// Never fails: an unknown weather uses the fallback pool, and a catalog
    /// without either yields the synthetic default clip.
    pub fn draw_card(&mut self, weather: WeatherType) -> ClipDescriptor {
        let catalog = Arc::clone(&self.catalog);
        let Some(pool) = catalog.pool(weather).or_else(|| catalog.pool(self.fallback)) else {
            let clip = default_clip(weather);
            self.history.record(weather, &clip.id);
            return clip;
        };

        let mut candidates: Vec<&ClipDescriptor> = pool.clips.iter().collect();
        if self.history.consecutive_count(weather) >= self.repeat_limit {
            if let Some(last) = self.history.last_clip_id.as_deref() {
                let filtered: Vec<&ClipDescriptor> =
                    candidates.iter().copied().filter(|c| c.id != last).collect();
                if !filtered.is_empty() && filtered.len() < candidates.len() {
                    metrics::record_repeat_exclusion(weather.as_str());
                    debug!(weather_type = %weather, clip_id = %last, "Excluding repeated clip");
                    candidates = filtered;
                }
            }
        }

        let total: u64 = candidates.iter().map(|c| u64::from(c.weight)).sum();
        let mut remaining = self.rng.sample() * total as f64;
        let mut picked = candidates[0];
        for &candidate in &candidates {
            remaining -= f64::from(candidate.weight);
            if remaining <= 0.0 {
                picked = candidate;
                break;
            }
        }

        let clip = picked.clone();
        self.history.record(weather, &clip.id);
        metrics::record_draw(weather.as_str(), clip.tier.as_str());
        debug!(
            weather_type = %weather,
            clip_id = %clip.id,
            tier = %clip.tier,
            consecutive = self.history.consecutive_count(weather),
            "Drew clip"
        );
        clip
    }

    /// Draw `n` clips in a row, e.g. for the first-load carousel.
    pub fn draw_sequence(&mut self, weather: WeatherType, n: usize) -> Vec<ClipDescriptor> {
        (0..n).map(|_| self.draw_card(weather)).collect()
    }

    pub fn history(&self) -> &PlaybackHistory {
        &self.history
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn reset(&mut self) {
        self.history = PlaybackHistory::default();
    }
}

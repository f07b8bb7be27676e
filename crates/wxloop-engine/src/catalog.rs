//! Weather video catalog.
//!
//! Builds one `WeatherPool` per weather type from a `VideoMappingSource`.
//! Construction never fails: a type whose mapping errors (or comes back empty)
//! gets a single synthetic default clip, and an unavailable source makes the
//! whole catalog fall back to the built-in static table.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use wxloop_models::{ClipDescriptor, ClipTier, WeatherPool, WeatherType};

use crate::metrics;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Mapping source unavailable: {0}")]
    Unavailable(String),

    #[error("No clips mapped for {0}")]
    Unmapped(WeatherType),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid manifest: {0}")]
    Json(#[from] serde_json::Error),
}

/// Supplies clip paths per weather type.
pub trait VideoMappingSource: Send + Sync {
    /// `false` when the source cannot be consulted at all.
    fn is_available(&self) -> bool {
        true
    }

    fn clip_paths(&self, weather: WeatherType) -> Result<Vec<String>, CatalogError>;
}

/// Selection weight per rarity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierWeights {
    pub normal: u32,
    pub special: u32,
    pub rare: u32,
}

impl TierWeights {
    pub const RARE_MIN: u32 = 5;
    pub const RARE_MAX: u32 = 10;

    /// Weights used by the built-in static table.
    pub const STATIC: TierWeights = TierWeights {
        normal: 80,
        special: 15,
        rare: 10,
    };

    /// Override the rare weight, kept within `RARE_MIN..=RARE_MAX`.
    pub fn with_rare(mut self, rare: u32) -> Self {
        self.rare = rare.clamp(Self::RARE_MIN, Self::RARE_MAX);
        self
    }

    pub fn for_tier(&self, tier: ClipTier) -> u32 {
        match tier {
            ClipTier::Normal => self.normal,
            ClipTier::Special => self.special,
            ClipTier::Rare => self.rare,
        }
    }
}

impl Default for TierWeights {
    fn default() -> Self {
        Self {
            normal: 80,
            special: 15,
            rare: 5,
        }
    }
}

/// Built-in clip table, used when no mapping source is available.
const STATIC_TABLE: &[(WeatherType, &[&str])] = &[
    (
        WeatherType::Clear,
        &[
            "video/tab/clear/blue-sky.mp4",
            "video/tab/clear/drifting-cirrus.mp4",
            "video/tab/clear-special/golden-hour.mp4",
            "video/tab/rare/rainbow-arc.mp4",
        ],
    ),
    (
        WeatherType::Cloudy,
        &[
            "video/tab/cloudy/passing-clouds.mp4",
            "video/tab/cloudy/cumulus-timelapse.mp4",
            "video/tab/cloudy-special/sun-breaks.mp4",
        ],
    ),
    (
        WeatherType::Overcast,
        &[
            "video/tab/overcast/grey-ceiling.mp4",
            "video/tab/overcast/low-deck.mp4",
        ],
    ),
    (
        WeatherType::Rain,
        &[
            "video/tab/rain/window-drops.mp4",
            "video/tab/rain/street-puddles.mp4",
            "video/tab/rain-special/umbrella-walk.mp4",
            "video/tab/rare/rain-rainbow.mp4",
        ],
    ),
    (
        WeatherType::Thunderstorm,
        &[
            "video/tab/thunderstorm/distant-flashes.mp4",
            "video/tab/thunderstorm/downpour.mp4",
            "video/tab/rare/supercell.mp4",
        ],
    ),
    (
        WeatherType::Snow,
        &[
            "video/tab/snow/soft-flakes.mp4",
            "video/tab/snow/pine-branches.mp4",
            "video/tab/snow-special/cabin-window.mp4",
        ],
    ),
    (
        WeatherType::Fog,
        &[
            "video/tab/fog/valley-mist.mp4",
            "video/tab/fog/harbor-haze.mp4",
        ],
    ),
];

/// Mapping loaded from a JSON manifest of the form
/// `{"clear": ["video/tab/clear/a.mp4", ...], ...}`.
#[derive(Debug, Clone, Default)]
pub struct ManifestMappingSource {
    entries: HashMap<WeatherType, Vec<String>>,
}

impl ManifestMappingSource {
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let raw: HashMap<String, Vec<String>> = serde_json::from_str(json)?;
        let mut entries = HashMap::new();
        for (key, paths) in raw {
            match key.parse::<WeatherType>() {
                Ok(weather) => {
                    entries.entry(weather).or_insert_with(Vec::new).extend(paths);
                }
                Err(e) => warn!(key = %key, error = %e, "Ignoring manifest entry"),
            }
        }
        Ok(Self { entries })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let source = Self::from_json_str(&json)?;
        info!(
            path = %path.as_ref().display(),
            weather_types = source.entries.len(),
            "Loaded clip manifest"
        );
        Ok(source)
    }
}

impl VideoMappingSource for ManifestMappingSource {
    fn clip_paths(&self, weather: WeatherType) -> Result<Vec<String>, CatalogError> {
        self.entries
            .get(&weather)
            .cloned()
            .ok_or(CatalogError::Unmapped(weather))
    }
}

/// Weather type → clip pool.
#[derive(Debug, Clone)]
pub struct Catalog {
    pools: HashMap<WeatherType, WeatherPool>,
}

impl Catalog {
    /// Build pools for `types` (the default weather is always included).
    pub fn build_pools(
        types: &[WeatherType],
        source: Option<&dyn VideoMappingSource>,
        weights: &TierWeights,
    ) -> Self {
        let source = match source {
            Some(s) if s.is_available() => s,
            _ => {
                warn!("Clip mapping source unavailable, using static table");
                metrics::record_catalog_fallback("all");
                return Self::static_table();
            }
        };

        let mut pools = HashMap::new();
        for &weather in with_default(types).iter() {
            let clips = match source.clip_paths(weather) {
                Ok(paths) if !paths.is_empty() => clips_from_paths(weather, &paths, weights),
                Ok(_) => {
                    warn!(weather_type = %weather, "No clips mapped, substituting default clip");
                    metrics::record_catalog_fallback(weather.as_str());
                    vec![default_clip(weather)]
                }
                Err(e) => {
                    warn!(weather_type = %weather, error = %e, "Clip mapping failed, substituting default clip");
                    metrics::record_catalog_fallback(weather.as_str());
                    vec![default_clip(weather)]
                }
            };
            debug!(weather_type = %weather, clips = clips.len(), "Built weather pool");
            pools.insert(weather, WeatherPool::new(weather, clips));
        }

        Self { pools }
    }

    /// Catalog from the built-in table.
    pub fn static_table() -> Self {
        let pools = STATIC_TABLE
            .iter()
            .map(|(weather, paths)| {
                let paths: Vec<String> = paths.iter().map(|p| p.to_string()).collect();
                let clips = clips_from_paths(*weather, &paths, &TierWeights::STATIC);
                (*weather, WeatherPool::new(*weather, clips))
            })
            .collect();
        Self { pools }
    }

    /// Catalog from prepared pools. Empty pools get a default clip.
    pub fn from_pools(pools: impl IntoIterator<Item = WeatherPool>) -> Self {
        let pools = pools
            .into_iter()
            .map(|mut pool| {
                if pool.is_empty() {
                    pool.clips.push(default_clip(pool.weather_type));
                }
                (pool.weather_type, pool)
            })
            .collect();
        Self { pools }
    }

    pub fn pool(&self, weather: WeatherType) -> Option<&WeatherPool> {
        self.pools.get(&weather)
    }

    pub fn weather_types(&self) -> Vec<WeatherType> {
        let mut types: Vec<_> = self.pools.keys().copied().collect();
        types.sort_by_key(|w| w.as_str());
        types
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

fn with_default(types: &[WeatherType]) -> Vec<WeatherType> {
    let mut seen = HashSet::new();
    let mut out: Vec<WeatherType> = types.iter().copied().filter(|w| seen.insert(*w)).collect();
    if seen.insert(WeatherType::default()) {
        out.push(WeatherType::default());
    }
    out
}

fn clips_from_paths(weather: WeatherType, paths: &[String], weights: &TierWeights) -> Vec<ClipDescriptor> {
    let mut ids = HashSet::new();
    paths
        .iter()
        .map(|path| {
            let tier = ClipTier::from_path(path);
            let stem = Path::new(path)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("clip");

            let base = format!("{}-{}", weather, stem);
            let mut id = base.clone();
            let mut n = 2;
            while !ids.insert(id.clone()) {
                id = format!("{base}-{n}");
                n += 1;
            }

            ClipDescriptor::new(
                id,
                path.clone(),
                weights.for_tier(tier),
                tier,
                format!("{} {} loop: {}", tier, weather, stem.replace('-', " ")),
            )
        })
        .collect()
}

/// Synthetic clip standing in for a pool that could not be built.
pub fn default_clip(weather: WeatherType) -> ClipDescriptor {
    ClipDescriptor::new(
        format!("{}-default", weather),
        format!("video/tab/{}/default.mp4", weather),
        TierWeights::default().normal,
        ClipTier::Normal,
        format!("default {} loop", weather),
    )
}

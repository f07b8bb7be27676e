//! Clip descriptors and weather pools.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::WeatherType;

/// Rarity tier of a clip, driving its default selection weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClipTier {
    #[default]
    Normal,
    Special,
    Rare,
}

impl ClipTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipTier::Normal => "normal",
            ClipTier::Special => "special",
            ClipTier::Rare => "rare",
        }
    }

    /// Classify a clip by its storage path.
    ///
    /// Paths follow `video/tab/<folder>/<file>`; a folder naming `rare` or
    /// `special` marks the tier, anything else is normal.
    pub fn from_path(path: &str) -> Self {
        let folder = path
            .trim_start_matches('/')
            .strip_prefix("video/tab/")
            .and_then(|rest| rest.rsplit_once('/').map(|(folder, _)| folder))
            .unwrap_or("")
            .to_lowercase();

        if folder.contains("rare") {
            ClipTier::Rare
        } else if folder.contains("special") {
            ClipTier::Special
        } else {
            ClipTier::Normal
        }
    }
}

impl fmt::Display for ClipTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata for one selectable video loop.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct ClipDescriptor {
    /// Identifier, unique within the catalog
    pub id: String,
    /// Storage path, `video/tab/<folder>/<file>`
    pub path: String,
    /// Relative selection weight (always > 0)
    pub weight: u32,
    pub tier: ClipTier,
    pub description: String,
}

impl ClipDescriptor {
    /// Create a descriptor. A zero weight is clamped to 1 so that every
    /// descriptor stays selectable.
    pub fn new(
        id: impl Into<String>,
        path: impl Into<String>,
        weight: u32,
        tier: ClipTier,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            weight: weight.max(1),
            tier,
            description: description.into(),
        }
    }
}

/// The set of clips eligible for one weather category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeatherPool {
    pub weather_type: WeatherType,
    pub clips: Vec<ClipDescriptor>,
}

impl WeatherPool {
    pub fn new(weather_type: WeatherType, clips: Vec<ClipDescriptor>) -> Self {
        Self { weather_type, clips }
    }

    /// Sum of all clip weights.
    pub fn total_weight(&self) -> u64 {
        self.clips.iter().map(|c| u64::from(c.weight)).sum()
    }

    pub fn get(&self, id: &str) -> Option<&ClipDescriptor> {
        self.clips.iter().find(|c| c.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }
}

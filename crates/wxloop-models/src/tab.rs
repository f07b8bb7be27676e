//! Tab initialization request and playback outcome.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{ClipDescriptor, TriggerEvent, WeatherSnapshot};

/// Visual theme of the host page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Auto,
    Light,
    Dark,
}

/// User settings relevant to ambient playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_true")]
    pub animation_enabled: bool,
    #[serde(default = "default_true")]
    pub floating_ball_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            animation_enabled: true,
            floating_ball_enabled: true,
        }
    }
}

/// Input to a tab initialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TabContext {
    pub weather: WeatherSnapshot,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub settings: Settings,
    /// Gate event; a plain tab open when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<TriggerEvent>,
}

impl TabContext {
    pub fn new(weather: WeatherSnapshot) -> Self {
        Self {
            weather,
            ..Default::default()
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_event(mut self, event: TriggerEvent) -> Self {
        self.event = Some(event);
        self
    }
}

/// Result of a tab initialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlaybackOutcome {
    pub success: bool,
    pub played: bool,
    /// Playback was interrupted by `stop()`
    #[serde(default)]
    pub cancelled: bool,
    /// First clip played
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<ClipDescriptor>,
    /// Every clip played, in order (more than one for a carousel)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clips: Vec<ClipDescriptor>,
}

impl PlaybackOutcome {
    /// Completed without playing anything.
    pub fn skipped() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    /// Rejected before playback.
    pub fn failed() -> Self {
        Self::default()
    }

    pub fn played(clips: Vec<ClipDescriptor>, cancelled: bool) -> Self {
        Self {
            success: true,
            played: true,
            cancelled,
            video: clips.first().cloned(),
            clips,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default_enabled() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert!(settings.animation_enabled);
        assert!(settings.floating_ball_enabled);

        let off: Settings = serde_json::from_str(r#"{"animationEnabled":false}"#).unwrap();
        assert!(!off.animation_enabled);
    }

    #[test]
    fn test_outcome_constructors() {
        let skipped = PlaybackOutcome::skipped();
        assert!(skipped.success && !skipped.played);

        let failed = PlaybackOutcome::failed();
        assert!(!failed.success);
    }
}

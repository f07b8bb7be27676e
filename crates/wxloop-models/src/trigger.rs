//! Trigger gate types: events, decisions and persisted state.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::WeatherType;

/// Why a playback was (or would be) triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// First tab ever opened: rotating multi-clip sequence
    FirstLoadCarousel,
    /// Regular new-tab trigger during an early startup session
    TabOpen,
    /// User changed animation settings
    SettingsChange,
    /// Forced weather refresh
    ForceRefresh,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::FirstLoadCarousel => "first_load_carousel",
            TriggerType::TabOpen => "tab_open",
            TriggerType::SettingsChange => "settings_change",
            TriggerType::ForceRefresh => "force_refresh",
        }
    }

    /// Automatic triggers count against the startup budget; overrides do not.
    pub fn is_automatic(&self) -> bool {
        matches!(self, TriggerType::FirstLoadCarousel | TriggerType::TabOpen)
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TriggerType {
    type Err = TriggerTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first_load_carousel" => Ok(TriggerType::FirstLoadCarousel),
            "tab_open" => Ok(TriggerType::TabOpen),
            "settings_change" => Ok(TriggerType::SettingsChange),
            "force_refresh" => Ok(TriggerType::ForceRefresh),
            _ => Err(TriggerTypeParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown trigger type: {0}")]
pub struct TriggerTypeParseError(String);

/// Event presented to the trigger gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerEvent {
    /// A new tab was opened
    TabOpened,
    /// User settings changed (override)
    SettingsChanged,
    /// Weather was force-refreshed (override), optionally naming the new weather
    ForceRefresh {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        weather_type: Option<WeatherType>,
    },
}

impl TriggerEvent {
    pub fn is_override(&self) -> bool {
        !matches!(self, TriggerEvent::TabOpened)
    }
}

/// Observable phase of the gate state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum GatePhase {
    #[default]
    Idle,
    Eligible,
    Triggered,
    Cooldown,
}

/// Result of a gate check. Produced without mutating persisted state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TriggerDecision {
    pub should_trigger: bool,
    pub reason: String,
    pub trigger_type: Option<TriggerType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_type: Option<WeatherType>,
    #[serde(default)]
    pub needs_carousel: bool,
    pub phase: GatePhase,
}

impl TriggerDecision {
    pub fn eligible(trigger_type: TriggerType, reason: impl Into<String>) -> Self {
        Self {
            should_trigger: true,
            reason: reason.into(),
            trigger_type: Some(trigger_type),
            weather_type: None,
            needs_carousel: trigger_type == TriggerType::FirstLoadCarousel,
            phase: GatePhase::Eligible,
        }
    }

    pub fn denied(phase: GatePhase, reason: impl Into<String>) -> Self {
        Self {
            should_trigger: false,
            reason: reason.into(),
            trigger_type: None,
            weather_type: None,
            needs_carousel: false,
            phase,
        }
    }

    pub fn with_weather(mut self, weather_type: Option<WeatherType>) -> Self {
        self.weather_type = weather_type;
        self
    }
}

/// Persisted gate state. Survives process restarts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TriggerState {
    /// Startup sessions that already consumed an automatic trigger
    pub start_count: u32,
    pub last_start_time: Option<DateTime<Utc>>,
    /// Tab-open event that last consumed an automatic trigger
    pub last_tab_open_time: Option<DateTime<Utc>>,
    pub last_session_end: Option<DateTime<Utc>>,
    pub has_first_load_carousel: bool,
    pub last_trigger_time: Option<DateTime<Utc>>,
    pub last_trigger_type: Option<TriggerType>,
    pub last_trigger_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_type_roundtrip_str() {
        for t in [
            TriggerType::FirstLoadCarousel,
            TriggerType::TabOpen,
            TriggerType::SettingsChange,
            TriggerType::ForceRefresh,
        ] {
            assert_eq!(t.as_str().parse::<TriggerType>().unwrap(), t);
        }
        assert!("boot".parse::<TriggerType>().is_err());
    }

    #[test]
    fn test_event_override() {
        assert!(!TriggerEvent::TabOpened.is_override());
        assert!(TriggerEvent::SettingsChanged.is_override());
        assert!(TriggerEvent::ForceRefresh { weather_type: None }.is_override());
    }

    #[test]
    fn test_event_json_shape() {
        let event: TriggerEvent =
            serde_json::from_str(r#"{"kind":"force_refresh","weather_type":"snow"}"#).unwrap();
        assert_eq!(
            event,
            TriggerEvent::ForceRefresh {
                weather_type: Some(WeatherType::Snow)
            }
        );
    }

    #[test]
    fn test_eligible_carousel_flag() {
        assert!(TriggerDecision::eligible(TriggerType::FirstLoadCarousel, "first").needs_carousel);
        assert!(!TriggerDecision::eligible(TriggerType::TabOpen, "tab").needs_carousel);
    }
}

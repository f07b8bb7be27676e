//! Weather categories and observation snapshots.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Weather category driving clip selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherType {
    /// Clear / sunny sky
    #[default]
    Clear,
    /// Scattered or partial cloud cover
    Cloudy,
    /// Fully overcast sky
    Overcast,
    /// Rain, drizzle and showers
    Rain,
    /// Thunderstorms
    Thunderstorm,
    /// Snow and sleet
    Snow,
    /// Fog, mist and haze
    Fog,
}

impl WeatherType {
    /// Every supported weather category.
    pub const ALL: &'static [WeatherType] = &[
        WeatherType::Clear,
        WeatherType::Cloudy,
        WeatherType::Overcast,
        WeatherType::Rain,
        WeatherType::Thunderstorm,
        WeatherType::Snow,
        WeatherType::Fog,
    ];

    /// Canonical lowercase name, also used as the catalog folder name.
    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherType::Clear => "clear",
            WeatherType::Cloudy => "cloudy",
            WeatherType::Overcast => "overcast",
            WeatherType::Rain => "rain",
            WeatherType::Thunderstorm => "thunderstorm",
            WeatherType::Snow => "snow",
            WeatherType::Fog => "fog",
        }
    }
}

impl fmt::Display for WeatherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WeatherType {
    type Err = WeatherParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "clear" | "sunny" | "fair" => Ok(WeatherType::Clear),
            "cloudy" | "partly_cloudy" | "clouds" => Ok(WeatherType::Cloudy),
            "overcast" => Ok(WeatherType::Overcast),
            "rain" | "rainy" | "drizzle" | "showers" => Ok(WeatherType::Rain),
            "thunderstorm" | "storm" | "thunder" => Ok(WeatherType::Thunderstorm),
            "snow" | "snowy" | "sleet" => Ok(WeatherType::Snow),
            "fog" | "foggy" | "mist" | "haze" => Ok(WeatherType::Fog),
            _ => Err(WeatherParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown weather type: {0}")]
pub struct WeatherParseError(String);

/// Current weather observation as delivered by the weather query contract.
///
/// `weather_type` stays a raw string so that an absent or unrecognised value
/// can be distinguished from a parsed one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub weather_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
}

impl WeatherSnapshot {
    /// Snapshot carrying only a weather category.
    pub fn of(weather_type: WeatherType) -> Self {
        Self {
            weather_type: Some(weather_type.to_string()),
            ..Default::default()
        }
    }

    /// Parse the raw category, if present and recognised.
    pub fn parsed_type(&self) -> Option<WeatherType> {
        self.weather_type.as_deref().and_then(|s| s.parse().ok())
    }
}

/// Geographic location used by the weather query contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Location {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weather_type_aliases() {
        assert_eq!("Sunny".parse::<WeatherType>().unwrap(), WeatherType::Clear);
        assert_eq!("partly-cloudy".parse::<WeatherType>().unwrap(), WeatherType::Cloudy);
        assert_eq!("drizzle".parse::<WeatherType>().unwrap(), WeatherType::Rain);
        assert_eq!(" haze ".parse::<WeatherType>().unwrap(), WeatherType::Fog);
        assert!("volcanic_ash".parse::<WeatherType>().is_err());
    }

    #[test]
    fn test_display_matches_serde() {
        for weather in WeatherType::ALL {
            let json = serde_json::to_string(weather).unwrap();
            assert_eq!(json, format!("\"{}\"", weather));
        }
    }

    #[test]
    fn test_snapshot_type_field() {
        let snapshot: WeatherSnapshot =
            serde_json::from_str(r#"{"type":"rain","temperatureC":12.5}"#).unwrap();
        assert_eq!(snapshot.parsed_type(), Some(WeatherType::Rain));
        assert_eq!(snapshot.temperature_c, Some(12.5));

        let empty: WeatherSnapshot = serde_json::from_str("{}").unwrap();
        assert!(empty.weather_type.is_none());
        assert_eq!(empty.parsed_type(), None);
    }
}

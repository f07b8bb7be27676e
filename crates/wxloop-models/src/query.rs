//! Weather/location query contract exchanged with the background service.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Location, WeatherSnapshot};

/// Request sent to the weather/location service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum WeatherRequest {
    #[serde(rename = "weather.getCurrent")]
    GetCurrentWeather,
    #[serde(rename = "weather.forceUpdate")]
    ForceUpdateWeather,
    #[serde(rename = "location.getCurrent")]
    GetCurrentLocation,
    #[serde(rename = "location.set")]
    SetLocation { location: Location },
}

impl WeatherRequest {
    pub fn type_name(&self) -> &'static str {
        match self {
            WeatherRequest::GetCurrentWeather => "weather.getCurrent",
            WeatherRequest::ForceUpdateWeather => "weather.forceUpdate",
            WeatherRequest::GetCurrentLocation => "location.getCurrent",
            WeatherRequest::SetLocation { .. } => "location.set",
        }
    }
}

/// Payload carried by a successful response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum QueryPayload {
    Location(Location),
    Weather(WeatherSnapshot),
}

/// Response envelope `{success, data?, error?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ResponseEnvelope<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ResponseEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Data of a successful response, `None` otherwise.
    pub fn into_data(self) -> Option<T> {
        if self.success {
            self.data
        } else {
            None
        }
    }
}

impl ResponseEnvelope<QueryPayload> {
    /// Weather snapshot carried by a successful response, if any.
    pub fn into_weather(self) -> Option<WeatherSnapshot> {
        match self.into_data() {
            Some(QueryPayload::Weather(snapshot)) => Some(snapshot),
            _ => None,
        }
    }
}

//! Weather/location query contract.
//!
//! The engine never fetches weather itself; it asks a `WeatherService`, which
//! in the extension is the background worker reached over message passing.

use std::sync::Mutex;

use async_trait::async_trait;

use wxloop_models::{Location, QueryPayload, ResponseEnvelope, WeatherRequest, WeatherSnapshot};

use crate::error::EngineResult;

#[async_trait]
pub trait WeatherService: Send + Sync {
    async fn query(&self, request: WeatherRequest) -> EngineResult<ResponseEnvelope<QueryPayload>>;
}

/// In-process service answering from fixed data.
#[derive(Debug, Default)]
pub struct StaticWeatherService {
    current: Mutex<Option<WeatherSnapshot>>,
    /// Returned by `weather.forceUpdate`; falls back to `current`
    refreshed: Mutex<Option<WeatherSnapshot>>,
    location: Mutex<Option<Location>>,
}

impl StaticWeatherService {
    pub fn new(current: Option<WeatherSnapshot>) -> Self {
        Self {
            current: Mutex::new(current),
            ..Default::default()
        }
    }

    pub fn with_refreshed(self, snapshot: WeatherSnapshot) -> Self {
        *self.refreshed.lock().unwrap_or_else(|e| e.into_inner()) = Some(snapshot);
        self
    }

    pub fn set_current(&self, snapshot: Option<WeatherSnapshot>) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = snapshot;
    }
}

#[async_trait]
impl WeatherService for StaticWeatherService {
    async fn query(&self, request: WeatherRequest) -> EngineResult<ResponseEnvelope<QueryPayload>> {
        let response = match request {
            WeatherRequest::GetCurrentWeather => {
                let current = self.current.lock().unwrap_or_else(|e| e.into_inner()).clone();
                match current {
                    Some(snapshot) => ResponseEnvelope::ok(QueryPayload::Weather(snapshot)),
                    None => ResponseEnvelope::err("no weather data"),
                }
            }
            WeatherRequest::ForceUpdateWeather => {
                let refreshed = self.refreshed.lock().unwrap_or_else(|e| e.into_inner()).take();
                let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
                if refreshed.is_some() {
                    *current = refreshed;
                }
                match current.clone() {
                    Some(snapshot) => ResponseEnvelope::ok(QueryPayload::Weather(snapshot)),
                    None => ResponseEnvelope::err("weather refresh failed"),
                }
            }
            WeatherRequest::GetCurrentLocation => {
                let location = self.location.lock().unwrap_or_else(|e| e.into_inner()).clone();
                match location {
                    Some(location) => ResponseEnvelope::ok(QueryPayload::Location(location)),
                    None => ResponseEnvelope::err("location not set"),
                }
            }
            WeatherRequest::SetLocation { location } => {
                *self.location.lock().unwrap_or_else(|e| e.into_inner()) = Some(location.clone());
                ResponseEnvelope::ok(QueryPayload::Location(location))
            }
        };
        Ok(response)
    }
}

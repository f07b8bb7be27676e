//! Ambient weather loop engine.
//!
//! This crate provides:
//! - The weather video catalog and weighted card draw
//! - The persisted trigger gate deciding when a playback may start
//! - The playback orchestrator sequencing gate, draw and media pool
//! - Configuration, retry, structured logging and metrics for the above

pub mod callbacks;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod context;
pub mod draw;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod random;
pub mod retry;
pub mod settings;
pub mod trigger_gate;
pub mod weather_service;

pub use callbacks::{CallbackEvent, NoopCallbacks, PlaybackCallbacks, RecordingCallbacks};
pub use catalog::{Catalog, CatalogError, ManifestMappingSource, TierWeights, VideoMappingSource};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use context::{EngineContext, EngineContextBuilder};
pub use draw::{CardDrawEngine, PlaybackHistory};
pub use error::{EngineError, EngineResult};
pub use logging::PlaybackLogger;
pub use orchestrator::PlaybackOrchestrator;
pub use random::{SampleSource, SeededSource, SequenceSource, ThreadRngSource};
pub use retry::{retry_async, RetryConfig, RetryResult};
pub use settings::load_settings;
pub use trigger_gate::TriggerGate;
pub use weather_service::{StaticWeatherService, WeatherService};

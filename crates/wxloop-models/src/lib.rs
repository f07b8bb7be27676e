//! Shared data models for the wxloop ambient weather engine.
//!
//! This crate provides Serde-serializable types for:
//! - Weather categories and observation snapshots
//! - Clip descriptors, rarity tiers and weather pools
//! - Trigger gate events, decisions and persisted state
//! - Tab initialization requests and playback outcomes
//! - The weather/location query contract

pub mod clip;
pub mod query;
pub mod tab;
pub mod trigger;
pub mod weather;

// Re-export common types
pub use clip::{ClipDescriptor, ClipTier, WeatherPool};
pub use query::{QueryPayload, ResponseEnvelope, WeatherRequest};
pub use tab::{PlaybackOutcome, Settings, TabContext, Theme};
pub use trigger::{GatePhase, TriggerDecision, TriggerEvent, TriggerState, TriggerType};
pub use weather::{Location, WeatherParseError, WeatherSnapshot, WeatherType};

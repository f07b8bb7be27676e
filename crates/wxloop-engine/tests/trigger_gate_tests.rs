//! Trigger gate integration tests against the storage backends.

mod common;

use std::sync::Arc;

use serde_json::json;

use wxloop_engine::{ManualClock, TriggerGate};
use wxloop_models::{GatePhase, TriggerEvent, TriggerType, WeatherType};
use wxloop_storage::keys::{EXTENSION_START_COUNT, HAS_FIRST_LOAD_CAROUSEL};
use wxloop_storage::{Entries, JsonFileStore, KeyValueStore, MemoryStore};

use common::{test_config, SwitchableStore};

fn gate(store: Arc<dyn KeyValueStore>) -> TriggerGate {
    TriggerGate::new(store, Arc::new(ManualClock::default()), &test_config())
}

fn store_with_start_count(count: u32) -> Arc<MemoryStore> {
    let mut entries = Entries::new();
    entries.insert(EXTENSION_START_COUNT.to_string(), json!(count));
    entries.insert(HAS_FIRST_LOAD_CAROUSEL.to_string(), json!(true));
    Arc::new(MemoryStore::with_entries(entries))
}

/// Checks alone never consume the gate.
#[tokio::test]
async fn test_two_checks_without_record_both_eligible() {
    let gate = gate(Arc::new(MemoryStore::new()));
    for _ in 0..2 {
        let decision = gate.check_should_trigger(&TriggerEvent::TabOpened).await;
        assert!(decision.should_trigger);
        assert_eq!(decision.phase, GatePhase::Eligible);
    }
}

/// Eligibility for tab opens is exactly `start_count < 2`.
#[tokio::test]
async fn test_start_count_bounds_automatic_triggers() {
    for (count, expected) in [(0, true), (1, true), (2, false), (5, false)] {
        let gate = gate(store_with_start_count(count));
        let decision = gate.check_should_trigger(&TriggerEvent::TabOpened).await;
        assert_eq!(decision.should_trigger, expected, "start_count = {count}");
    }
}

/// Overrides pass regardless of the startup budget.
#[tokio::test]
async fn test_overrides_ignore_start_count() {
    let gate = gate(store_with_start_count(9));

    let settings = gate.check_should_trigger(&TriggerEvent::SettingsChanged).await;
    assert!(settings.should_trigger);
    assert_eq!(settings.trigger_type, Some(TriggerType::SettingsChange));
    assert!(!settings.needs_carousel);

    let refresh = gate
        .check_should_trigger(&TriggerEvent::ForceRefresh {
            weather_type: Some(WeatherType::Thunderstorm),
        })
        .await;
    assert!(refresh.should_trigger);
    assert_eq!(refresh.weather_type, Some(WeatherType::Thunderstorm));
}

/// Unreadable storage behaves like a fresh install.
#[tokio::test]
async fn test_storage_failure_fails_open() {
    let store = Arc::new(SwitchableStore::failing());
    let gate = gate(store.clone());

    let decision = gate.check_should_trigger(&TriggerEvent::TabOpened).await;
    assert!(decision.should_trigger);
    assert!(decision.needs_carousel);
    assert_eq!(decision.trigger_type, Some(TriggerType::FirstLoadCarousel));

    let err = gate
        .record_trigger(TriggerType::FirstLoadCarousel, "first")
        .await
        .expect_err("writes are failing");
    assert_eq!(err.kind(), "storage_failure");
}

/// Gate state survives a restart when backed by the JSON file store.
#[tokio::test]
async fn test_state_persists_across_gate_instances() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("state.json");
    let clock = Arc::new(ManualClock::default());

    let first = TriggerGate::new(Arc::new(JsonFileStore::new(&path)), clock.clone(), &test_config());
    first.begin_session().await.expect("begin session");
    clock.advance(chrono::Duration::seconds(1));
    first
        .record_trigger(TriggerType::FirstLoadCarousel, "first tab")
        .await
        .expect("record trigger");

    let second = TriggerGate::new(Arc::new(JsonFileStore::new(&path)), clock.clone(), &test_config());
    let state = second.state().await;
    assert_eq!(state.start_count, 1);
    assert!(state.has_first_load_carousel);
    assert_eq!(state.last_trigger_reason.as_deref(), Some("first tab"));
    assert_eq!(second.phase().await, GatePhase::Cooldown);

    clock.advance(chrono::Duration::seconds(1));
    second.begin_session().await.expect("begin session");
    clock.advance(chrono::Duration::seconds(1));
    let decision = second.check_should_trigger(&TriggerEvent::TabOpened).await;
    assert_eq!(decision.trigger_type, Some(TriggerType::TabOpen));
}

//! Trigger gate: decides whether a tab event may start a playback.
//!
//! The gate moves through `Idle → Eligible → Triggered → Cooldown → Idle`.
//! Its state is persisted in the key-value store, so it survives restarts;
//! the gate is the only writer of those keys.
//!
//! Automatic (tab-open) triggers are limited to the first
//! `max_auto_start_sessions` startup sessions and to one per session.
//! Settings changes and forced refreshes are overrides and always pass.
//!
//! A session starts at `begin_session`. If the last recorded session end is
//! older than `session_gap`, the session is considered to have started no
//! earlier than that end, which re-opens the gate after a long idle period
//! even without a fresh `begin_session`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use wxloop_models::{GatePhase, TriggerDecision, TriggerEvent, TriggerState, TriggerType};
use wxloop_storage::keys::{
    EXTENSION_START_COUNT, HAS_FIRST_LOAD_CAROUSEL, LAST_SESSION_END, LAST_START_TIME,
    LAST_TAB_OPEN_TIME, LAST_TRIGGER_REASON, LAST_TRIGGER_TIME, LAST_TRIGGER_TYPE,
    TRIGGER_STATE_KEYS,
};
use wxloop_storage::{Entries, KeyValueStore};

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::metrics;
use crate::retry::{retry_async, RetryConfig, RetryResult};

pub struct TriggerGate {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    max_auto_start_sessions: u32,
    session_gap: chrono::Duration,
    retry: RetryConfig,
}

impl TriggerGate {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, config: &EngineConfig) -> Self {
        Self {
            store,
            clock,
            max_auto_start_sessions: config.max_auto_start_sessions,
            session_gap: chrono::Duration::from_std(config.session_gap)
                .unwrap_or_else(|_| chrono::Duration::minutes(30)),
            retry: RetryConfig::new("trigger_state_write")
                .with_max_retries(config.store_write_retries)
                .with_base_delay(config.store_retry_base_delay),
        }
    }

    /// Load the persisted state. A read failure yields the default state.
    pub async fn state(&self) -> TriggerState {
        match self.load_state().await {
            Ok(state) => state,
            Err(e) => {
                metrics::record_storage_failure("read");
                warn!(store = self.store.name(), error = %e, "Trigger state unreadable, failing open");
                TriggerState::default()
            }
        }
    }

    /// Load the persisted state, surfacing read failures.
    pub async fn load_state(&self) -> EngineResult<TriggerState> {
        let entries = self.store.get(TRIGGER_STATE_KEYS).await?;
        Ok(TriggerState {
            start_count: entries
                .get(EXTENSION_START_COUNT)
                .and_then(Value::as_u64)
                .map(|n| n.min(u64::from(u32::MAX)) as u32)
                .unwrap_or(0),
            last_start_time: read_timestamp(&entries, LAST_START_TIME),
            last_tab_open_time: read_timestamp(&entries, LAST_TAB_OPEN_TIME),
            last_session_end: read_timestamp(&entries, LAST_SESSION_END),
            has_first_load_carousel: entries
                .get(HAS_FIRST_LOAD_CAROUSEL)
                .and_then(Value::as_bool)
                .unwrap_or(false),
            last_trigger_time: read_timestamp(&entries, LAST_TRIGGER_TIME),
            last_trigger_type: entries
                .get(LAST_TRIGGER_TYPE)
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok()),
            last_trigger_reason: entries
                .get(LAST_TRIGGER_REASON)
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    /// Decide whether `event` may start a playback. Never writes.
    pub async fn check_should_trigger(&self, event: &TriggerEvent) -> TriggerDecision {
        let state = self.state().await;
        let decision = self.decide(&state, event, self.clock.now());

        metrics::record_trigger_check(if decision.should_trigger { "eligible" } else { "denied" });
        debug!(
            should_trigger = decision.should_trigger,
            phase = ?decision.phase,
            start_count = state.start_count,
            reason = %decision.reason,
            "Trigger check"
        );
        decision
    }

    fn decide(&self, state: &TriggerState, event: &TriggerEvent, now: DateTime<Utc>) -> TriggerDecision {
        if !event.is_override() {
            return self.decide_automatic(state, now);
        }
        match event {
            TriggerEvent::ForceRefresh { weather_type } => {
                TriggerDecision::eligible(TriggerType::ForceRefresh, "forced weather refresh")
                    .with_weather(*weather_type)
            }
            _ => TriggerDecision::eligible(TriggerType::SettingsChange, "settings changed"),
        }
    }

    fn decide_automatic(&self, state: &TriggerState, now: DateTime<Utc>) -> TriggerDecision {
        if state.start_count >= self.max_auto_start_sessions {
            TriggerDecision::denied(
                GatePhase::Idle,
                format!(
                    "automatic playback limited to the first {} sessions",
                    self.max_auto_start_sessions
                ),
            )
        } else if self.triggered_in_session(state, now) {
            TriggerDecision::denied(GatePhase::Cooldown, "already played this session")
        } else if !state.has_first_load_carousel {
            TriggerDecision::eligible(TriggerType::FirstLoadCarousel, "first tab after install")
        } else {
            TriggerDecision::eligible(
                TriggerType::TabOpen,
                format!("startup session {}", state.start_count + 1),
            )
        }
    }

    /// Whether an automatic trigger was already recorded in the current session.
    fn triggered_in_session(&self, state: &TriggerState, now: DateTime<Utc>) -> bool {
        let Some(opened) = state.last_tab_open_time else {
            return false;
        };
        let after_start = state.last_start_time.map_or(true, |start| opened >= start);
        match state.last_session_end {
            Some(end) if now - end > self.session_gap => after_start && opened > end,
            _ => after_start,
        }
    }

    /// Current phase: `Cooldown` after an automatic trigger in this session.
    pub async fn phase(&self) -> GatePhase {
        let state = self.state().await;
        if self.triggered_in_session(&state, self.clock.now()) {
            GatePhase::Cooldown
        } else {
            GatePhase::Idle
        }
    }

    /// Persist a trigger and move the gate to `Triggered`. Automatic triggers
    /// also consume the session and one unit of the startup budget.
    ///
    /// The start count is only rewritten from a state that was actually read;
    /// during a read outage the trigger itself is still recorded.
    pub async fn record_trigger(&self, trigger_type: TriggerType, reason: &str) -> EngineResult<GatePhase> {
        let now = self.clock.now().timestamp_millis();

        let mut entries = Entries::new();
        entries.insert(LAST_TRIGGER_TIME.to_string(), json!(now));
        entries.insert(LAST_TRIGGER_TYPE.to_string(), json!(trigger_type.as_str()));
        entries.insert(LAST_TRIGGER_REASON.to_string(), json!(reason));
        if trigger_type.is_automatic() {
            entries.insert(LAST_TAB_OPEN_TIME.to_string(), json!(now));
            match self.load_state().await {
                Ok(state) => {
                    entries.insert(
                        EXTENSION_START_COUNT.to_string(),
                        json!(state.start_count.saturating_add(1)),
                    );
                }
                Err(e) => {
                    metrics::record_storage_failure("read");
                    warn!(
                        store = self.store.name(),
                        error = %e,
                        "Trigger state unreadable, start count left unchanged"
                    );
                }
            }
        }
        if trigger_type == TriggerType::FirstLoadCarousel {
            entries.insert(HAS_FIRST_LOAD_CAROUSEL.to_string(), json!(true));
        }

        self.write(entries).await?;
        metrics::record_trigger(trigger_type.as_str());
        info!(trigger_type = %trigger_type, reason = reason, "Recorded trigger");
        Ok(GatePhase::Triggered)
    }

    /// Mark the start of a startup session.
    pub async fn begin_session(&self) -> EngineResult<()> {
        let now = self.clock.now().timestamp_millis();
        let mut entries = Entries::new();
        entries.insert(LAST_START_TIME.to_string(), json!(now));
        self.write(entries).await?;
        debug!("Startup session began");
        Ok(())
    }

    /// Mark the end of the current session.
    pub async fn end_session(&self) -> EngineResult<()> {
        let now = self.clock.now().timestamp_millis();
        let mut entries = Entries::new();
        entries.insert(LAST_SESSION_END.to_string(), json!(now));
        self.write(entries).await?;
        debug!("Session ended");
        Ok(())
    }

    /// Forget every persisted gate key.
    pub async fn reset(&self) -> EngineResult<()> {
        match retry_async(&self.retry, || self.store.remove(TRIGGER_STATE_KEYS)).await {
            RetryResult::Success(()) => {
                info!("Trigger state reset");
                Ok(())
            }
            RetryResult::Failed { error, attempts } => {
                metrics::record_storage_failure("write");
                Err(EngineError::storage_failure(format!(
                    "reset failed after {attempts} attempts: {error}"
                )))
            }
        }
    }

    async fn write(&self, entries: Entries) -> EngineResult<()> {
        match retry_async(&self.retry, || self.store.set(entries.clone())).await {
            RetryResult::Success(()) => Ok(()),
            RetryResult::Failed { error, attempts } => {
                metrics::record_storage_failure("write");
                Err(EngineError::storage_failure(format!(
                    "write failed after {attempts} attempts: {error}"
                )))
            }
        }
    }
}

fn read_timestamp(entries: &Entries, key: &str) -> Option<DateTime<Utc>> {
    let value = entries.get(key)?;
    let millis = value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))?;
    DateTime::from_timestamp_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::Duration;
    use wxloop_storage::{MemoryStore, StorageError, StorageResult};

    fn gate_with(store: Arc<dyn KeyValueStore>, clock: Arc<ManualClock>) -> TriggerGate {
        let config = EngineConfig {
            store_retry_base_delay: Duration::from_millis(1),
            ..Default::default()
        };
        TriggerGate::new(store, clock, &config)
    }

    fn gate() -> (TriggerGate, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (gate_with(Arc::new(MemoryStore::new()), clock.clone()), clock)
    }

    /// Fails the first `failures` writes and every read while `reads_fail`.
    struct FlakyStore {
        inner: MemoryStore,
        failures: AtomicU32,
        reads_fail: AtomicBool,
    }

    #[async_trait]
    impl KeyValueStore for FlakyStore {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn get(&self, keys: &[&str]) -> StorageResult<Entries> {
            if self.reads_fail.load(Ordering::SeqCst) {
                return Err(StorageError::unavailable("offline"));
            }
            self.inner.get(keys).await
        }

        async fn set(&self, entries: Entries) -> StorageResult<()> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(StorageError::write_failed("quota"));
            }
            self.inner.set(entries).await
        }

        async fn remove(&self, keys: &[&str]) -> StorageResult<()> {
            self.inner.remove(keys).await
        }
    }

    #[tokio::test]
    async fn test_check_does_not_mutate() {
        let (gate, _) = gate();
        let first = gate.check_should_trigger(&TriggerEvent::TabOpened).await;
        let second = gate.check_should_trigger(&TriggerEvent::TabOpened).await;
        assert!(first.should_trigger);
        assert!(second.should_trigger);
        assert_eq!(gate.state().await, TriggerState::default());
    }

    #[tokio::test]
    async fn test_first_trigger_is_carousel() {
        let (gate, _) = gate();
        let decision = gate.check_should_trigger(&TriggerEvent::TabOpened).await;
        assert_eq!(decision.trigger_type, Some(TriggerType::FirstLoadCarousel));
        assert!(decision.needs_carousel);
        assert_eq!(decision.phase, GatePhase::Eligible);

        let phase = gate.record_trigger(TriggerType::FirstLoadCarousel, &decision.reason).await.unwrap();
        assert_eq!(phase, GatePhase::Triggered);
        let state = gate.state().await;
        assert!(state.has_first_load_carousel);
        assert_eq!(state.start_count, 1);
        assert_eq!(state.last_trigger_type, Some(TriggerType::FirstLoadCarousel));
        assert_eq!(gate.phase().await, GatePhase::Cooldown);
    }

    #[tokio::test]
    async fn test_one_automatic_trigger_per_session() {
        let (gate, clock) = gate();
        gate.begin_session().await.unwrap();
        gate.record_trigger(TriggerType::FirstLoadCarousel, "first").await.unwrap();

        clock.advance(chrono::Duration::seconds(5));
        let decision = gate.check_should_trigger(&TriggerEvent::TabOpened).await;
        assert!(!decision.should_trigger);
        assert_eq!(decision.phase, GatePhase::Cooldown);

        // Next startup session re-opens the gate
        clock.advance(chrono::Duration::seconds(5));
        gate.begin_session().await.unwrap();
        clock.advance(chrono::Duration::seconds(1));
        let decision = gate.check_should_trigger(&TriggerEvent::TabOpened).await;
        assert!(decision.should_trigger);
        assert_eq!(decision.trigger_type, Some(TriggerType::TabOpen));
        assert!(!decision.needs_carousel);
    }

    #[tokio::test]
    async fn test_budget_exhausted_after_two_sessions() {
        let (gate, clock) = gate();
        for trigger in [TriggerType::FirstLoadCarousel, TriggerType::TabOpen] {
            gate.begin_session().await.unwrap();
            clock.advance(chrono::Duration::seconds(1));
            gate.record_trigger(trigger, "auto").await.unwrap();
            clock.advance(chrono::Duration::seconds(1));
        }
        gate.begin_session().await.unwrap();
        clock.advance(chrono::Duration::seconds(1));

        let decision = gate.check_should_trigger(&TriggerEvent::TabOpened).await;
        assert!(!decision.should_trigger);
        assert_eq!(gate.state().await.start_count, 2);

        let forced = gate
            .check_should_trigger(&TriggerEvent::ForceRefresh {
                weather_type: Some(wxloop_models::WeatherType::Snow),
            })
            .await;
        assert!(forced.should_trigger);
        assert_eq!(forced.weather_type, Some(wxloop_models::WeatherType::Snow));
        assert!(gate.check_should_trigger(&TriggerEvent::SettingsChanged).await.should_trigger);
    }

    #[tokio::test]
    async fn test_overrides_do_not_consume_budget() {
        let (gate, _) = gate();
        gate.record_trigger(TriggerType::SettingsChange, "settings changed").await.unwrap();
        let state = gate.state().await;
        assert_eq!(state.start_count, 0);
        assert!(state.last_tab_open_time.is_none());
        assert_eq!(state.last_trigger_reason.as_deref(), Some("settings changed"));
    }

    #[tokio::test]
    async fn test_session_gap_reopens_gate() {
        let (gate, clock) = gate();
        gate.begin_session().await.unwrap();
        gate.record_trigger(TriggerType::FirstLoadCarousel, "first").await.unwrap();
        gate.end_session().await.unwrap();

        clock.advance(chrono::Duration::minutes(10));
        assert!(!gate.check_should_trigger(&TriggerEvent::TabOpened).await.should_trigger);

        clock.advance(chrono::Duration::minutes(30));
        assert!(gate.check_should_trigger(&TriggerEvent::TabOpened).await.should_trigger);
    }

    #[tokio::test]
    async fn test_read_failure_fails_open() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            failures: AtomicU32::new(0),
            reads_fail: AtomicBool::new(true),
        });
        let gate = gate_with(store, Arc::new(ManualClock::default()));
        assert!(gate.load_state().await.is_err());
        assert!(gate.check_should_trigger(&TriggerEvent::TabOpened).await.should_trigger);
    }

    #[tokio::test]
    async fn test_read_outage_keeps_persisted_start_count() {
        let mut entries = Entries::new();
        entries.insert(EXTENSION_START_COUNT.to_string(), json!(5));
        entries.insert(HAS_FIRST_LOAD_CAROUSEL.to_string(), json!(true));
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::with_entries(entries),
            failures: AtomicU32::new(0),
            reads_fail: AtomicBool::new(true),
        });
        let gate = gate_with(store.clone(), Arc::new(ManualClock::default()));

        let phase = gate.record_trigger(TriggerType::FirstLoadCarousel, "first").await.unwrap();
        assert_eq!(phase, GatePhase::Triggered);

        store.reads_fail.store(false, Ordering::SeqCst);
        let state = gate.load_state().await.unwrap();
        assert_eq!(state.start_count, 5);
        assert!(state.has_first_load_carousel);
        assert_eq!(state.last_trigger_type, Some(TriggerType::FirstLoadCarousel));
        assert!(state.last_tab_open_time.is_some());
    }

    #[tokio::test]
    async fn test_write_retried_then_reported() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            failures: AtomicU32::new(2),
            reads_fail: AtomicBool::new(false),
        });
        let gate = gate_with(store.clone(), Arc::new(ManualClock::default()));
        gate.record_trigger(TriggerType::TabOpen, "retry").await.unwrap();
        assert_eq!(gate.state().await.start_count, 1);

        store.failures.store(100, Ordering::SeqCst);
        let err = gate.record_trigger(TriggerType::TabOpen, "fail").await.unwrap_err();
        assert!(matches!(err, EngineError::StorageFailure(_)));
    }

    #[tokio::test]
    async fn test_reset_clears_state() {
        let (gate, _) = gate();
        gate.record_trigger(TriggerType::FirstLoadCarousel, "first").await.unwrap();
        gate.reset().await.unwrap();
        assert_eq!(gate.state().await, TriggerState::default());
    }

    #[test]
    fn test_read_timestamp_formats() {
        let mut entries = Entries::new();
        entries.insert("a".to_string(), json!(1_700_000_000_000i64));
        entries.insert("b".to_string(), json!("1700000000000"));
        entries.insert("c".to_string(), json!(true));
        assert!(read_timestamp(&entries, "a").is_some());
        assert_eq!(read_timestamp(&entries, "a"), read_timestamp(&entries, "b"));
        assert!(read_timestamp(&entries, "c").is_none());
        assert!(read_timestamp(&entries, "missing").is_none());
    }
}

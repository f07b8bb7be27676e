//! User settings as stored by the host.

use serde_json::Value;
use tracing::warn;

use wxloop_models::Settings;
use wxloop_storage::keys::{ANIMATION_ENABLED, FLOATING_BALL_ENABLED, SETTINGS_KEYS};
use wxloop_storage::KeyValueStore;

/// Read the user settings. Anything other than an explicit `false` counts as
/// enabled, and an unreadable store yields the defaults.
pub async fn load_settings(store: &dyn KeyValueStore) -> Settings {
    let entries = match store.get(SETTINGS_KEYS).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(store = store.name(), error = %e, "Settings unreadable, using defaults");
            return Settings::default();
        }
    };

    let enabled = |key: &str| entries.get(key) != Some(&Value::Bool(false));
    Settings {
        animation_enabled: enabled(ANIMATION_ENABLED),
        floating_ball_enabled: enabled(FLOATING_BALL_ENABLED),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wxloop_storage::{Entries, MemoryStore};

    #[tokio::test]
    async fn test_only_explicit_false_disables() {
        let mut entries = Entries::new();
        entries.insert(ANIMATION_ENABLED.to_string(), json!(false));
        entries.insert(FLOATING_BALL_ENABLED.to_string(), json!("false"));
        let store = MemoryStore::with_entries(entries);

        let settings = load_settings(&store).await;
        assert!(!settings.animation_enabled);
        assert!(settings.floating_ball_enabled);
    }

    #[test]
    fn test_missing_keys_default_to_enabled() {
        let store = MemoryStore::new();
        let settings = tokio_test::block_on(load_settings(&store));
        assert_eq!(settings, Settings::default());
    }
}

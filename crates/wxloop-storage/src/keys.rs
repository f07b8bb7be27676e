//! Well-known storage keys.
//!
//! Key names match the host extension's storage layout so state written by
//! either side stays readable by the other.

pub const FLOATING_BALL_ENABLED: &str = "floatingBallEnabled";
pub const ANIMATION_ENABLED: &str = "animationEnabled";
pub const HAS_FIRST_LOAD_CAROUSEL: &str = "hasFirstLoadCarousel";
pub const EXTENSION_START_COUNT: &str = "extensionStartCount";
pub const LAST_START_TIME: &str = "lastStartTime";
pub const LAST_TAB_OPEN_TIME: &str = "lastTabOpenTime";
pub const LAST_SESSION_END: &str = "lastSessionEnd";
pub const LAST_TRIGGER_TIME: &str = "lastTriggerTime";
pub const LAST_TRIGGER_TYPE: &str = "lastTriggerType";
pub const LAST_TRIGGER_REASON: &str = "lastTriggerReason";

/// Keys owned by the trigger gate.
pub const TRIGGER_STATE_KEYS: &[&str] = &[
    EXTENSION_START_COUNT,
    LAST_START_TIME,
    LAST_TAB_OPEN_TIME,
    LAST_SESSION_END,
    HAS_FIRST_LOAD_CAROUSEL,
    LAST_TRIGGER_TIME,
    LAST_TRIGGER_TYPE,
    LAST_TRIGGER_REASON,
];

/// Keys holding user settings.
pub const SETTINGS_KEYS: &[&str] = &[ANIMATION_ENABLED, FLOATING_BALL_ENABLED];

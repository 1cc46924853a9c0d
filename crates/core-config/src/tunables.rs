//! Timing and sizing tunables.
//!
//! Keys are kebab-case in the settings file (`{"cursor-settle": 12000}`) and
//! SCREAMING_SNAKE in the environment (`GHOSTTOUCH_CURSOR_SETTLE=12000`).
//! The settings file wins over the environment, which wins over the
//! compile-time default. All timing values are microseconds unless the key
//! says otherwise.

use std::path::Path;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::paths::config_dirs;

const SETTINGS_FILE_NAME: &str = "settings.json";
const ENV_PREFIX: &str = "GHOSTTOUCH_";

/// Resolved tunables, loaded once per process.
#[derive(Debug, Clone, PartialEq)]
pub struct Tunables {
    /// Sleep after each cursor warp.
    pub cursor_settle: Duration,
    /// Sleep between the two halves of the position nudge.
    pub nudge_settle: Duration,
    /// Primary-button hold for a tap.
    pub click_hold: Duration,
    /// Per-tap hold inside a double tap.
    pub double_tap_hold: Duration,
    /// Gap between the two taps of a double tap.
    pub double_tap_gap: Duration,
    /// Hold after button-down before drag movement starts.
    pub drag_mode_hold: Duration,
    /// Sleep after the focus pre-click before typing.
    pub focus_settle: Duration,
    /// Sleep between keystroke chunks.
    pub keystroke_delay: Duration,
    /// Hold of a single keystroke chunk.
    pub key_hold: Duration,
    /// Extra delay between a dead key and its base key.
    pub dead_key_delay: Duration,
    /// Number of drag sub-steps.
    pub drag_interpolation_steps: u32,
    /// Number of swipe sub-steps.
    pub swipe_interpolation_steps: u32,
    /// Pixels per scroll-wheel tick.
    pub scroll_pixel_scale: f64,
    /// Characters per keyboard report batch.
    pub hid_typing_chunk_size: usize,
    /// Per-client socket receive/send timeout.
    pub recv_timeout: Duration,
    /// Consecutive idle timeouts before a client is dropped.
    pub idle_max_timeouts: u32,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            cursor_settle: Duration::from_micros(10_000),
            nudge_settle: Duration::from_micros(5_000),
            click_hold: Duration::from_micros(80_000),
            double_tap_hold: Duration::from_micros(40_000),
            double_tap_gap: Duration::from_micros(50_000),
            drag_mode_hold: Duration::from_micros(150_000),
            focus_settle: Duration::from_micros(200_000),
            keystroke_delay: Duration::from_micros(15_000),
            key_hold: Duration::from_micros(20_000),
            dead_key_delay: Duration::from_micros(30_000),
            drag_interpolation_steps: 60,
            swipe_interpolation_steps: 20,
            scroll_pixel_scale: 8.0,
            hid_typing_chunk_size: 15,
            recv_timeout: Duration::from_secs(5),
            idle_max_timeouts: 4,
        }
    }
}

impl Tunables {
    /// Load using the discovered settings file and the process environment.
    pub fn load() -> Self {
        Self::from_settings(&Settings::discover())
    }

    /// Load from an explicit settings file (tests, `--config` overrides).
    pub fn load_from(path: &Path) -> Self {
        Self::from_settings(&Settings::from_path(path))
    }

    fn from_settings(settings: &Settings) -> Self {
        let d = Self::default();
        Self {
            cursor_settle: settings.micros("cursor-settle", d.cursor_settle),
            nudge_settle: settings.micros("nudge-settle", d.nudge_settle),
            click_hold: settings.micros("click-hold", d.click_hold),
            double_tap_hold: settings.micros("double-tap-hold", d.double_tap_hold),
            double_tap_gap: settings.micros("double-tap-gap", d.double_tap_gap),
            drag_mode_hold: settings.micros("drag-mode-hold", d.drag_mode_hold),
            focus_settle: settings.micros("focus-settle", d.focus_settle),
            keystroke_delay: settings.micros("keystroke-delay", d.keystroke_delay),
            key_hold: settings.micros("key-hold", d.key_hold),
            dead_key_delay: settings.micros("dead-key-delay", d.dead_key_delay),
            drag_interpolation_steps: settings
                .integer("drag-interpolation-steps", d.drag_interpolation_steps as u64)
                as u32,
            swipe_interpolation_steps: settings
                .integer("swipe-interpolation-steps", d.swipe_interpolation_steps as u64)
                as u32,
            scroll_pixel_scale: settings.float("scroll-pixel-scale", d.scroll_pixel_scale),
            hid_typing_chunk_size: settings
                .integer("hid-typing-chunk-size", d.hid_typing_chunk_size as u64)
                as usize,
            recv_timeout: Duration::from_secs(
                settings.integer("recv-timeout-sec", d.recv_timeout.as_secs()),
            ),
            idle_max_timeouts: settings.integer("idle-max-timeouts", d.idle_max_timeouts as u64)
                as u32,
        }
    }
}

/// Raw settings source: parsed file object plus environment lookups.
struct Settings {
    file: serde_json::Map<String, Value>,
}

impl Settings {
    fn discover() -> Self {
        for dir in config_dirs() {
            let path = dir.join(SETTINGS_FILE_NAME);
            if path.is_file() {
                return Self::from_path(&path);
            }
        }
        Self {
            file: serde_json::Map::new(),
        }
    }

    fn from_path(path: &Path) -> Self {
        let file = match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Value>(&content) {
                Ok(Value::Object(map)) => {
                    debug!(target: "config", file = %path.display(), keys = map.len(), "settings_loaded");
                    map
                }
                Ok(_) => {
                    warn!(target: "config", file = %path.display(), "settings_not_an_object");
                    serde_json::Map::new()
                }
                Err(e) => {
                    warn!(target: "config", file = %path.display(), error = %e, "settings_parse_error");
                    serde_json::Map::new()
                }
            },
            Err(_) => serde_json::Map::new(),
        };
        Self { file }
    }

    /// `GHOSTTOUCH_<KEY>` with the kebab-case key upper-snaked.
    fn env_key(key: &str) -> String {
        let mut out = String::from(ENV_PREFIX);
        out.extend(key.chars().map(|c| match c {
            '-' => '_',
            other => other.to_ascii_uppercase(),
        }));
        out
    }

    fn integer(&self, key: &str, default: u64) -> u64 {
        if let Some(v) = self.file.get(key).and_then(Value::as_u64) {
            return v;
        }
        if let Ok(raw) = std::env::var(Self::env_key(key)) {
            match raw.parse::<u64>() {
                Ok(v) => return v,
                Err(_) => {
                    warn!(target: "config", key, value = raw.as_str(), "env_override_not_an_integer")
                }
            }
        }
        default
    }

    fn float(&self, key: &str, default: f64) -> f64 {
        if let Some(v) = self.file.get(key).and_then(Value::as_f64) {
            return v;
        }
        if let Ok(raw) = std::env::var(Self::env_key(key)) {
            match raw.parse::<f64>() {
                Ok(v) => return v,
                Err(_) => {
                    warn!(target: "config", key, value = raw.as_str(), "env_override_not_a_number")
                }
            }
        }
        default
    }

    fn micros(&self, key: &str, default: Duration) -> Duration {
        Duration::from_micros(self.integer(key, default.as_micros() as u64))
    }
}

//! UI performance tuning
//!
//! Four integer knobs trading responsiveness against throughput. Stored
//! values are never trusted: each one is parsed leniently and clamped into
//! its range, and anything unusable falls back to the default.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SettingsError, SettingsResult};

/// Storage key of the tuning object
pub const UI_TUNING_KEY: &str = "mural_ui_tuning_v1";

/// Range and default of one knob
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TuningLimits {
    pub key: &'static str,
    pub min: i64,
    pub max: i64,
    pub default: i64,
}

pub const PARSE_LINES_PER_TICK: TuningLimits = TuningLimits {
    key: "PARSE_LINES_PER_TICK",
    min: 50,
    max: 5000,
    default: 300,
};

pub const DRAW_SEGMENTS_PER_TICK: TuningLimits = TuningLimits {
    key: "DRAW_SEGMENTS_PER_TICK",
    min: 50,
    max: 5000,
    default: 250,
};

pub const STATUS_POLL_MS: TuningLimits = TuningLimits {
    key: "STATUS_POLL_MS",
    min: 80,
    max: 5000,
    default: 350,
};

pub const PREVIEW_FPS: TuningLimits = TuningLimits {
    key: "PREVIEW_FPS",
    min: 5,
    max: 60,
    default: 24,
};

/// All knobs, in display order
pub const ALL_LIMITS: [TuningLimits; 4] = [
    PARSE_LINES_PER_TICK,
    DRAW_SEGMENTS_PER_TICK,
    STATUS_POLL_MS,
    PREVIEW_FPS,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct UiTuning {
    /// Parser lines between cooperative yields
    pub parse_lines_per_tick: usize,
    /// Planned-path segments drawn between yields
    pub draw_segments_per_tick: usize,
    /// Telemetry poll interval in ms
    pub status_poll_ms: u64,
    /// Preview frame-rate cap
    pub preview_fps: u32,
}

impl Default for UiTuning {
    fn default() -> Self {
        Self {
            parse_lines_per_tick: PARSE_LINES_PER_TICK.default as usize,
            draw_segments_per_tick: DRAW_SEGMENTS_PER_TICK.default as usize,
            status_poll_ms: STATUS_POLL_MS.default as u64,
            preview_fps: PREVIEW_FPS.default as u32,
        }
    }
}

impl UiTuning {
    /// Build a tuning from an untrusted stored value.
    ///
    /// A value that is not an object yields the defaults.
    pub fn sanitize(raw: &Value) -> Self {
        let Some(obj) = raw.as_object() else {
            return Self::default();
        };
        let knob = |limits: TuningLimits| clamp_int(obj.get(limits.key), limits);

        Self {
            parse_lines_per_tick: knob(PARSE_LINES_PER_TICK) as usize,
            draw_segments_per_tick: knob(DRAW_SEGMENTS_PER_TICK) as usize,
            status_poll_ms: knob(STATUS_POLL_MS) as u64,
            preview_fps: knob(PREVIEW_FPS) as u32,
        }
    }

    /// Current value of the knob stored under `key`
    pub fn get(&self, key: &str) -> Option<i64> {
        match key {
            k if k == PARSE_LINES_PER_TICK.key => Some(self.parse_lines_per_tick as i64),
            k if k == DRAW_SEGMENTS_PER_TICK.key => Some(self.draw_segments_per_tick as i64),
            k if k == STATUS_POLL_MS.key => Some(self.status_poll_ms as i64),
            k if k == PREVIEW_FPS.key => Some(self.preview_fps as i64),
            _ => None,
        }
    }

    /// Set one knob from user input and return the clamped value.
    ///
    /// Keys are matched case-insensitively. Input that does not start with
    /// an integer resets the knob to its default.
    pub fn set(&mut self, key: &str, input: &str) -> SettingsResult<i64> {
        let limits = limits_for(key).ok_or_else(|| SettingsError::InvalidSetting {
            key: key.to_string(),
            reason: format!(
                "unknown key, expected one of {}",
                ALL_LIMITS.map(|l| l.key).join(", ")
            ),
        })?;

        let value = clamp_int(Some(&Value::String(input.to_string())), limits);
        match limits.key {
            k if k == PARSE_LINES_PER_TICK.key => self.parse_lines_per_tick = value as usize,
            k if k == DRAW_SEGMENTS_PER_TICK.key => self.draw_segments_per_tick = value as usize,
            k if k == STATUS_POLL_MS.key => self.status_poll_ms = value as u64,
            _ => self.preview_fps = value as u32,
        }
        Ok(value)
    }

    /// `(key, value)` pairs in display order
    pub fn entries(&self) -> Vec<(&'static str, i64)> {
        ALL_LIMITS
            .iter()
            .filter_map(|l| self.get(l.key).map(|v| (l.key, v)))
            .collect()
    }
}

/// Limits for a key, case-insensitive
pub fn limits_for(key: &str) -> Option<TuningLimits> {
    ALL_LIMITS
        .into_iter()
        .find(|l| l.key.eq_ignore_ascii_case(key.trim()))
}

/// Integer-prefix parse, fallback and clamp.
///
/// Numbers are truncated toward zero; strings contribute their leading
/// integer (`"120ms"` is 120). Anything else takes the default.
pub fn clamp_int(value: Option<&Value>, limits: TuningLimits) -> i64 {
    let parsed = match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Some(Value::String(s)) => leading_int(s),
        _ => None,
    };
    parsed
        .unwrap_or(limits.default)
        .clamp(limits.min, limits.max)
}

fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    // Saturate absurdly long inputs; the clamp brings them back in range
    let magnitude = rest[..digits].parse::<i64>().unwrap_or(i64::MAX);
    Some(sign * magnitude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let tuning = UiTuning::default();
        assert_eq!(tuning.parse_lines_per_tick, 300);
        assert_eq!(tuning.draw_segments_per_tick, 250);
        assert_eq!(tuning.status_poll_ms, 350);
        assert_eq!(tuning.preview_fps, 24);
    }

    #[test]
    fn test_serde_field_names() {
        let value = serde_json::to_value(UiTuning::default()).unwrap();
        assert_eq!(
            value,
            json!({
                "PARSE_LINES_PER_TICK": 300,
                "DRAW_SEGMENTS_PER_TICK": 250,
                "STATUS_POLL_MS": 350,
                "PREVIEW_FPS": 24
            })
        );
    }

    #[test]
    fn test_sanitize_clamps_and_falls_back() {
        let tuning = UiTuning::sanitize(&json!({
            "PARSE_LINES_PER_TICK": 10,
            "DRAW_SEGMENTS_PER_TICK": "abc",
            "STATUS_POLL_MS": "120.9",
            "PREVIEW_FPS": 1000
        }));
        assert_eq!(tuning.parse_lines_per_tick, 50);
        assert_eq!(tuning.draw_segments_per_tick, 250);
        assert_eq!(tuning.status_poll_ms, 120);
        assert_eq!(tuning.preview_fps, 60);
    }

    #[test]
    fn test_sanitize_non_object() {
        assert_eq!(UiTuning::sanitize(&json!(null)), UiTuning::default());
        assert_eq!(UiTuning::sanitize(&json!([1, 2])), UiTuning::default());
        assert_eq!(UiTuning::sanitize(&json!({})), UiTuning::default());
    }

    #[test]
    fn test_clamp_int() {
        let l = STATUS_POLL_MS;
        assert_eq!(clamp_int(Some(&json!(99.7)), l), 99);
        assert_eq!(clamp_int(Some(&json!(-5)), l), 80);
        assert_eq!(clamp_int(Some(&json!("  400ms")), l), 400);
        assert_eq!(clamp_int(Some(&json!("-")), l), 350);
        assert_eq!(clamp_int(Some(&json!(true)), l), 350);
        assert_eq!(clamp_int(Some(&json!("99999999999999999999999")), l), 5000);
        assert_eq!(clamp_int(None, l), 350);
    }

    #[test]
    fn test_set() {
        let mut tuning = UiTuning::default();
        assert_eq!(tuning.set("preview_fps", "30").unwrap(), 30);
        assert_eq!(tuning.preview_fps, 30);
        assert_eq!(tuning.set("STATUS_POLL_MS", "10").unwrap(), 80);
        assert_eq!(tuning.set("PARSE_LINES_PER_TICK", "lots").unwrap(), 300);
        assert!(matches!(
            tuning.set("FOO", "1"),
            Err(SettingsError::InvalidSetting { .. })
        ));
        assert_eq!(tuning.get("PREVIEW_FPS"), Some(30));
        assert_eq!(tuning.entries().len(), 4);
    }
}

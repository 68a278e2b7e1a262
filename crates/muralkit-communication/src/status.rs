//! Device `/status` payload decoding
//!
//! The firmware's JSON is decoded leniently: every field is optional,
//! numbers may arrive as numeric strings, and flags follow the usual
//! truthiness rules (non-zero numbers and non-empty strings are `true`).

use muralkit_core::{TelemetryError, TelemetrySample};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Firmware main-loop timings reported alongside the status
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FirmwarePerf {
    /// Average main loop duration in ms
    pub loop_ms: Option<f64>,
    /// Time spent yielding to the network stack in ms
    pub yield_ms: Option<f64>,
    /// Time spent in the motion step in ms
    pub move_ms: Option<f64>,
    /// Time spent in the job runner in ms
    pub runner_ms: Option<f64>,
    /// Time spent in the phase handler in ms
    pub phase_ms: Option<f64>,
    /// Longest main loop observed in ms
    pub max_loop_ms: Option<f64>,
}

/// One decoded `/status` response
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// Job progress in percent
    pub progress: Option<f64>,
    /// Pen X position in mm
    pub x: Option<f64>,
    /// Pen Y position in mm
    pub y: Option<f64>,
    pub paused: bool,
    pub running: bool,
    /// Firmware phase name, when reported
    pub phase: Option<String>,
    pub perf: FirmwarePerf,
}

impl DeviceStatus {
    /// Decode a `/status` body.
    ///
    /// Only a body that is not a JSON object is rejected; anything missing or
    /// malformed inside it decodes as absent.
    pub fn from_json(value: &Value) -> Result<Self, TelemetryError> {
        let obj = value.as_object().ok_or_else(|| TelemetryError::NotAnObject {
            reason: format!("expected object, got {}", json_kind(value)),
        })?;

        let perf = obj
            .get("perf")
            .and_then(Value::as_object)
            .map(|p| FirmwarePerf {
                loop_ms: number(p, "loop_ms"),
                yield_ms: number(p, "yield_ms"),
                move_ms: number(p, "move_ms"),
                runner_ms: number(p, "runner_ms"),
                phase_ms: number(p, "phase_ms"),
                max_loop_ms: number(p, "max_loop_ms"),
            })
            .unwrap_or_default();

        Ok(Self {
            progress: number(obj, "progress").or_else(|| number(obj, "percent")),
            x: number(obj, "x"),
            y: number(obj, "y"),
            paused: obj.get("paused").map(truthy).unwrap_or(false),
            running: obj.get("running").map(truthy).unwrap_or(false),
            phase: obj
                .get("phase")
                .and_then(Value::as_str)
                .map(str::to_string),
            perf,
        })
    }

    /// Decode a raw response body.
    pub fn from_body(body: &str) -> Result<Self, TelemetryError> {
        let value: Value =
            serde_json::from_str(body).map_err(|e| TelemetryError::NotAnObject {
                reason: e.to_string(),
            })?;
        Self::from_json(&value)
    }

    /// Normalized telemetry sample for the playback engines
    pub fn to_sample(&self) -> TelemetrySample {
        TelemetrySample::new(self.progress, self.x, self.y)
            .with_running(self.running)
            .with_paused(self.paused)
    }
}

/// Finite number stored under `key`, accepting numeric strings.
pub(crate) fn number(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    let v = match obj.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    v.is_finite().then_some(v)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0 && !v.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_status() {
        let status = DeviceStatus::from_json(&json!({
            "progress": 42.5,
            "x": 100.0,
            "y": 200.5,
            "paused": false,
            "running": true,
            "phase": "BeginDrawing",
            "perf": { "loop_ms": 1.5, "max_loop_ms": 12 }
        }))
        .unwrap();

        assert_eq!(status.progress, Some(42.5));
        assert_eq!(status.x, Some(100.0));
        assert!(status.running);
        assert!(!status.paused);
        assert_eq!(status.phase.as_deref(), Some("BeginDrawing"));
        assert_eq!(status.perf.loop_ms, Some(1.5));
        assert_eq!(status.perf.max_loop_ms, Some(12.0));
        assert_eq!(status.perf.move_ms, None);
    }

    #[test]
    fn test_lenient_fields() {
        let status = DeviceStatus::from_json(&json!({
            "percent": "17",
            "x": "abc",
            "y": null,
            "paused": 1,
            "running": "yes"
        }))
        .unwrap();

        assert_eq!(status.progress, Some(17.0));
        assert_eq!(status.x, None);
        assert_eq!(status.y, None);
        assert!(status.paused);
        assert!(status.running);
    }

    #[test]
    fn test_empty_object() {
        let status = DeviceStatus::from_json(&json!({})).unwrap();
        assert_eq!(status, DeviceStatus::default());
        assert!(!status.to_sample().is_drawing());
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(matches!(
            DeviceStatus::from_json(&json!([1, 2])),
            Err(TelemetryError::NotAnObject { .. })
        ));
        assert!(DeviceStatus::from_body("not json").is_err());
    }

    #[test]
    fn test_to_sample() {
        let status = DeviceStatus::from_body(r#"{"progress":150,"x":1,"y":2,"running":true,"paused":true}"#)
            .unwrap();
        let sample = status.to_sample();
        assert_eq!(sample.progress_percent(), Some(100.0));
        assert_eq!(sample.position(), Some((1.0, 2.0)));
        assert!(sample.running);
        assert!(!sample.is_drawing());
    }
}

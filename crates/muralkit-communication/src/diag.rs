//! Device diagnostics and the preview feed-rate estimate

use std::sync::Arc;

use muralkit_core::constants::{DEFAULT_FEED_RATE_MM_S, MAX_FEED_RATE_MM_S, MIN_FEED_RATE_MM_S};
use muralkit_core::NetworkError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::DeviceApi;
use crate::status::number;

/// Motor and speed settings reported by `/diag`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceDiagnostics {
    pub steps_per_rotation: Option<f64>,
    /// Belt travel per motor rotation; older firmware calls it `circumference`
    pub travel_per_rotation_mm: Option<f64>,
    /// Drawing speed in steps per second
    pub print_speed_steps: Option<f64>,
}

impl DeviceDiagnostics {
    /// Decode a `/diag` body. Unknown or malformed fields are ignored.
    pub fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            steps_per_rotation: number(obj, "stepsPerRotation"),
            travel_per_rotation_mm: number(obj, "travelPerRotationMM")
                .or_else(|| number(obj, "circumference")),
            print_speed_steps: number(obj, "printSpeedSteps"),
        })
    }
}

/// Pen speed in mm/s derived from the diagnostics.
///
/// Falls back to the default feed rate when any input is missing or not
/// positive. The result is clamped to the plausible range.
pub fn estimate_feed_rate(diag: Option<&DeviceDiagnostics>) -> f64 {
    let Some(diag) = diag else {
        return DEFAULT_FEED_RATE_MM_S;
    };

    let positive = |v: Option<f64>| v.filter(|v| v.is_finite() && *v > 0.0);
    match (
        positive(diag.steps_per_rotation),
        positive(diag.travel_per_rotation_mm),
        positive(diag.print_speed_steps),
    ) {
        (Some(steps), Some(travel), Some(speed)) => {
            let mm_s = speed * travel / steps;
            if mm_s.is_finite() && mm_s > 0.0 {
                mm_s.clamp(MIN_FEED_RATE_MM_S, MAX_FEED_RATE_MM_S)
            } else {
                DEFAULT_FEED_RATE_MM_S
            }
        }
        _ => DEFAULT_FEED_RATE_MM_S,
    }
}

/// Fetches `/diag` once per session.
///
/// Only a successful fetch is cached; a failed one is retried on the next
/// call.
pub struct DiagnosticsCache {
    api: Arc<dyn DeviceApi>,
    cached: Mutex<Option<DeviceDiagnostics>>,
}

impl DiagnosticsCache {
    pub fn new(api: Arc<dyn DeviceApi>) -> Self {
        Self {
            api,
            cached: Mutex::new(None),
        }
    }

    pub async fn get(&self) -> Option<DeviceDiagnostics> {
        if let Some(diag) = *self.cached.lock() {
            return Some(diag);
        }

        match self.api.fetch_diagnostics().await {
            Ok(diag) => {
                debug!("Diagnostics loaded: {:?}", diag);
                *self.cached.lock() = Some(diag);
                Some(diag)
            }
            Err(e) => {
                warn!("Diagnostics unavailable: {}", e);
                None
            }
        }
    }

    /// Feed rate for the preview, using the default when `/diag` fails
    pub async fn feed_rate(&self) -> f64 {
        estimate_feed_rate(self.get().await.as_ref())
    }

    pub fn cached(&self) -> Option<DeviceDiagnostics> {
        *self.cached.lock()
    }

    /// Forget the cached value, e.g. after switching devices
    pub fn invalidate(&self) {
        self.cached.lock().take();
    }
}

impl std::fmt::Debug for DiagnosticsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticsCache")
            .field("cached", &self.cached())
            .finish()
    }
}

/// Decoding helper shared with the client
pub(crate) fn decode_diagnostics(endpoint: &str, body: &str) -> Result<DeviceDiagnostics, NetworkError> {
    let value: Value = serde_json::from_str(body).map_err(|e| NetworkError::Decode {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })?;
    DeviceDiagnostics::from_json(&value).ok_or_else(|| NetworkError::Decode {
        endpoint: endpoint.to_string(),
        reason: "expected a JSON object".to_string(),
    })
}

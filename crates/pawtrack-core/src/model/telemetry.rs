// ── Telemetry ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One vitals reading from a collar.
///
/// Produced by the device, never mutated, superseded by newer samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub heart_rate: Option<f64>,
    pub temperature: Option<f64>,
    pub activity_level: Option<f64>,
    pub battery_level: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Aggregates over a trailing window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryStats {
    pub avg_heart_rate: Option<f64>,
    pub avg_temperature: Option<f64>,
    pub avg_activity: Option<f64>,
    pub data_points: Option<u64>,
}

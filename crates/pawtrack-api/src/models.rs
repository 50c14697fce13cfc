// REST and push-channel wire types
//
// Models for the tracking backend's JSON payloads. Fields use
// `#[serde(default)]` where the backend is inconsistent about presence,
// and coordinates accept either JSON numbers or numeric strings because
// the location service serializes decimals as strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ── Lenient numbers ─────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    match NumberOrString::deserialize(d)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn lenient_opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    match Option::<NumberOrString>::deserialize(d)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(NumberOrString::Text(s)) => {
            s.trim().parse().map(Some).map_err(serde::de::Error::custom)
        }
    }
}

// ── Pets ─────────────────────────────────────────────────────────────

/// A pet record from `GET /pets` and `GET /pets/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub weight: Option<f64>,
    #[serde(default)]
    pub collar_id: Option<String>,
}

// ── Sensor data ──────────────────────────────────────────────────────

/// One telemetry reading, from `/sensor-data/...` or a `sensor-update` push.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub heart_rate: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub activity_level: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub battery_level: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Aggregates from `GET /sensor-data/pet/{id}/stats`.
///
/// The backend returns lowercased SQL aggregate names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorStats {
    #[serde(default, rename = "avgheartrate", deserialize_with = "lenient_opt_f64")]
    pub avg_heart_rate: Option<f64>,
    #[serde(default, rename = "avgtemperature", deserialize_with = "lenient_opt_f64")]
    pub avg_temperature: Option<f64>,
    #[serde(default, rename = "avgactivity", deserialize_with = "lenient_opt_f64")]
    pub avg_activity: Option<f64>,
    #[serde(default, rename = "datapoints", deserialize_with = "lenient_opt_f64")]
    pub data_points: Option<f64>,
}

// ── Collars ──────────────────────────────────────────────────────────

/// Envelope of `GET /collar/assignments`.
#[derive(Debug, Deserialize)]
pub struct AssignmentList {
    #[serde(default)]
    pub assignments: Vec<CollarAssignment>,
}

/// A collar-to-pet binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollarAssignment {
    pub collar_id: String,
    pub pet_id: String,
    #[serde(default)]
    pub is_active: bool,
}

/// Body of `POST /collar/assign`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignCollarRequest {
    pub pet_id: String,
    pub collar_id: String,
}

/// Body of `POST /collar/commands`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollarCommandRequest {
    pub pet_id: String,
    /// Command name, e.g. `"FIND_PET"`.
    pub command: String,
}

/// Acknowledgement returned by the collar endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandAck {
    #[serde(default)]
    pub message: Option<String>,
}

// ── Location ─────────────────────────────────────────────────────────

/// A GPS fix, from `/location/collar/{id}/current` or a `location-update` push.
///
/// Push payloads omit `collarId` and `isCurrent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub collar_id: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub latitude: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub longitude: f64,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub accuracy: Option<f64>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_current: Option<bool>,
}

// ── Notifications ────────────────────────────────────────────────────

/// An owner notification from `GET /pets/my-notifications`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub pet_name: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// All remaining fields the backend sends.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Body of `GET /pets/my-notifications/unread-count`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UnreadCount {
    #[serde(default)]
    pub count: u64,
}

// ── Error body ───────────────────────────────────────────────────────

/// Error body shape used by the backend on non-2xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn location_accepts_string_coordinates() {
        let json = r#"{
            "id": "loc-1",
            "collarId": "ESP32_001",
            "latitude": "6.2500000",
            "longitude": "-75.5900000",
            "accuracy": "4.5",
            "timestamp": "2026-03-01T10:00:00Z",
            "isCurrent": true
        }"#;
        let loc: LocationRecord = serde_json::from_str(json).unwrap();
        assert!((loc.latitude - 6.25).abs() < 1e-9);
        assert!((loc.longitude + 75.59).abs() < 1e-9);
        assert_eq!(loc.accuracy, Some(4.5));
        assert_eq!(loc.is_current, Some(true));
    }

    #[test]
    fn location_accepts_numeric_push_payload() {
        let json = r#"{"latitude": 6.26, "longitude": -75.6, "accuracy": 3, "timestamp": "2026-03-01T10:00:05Z"}"#;
        let loc: LocationRecord = serde_json::from_str(json).unwrap();
        assert!(loc.collar_id.is_none());
        assert!(loc.is_current.is_none());
        assert_eq!(loc.accuracy, Some(3.0));
    }

    #[test]
    fn stats_use_lowercase_aggregate_names() {
        let json = r#"{"avgheartrate": "92.4", "avgtemperature": 38.6, "avgactivity": 5, "datapoints": "288"}"#;
        let stats: SensorStats = serde_json::from_str(json).unwrap();
        assert_eq!(stats.avg_heart_rate, Some(92.4));
        assert_eq!(stats.data_points, Some(288.0));
    }

    #[test]
    fn notification_keeps_unknown_fields() {
        let json = r#"{"id": "n1", "title": "Low battery", "petName": "Luna", "priority": "HIGH", "type": "BATTERY"}"#;
        let n: NotificationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(n.pet_name.as_deref(), Some("Luna"));
        assert_eq!(n.extra["type"], "BATTERY");
    }
}

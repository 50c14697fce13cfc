// ── API-to-domain type conversions ──
//
// Bridges raw `pawtrack_api::models` payloads into canonical
// `pawtrack_core::model` types. Each `From` impl normalizes field names
// and fills defaults for data the backend omits.

use pawtrack_api::models::{
    CollarAssignment, LocationRecord, NotificationRecord, PetRecord, SensorReading, SensorStats,
};

use crate::model::{
    Coordinate, DeviceAssignment, DeviceId, LocationSample, Notification, Pet, PetId,
    TelemetrySample, TelemetryStats, UnreadCount,
};

// ── Helpers ────────────────────────────────────────────────────────

/// Treat blank strings from the backend as absent.
fn non_empty(raw: Option<String>) -> Option<String> {
    raw.filter(|s| !s.trim().is_empty())
}

// ── Pets ───────────────────────────────────────────────────────────

impl From<PetRecord> for Pet {
    fn from(r: PetRecord) -> Self {
        Self {
            id: PetId::new(r.id),
            name: r.name,
            species: non_empty(r.species),
            breed: non_empty(r.breed),
            age: r.age,
            weight: r.weight,
            device_id: non_empty(r.collar_id).map(DeviceId::new),
        }
    }
}

impl From<CollarAssignment> for DeviceAssignment {
    fn from(a: CollarAssignment) -> Self {
        Self {
            device_id: DeviceId::new(a.collar_id),
            pet_id: PetId::new(a.pet_id),
            is_active: a.is_active,
        }
    }
}

// ── Telemetry ──────────────────────────────────────────────────────

impl From<SensorReading> for TelemetrySample {
    fn from(r: SensorReading) -> Self {
        Self {
            heart_rate: r.heart_rate,
            temperature: r.temperature,
            activity_level: r.activity_level,
            battery_level: r.battery_level,
            timestamp: r.timestamp,
        }
    }
}

impl From<SensorStats> for TelemetryStats {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::as_conversions
    )]
    fn from(s: SensorStats) -> Self {
        Self {
            avg_heart_rate: s.avg_heart_rate,
            avg_temperature: s.avg_temperature,
            avg_activity: s.avg_activity,
            // COUNT(*) arrives as a numeric string; negatives are impossible.
            data_points: s
                .data_points
                .filter(|n| n.is_finite() && *n >= 0.0)
                .map(|n| n.round() as u64),
        }
    }
}

// ── Location ───────────────────────────────────────────────────────

impl LocationSample {
    /// Convert a wire record, falling back to `device` when the payload
    /// does not name its collar (push events never do).
    pub fn from_record(r: LocationRecord, device: Option<&DeviceId>) -> Self {
        let device_id = non_empty(r.collar_id)
            .map(DeviceId::new)
            .or_else(|| device.cloned());
        Self {
            device_id,
            coordinate: Coordinate::new(r.latitude, r.longitude),
            accuracy: r.accuracy,
            timestamp: r.timestamp,
            // A fix served by the current-location endpoint or pushed live
            // is the current one unless the backend says otherwise.
            is_current: r.is_current.unwrap_or(true),
        }
    }
}

impl From<LocationRecord> for LocationSample {
    fn from(r: LocationRecord) -> Self {
        Self::from_record(r, None)
    }
}

// ── Notifications ──────────────────────────────────────────────────

impl From<NotificationRecord> for Notification {
    fn from(n: NotificationRecord) -> Self {
        Self {
            id: n.id,
            title: n.title,
            message: n.message,
            pet_name: n.pet_name,
            priority: n.priority,
            created_at: n.created_at,
            extra: n.extra,
        }
    }
}

impl From<pawtrack_api::models::UnreadCount> for UnreadCount {
    fn from(c: pawtrack_api::models::UnreadCount) -> Self {
        Self { count: c.count }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn location_falls_back_to_resolved_device() {
        let record: LocationRecord = serde_json::from_value(serde_json::json!({
            "latitude": "6.25", "longitude": "-75.59", "timestamp": "2026-03-01T10:00:00Z"
        }))
        .unwrap();
        let device = DeviceId::from("D1");
        let sample = LocationSample::from_record(record, Some(&device));
        assert_eq!(sample.device_id, Some(device));
        assert!(sample.is_current);
        assert!(sample.coordinate.is_valid());
    }

    #[test]
    fn pet_blank_collar_is_none() {
        let record: PetRecord = serde_json::from_value(serde_json::json!({
            "id": "P1", "name": "Luna", "collarId": "  "
        }))
        .unwrap();
        let pet = Pet::from(record);
        assert!(pet.device_id.is_none());
        assert_eq!(pet.id.as_str(), "P1");
    }

    #[test]
    fn stats_data_points_become_integer() {
        let stats = TelemetryStats::from(SensorStats {
            avg_heart_rate: Some(90.0),
            avg_temperature: None,
            avg_activity: None,
            data_points: Some(288.0),
        });
        assert_eq!(stats.data_points, Some(288));
    }
}

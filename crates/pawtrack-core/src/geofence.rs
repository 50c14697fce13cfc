// ── Geofence evaluation ──
//
// Pure containment and distance checks of a point against named
// circular zones. Great-circle distance via the haversine formula on a
// spherical Earth.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::CoreError;
use crate::model::Coordinate;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Name of the zone used when none are configured.
pub const DEFAULT_ZONE_NAME: &str = "Home";

/// Center and radius of the zone used when none are configured.
pub const DEFAULT_ZONE_CENTER: Coordinate = Coordinate::new(6.25, -75.59);
pub const DEFAULT_ZONE_RADIUS_M: f64 = 300.0;

// ── GeofenceZone ─────────────────────────────────────────────────────

/// A named circle. Construction rejects non-positive radii.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeofenceZone {
    name: String,
    center: Coordinate,
    radius_m: f64,
}

impl GeofenceZone {
    pub fn new(
        name: impl Into<String>,
        center: Coordinate,
        radius_m: f64,
    ) -> Result<Self, CoreError> {
        let name = name.into();
        if !(radius_m.is_finite() && radius_m > 0.0) {
            return Err(CoreError::ValidationFailed {
                message: format!("zone '{name}' radius must be > 0 (got {radius_m})"),
            });
        }
        if !center.is_valid() {
            return Err(CoreError::ValidationFailed {
                message: format!(
                    "zone '{name}' center ({}, {}) is out of range",
                    center.latitude, center.longitude
                ),
            });
        }
        Ok(Self {
            name,
            center,
            radius_m,
        })
    }

    /// The 300 m home zone applied when a profile configures none.
    pub fn default_home() -> Self {
        Self {
            name: DEFAULT_ZONE_NAME.to_owned(),
            center: DEFAULT_ZONE_CENTER,
            radius_m: DEFAULT_ZONE_RADIUS_M,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn center(&self) -> Coordinate {
        self.center
    }

    pub fn radius_m(&self) -> f64 {
        self.radius_m
    }

    /// Non-strict: a point exactly on the boundary is inside.
    pub fn contains(&self, point: Coordinate) -> bool {
        distance_m(self.center, point) <= self.radius_m
    }
}

// ── Evaluation ───────────────────────────────────────────────────────

/// Distance from the evaluated point to one zone's center.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneDistance {
    pub zone: String,
    pub distance_m: f64,
    pub inside: bool,
}

/// Result of [`evaluate`]: every containing zone plus the distance to
/// each zone in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeofenceReport {
    pub point: Coordinate,
    pub inside: BTreeSet<String>,
    pub distances: Vec<ZoneDistance>,
}

impl GeofenceReport {
    pub fn is_inside(&self, zone: &str) -> bool {
        self.inside.contains(zone)
    }

    pub fn inside_any(&self) -> bool {
        !self.inside.is_empty()
    }

    pub fn distance_to(&self, zone: &str) -> Option<f64> {
        self.distances
            .iter()
            .find(|d| d.zone == zone)
            .map(|d| d.distance_m)
    }
}

/// Great-circle distance in meters between two points.
pub fn distance_m(a: Coordinate, b: Coordinate) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Classify `point` against every zone. Overlapping zones all match.
pub fn evaluate(point: Coordinate, zones: &[GeofenceZone]) -> GeofenceReport {
    let distances: Vec<ZoneDistance> = zones
        .iter()
        .map(|zone| {
            let distance_m = distance_m(zone.center, point);
            ZoneDistance {
                zone: zone.name.clone(),
                distance_m,
                inside: distance_m <= zone.radius_m,
            }
        })
        .collect();

    let inside = distances
        .iter()
        .filter(|d| d.inside)
        .map(|d| d.zone.clone())
        .collect();

    GeofenceReport {
        point,
        inside,
        distances,
    }
}

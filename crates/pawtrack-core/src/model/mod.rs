// ── Domain model ──
//
// Canonical pet-tracking types. Wire payloads from `pawtrack_api` are
// converted into these in `convert.rs`; nothing above this crate sees
// raw JSON shapes.

pub mod ids;
pub mod location;
pub mod notification;
pub mod pet;
pub mod telemetry;

pub use ids::{DeviceId, PetId};
pub use location::{Coordinate, LocationSample};
pub use notification::{Notification, UnreadCount};
pub use pet::{DeviceAssignment, Pet};
pub use telemetry::{TelemetrySample, TelemetryStats};

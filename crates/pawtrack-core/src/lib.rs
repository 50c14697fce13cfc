// pawtrack-core: Telemetry reconciliation between pawtrack-api and consumers (CLI).

pub mod cache;
pub mod command;
pub mod config;
pub mod connection;
pub mod convert;
pub mod error;
pub mod geofence;
pub mod merger;
pub mod model;
pub mod resolver;
pub mod router;
pub mod session;
pub mod tracker;
pub mod view;

mod pipeline;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::{CacheKey, EntryConfig, PolledCache, QueryHandle, QueryState, Resource, RetryPolicy, Scope};
pub use command::{Command, CommandResult};
pub use config::{ResourcePolicies, TlsVerification, TrackerConfig};
pub use connection::{ConnectionHandle, ConnectionManager};
pub use error::CoreError;
pub use geofence::{GeofenceReport, GeofenceZone, ZoneDistance};
pub use merger::{CurrentView, MergeMode, Source, Sourced, StateMerger};
pub use pipeline::LocationGate;
pub use resolver::DeviceResolver;
pub use router::{EventRouter, LiveSlots};
pub use session::{SessionContext, SessionState};
pub use tracker::Tracker;
pub use view::{PetView, ViewWatcher};

pub use model::{
    Coordinate, DeviceAssignment, DeviceId, LocationSample, Notification, Pet, PetId,
    TelemetrySample, TelemetryStats, UnreadCount,
};

// Push-channel types surface unchanged.
pub use pawtrack_api::{ConnectivityState, LinkPhase, PushEvent, ReconnectConfig};

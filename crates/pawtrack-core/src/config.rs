// ── Runtime tracker configuration ──
//
// These types describe *how* to reach the backend and how each polled
// resource is scheduled. They never touch disk: the CLI (through
// pawtrack-config) builds a `TrackerConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use pawtrack_api::{ReconnectConfig, TlsMode, TransportConfig};
use url::Url;

use crate::cache::EntryConfig;
use crate::geofence::GeofenceZone;
use crate::merger::MergeMode;

/// TLS verification strategy.
#[derive(Debug, Clone, Default)]
pub enum TlsVerification {
    /// Bundled webpki roots (strict).
    #[default]
    SystemDefaults,
    /// Additional CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed development backends).
    DangerAcceptInvalid,
}

impl From<&TlsVerification> for TlsMode {
    fn from(tls: &TlsVerification) -> Self {
        match tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        }
    }
}

/// Scheduling for every polled resource the core uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePolicies {
    pub latest_telemetry: EntryConfig,
    pub telemetry_stats: EntryConfig,
    pub telemetry_history: EntryConfig,
    pub current_location: EntryConfig,
    pub assignments: EntryConfig,
    pub notifications: EntryConfig,
    pub unread_count: EntryConfig,
}

impl Default for ResourcePolicies {
    fn default() -> Self {
        Self {
            latest_telemetry: EntryConfig::default().every(Duration::from_secs(30)),
            telemetry_stats: EntryConfig::default(),
            telemetry_history: EntryConfig::default(),
            current_location: EntryConfig::default()
                .every(Duration::from_secs(10))
                .retry(3),
            assignments: EntryConfig::default().stale_for(Duration::from_secs(5 * 60)),
            notifications: EntryConfig::default().every(Duration::from_secs(30)),
            unread_count: EntryConfig::default().every(Duration::from_secs(30)),
        }
    }
}

/// Everything the [`Tracker`](crate::Tracker) needs to run.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// REST API root.
    pub api_url: Url,
    /// Socket.IO server root.
    pub push_url: Url,
    pub tls: TlsVerification,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Push-channel handshake bound.
    pub handshake_timeout: Duration,
    /// `None` connects once and stays disconnected after a failure.
    pub reconnect: Option<ReconnectConfig>,
    pub merge_mode: MergeMode,
    pub zones: Vec<GeofenceZone>,
    pub policies: ResourcePolicies,
    /// Window passed as `?hours=` to the stats resource.
    pub stats_window_hours: u32,
}

impl TrackerConfig {
    /// Defaults for a backend serving REST and push from one origin.
    pub fn new(api_url: Url) -> Self {
        Self {
            push_url: api_url.clone(),
            api_url,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(5),
            reconnect: Some(ReconnectConfig::default()),
            merge_mode: MergeMode::default(),
            zones: vec![GeofenceZone::default_home()],
            policies: ResourcePolicies::default(),
            stats_window_hours: 24,
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: TlsMode::from(&self.tls),
            timeout: self.timeout,
        }
    }
}

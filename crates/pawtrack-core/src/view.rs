// ── Per-pet view ──
//
// A `PetView` is the observer-side handle for one pet: merged current
// state, geofence evaluation, and change notification. Dropping it (or
// calling `close`) disconnects the push channel and stops every poll
// scoped to the pet or its device.

use std::sync::Arc;

use pawtrack_api::ConnectivityState;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::{PolledCache, QueryHandle, QueryState, Scope};
use crate::connection::ConnectionHandle;
use crate::geofence::{self, GeofenceReport, GeofenceZone};
use crate::merger::{CurrentView, StateMerger};
use crate::model::{DeviceId, LocationSample, PetId, TelemetrySample, TelemetryStats};
use crate::pipeline::LocationGate;
use crate::router::{EventRouter, LiveSlots};

pub struct PetView {
    pub(crate) pet: PetId,
    pub(crate) merger: StateMerger,
    pub(crate) zones: Vec<GeofenceZone>,
    pub(crate) cache: PolledCache,
    pub(crate) connection: Option<ConnectionHandle>,
    pub(crate) connectivity: Option<watch::Receiver<ConnectivityState>>,
    pub(crate) router: Arc<EventRouter>,
    pub(crate) telemetry: QueryHandle<Option<TelemetrySample>>,
    pub(crate) stats: QueryHandle<TelemetryStats>,
    pub(crate) device: watch::Receiver<Option<DeviceId>>,
    pub(crate) gate: watch::Receiver<LocationGate>,
    pub(crate) cancel: CancellationToken,
    pub(crate) closed: bool,
}

impl std::fmt::Debug for PetView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PetView")
            .field("pet", &self.pet)
            .field("push", &self.connection.is_some())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl PetView {
    pub fn pet(&self) -> &PetId {
        &self.pet
    }

    pub fn zones(&self) -> &[GeofenceZone] {
        &self.zones
    }

    /// Whether this view runs a push connection.
    pub fn is_live(&self) -> bool {
        self.connection.is_some()
    }

    /// `currentView(pet)`: merged telemetry and location plus connectivity.
    pub fn current_view(&self) -> CurrentView {
        let live = self.router.snapshot();
        let polled_telemetry = self
            .telemetry
            .data()
            .and_then(|d| (*d).clone().map(Arc::new));
        let polled_location = self.polled_location();

        self.merger.merge(
            &self.pet,
            &live,
            polled_telemetry.as_ref(),
            polled_location.as_ref(),
            self.connectivity(),
        )
    }

    /// The polled fix for the currently bound device, if the gate is open.
    fn polled_location(&self) -> Option<Arc<LocationSample>> {
        let data = self.gate.borrow().query()?.data()?;
        (*data).clone().map(Arc::new)
    }

    /// Containment and distances for the merged location, if there is one.
    pub fn geofence(&self) -> Option<GeofenceReport> {
        self.current_view()
            .location
            .map(|loc| geofence::evaluate(loc.value.coordinate, &self.zones))
    }

    /// The device the location query is currently bound to.
    pub fn device(&self) -> Option<DeviceId> {
        self.device.borrow().clone()
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.connectivity
            .as_ref()
            .map(|rx| rx.borrow().clone())
            .unwrap_or_default()
    }

    pub fn live_slots(&self) -> LiveSlots {
        self.router.snapshot()
    }

    pub fn telemetry_state(&self) -> QueryState<Option<TelemetrySample>> {
        self.telemetry.snapshot()
    }

    /// `None` while the location gate is not open.
    pub fn location_state(&self) -> Option<QueryState<Option<LocationSample>>> {
        self.gate.borrow().query().map(QueryHandle::snapshot)
    }

    pub fn stats(&self) -> QueryState<TelemetryStats> {
        self.stats.snapshot()
    }

    /// Wait until every query this view depends on has settled once:
    /// telemetry and stats have an answer, the device is resolved, and the
    /// location query (if the gate opened) has an answer.
    pub async fn settled(&self) {
        wait_settled(&self.telemetry).await;
        wait_settled(&self.stats).await;

        let mut gate = self.gate.clone();
        let Ok(open) = gate.wait_for(|g| !g.is_pending()).await else {
            return;
        };
        let location = open.query().cloned();
        drop(open);
        if let Some(location) = location {
            wait_settled(&location).await;
        }
    }

    /// Change notifications for everything `current_view` reads.
    pub fn watcher(&self) -> ViewWatcher {
        let gate = self.gate.clone();
        let location = gate.borrow().query().map(QueryHandle::subscribe);
        ViewWatcher {
            slots: Some(self.router.slots()),
            telemetry: Some(self.telemetry.subscribe()),
            connectivity: self.connectivity.clone(),
            gate: Some(gate),
            location,
        }
    }

    /// Disconnect, then drop every cache entry bound to this pet or its
    /// device. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        self.cancel.cancel();
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
        self.cache.remove_scope(&Scope::Pet(self.pet.clone()));
        if let Some(device) = self.device.borrow().clone() {
            self.cache.remove_scope(&Scope::Device(device));
        }
        if let Some(location) = self.gate.borrow().query() {
            location.set_enabled(false);
        }
        self.router.clear();
        debug!(pet = %self.pet, "pet view closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for PetView {
    fn drop(&mut self) {
        self.close();
    }
}

async fn wait_settled<T: Send + Sync + 'static>(query: &QueryHandle<T>) {
    if !query.is_enabled() {
        return;
    }
    let mut rx = query.subscribe();
    let _ = rx
        .wait_for(|s| !s.is_loading && (s.data.is_some() || s.error.is_some()))
        .await;
}

// ── Change notification ──────────────────────────────────────────────

/// Resolves whenever a merged-view input changes.
pub struct ViewWatcher {
    slots: Option<watch::Receiver<LiveSlots>>,
    telemetry: Option<watch::Receiver<QueryState<Option<TelemetrySample>>>>,
    connectivity: Option<watch::Receiver<ConnectivityState>>,
    gate: Option<watch::Receiver<LocationGate>>,
    location: Option<watch::Receiver<QueryState<Option<LocationSample>>>>,
}

enum Changed {
    Slots(bool),
    Telemetry(bool),
    Connectivity(bool),
    Gate(bool),
    Location(bool),
}

impl ViewWatcher {
    /// Wait for the next change. Returns `false` once every source is gone.
    pub async fn changed(&mut self) -> bool {
        loop {
            if self.slots.is_none()
                && self.telemetry.is_none()
                && self.connectivity.is_none()
                && self.gate.is_none()
                && self.location.is_none()
            {
                return false;
            }

            let which = tokio::select! {
                ok = wait_changed(&mut self.slots) => Changed::Slots(ok),
                ok = wait_changed(&mut self.telemetry) => Changed::Telemetry(ok),
                ok = wait_changed(&mut self.connectivity) => Changed::Connectivity(ok),
                ok = wait_changed(&mut self.gate) => Changed::Gate(ok),
                ok = wait_changed(&mut self.location) => Changed::Location(ok),
            };

            match which {
                Changed::Slots(true)
                | Changed::Telemetry(true)
                | Changed::Connectivity(true)
                | Changed::Location(true) => return true,
                Changed::Gate(true) => {
                    // Follow the gate to the newly bound location query.
                    self.location = self
                        .gate
                        .as_ref()
                        .and_then(|g| g.borrow().query().map(QueryHandle::subscribe));
                    return true;
                }
                Changed::Slots(false) => self.slots = None,
                Changed::Telemetry(false) => self.telemetry = None,
                Changed::Connectivity(false) => self.connectivity = None,
                Changed::Gate(false) => self.gate = None,
                Changed::Location(false) => self.location = None,
            }
        }
    }
}

/// `changed()` on an optional receiver; pends forever when absent.
async fn wait_changed<T>(rx: &mut Option<watch::Receiver<T>>) -> bool {
    match rx {
        Some(rx) => rx.changed().await.is_ok(),
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use pawtrack_api::PushEvent;
    use pawtrack_api::models::LocationRecord;
    use secrecy::SecretString;
    use serde_json::{Value, json};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::cache::{CacheKey, Resource};
    use crate::config::TrackerConfig;
    use crate::merger::Source;
    use crate::model::Notification;
    use crate::session::SessionContext;
    use crate::tracker::Tracker;

    async fn mount_get(server: &MockServer, route: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    /// A backend where P1 wears D1 and D1 reports a fix at home.
    async fn backend() -> MockServer {
        let server = MockServer::start().await;
        mount_get(
            &server,
            "/sensor-data/pet/P1/latest",
            json!({
                "heartRate": 88, "temperature": "38.5", "activityLevel": 4,
                "batteryLevel": 81, "timestamp": "2026-03-01T10:00:00Z"
            }),
        )
        .await;
        mount_get(
            &server,
            "/sensor-data/pet/P1/stats",
            json!({ "avgheartrate": "90.5", "avgtemperature": 38.4, "avgactivity": 3, "datapoints": "12" }),
        )
        .await;
        mount_get(&server, "/pets/my-notifications", json!([])).await;
        mount_get(&server, "/pets/my-notifications/unread-count", json!({ "count": 0 })).await;
        mount_get(
            &server,
            "/collar/assignments",
            json!({ "assignments": [{ "collarId": "D1", "petId": "P1", "isActive": true }] }),
        )
        .await;
        mount_get(
            &server,
            "/location/collar/D1/current",
            json!({
                "collarId": "D1", "latitude": "6.2505", "longitude": "-75.5905",
                "accuracy": 5, "timestamp": "2026-03-01T10:00:02Z", "isCurrent": true
            }),
        )
        .await;
        server
    }

    fn tracker(server: &MockServer) -> Tracker {
        let mut config = TrackerConfig::new(server.uri().parse().unwrap());
        config.reconnect = None;
        let session = SessionContext::with_token(SecretString::from("t".to_owned()));
        Tracker::new(config, session).unwrap()
    }

    #[tokio::test]
    async fn older_live_location_still_beats_polled() {
        let server = backend().await;
        let tracker = tracker(&server);
        let view = tracker.observe_polled(PetId::from("P1")).unwrap();
        tokio::time::timeout(Duration::from_secs(5), view.settled())
            .await
            .unwrap();

        let polled = view.current_view().location.unwrap();
        assert_eq!(polled.source, Source::Poll);
        assert!(view.geofence().unwrap().is_inside("Home"));

        // An hour older than the polled fix and ~11 km away.
        let pushed: LocationRecord = serde_json::from_value(json!({
            "latitude": 6.30, "longitude": -75.50, "timestamp": "2026-03-01T09:00:00Z"
        }))
        .unwrap();
        view.router.apply(&PushEvent::Location(pushed));

        let merged = view.current_view().location.unwrap();
        assert_eq!(merged.source, Source::Push);
        assert!((merged.value.coordinate.latitude - 6.30).abs() < 1e-9);
        assert_eq!(merged.value.device_id.as_ref().unwrap().as_str(), "D1");
        assert!(!view.geofence().unwrap().inside_any());
    }

    #[tokio::test]
    async fn close_removes_pet_and_device_entries() {
        let server = backend().await;
        let tracker = tracker(&server);
        let pet = PetId::from("P1");
        let mut view = tracker.observe_polled(pet.clone()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), view.settled())
            .await
            .unwrap();

        let device = view.device().unwrap();
        let location_key = CacheKey::device(Resource::CurrentLocation, &device);
        assert!(view.location_state().unwrap().data.is_some());

        view.close();

        let cache = tracker.cache();
        assert!(
            cache
                .handle::<Option<TelemetrySample>>(&CacheKey::pet(
                    Resource::LatestTelemetry,
                    &pet
                ))
                .unwrap()
                .is_none()
        );
        assert!(
            cache
                .handle::<Option<LocationSample>>(&location_key)
                .unwrap()
                .is_none()
        );
        // Global queries stay registered for other views.
        assert!(
            cache
                .handle::<Vec<Notification>>(&CacheKey::global(Resource::Notifications))
                .unwrap()
                .is_some()
        );
    }
}

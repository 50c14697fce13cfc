// Integration tests for `Tracker` and `PetView` against a wiremock backend.

use std::time::Duration;

use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use wiremock::matchers::{body_json, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pawtrack_core::{
    CacheKey, Command, CoreError, PetId, Resource, SessionContext, Source, TelemetrySample,
    Tracker, TrackerConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

const SETTLE: Duration = Duration::from_secs(5);

fn tracker(server: &MockServer) -> Tracker {
    let mut config = TrackerConfig::new(server.uri().parse().unwrap());
    config.reconnect = None;
    let session = SessionContext::with_token(SecretString::from("test-token".to_owned()));
    Tracker::new(config, session).unwrap()
}

async fn mount_get(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Telemetry, stats and notification endpoints for pet `P1`.
async fn mount_pet_basics(server: &MockServer) {
    mount_get(
        server,
        "/sensor-data/pet/P1/latest",
        json!({
            "heartRate": 88, "temperature": "38.5", "activityLevel": 4,
            "batteryLevel": 81, "timestamp": "2026-03-01T10:00:00Z"
        }),
    )
    .await;
    mount_get(
        server,
        "/sensor-data/pet/P1/stats",
        json!({ "avgheartrate": "90.5", "avgtemperature": 38.4, "avgactivity": 3, "datapoints": "12" }),
    )
    .await;
    mount_get(server, "/pets/my-notifications", json!([])).await;
    mount_get(server, "/pets/my-notifications/unread-count", json!({ "count": 0 })).await;
}

async fn mount_assignments(server: &MockServer, rows: Value) {
    mount_get(server, "/collar/assignments", json!({ "assignments": rows })).await;
}

async fn requests_to(server: &MockServer, prefix: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path().starts_with(prefix))
        .count()
}

// ── Views ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_pet_without_device_never_requests_location() {
    let server = MockServer::start().await;
    mount_pet_basics(&server).await;
    mount_assignments(&server, json!([{ "collarId": "D9", "petId": "P2", "isActive": true }])).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/location/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Value::Null))
        .expect(0)
        .mount(&server)
        .await;

    let tracker = tracker(&server);
    let view = tracker.observe_polled(PetId::from("P1")).unwrap();
    tokio::time::timeout(SETTLE, view.settled()).await.unwrap();

    assert_eq!(view.device(), None);
    assert!(view.location_state().is_none());

    let current = view.current_view();
    let telemetry = current.telemetry.unwrap();
    assert_eq!(telemetry.source, Source::Poll);
    assert_eq!(telemetry.value.heart_rate, Some(88.0));
    assert_eq!(telemetry.value.temperature, Some(38.5));
    assert!(current.location.is_none());
    assert!(!current.connectivity.connected());
    assert!(view.geofence().is_none());

    let stats = view.stats().data.unwrap();
    assert_eq!(stats.data_points, Some(12));
}

#[tokio::test]
async fn test_resolved_device_drives_location_and_geofence() {
    let server = MockServer::start().await;
    mount_pet_basics(&server).await;
    mount_assignments(
        &server,
        json!([
            { "collarId": "D0", "petId": "P1", "isActive": false },
            { "collarId": "D1", "petId": "P1", "isActive": true }
        ]),
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

    let tracker = tracker(&server);
    let view = tracker.observe_polled(PetId::from("P1")).unwrap();
    tokio::time::timeout(SETTLE, view.settled()).await.unwrap();

    assert_eq!(view.device().unwrap().as_str(), "D1");

    let location = view.current_view().location.unwrap();
    assert_eq!(location.source, Source::Poll);
    assert_eq!(location.value.device_id.as_ref().unwrap().as_str(), "D1");

    let report = view.geofence().unwrap();
    assert!(report.is_inside("Home"));
    assert!(report.distance_to("Home").unwrap() < 100.0);
}

#[tokio::test]
async fn test_push_handshake_timeout_keeps_polled_data() {
    let server = MockServer::start().await;
    mount_pet_basics(&server).await;
    mount_assignments(&server, json!([])).await;

    // Accepts TCP but never answers the websocket upgrade.
    let silent = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let push_url = format!("http://{}", silent.local_addr().unwrap());
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = silent.accept().await {
            held.push(stream);
        }
    });

    let mut config = TrackerConfig::new(server.uri().parse().unwrap());
    config.push_url = push_url.parse().unwrap();
    config.handshake_timeout = Duration::from_millis(200);
    config.reconnect = None;
    let session = SessionContext::with_token(SecretString::from("test-token".to_owned()));
    let tracker = Tracker::new(config, session).unwrap();

    let view = tracker.observe(PetId::from("P1")).unwrap();
    assert!(view.is_live());
    tokio::time::timeout(SETTLE, view.settled()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;

    let current = view.current_view();
    assert!(!current.connectivity.connected());
    assert_eq!(current.telemetry.unwrap().source, Source::Poll);
}

#[tokio::test]
async fn test_close_removes_pet_scoped_polling() {
    let server = MockServer::start().await;
    mount_pet_basics(&server).await;
    mount_assignments(&server, json!([])).await;

    let tracker = tracker(&server);
    let pet = PetId::from("P1");
    let mut view = tracker.observe_polled(pet.clone()).unwrap();
    tokio::time::timeout(SETTLE, view.settled()).await.unwrap();

    let telemetry = tracker
        .cache()
        .handle::<Option<TelemetrySample>>(&CacheKey::pet(Resource::LatestTelemetry, &pet))
        .unwrap()
        .unwrap();
    assert!(telemetry.is_enabled());

    view.close();
    view.close();
    assert!(view.is_closed());
    assert!(!telemetry.is_enabled());
    // Outstanding handles keep their last answer.
    assert!(telemetry.data().is_some());
    assert!(
        tracker
            .cache()
            .handle::<Option<TelemetrySample>>(&CacheKey::pet(Resource::LatestTelemetry, &pet))
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_failed_push_open_leaves_no_polling() {
    let server = MockServer::start().await;
    mount_pet_basics(&server).await;
    mount_assignments(&server, json!([{ "collarId": "D1", "petId": "P1", "isActive": true }])).await;

    let mut config = TrackerConfig::new(server.uri().parse().unwrap());
    config.push_url = "ftp://push.example.com".parse().unwrap();
    config.reconnect = None;
    config.policies.latest_telemetry.refetch_interval = Some(Duration::from_millis(100));
    let session = SessionContext::with_token(SecretString::from("test-token".to_owned()));
    let tracker = Tracker::new(config, session).unwrap();

    let pet = PetId::from("P1");
    let err = tracker.observe(pet.clone()).unwrap_err();
    assert!(matches!(err, CoreError::ConnectionFailed { .. }), "{err:?}");

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(requests_to(&server, "/sensor-data/").await, 0);
    assert!(
        tracker
            .cache()
            .handle::<Option<TelemetrySample>>(&CacheKey::pet(Resource::LatestTelemetry, &pet))
            .unwrap()
            .is_none()
    );
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_find_pet_refetches_device_location() {
    let server = MockServer::start().await;
    mount_pet_basics(&server).await;
    mount_assignments(&server, json!([{ "collarId": "D1", "petId": "P1", "isActive": true }])).await;
    mount_get(
        &server,
        "/location/collar/D1/current",
        json!({ "latitude": 6.25, "longitude": -75.59, "timestamp": "2026-03-01T10:00:02Z" }),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/collar/commands"))
        .and(body_json(json!({ "petId": "P1", "command": "FIND_PET" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "Command sent" })))
        .expect(1)
        .mount(&server)
        .await;

    let tracker = tracker(&server);
    let view = tracker.observe_polled(PetId::from("P1")).unwrap();
    tokio::time::timeout(SETTLE, view.settled()).await.unwrap();
    assert_eq!(requests_to(&server, "/location/").await, 1);

    let result = tracker
        .execute(Command::FindPet {
            pet: PetId::from("P1"),
        })
        .await
        .unwrap();
    assert_eq!(result.message.as_deref(), Some("Command sent"));

    tokio::time::timeout(SETTLE, async {
        while requests_to(&server, "/location/").await < 2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_assign_device_trims_and_invalidates_registry() {
    let server = MockServer::start().await;
    mount_assignments(&server, json!([])).await;
    Mock::given(method("POST"))
        .and(path("/collar/assign"))
        .and(body_json(json!({ "petId": "P1", "collarId": "D7" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "assigned" })))
        .expect(1)
        .mount(&server)
        .await;

    let tracker = tracker(&server);
    assert_eq!(tracker.resolve_device(&PetId::from("P1")).await.unwrap(), None);

    tracker
        .execute(Command::AssignDevice {
            pet: PetId::from("P1"),
            device: "  D7 ".into(),
        })
        .await
        .unwrap();

    // The registry was invalidated, so its poll task goes back to the server.
    tokio::time::timeout(SETTLE, async {
        while requests_to(&server, "/collar/assignments").await < 2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_assign_device_rejects_blank_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collar/assign"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tracker = tracker(&server);
    let err = tracker
        .execute(Command::AssignDevice {
            pet: PetId::from("P1"),
            device: "   ".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ValidationFailed { .. }));
}

// ── Errors ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_unauthorized_read_invalidates_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pets"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let tracker = tracker(&server);
    assert!(tracker.session().is_active());

    let err = tracker.list_pets().await.unwrap_err();
    assert!(err.is_unauthorized());
    assert!(tracker.session().is_invalidated());
}

#[tokio::test]
async fn test_missing_pet_maps_to_pet_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pets/P404"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Pet not found" })))
        .mount(&server)
        .await;

    let tracker = tracker(&server);
    let err = tracker.get_pet(&PetId::from("P404")).await.unwrap_err();
    assert!(matches!(err, CoreError::PetNotFound { ref pet } if pet == "P404"));
}

// ── Event router ──
//
// Consumes the push stream for one pet: every recognized event
// overwrites the matching live slot and invalidates the polled resource
// it supersedes. Events are applied strictly in arrival order with no
// timestamp comparison, so a late stale event still wins its slot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use pawtrack_api::PushEvent;
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::{PolledCache, Resource, Scope};
use crate::model::{DeviceId, LocationSample, PetId, TelemetrySample};

/// Most recent pushed value per event kind.
#[derive(Debug, Clone, Default)]
pub struct LiveSlots {
    pub telemetry: Option<Arc<TelemetrySample>>,
    pub location: Option<Arc<LocationSample>>,
    pub notification: Option<Arc<Value>>,
    /// Events applied since the slots were last cleared.
    pub applied: u64,
    pub last_applied_at: Option<DateTime<Utc>>,
}

/// Routes push events for one pet into live slots and cache invalidations.
pub struct EventRouter {
    pet: PetId,
    cache: PolledCache,
    device: watch::Receiver<Option<DeviceId>>,
    slots: watch::Sender<LiveSlots>,
}

impl EventRouter {
    /// `device` tracks the resolver's current answer for `pet`; location
    /// invalidations target that device's entry.
    pub fn new(pet: PetId, cache: PolledCache, device: watch::Receiver<Option<DeviceId>>) -> Self {
        let (slots, _) = watch::channel(LiveSlots::default());
        Self {
            pet,
            cache,
            device,
            slots,
        }
    }

    pub fn pet(&self) -> &PetId {
        &self.pet
    }

    /// Read-only view of the live slots.
    pub fn slots(&self) -> watch::Receiver<LiveSlots> {
        self.slots.subscribe()
    }

    pub fn snapshot(&self) -> LiveSlots {
        self.slots.borrow().clone()
    }

    /// Apply one event: overwrite its slot, then invalidate.
    pub fn apply(&self, event: &PushEvent) {
        let now = Utc::now();
        match event {
            PushEvent::Sensor(reading) => {
                let sample = Arc::new(TelemetrySample::from(reading.clone()));
                self.slots.send_modify(|s| {
                    s.telemetry = Some(sample);
                    s.applied += 1;
                    s.last_applied_at = Some(now);
                });
                let scope = Scope::Pet(self.pet.clone());
                self.cache.invalidate(Resource::LatestTelemetry, &scope);
                self.cache.invalidate(Resource::TelemetryStats, &scope);
            }
            PushEvent::Location(record) => {
                let device = self.device.borrow().clone();
                let sample = Arc::new(LocationSample::from_record(record.clone(), device.as_ref()));
                self.slots.send_modify(|s| {
                    s.location = Some(sample);
                    s.applied += 1;
                    s.last_applied_at = Some(now);
                });
                match device {
                    Some(device) => {
                        self.cache
                            .invalidate(Resource::CurrentLocation, &Scope::Device(device));
                    }
                    None => debug!(pet = %self.pet, "location pushed before device resolved"),
                }
            }
            PushEvent::Notification(payload) => {
                let payload = Arc::new(payload.clone());
                self.slots.send_modify(|s| {
                    s.notification = Some(payload);
                    s.applied += 1;
                    s.last_applied_at = Some(now);
                });
                self.cache.invalidate(Resource::Notifications, &Scope::Global);
                self.cache.invalidate(Resource::UnreadCount, &Scope::Global);
            }
        }
    }

    /// Discard every live slot.
    pub fn clear(&self) {
        self.slots.send_replace(LiveSlots::default());
    }

    /// Drain `events` until the stream closes or `cancel` fires.
    pub async fn run(
        &self,
        mut events: broadcast::Receiver<Arc<PushEvent>>,
        cancel: CancellationToken,
    ) {
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                next = events.recv() => next,
            };

            match next {
                Ok(event) => {
                    debug!(pet = %self.pet, kind = ?event.kind(), "push event");
                    self.apply(&event);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(pet = %self.pet, skipped, "event router lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!(pet = %self.pet, "event router stopped");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use pawtrack_api::models::{LocationRecord, SensorReading};
    use secrecy::SecretString;

    use super::*;
    use crate::cache::{CacheKey, EntryConfig};
    use crate::session::SessionContext;

    fn location(lat: &str, ts: &str) -> PushEvent {
        let record: LocationRecord = serde_json::from_value(serde_json::json!({
            "latitude": lat, "longitude": "-75.59", "timestamp": ts
        }))
        .unwrap();
        PushEvent::Location(record)
    }

    fn sensor(hr: f64, ts: &str) -> PushEvent {
        let reading: SensorReading = serde_json::from_value(serde_json::json!({
            "heartRate": hr, "timestamp": ts
        }))
        .unwrap();
        PushEvent::Sensor(reading)
    }

    fn router(device: Option<&str>) -> (EventRouter, PolledCache, watch::Sender<Option<DeviceId>>) {
        let cache = PolledCache::new(SessionContext::with_token(SecretString::from("t".to_owned())));
        let (tx, rx) = watch::channel(device.map(DeviceId::from));
        (EventRouter::new("P1".into(), cache.clone(), rx), cache, tx)
    }

    #[tokio::test]
    async fn last_processed_location_wins_regardless_of_timestamp() {
        let (router, _cache, _tx) = router(Some("D1"));

        router.apply(&location("6.2500", "2026-03-01T10:00:05Z"));
        router.apply(&sensor(90.0, "2026-03-01T10:00:06Z"));
        router.apply(&location("6.2400", "2026-03-01T09:59:00Z"));

        let slots = router.snapshot();
        let loc = slots.location.unwrap();
        assert!((loc.coordinate.latitude - 6.24).abs() < 1e-9);
        assert_eq!(loc.timestamp.to_rfc3339(), "2026-03-01T09:59:00+00:00");
        assert_eq!(loc.device_id, Some(DeviceId::from("D1")));
        assert_eq!(slots.telemetry.unwrap().heart_rate, Some(90.0));
        assert_eq!(slots.applied, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn events_invalidate_matching_entries() {
        let (router, cache, _tx) = router(Some("D1"));
        let calls = Arc::new(AtomicU32::new(0));

        let register = |key: CacheKey| {
            let calls = Arc::clone(&calls);
            cache
                .register(key, EntryConfig::default().stale_for(Duration::from_secs(3600)), move || {
                    let calls = Arc::clone(&calls);
                    async move { Ok(calls.fetch_add(1, Ordering::SeqCst)) }
                })
                .unwrap()
        };
        let telemetry = register(CacheKey::pet(Resource::LatestTelemetry, &"P1".into()));
        let location_entry = register(CacheKey::device(Resource::CurrentLocation, &"D1".into()));
        let other_pet = register(CacheKey::pet(Resource::LatestTelemetry, &"P2".into()));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let untouched = other_pet.data();

        router.apply(&sensor(95.0, "2026-03-01T10:00:00Z"));
        router.apply(&location("6.25", "2026-03-01T10:00:00Z"));
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Telemetry for P1 and location for D1 refetched; P2 untouched.
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert!(telemetry.data().is_some());
        assert!(location_entry.data().is_some());
        assert_eq!(other_pet.data(), untouched);
    }

    #[tokio::test]
    async fn unknown_device_skips_location_invalidation() {
        let (router, cache, _tx) = router(None);
        router.apply(&location("6.25", "2026-03-01T10:00:00Z"));
        assert!(router.snapshot().location.unwrap().device_id.is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn clear_discards_slots() {
        let (router, _cache, _tx) = router(Some("D1"));
        router.apply(&PushEvent::Notification(serde_json::json!({"title": "hi"})));
        assert!(router.snapshot().notification.is_some());
        router.clear();
        let slots = router.snapshot();
        assert!(slots.notification.is_none());
        assert_eq!(slots.applied, 0);
    }

    #[tokio::test]
    async fn run_processes_stream_in_order_until_closed() {
        let (router, _cache, _tx) = router(Some("D1"));
        let (tx, rx) = broadcast::channel(16);
        tx.send(Arc::new(location("6.1", "2026-03-01T10:00:00Z"))).unwrap();
        tx.send(Arc::new(location("6.2", "2026-03-01T10:00:01Z"))).unwrap();
        tx.send(Arc::new(location("6.3", "2026-03-01T09:00:00Z"))).unwrap();
        drop(tx);

        router.run(rx, CancellationToken::new()).await;

        let loc = router.snapshot().location.unwrap();
        assert!((loc.coordinate.latitude - 6.3).abs() < 1e-9);
    }
}

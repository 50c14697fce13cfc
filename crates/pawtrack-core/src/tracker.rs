// ── Tracker facade ──
//
// Owns the session, the REST client, the shared polled cache and the
// connection manager. Views are handed out per pet; one-shot reads and
// commands go straight through here.

use std::sync::Arc;

use pawtrack_api::{BearerSource, RestClient};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::{CacheKey, PolledCache, QueryHandle, Resource, Scope};
use crate::command::{Command, CommandResult, FIND_PET_COMMAND};
use crate::config::TrackerConfig;
use crate::connection::ConnectionManager;
use crate::error::CoreError;
use crate::merger::StateMerger;
use crate::model::{
    DeviceId, LocationSample, Notification, Pet, PetId, TelemetrySample, TelemetryStats,
    UnreadCount,
};
use crate::pipeline::{LocationGate, LocationPipeline};
use crate::resolver::DeviceResolver;
use crate::router::EventRouter;
use crate::session::SessionContext;
use crate::view::PetView;

/// Cheaply cloneable entry point into the tracking core.
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    config: TrackerConfig,
    session: SessionContext,
    rest: RestClient,
    cache: PolledCache,
    connections: ConnectionManager,
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("api_url", &self.inner.config.api_url.as_str())
            .field("session", &self.inner.session)
            .finish_non_exhaustive()
    }
}

impl Tracker {
    /// Build the REST client from `config` and bind it to `session`.
    pub fn new(config: TrackerConfig, session: SessionContext) -> Result<Self, CoreError> {
        let credentials: Arc<dyn BearerSource> = Arc::new(session.clone());
        let rest = RestClient::new(config.api_url.clone(), &config.transport(), Some(credentials))?;
        let cache = PolledCache::new(session.clone());
        let connections = ConnectionManager::new(&config, session.clone());

        Ok(Self {
            inner: Arc::new(TrackerInner {
                config,
                session,
                rest,
                cache,
                connections,
            }),
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.inner.config
    }

    pub fn session(&self) -> &SessionContext {
        &self.inner.session
    }

    pub fn cache(&self) -> &PolledCache {
        &self.inner.cache
    }

    // ── Shared queries ───────────────────────────────────────────────

    /// The process-wide assignment registry resolver.
    pub fn resolver(&self) -> Result<DeviceResolver, CoreError> {
        DeviceResolver::new(
            &self.inner.cache,
            self.inner.rest.clone(),
            self.inner.config.policies.assignments,
        )
    }

    pub async fn resolve_device(&self, pet: &PetId) -> Result<Option<DeviceId>, CoreError> {
        self.resolver()?.resolve(pet).await
    }

    pub fn notifications(&self) -> Result<QueryHandle<Vec<Notification>>, CoreError> {
        let rest = self.inner.rest.clone();
        self.inner.cache.register(
            CacheKey::global(Resource::Notifications),
            self.inner.config.policies.notifications,
            move || {
                let rest = rest.clone();
                async move {
                    let rows = rest.list_notifications().await?;
                    Ok(rows.into_iter().map(Notification::from).collect::<Vec<_>>())
                }
            },
        )
    }

    pub fn unread_count(&self) -> Result<QueryHandle<UnreadCount>, CoreError> {
        let rest = self.inner.rest.clone();
        self.inner.cache.register(
            CacheKey::global(Resource::UnreadCount),
            self.inner.config.policies.unread_count,
            move || {
                let rest = rest.clone();
                async move { Ok(UnreadCount::from(rest.unread_count().await?)) }
            },
        )
    }

    // ── One-shot reads ───────────────────────────────────────────────

    pub async fn list_pets(&self) -> Result<Vec<Pet>, CoreError> {
        let pets = self.check(self.inner.rest.list_pets().await)?;
        Ok(pets.into_iter().map(Pet::from).collect())
    }

    pub async fn get_pet(&self, pet: &PetId) -> Result<Pet, CoreError> {
        match self.check(self.inner.rest.get_pet(pet.as_str()).await) {
            Ok(record) => Ok(Pet::from(record)),
            Err(e) if e.is_not_found() => Err(CoreError::PetNotFound {
                pet: pet.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    pub async fn telemetry_history(
        &self,
        pet: &PetId,
        limit: Option<u32>,
    ) -> Result<Vec<TelemetrySample>, CoreError> {
        let rows = self.check(self.inner.rest.sensor_history(pet.as_str(), limit).await)?;
        Ok(rows.into_iter().map(TelemetrySample::from).collect())
    }

    pub async fn telemetry_stats(
        &self,
        pet: &PetId,
        hours: Option<u32>,
    ) -> Result<TelemetryStats, CoreError> {
        let hours = hours.unwrap_or(self.inner.config.stats_window_hours);
        let stats = self.check(self.inner.rest.sensor_stats(pet.as_str(), Some(hours)).await)?;
        Ok(TelemetryStats::from(stats))
    }

    /// Resolve the pet's device, then read its current fix. A pet without
    /// an active device yields `Ok(None)` and issues no location request.
    pub async fn current_location(&self, pet: &PetId) -> Result<Option<LocationSample>, CoreError> {
        let Some(device) = self.resolve_device(pet).await? else {
            return Ok(None);
        };
        let record = self.check(self.inner.rest.current_location(device.as_str()).await)?;
        Ok(record.map(|r| LocationSample::from_record(r, Some(&device))))
    }

    // ── Views ────────────────────────────────────────────────────────

    /// Poll + push view for `pet`.
    pub fn observe(&self, pet: PetId) -> Result<PetView, CoreError> {
        self.observe_inner(pet, true)
    }

    /// Poll-only view for `pet`; connectivity always reads disconnected.
    pub fn observe_polled(&self, pet: PetId) -> Result<PetView, CoreError> {
        self.observe_inner(pet, false)
    }

    fn observe_inner(&self, pet: PetId, push: bool) -> Result<PetView, CoreError> {
        let config = &self.inner.config;
        let cache = &self.inner.cache;
        let policies = &config.policies;

        // Nothing is registered until the connection is up, so a failed
        // open leaves no polling behind.
        let handle = if push {
            Some(self.inner.connections.open(&pet)?)
        } else {
            None
        };

        let (telemetry, stats, resolver) = match self.register_pet_queries(&pet) {
            Ok(queries) => queries,
            Err(e) => {
                cache.remove_scope(&Scope::Pet(pet.clone()));
                return Err(e);
            }
        };

        let (device_tx, device_rx) = watch::channel(None);
        let (gate_tx, gate_rx) = watch::channel(LocationGate::Pending);
        let router = Arc::new(EventRouter::new(pet.clone(), cache.clone(), device_rx.clone()));
        let cancel = CancellationToken::new();

        let (connection, connectivity) = match handle {
            Some(handle) => {
                let events = handle.events();
                let connectivity = handle.connectivity();
                let router = Arc::clone(&router);
                let token = cancel.child_token();
                tokio::spawn(async move { router.run(events, token).await });
                (Some(handle), Some(connectivity))
            }
            None => (None, None),
        };

        let location = LocationPipeline {
            pet: pet.clone(),
            resolver,
            cache: cache.clone(),
            rest: self.inner.rest.clone(),
            location_policy: policies.current_location,
            stale_window: policies.assignments.stale_time,
            device_tx,
            gate_tx,
            cancel: cancel.child_token(),
        };
        tokio::spawn(location.run());

        info!(pet = %pet, push, "observing pet");

        Ok(PetView {
            pet,
            merger: StateMerger::new(config.merge_mode),
            zones: config.zones.clone(),
            cache: cache.clone(),
            connection,
            connectivity,
            router,
            telemetry,
            stats,
            device: device_rx,
            gate: gate_rx,
            cancel,
            closed: false,
        })
    }

    /// Telemetry, stats and the global queries pushed events invalidate.
    fn register_pet_queries(
        &self,
        pet: &PetId,
    ) -> Result<
        (
            QueryHandle<Option<TelemetrySample>>,
            QueryHandle<TelemetryStats>,
            DeviceResolver,
        ),
        CoreError,
    > {
        let config = &self.inner.config;
        let cache = &self.inner.cache;
        let policies = &config.policies;

        let telemetry = {
            let rest = self.inner.rest.clone();
            let id = pet.clone();
            cache.register(
                CacheKey::pet(Resource::LatestTelemetry, pet),
                policies.latest_telemetry,
                move || {
                    let rest = rest.clone();
                    let id = id.clone();
                    async move {
                        let reading = rest.latest_sensor_data(id.as_str()).await?;
                        Ok(reading.map(TelemetrySample::from))
                    }
                },
            )?
        };

        let stats = {
            let rest = self.inner.rest.clone();
            let id = pet.clone();
            let hours = config.stats_window_hours;
            cache.register(
                CacheKey::pet(Resource::TelemetryStats, pet).with_param("hours", hours),
                policies.telemetry_stats,
                move || {
                    let rest = rest.clone();
                    let id = id.clone();
                    async move {
                        let stats = rest.sensor_stats(id.as_str(), Some(hours)).await?;
                        Ok(TelemetryStats::from(stats))
                    }
                },
            )?
        };

        // Pushed notifications invalidate these, so they must exist.
        self.notifications()?;
        self.unread_count()?;

        Ok((telemetry, stats, self.resolver()?))
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Execute a write operation and invalidate what it makes stale.
    pub async fn execute(&self, command: Command) -> Result<CommandResult, CoreError> {
        match command {
            Command::FindPet { pet } => {
                let ack = self.check(
                    self.inner
                        .rest
                        .send_collar_command(pet.as_str(), FIND_PET_COMMAND)
                        .await,
                )?;
                match self.resolve_device(&pet).await {
                    Ok(Some(device)) => {
                        self.inner
                            .cache
                            .invalidate(Resource::CurrentLocation, &Scope::Device(device));
                    }
                    Ok(None) => debug!(pet = %pet, "find-pet sent for pet without active device"),
                    Err(e) => debug!(pet = %pet, error = %e, "cannot resolve device after find-pet"),
                }
                info!(pet = %pet, "find-pet command sent");
                Ok(CommandResult {
                    message: ack.message,
                })
            }
            Command::AssignDevice { pet, device } => {
                let device = device.as_str().trim();
                if device.is_empty() {
                    return Err(CoreError::ValidationFailed {
                        message: "device id must not be empty".into(),
                    });
                }
                let ack = self.check(self.inner.rest.assign_collar(pet.as_str(), device).await)?;
                self.inner
                    .cache
                    .invalidate(Resource::Assignments, &Scope::Global);
                info!(pet = %pet, device, "device assigned");
                Ok(CommandResult {
                    message: ack.message,
                })
            }
        }
    }

    /// Stop every poll task. Open views keep their last state.
    pub fn shutdown(&self) {
        self.inner.cache.shutdown();
    }

    /// Convert an API result, invalidating the session on a 401.
    fn check<T>(&self, result: Result<T, pawtrack_api::Error>) -> Result<T, CoreError> {
        result.map_err(|e| {
            let e = CoreError::from(e);
            if e.is_unauthorized() {
                self.inner.session.invalidate("401 from backend");
            }
            e
        })
    }
}

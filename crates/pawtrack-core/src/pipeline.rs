// ── Location pipeline ──
//
// Two explicit stages per observed pet: resolve the active device, then
// open or close the gate on that device's current-location query. The
// location query is only ever registered with a resolved device id, so
// a pet without a collar never issues a location request.

use std::time::Duration;

use pawtrack_api::RestClient;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, EntryConfig, PolledCache, QueryHandle, Resource};
use crate::error::CoreError;
use crate::model::{DeviceId, LocationSample, PetId};
use crate::resolver::DeviceResolver;

/// State of the dependent location query.
#[derive(Debug, Clone)]
pub enum LocationGate {
    /// Device resolution has not completed yet.
    Pending,
    /// No active device: the location query does not run.
    Closed,
    /// Location polling enabled for the resolved device.
    Open(QueryHandle<Option<LocationSample>>),
}

impl LocationGate {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn query(&self) -> Option<&QueryHandle<Option<LocationSample>>> {
        match self {
            Self::Open(handle) => Some(handle),
            Self::Pending | Self::Closed => None,
        }
    }
}

/// Register (or re-enable) the current-location query for `device`.
pub(crate) fn register_location(
    cache: &PolledCache,
    rest: &RestClient,
    device: &DeviceId,
    config: EntryConfig,
) -> Result<QueryHandle<Option<LocationSample>>, CoreError> {
    let rest = rest.clone();
    let id = device.clone();
    cache.register(
        CacheKey::device(Resource::CurrentLocation, device),
        config.enabled(true),
        move || {
            let rest = rest.clone();
            let id = id.clone();
            async move {
                let record = rest.current_location(id.as_str()).await?;
                Ok(record.map(|r| LocationSample::from_record(r, Some(&id))))
            }
        },
    )
}

pub(crate) struct LocationPipeline {
    pub pet: PetId,
    pub resolver: DeviceResolver,
    pub cache: PolledCache,
    pub rest: RestClient,
    pub location_policy: EntryConfig,
    /// Re-resolve at least this often even without registry changes.
    pub stale_window: Duration,
    pub device_tx: watch::Sender<Option<DeviceId>>,
    pub gate_tx: watch::Sender<LocationGate>,
    pub cancel: CancellationToken,
}

impl LocationPipeline {
    pub(crate) async fn run(self) {
        let mut registry = self.resolver.subscribe();
        let recheck = if self.stale_window.is_zero() {
            Duration::from_secs(60)
        } else {
            self.stale_window
        };

        loop {
            // Stage 1: resolve.
            let resolved = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                resolved = self.resolver.resolve(&self.pet) => resolved,
            };
            // Registry updates caused by this resolve are already reflected.
            registry.mark_unchanged();
            let device = resolved.unwrap_or_else(|e| {
                warn!(pet = %self.pet, error = %e, "device resolution failed");
                None
            });

            // Stage 2: gate.
            self.apply(device);
            if self.cancel.is_cancelled() {
                self.close_gate();
                break;
            }

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                changed = registry.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                () = tokio::time::sleep(recheck) => {}
            }
        }

        debug!(pet = %self.pet, "location pipeline stopped");
    }

    fn apply(&self, device: Option<DeviceId>) {
        let unchanged =
            *self.device_tx.borrow() == device && !self.gate_tx.borrow().is_pending();
        if unchanged {
            return;
        }

        self.close_gate();

        let gate = match &device {
            Some(id) => {
                match register_location(&self.cache, &self.rest, id, self.location_policy) {
                    Ok(handle) => {
                        info!(pet = %self.pet, device = %id, "device resolved, location query enabled");
                        LocationGate::Open(handle)
                    }
                    Err(e) => {
                        warn!(pet = %self.pet, device = %id, error = %e, "cannot register location query");
                        LocationGate::Closed
                    }
                }
            }
            None => {
                info!(pet = %self.pet, "no active device, location query gated");
                LocationGate::Closed
            }
        };

        self.device_tx.send_replace(device);
        self.gate_tx.send_replace(gate);
    }

    /// Disable the currently open location query, if any.
    fn close_gate(&self) {
        if let Some(handle) = self.gate_tx.borrow().query() {
            handle.set_enabled(false);
        }
    }
}

// ── Device resolution ──
//
// Maps a pet to its active collar through the assignment registry. The
// registry is itself a cached query (long staleness window), and "no
// active device" is a normal answer that keeps location polling gated.

use pawtrack_api::RestClient;
use tokio::sync::watch;
use tracing::warn;

use crate::cache::{CacheKey, EntryConfig, PolledCache, QueryHandle, QueryState, Resource};
use crate::error::CoreError;
use crate::model::{DeviceAssignment, DeviceId, PetId};

/// Pick the active device for `pet` from a registry snapshot.
///
/// More than one active row is an upstream integrity problem: the first
/// match wins and the rest are logged.
pub fn resolve_from(assignments: &[DeviceAssignment], pet: &PetId) -> Option<DeviceId> {
    let mut active = assignments
        .iter()
        .filter(|a| a.is_active && &a.pet_id == pet);

    let first = active.next()?;
    let extra: Vec<&str> = active.map(|a| a.device_id.as_str()).collect();
    if !extra.is_empty() {
        warn!(
            pet = %pet,
            chosen = %first.device_id,
            ignored = ?extra,
            "multiple active device assignments for one pet"
        );
    }
    Some(first.device_id.clone())
}

/// Resolves pets to devices over the cached assignment registry.
#[derive(Clone, Debug)]
pub struct DeviceResolver {
    assignments: QueryHandle<Vec<DeviceAssignment>>,
}

impl DeviceResolver {
    /// Register (or reuse) the process-wide assignment registry query.
    pub fn new(cache: &PolledCache, rest: RestClient, config: EntryConfig) -> Result<Self, CoreError> {
        let assignments = cache.register(CacheKey::global(Resource::Assignments), config, move || {
            let rest = rest.clone();
            async move {
                let rows = rest.list_assignments().await?;
                Ok(rows.into_iter().map(DeviceAssignment::from).collect::<Vec<_>>())
            }
        })?;
        Ok(Self { assignments })
    }

    /// `resolve(pet) → device | none`.
    ///
    /// Serves the cached registry while it is within its staleness window.
    /// Errors only when the registry has never been fetched successfully;
    /// after that, a failed refresh keeps resolving from the last snapshot.
    pub async fn resolve(&self, pet: &PetId) -> Result<Option<DeviceId>, CoreError> {
        let state = self.assignments.get().await;
        match (state.data, state.error) {
            (Some(rows), _) => Ok(resolve_from(&rows, pet)),
            (None, Some(e)) => Err(e),
            (None, None) => Ok(None),
        }
    }

    /// Resolve from whatever is cached, without fetching.
    pub fn resolve_cached(&self, pet: &PetId) -> Option<DeviceId> {
        self.assignments
            .data()
            .and_then(|rows| resolve_from(&rows, pet))
    }

    /// Change notifications for the registry.
    pub fn subscribe(&self) -> watch::Receiver<QueryState<Vec<DeviceAssignment>>> {
        self.assignments.subscribe()
    }

    pub fn assignments(&self) -> &QueryHandle<Vec<DeviceAssignment>> {
        &self.assignments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(device: &str, pet: &str, is_active: bool) -> DeviceAssignment {
        DeviceAssignment {
            device_id: device.into(),
            pet_id: pet.into(),
            is_active,
        }
    }

    #[test]
    fn resolves_active_assignment() {
        let rows = vec![row("D1", "P1", true)];
        assert_eq!(resolve_from(&rows, &"P1".into()), Some(DeviceId::from("D1")));
        assert_eq!(resolve_from(&rows, &"P2".into()), None);
    }

    #[test]
    fn inactive_assignments_are_ignored() {
        let rows = vec![row("D0", "P1", false), row("D9", "P2", true)];
        assert_eq!(resolve_from(&rows, &"P1".into()), None);
    }

    #[test]
    fn reassignment_picks_the_active_row() {
        let rows = vec![row("D0", "P1", false), row("D2", "P1", true)];
        assert_eq!(resolve_from(&rows, &"P1".into()), Some(DeviceId::from("D2")));
    }

    #[test]
    fn duplicate_active_rows_resolve_to_first() {
        let rows = vec![row("D1", "P1", true), row("D2", "P1", true)];
        assert_eq!(resolve_from(&rows, &"P1".into()), Some(DeviceId::from("D1")));
    }

    #[test]
    fn empty_registry_resolves_to_none() {
        assert_eq!(resolve_from(&[], &"P1".into()), None);
    }
}

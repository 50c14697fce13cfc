// ── Cache keys ──

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::model::{DeviceId, PetId};

/// The closed set of polled backend resources.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Resource {
    LatestTelemetry,
    TelemetryStats,
    TelemetryHistory,
    CurrentLocation,
    Assignments,
    Notifications,
    UnreadCount,
}

/// What a cached entry is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Scope {
    /// Process-wide (assignment registry, notifications).
    Global,
    Pet(PetId),
    Device(DeviceId),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Pet(id) => write!(f, "pet:{id}"),
            Self::Device(id) => write!(f, "device:{id}"),
        }
    }
}

/// `(resource, scope, params)`. Two keys are the same entry iff all three match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub resource: Resource,
    pub scope: Scope,
    pub params: BTreeMap<String, String>,
}

impl CacheKey {
    pub fn new(resource: Resource, scope: Scope) -> Self {
        Self {
            resource,
            scope,
            params: BTreeMap::new(),
        }
    }

    pub fn global(resource: Resource) -> Self {
        Self::new(resource, Scope::Global)
    }

    pub fn pet(resource: Resource, pet: &PetId) -> Self {
        Self::new(resource, Scope::Pet(pet.clone()))
    }

    pub fn device(resource: Resource, device: &DeviceId) -> Self {
        Self::new(resource, Scope::Device(device.clone()))
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    /// Matches every parameterization of `resource` under `scope`.
    pub fn matches(&self, resource: Resource, scope: &Scope) -> bool {
        self.resource == resource && &self.scope == scope
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource, self.scope)?;
        let mut sep = '?';
        for (k, v) in &self.params {
            write!(f, "{sep}{k}={v}")?;
            sep = '&';
        }
        Ok(())
    }
}

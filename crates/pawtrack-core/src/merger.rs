// ── State merger ──
//
// Composes polled and pushed values into one view per pet. The default
// mode lets any live value shadow the polled one, even when the live
// value is older: an old push keeps hiding a fresher poll until the next
// push arrives. `Freshest` compares timestamps instead and is opt-in.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use pawtrack_api::ConnectivityState;
use serde::{Deserialize, Serialize};

use crate::model::{LocationSample, PetId, TelemetrySample};
use crate::router::LiveSlots;

/// Precedence rule between live and polled values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum MergeMode {
    /// Live slot wins whenever it is set.
    #[default]
    PushPrecedence,
    /// Newer timestamp wins; ties go to the live value.
    Freshest,
}

/// Where a merged value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Push,
    Poll,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sourced<T> {
    pub value: Arc<T>,
    pub source: Source,
}

/// `{telemetry, location, connectivity}` for one pet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentView {
    pub pet: PetId,
    pub telemetry: Option<Sourced<TelemetrySample>>,
    pub location: Option<Sourced<LocationSample>>,
    pub connectivity: ConnectivityState,
}

/// Samples that carry a device timestamp.
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

impl Timestamped for TelemetrySample {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for LocationSample {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StateMerger {
    mode: MergeMode,
}

impl StateMerger {
    pub fn new(mode: MergeMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> MergeMode {
        self.mode
    }

    /// Choose between a live and a polled value.
    pub fn pick<T: Timestamped>(
        &self,
        live: Option<&Arc<T>>,
        polled: Option<&Arc<T>>,
    ) -> Option<Sourced<T>> {
        let push = |v: &Arc<T>| Sourced {
            value: Arc::clone(v),
            source: Source::Push,
        };
        let poll = |v: &Arc<T>| Sourced {
            value: Arc::clone(v),
            source: Source::Poll,
        };

        match (live, polled, self.mode) {
            (Some(l), Some(p), MergeMode::Freshest) if p.timestamp() > l.timestamp() => Some(poll(p)),
            (Some(l), _, _) => Some(push(l)),
            (None, Some(p), _) => Some(poll(p)),
            (None, None, _) => None,
        }
    }

    /// `currentView(pet)`.
    pub fn merge(
        &self,
        pet: &PetId,
        live: &LiveSlots,
        polled_telemetry: Option<&Arc<TelemetrySample>>,
        polled_location: Option<&Arc<LocationSample>>,
        connectivity: ConnectivityState,
    ) -> CurrentView {
        CurrentView {
            pet: pet.clone(),
            telemetry: self.pick(live.telemetry.as_ref(), polled_telemetry),
            location: self.pick(live.location.as_ref(), polled_location),
            connectivity,
        }
    }
}

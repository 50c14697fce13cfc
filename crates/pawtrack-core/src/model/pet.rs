// ── Pets and device assignments ──

use serde::{Deserialize, Serialize};

use super::ids::{DeviceId, PetId};

/// A tracked pet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    pub id: PetId,
    pub name: String,
    pub species: Option<String>,
    pub breed: Option<String>,
    pub age: Option<u32>,
    pub weight: Option<f64>,
    /// Collar recorded on the pet profile. The assignment registry is
    /// authoritative for live tracking; this is display data only.
    pub device_id: Option<DeviceId>,
}

/// A collar-to-pet binding from the assignment registry.
///
/// At most one active assignment per pet is expected; the registry
/// deactivates the old row on reassignment instead of deleting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAssignment {
    pub device_id: DeviceId,
    pub pet_id: PetId,
    pub is_active: bool,
}

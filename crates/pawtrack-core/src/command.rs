// ── Command API ──
//
// Device-control operations. Each command is sent over REST and then
// invalidates the cached resource it makes stale.

use serde::Serialize;

use crate::model::{DeviceId, PetId};

/// Collar command name understood by the backend for "make the collar beep
/// and report a fresh fix".
pub const FIND_PET_COMMAND: &str = "FIND_PET";

/// All write operations against the tracking backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Ask the pet's collar for an immediate location report.
    FindPet { pet: PetId },
    /// Bind a collar to a pet, deactivating any previous binding.
    AssignDevice { pet: PetId, device: DeviceId },
}

/// Outcome of a successfully executed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    /// Server acknowledgement text, if any.
    pub message: Option<String>,
}

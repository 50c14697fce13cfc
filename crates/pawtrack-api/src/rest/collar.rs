// Collar endpoints
//
// Assignment registry (read) plus the two device-control commands.

use tracing::debug;

use crate::error::Error;
use crate::models::{
    AssignCollarRequest, AssignmentList, CollarAssignment, CollarCommandRequest, CommandAck,
};
use crate::rest::client::RestClient;

impl RestClient {
    /// Every collar assignment visible to the owner, active or not.
    ///
    /// `GET /collar/assignments` -> `{ "assignments": [...] }`
    pub async fn list_assignments(&self) -> Result<Vec<CollarAssignment>, Error> {
        let url = self.url("collar/assignments")?;
        let list: AssignmentList = self.get(url).await?;
        Ok(list.assignments)
    }

    /// Bind a collar to a pet. The backend deactivates any previous binding.
    ///
    /// `POST /collar/assign` with `{"petId": "...", "collarId": "..."}`
    pub async fn assign_collar(&self, pet_id: &str, collar_id: &str) -> Result<CommandAck, Error> {
        let url = self.url("collar/assign")?;
        debug!(pet_id, collar_id, "assigning collar");
        let body = AssignCollarRequest {
            pet_id: pet_id.to_owned(),
            collar_id: collar_id.trim().to_owned(),
        };
        self.post(url, &body).await
    }

    /// Queue a command for the pet's collar (the collar polls for it).
    ///
    /// `POST /collar/commands` with `{"petId": "...", "command": "FIND_PET"}`
    pub async fn send_collar_command(&self, pet_id: &str, command: &str) -> Result<CommandAck, Error> {
        let url = self.url("collar/commands")?;
        debug!(pet_id, command, "sending collar command");
        let body = CollarCommandRequest {
            pet_id: pet_id.to_owned(),
            command: command.to_owned(),
        };
        self.post(url, &body).await
    }
}

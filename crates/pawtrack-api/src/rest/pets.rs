// Pet endpoints
//
// Read-only; pet management belongs to the web app.

use crate::error::Error;
use crate::models::PetRecord;
use crate::rest::client::RestClient;

impl RestClient {
    /// List the owner's pets.
    ///
    /// `GET /pets`
    pub async fn list_pets(&self) -> Result<Vec<PetRecord>, Error> {
        let url = self.url("pets")?;
        self.get(url).await
    }

    /// Fetch one pet.
    ///
    /// `GET /pets/{id}`
    pub async fn get_pet(&self, pet_id: &str) -> Result<PetRecord, Error> {
        let url = self.url(&format!("pets/{pet_id}"))?;
        self.get(url).await
    }
}

// Location endpoints

use crate::error::Error;
use crate::models::LocationRecord;
use crate::rest::client::RestClient;

impl RestClient {
    /// Current GPS fix for a collar. `None` when the collar has no fix yet.
    ///
    /// `GET /location/collar/{id}/current`
    pub async fn current_location(&self, collar_id: &str) -> Result<Option<LocationRecord>, Error> {
        let url = self.url(&format!("location/collar/{collar_id}/current"))?;
        self.get(url).await
    }
}

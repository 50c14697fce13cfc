// Sensor data endpoints
//
// Latest reading, aggregate stats, and bounded history for one pet.

use crate::error::Error;
use crate::models::{SensorReading, SensorStats};
use crate::rest::client::RestClient;

impl RestClient {
    /// Most recent reading for a pet. `None` when the collar has not
    /// reported yet (the backend answers `null`).
    ///
    /// `GET /sensor-data/pet/{id}/latest`
    pub async fn latest_sensor_data(&self, pet_id: &str) -> Result<Option<SensorReading>, Error> {
        let url = self.url(&format!("sensor-data/pet/{pet_id}/latest"))?;
        self.get(url).await
    }

    /// Aggregates over the trailing `hours` window (server default when `None`).
    ///
    /// `GET /sensor-data/pet/{id}/stats?hours=`
    pub async fn sensor_stats(&self, pet_id: &str, hours: Option<u32>) -> Result<SensorStats, Error> {
        let mut url = self.url(&format!("sensor-data/pet/{pet_id}/stats"))?;
        if let Some(h) = hours {
            url.query_pairs_mut().append_pair("hours", &h.to_string());
        }
        self.get(url).await
    }

    /// Recent readings, newest first, up to `limit` (server default when `None`).
    ///
    /// `GET /sensor-data/pet/{id}?limit=`
    pub async fn sensor_history(
        &self,
        pet_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<SensorReading>, Error> {
        let mut url = self.url(&format!("sensor-data/pet/{pet_id}"))?;
        if let Some(n) = limit {
            url.query_pairs_mut().append_pair("limit", &n.to_string());
        }
        self.get(url).await
    }
}

// Notification endpoints

use crate::error::Error;
use crate::models::{NotificationRecord, UnreadCount};
use crate::rest::client::RestClient;

impl RestClient {
    /// The owner's notifications, newest first.
    ///
    /// `GET /pets/my-notifications`
    pub async fn list_notifications(&self) -> Result<Vec<NotificationRecord>, Error> {
        let url = self.url("pets/my-notifications")?;
        self.get(url).await
    }

    /// `GET /pets/my-notifications/unread-count`
    pub async fn unread_count(&self) -> Result<UnreadCount, Error> {
        let url = self.url("pets/my-notifications/unread-count")?;
        self.get(url).await
    }
}

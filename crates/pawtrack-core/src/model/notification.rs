// ── Owner notifications ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An alert addressed to the owner (low battery, zone exit, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
    pub pet_name: Option<String>,
    pub priority: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    /// Backend fields without a dedicated slot.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    pub count: u64,
}

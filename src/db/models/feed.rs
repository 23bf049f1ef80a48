use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::template::Bilingual;

/// Read-only projection merging per-user notifications and admin broadcasts
/// into the one shape the feed exposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedNotification {
    pub id: String,
    pub title: Bilingual,
    pub message: Bilingual,
    pub module: String,
    pub notification_type: String,
    pub metadata: serde_json::Value,
    pub read: bool,
    pub is_admin_notification: bool,
    pub created_at: NaiveDateTime,
}

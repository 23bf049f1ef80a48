use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::db::models::{Bilingual, CombinedNotification};
use crate::error::AppResult;

/// The payload every delivery channel receives: the persisted id plus the
/// resolved bilingual content. Built once per delivery, after persistence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationPayload {
    pub id: String,
    /// Target user; absent for admin broadcasts, which address everyone.
    pub user_id: Option<String>,
    pub notification_type: String,
    pub module: String,
    pub title: Bilingual,
    pub message: Bilingual,
    pub metadata: serde_json::Value,
    pub is_admin_notification: bool,
    pub created_at: NaiveDateTime,
}

impl NotificationPayload {
    /// Rebuild the wire payload from a stored feed view, e.g. when replaying
    /// unread notifications to a freshly connected client.
    pub fn from_view(view: CombinedNotification, user_id: Option<String>) -> Self {
        Self {
            id: view.id,
            user_id,
            notification_type: view.notification_type,
            module: view.module,
            title: view.title,
            message: view.message,
            metadata: view.metadata,
            is_admin_notification: view.is_admin_notification,
            created_at: view.created_at,
        }
    }
}

/// A delivery mechanism. Channels are independent: one failing must never
/// prevent another from running, and never rolls back the persisted row.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, payload: &NotificationPayload) -> AppResult<()>;
}

/// Outcome of one channel's attempt for one payload. Reported to the
/// delivery outcome sink; never returned to the caller of `notify`.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub channel: &'static str,
    pub notification_id: String,
    pub user_id: Option<String>,
    pub success: bool,
    pub error: Option<String>,
}

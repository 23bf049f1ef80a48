use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserNotification {
    pub id: String,
    pub user_id: String,
    pub template_id: String,
    /// JSON object, stored as TEXT.
    pub metadata: String,
    pub read: bool,
    /// Soft-delete tombstone; set rows are excluded from every listing.
    pub deleted_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserNotification {
    pub user_id: String,
    pub template_id: String,
    pub metadata: serde_json::Value,
}

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A single admin-authored notification addressing the entire user
/// population. Never fanned out into per-user rows; per-user read state
/// lives in `broadcast_reads`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AdminBroadcast {
    pub id: String,
    pub template_id: String,
    pub metadata: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAdminBroadcast {
    pub template_id: String,
    pub metadata: serde_json::Value,
}

/// Broadcast row joined with the requesting user's read state.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BroadcastForUser {
    pub id: String,
    pub template_id: String,
    pub metadata: String,
    pub read: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::db::repository::{AdminBroadcastRepository, UserNotificationRepository};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AdminUser;
use crate::AppState;

/// Admin-side triggers. Business modules (ads, payments, ...) call the
/// dispatcher in-process; these endpoints are the operator-facing surface
/// for announcements and manual sends.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/broadcasts", post(create_broadcast))
        .route("/broadcasts/:id", delete(delete_broadcast))
        .route("/notifications", post(create_notification))
        .route("/notifications/:id", delete(delete_notification))
        .route("/users/:user_id/notifications", delete(purge_user_notifications))
        .route("/realtime", get(realtime_stats))
        .route("/realtime/:user_id", get(realtime_user_stats))
}

#[derive(Debug, Deserialize)]
pub struct CreateBroadcastRequest {
    pub notification_type: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct CreateBroadcastResponse {
    pub id: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub struct CreateNotificationRequest {
    pub user_id: String,
    pub notification_type: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub accepted: bool,
}

/// One broadcast row for the entire user population; online users get the
/// push immediately, everyone else catches up through the feed.
async fn create_broadcast(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(request): Json<CreateBroadcastRequest>,
) -> AppResult<Json<CreateBroadcastResponse>> {
    let broadcast = state
        .dispatcher
        .send_admin_broadcast(&admin.sub, &request.notification_type, request.metadata)
        .await?;

    Ok(Json(CreateBroadcastResponse {
        id: broadcast.id,
        created_at: broadcast.created_at,
    }))
}

/// Direct notify trigger. Delivery is fire-and-forget: the row is durable
/// once this returns, channel outcomes surface only in the logs.
async fn create_notification(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Json(request): Json<CreateNotificationRequest>,
) -> AppResult<Json<AcceptedResponse>> {
    if request.user_id.trim().is_empty() {
        return Err(AppError::BadRequest("user_id is required".to_string()));
    }

    state
        .dispatcher
        .notify(&request.user_id, &request.notification_type, request.metadata)
        .await?;

    Ok(Json(AcceptedResponse { accepted: true }))
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: u64,
}

/// Terminal removal of a broadcast; per-user read rows go with it.
async fn delete_broadcast(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<String>,
) -> AppResult<Json<DeletedResponse>> {
    let deleted = AdminBroadcastRepository::hard_delete(&state.db, &id).await?;
    if !deleted {
        return Err(AppError::NotFound("Broadcast not found".to_string()));
    }
    Ok(Json(DeletedResponse { deleted: 1 }))
}

/// Terminal removal of a single notification (moderation path, not the
/// user-facing soft delete).
async fn delete_notification(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<String>,
) -> AppResult<Json<DeletedResponse>> {
    let deleted = UserNotificationRepository::hard_delete(&state.db, &id).await?;
    if !deleted {
        return Err(AppError::NotFound("Notification not found".to_string()));
    }
    Ok(Json(DeletedResponse { deleted: 1 }))
}

/// Cleanup hook for account deletion: removes every notification row the
/// user owns, tombstoned or not.
async fn purge_user_notifications(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Path(user_id): Path<String>,
) -> AppResult<Json<DeletedResponse>> {
    let deleted = UserNotificationRepository::hard_delete_for_user(&state.db, &user_id).await?;
    Ok(Json(DeletedResponse { deleted }))
}

#[derive(Debug, Serialize)]
pub struct RealtimeStatsResponse {
    pub online_users: usize,
}

#[derive(Debug, Serialize)]
pub struct RealtimeUserStatsResponse {
    pub online: bool,
    pub connections: usize,
}

/// Connection registry diagnostics; read-only.
async fn realtime_stats(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> AppResult<Json<RealtimeStatsResponse>> {
    Ok(Json(RealtimeStatsResponse {
        online_users: state.realtime.online_count().await,
    }))
}

async fn realtime_user_stats(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Path(user_id): Path<String>,
) -> AppResult<Json<RealtimeUserStatsResponse>> {
    Ok(Json(RealtimeUserStatsResponse {
        online: state.realtime.is_online(&user_id).await,
        connections: state.realtime.connection_count(&user_id).await,
    }))
}

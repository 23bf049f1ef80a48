use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::models::{BroadcastForUser, CombinedNotification, UserNotification};
use crate::db::repository::{
    AdminBroadcastRepository, FeedRepository, UserNotificationRepository,
};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_feed))
        .route("/personal", get(list_personal))
        .route("/unread", get(list_unread))
        .route("/unread-count", get(unread_count))
        .route("/read", post(mark_many_read))
        .route("/read-all", post(mark_all_read))
        .route("/delete", post(soft_delete_many))
        .route("/:id/read", post(mark_read))
        .route("/:id/restore", post(restore))
        .route("/:id", delete(soft_delete))
        .route("/broadcasts", get(list_broadcasts))
        .route("/broadcasts/:id/read", post(mark_broadcast_read))
        .route("/broadcasts/read-all", post(mark_all_broadcasts_read))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PageQuery {
    fn resolve(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        (page, per_page, (page - 1) * per_page)
    }
}

#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub items: Vec<CombinedNotification>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct PersonalResponse {
    pub items: Vec<UserNotification>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Debug, Serialize)]
pub struct UnreadResponse {
    pub items: Vec<UserNotification>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

#[derive(Debug, Deserialize)]
pub struct IdsRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdatedResponse {
    pub updated: u64,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: u64,
}

#[derive(Debug, Serialize)]
pub struct BroadcastsResponse {
    pub items: Vec<BroadcastForUser>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

// ============================================================================
// Handlers
// ============================================================================

/// Combined feed: per-user notifications and admin broadcasts merged into
/// one page, admin entries first, newest first within each kind.
async fn list_feed(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<FeedResponse>> {
    let (page, per_page, offset) = query.resolve();

    let items = FeedRepository::list_combined(&state.db, &user.sub, per_page, offset).await?;
    let total = UserNotificationRepository::count_for_user(&state.db, &user.sub).await?
        + AdminBroadcastRepository::count(&state.db).await?;
    let total_pages = (total as f64 / per_page as f64).ceil() as i64;

    Ok(Json(FeedResponse {
        items,
        total,
        page,
        per_page,
        total_pages,
    }))
}

/// The user's own notifications only, without broadcasts.
async fn list_personal(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<PersonalResponse>> {
    let (page, per_page, offset) = query.resolve();

    let items =
        UserNotificationRepository::find_by_user(&state.db, &user.sub, per_page, offset).await?;
    let total = UserNotificationRepository::count_for_user(&state.db, &user.sub).await?;

    Ok(Json(PersonalResponse {
        items,
        total,
        page,
        per_page,
    }))
}

async fn list_unread(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<UnreadResponse>> {
    let items = UserNotificationRepository::find_unread(&state.db, &user.sub).await?;
    Ok(Json(UnreadResponse { items }))
}

async fn unread_count(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<UnreadCountResponse>> {
    let unread = FeedRepository::unread_total(&state.db, &user.sub).await?;
    Ok(Json(UnreadCountResponse { unread }))
}

/// Mark one notification read. A non-owned or nonexistent id is the same
/// "not found" to the caller.
async fn mark_read(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<UpdatedResponse>> {
    let changed =
        UserNotificationRepository::mark_read(&state.db, &id, Some(&user.sub)).await?;
    if !changed {
        return Err(AppError::NotFound("Notification not found".to_string()));
    }
    Ok(Json(UpdatedResponse { updated: 1 }))
}

async fn mark_many_read(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<IdsRequest>,
) -> AppResult<Json<UpdatedResponse>> {
    if request.ids.is_empty() {
        return Err(AppError::Validation("No notification ids provided".to_string()));
    }
    let updated =
        UserNotificationRepository::mark_many_read(&state.db, &request.ids, Some(&user.sub))
            .await?;
    Ok(Json(UpdatedResponse { updated }))
}

async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<UpdatedResponse>> {
    let updated = UserNotificationRepository::mark_all_read(&state.db, &user.sub).await?;
    Ok(Json(UpdatedResponse { updated }))
}

async fn soft_delete(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<DeletedResponse>> {
    let deleted =
        UserNotificationRepository::soft_delete(&state.db, &id, Some(&user.sub)).await?;
    if !deleted {
        return Err(AppError::NotFound("Notification not found".to_string()));
    }
    Ok(Json(DeletedResponse { deleted: 1 }))
}

async fn soft_delete_many(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<IdsRequest>,
) -> AppResult<Json<DeletedResponse>> {
    if request.ids.is_empty() {
        return Err(AppError::Validation("No notification ids provided".to_string()));
    }
    let deleted =
        UserNotificationRepository::soft_delete_many(&state.db, &request.ids, Some(&user.sub))
            .await?;
    Ok(Json(DeletedResponse { deleted }))
}

async fn restore(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<UpdatedResponse>> {
    let restored = UserNotificationRepository::restore(&state.db, &id, Some(&user.sub)).await?;
    if !restored {
        return Err(AppError::NotFound("Notification not found".to_string()));
    }
    Ok(Json(UpdatedResponse { updated: 1 }))
}

async fn list_broadcasts(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<BroadcastsResponse>> {
    let (page, per_page, offset) = query.resolve();

    let items =
        AdminBroadcastRepository::list_for_user(&state.db, &user.sub, per_page, offset).await?;
    let total = AdminBroadcastRepository::count(&state.db).await?;

    Ok(Json(BroadcastsResponse {
        items,
        total,
        page,
        per_page,
    }))
}

/// Record the user's read state for a broadcast. Reading an already-read
/// broadcast is a no-op, not an error.
async fn mark_broadcast_read(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<UpdatedResponse>> {
    if AdminBroadcastRepository::find_by_id(&state.db, &id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound("Broadcast not found".to_string()));
    }

    let inserted = AdminBroadcastRepository::mark_read(&state.db, &id, &user.sub).await?;
    Ok(Json(UpdatedResponse {
        updated: u64::from(inserted),
    }))
}

async fn mark_all_broadcasts_read(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<UpdatedResponse>> {
    let updated = AdminBroadcastRepository::mark_all_read(&state.db, &user.sub).await?;
    Ok(Json(UpdatedResponse { updated }))
}

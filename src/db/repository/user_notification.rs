use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{CreateUserNotification, UserNotification};
use crate::error::{AppError, AppResult};

// ============================================================================
// User Notification Repository
// ============================================================================
//
// Every read excludes soft-deleted rows. Mutations optionally take an owner
// id; when present the predicate embeds ownership, so a non-owned id simply
// matches zero rows. The caller cannot tell "not yours" from "does not
// exist", which is the intended shape.

pub struct UserNotificationRepository;

impl UserNotificationRepository {
    pub async fn create(
        pool: &SqlitePool,
        notification: CreateUserNotification,
    ) -> AppResult<UserNotification> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();
        let metadata = serde_json::to_string(&notification.metadata)
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

        sqlx::query_as::<_, UserNotification>(
            r#"
            INSERT INTO user_notifications (
                id, user_id, template_id, metadata, read, deleted_at, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, FALSE, NULL, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&notification.user_id)
        .bind(&notification.template_id)
        .bind(&metadata)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_user(
        pool: &SqlitePool,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<UserNotification>> {
        sqlx::query_as::<_, UserNotification>(
            r#"
            SELECT * FROM user_notifications
            WHERE user_id = ? AND deleted_at IS NULL
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_unread(
        pool: &SqlitePool,
        user_id: &str,
    ) -> AppResult<Vec<UserNotification>> {
        sqlx::query_as::<_, UserNotification>(
            r#"
            SELECT * FROM user_notifications
            WHERE user_id = ? AND read = FALSE AND deleted_at IS NULL
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn unread_count(pool: &SqlitePool, user_id: &str) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM user_notifications \
             WHERE user_id = ? AND read = FALSE AND deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(count)
    }

    /// Visible (non-tombstoned) rows for the user; drives pagination totals.
    pub async fn count_for_user(pool: &SqlitePool, user_id: &str) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM user_notifications WHERE user_id = ? AND deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(count)
    }

    /// Mark one notification as read. Returns whether a row was touched.
    pub async fn mark_read(
        pool: &SqlitePool,
        id: &str,
        owner: Option<&str>,
    ) -> AppResult<bool> {
        let now = Utc::now().naive_utc();

        let result = match owner {
            Some(user_id) => {
                sqlx::query(
                    "UPDATE user_notifications SET read = TRUE, updated_at = ? \
                     WHERE id = ? AND user_id = ? AND deleted_at IS NULL",
                )
                .bind(now)
                .bind(id)
                .bind(user_id)
                .execute(pool)
                .await
            }
            None => {
                sqlx::query(
                    "UPDATE user_notifications SET read = TRUE, updated_at = ? \
                     WHERE id = ? AND deleted_at IS NULL",
                )
                .bind(now)
                .bind(id)
                .execute(pool)
                .await
            }
        }
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark a batch of notifications as read. Returns how many rows changed
    /// from unread to read.
    pub async fn mark_many_read(
        pool: &SqlitePool,
        ids: &[String],
        owner: Option<&str>,
    ) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let now = Utc::now().naive_utc();
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = match owner {
            Some(_) => format!(
                "UPDATE user_notifications SET read = TRUE, updated_at = ? \
                 WHERE id IN ({placeholders}) AND user_id = ? AND read = FALSE AND deleted_at IS NULL"
            ),
            None => format!(
                "UPDATE user_notifications SET read = TRUE, updated_at = ? \
                 WHERE id IN ({placeholders}) AND read = FALSE AND deleted_at IS NULL"
            ),
        };

        let mut query = sqlx::query(&sql).bind(now);
        for id in ids {
            query = query.bind(id);
        }
        if let Some(user_id) = owner {
            query = query.bind(user_id);
        }

        let result = query.execute(pool).await.map_err(AppError::Database)?;
        Ok(result.rows_affected())
    }

    pub async fn mark_all_read(pool: &SqlitePool, user_id: &str) -> AppResult<u64> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            "UPDATE user_notifications SET read = TRUE, updated_at = ? \
             WHERE user_id = ? AND read = FALSE AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }

    /// Tombstone a notification. Reversible via `restore`.
    pub async fn soft_delete(
        pool: &SqlitePool,
        id: &str,
        owner: Option<&str>,
    ) -> AppResult<bool> {
        let now = Utc::now().naive_utc();

        let result = match owner {
            Some(user_id) => {
                sqlx::query(
                    "UPDATE user_notifications SET deleted_at = ?, updated_at = ? \
                     WHERE id = ? AND user_id = ? AND deleted_at IS NULL",
                )
                .bind(now)
                .bind(now)
                .bind(id)
                .bind(user_id)
                .execute(pool)
                .await
            }
            None => {
                sqlx::query(
                    "UPDATE user_notifications SET deleted_at = ?, updated_at = ? \
                     WHERE id = ? AND deleted_at IS NULL",
                )
                .bind(now)
                .bind(now)
                .bind(id)
                .execute(pool)
                .await
            }
        }
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn soft_delete_many(
        pool: &SqlitePool,
        ids: &[String],
        owner: Option<&str>,
    ) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let now = Utc::now().naive_utc();
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = match owner {
            Some(_) => format!(
                "UPDATE user_notifications SET deleted_at = ?, updated_at = ? \
                 WHERE id IN ({placeholders}) AND user_id = ? AND deleted_at IS NULL"
            ),
            None => format!(
                "UPDATE user_notifications SET deleted_at = ?, updated_at = ? \
                 WHERE id IN ({placeholders}) AND deleted_at IS NULL"
            ),
        };

        let mut query = sqlx::query(&sql).bind(now).bind(now);
        for id in ids {
            query = query.bind(id);
        }
        if let Some(user_id) = owner {
            query = query.bind(user_id);
        }

        let result = query.execute(pool).await.map_err(AppError::Database)?;
        Ok(result.rows_affected())
    }

    /// Reverse a soft delete.
    pub async fn restore(pool: &SqlitePool, id: &str, owner: Option<&str>) -> AppResult<bool> {
        let now = Utc::now().naive_utc();

        let result = match owner {
            Some(user_id) => {
                sqlx::query(
                    "UPDATE user_notifications SET deleted_at = NULL, updated_at = ? \
                     WHERE id = ? AND user_id = ? AND deleted_at IS NOT NULL",
                )
                .bind(now)
                .bind(id)
                .bind(user_id)
                .execute(pool)
                .await
            }
            None => {
                sqlx::query(
                    "UPDATE user_notifications SET deleted_at = NULL, updated_at = ? \
                     WHERE id = ? AND deleted_at IS NOT NULL",
                )
                .bind(now)
                .bind(id)
                .execute(pool)
                .await
            }
        }
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Physically remove a row. Terminal; used by cascaded cleanup, not by
    /// the user-facing delete flow.
    pub async fn hard_delete(pool: &SqlitePool, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM user_notifications WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Cascade for user deletion: removes every notification the user owns,
    /// tombstoned or not.
    pub async fn hard_delete_for_user(pool: &SqlitePool, user_id: &str) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM user_notifications WHERE user_id = ?")
            .bind(user_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }
}

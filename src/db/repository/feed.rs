use sqlx::{Row, SqlitePool};

use crate::db::models::{Bilingual, CombinedNotification};
use crate::db::repository::{AdminBroadcastRepository, UserNotificationRepository};
use crate::error::{AppError, AppResult};

// ============================================================================
// Feed Repository
// ============================================================================
//
// The combined feed merges two sources with unrelated identity and lifecycle
// (per-user rows vs. shared broadcasts plus read rows), so it cannot be one
// query. Each source contributes a candidate window of offset + limit rows,
// the merge sorts admin-before-user then newest-first, and pagination is
// applied to the merged list. Fine while broadcast volume stays small.

pub struct FeedRepository;

impl FeedRepository {
    pub async fn list_combined(
        pool: &SqlitePool,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<CombinedNotification>> {
        let window = offset.saturating_add(limit);

        let mut entries = Self::user_views(pool, user_id, window).await?;
        entries.extend(Self::broadcast_views(pool, user_id, window).await?);

        entries.sort_by(|a, b| {
            b.is_admin_notification
                .cmp(&a.is_admin_notification)
                .then(b.created_at.cmp(&a.created_at))
                .then(b.id.cmp(&a.id))
        });

        Ok(entries
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    /// Combined unread count: unread per-user rows plus broadcasts with no
    /// read row for this user.
    pub async fn unread_total(pool: &SqlitePool, user_id: &str) -> AppResult<i64> {
        let user_unread = UserNotificationRepository::unread_count(pool, user_id).await?;
        let broadcast_unread = AdminBroadcastRepository::unread_count(pool, user_id).await?;
        Ok(user_unread + broadcast_unread)
    }

    /// Unread per-user notifications as feed views, newest first. Used for
    /// reconnect catch-up on the realtime stream.
    pub async fn list_unread_views(
        pool: &SqlitePool,
        user_id: &str,
        limit: i64,
    ) -> AppResult<Vec<CombinedNotification>> {
        let rows = sqlx::query(
            r#"
            SELECT n.id, n.metadata, n.read, n.created_at,
                   t.module, t.notification_type,
                   t.title_primary, t.title_secondary,
                   t.message_primary, t.message_secondary
            FROM user_notifications n
            JOIN notification_templates t ON t.id = n.template_id
            WHERE n.user_id = ? AND n.read = FALSE AND n.deleted_at IS NULL
            ORDER BY n.created_at DESC, n.id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows.iter().map(|row| Self::view_from_row(row, false)).collect())
    }

    async fn user_views(
        pool: &SqlitePool,
        user_id: &str,
        window: i64,
    ) -> AppResult<Vec<CombinedNotification>> {
        let rows = sqlx::query(
            r#"
            SELECT n.id, n.metadata, n.read, n.created_at,
                   t.module, t.notification_type,
                   t.title_primary, t.title_secondary,
                   t.message_primary, t.message_secondary
            FROM user_notifications n
            JOIN notification_templates t ON t.id = n.template_id
            WHERE n.user_id = ? AND n.deleted_at IS NULL
            ORDER BY n.created_at DESC, n.id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(window)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows.iter().map(|row| Self::view_from_row(row, false)).collect())
    }

    async fn broadcast_views(
        pool: &SqlitePool,
        user_id: &str,
        window: i64,
    ) -> AppResult<Vec<CombinedNotification>> {
        let rows = sqlx::query(
            r#"
            SELECT b.id, b.metadata, (r.user_id IS NOT NULL) AS read, b.created_at,
                   t.module, t.notification_type,
                   t.title_primary, t.title_secondary,
                   t.message_primary, t.message_secondary
            FROM admin_broadcasts b
            JOIN notification_templates t ON t.id = b.template_id
            LEFT JOIN broadcast_reads r
                   ON r.broadcast_id = b.id AND r.user_id = ?
            ORDER BY b.created_at DESC, b.id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(window)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows.iter().map(|row| Self::view_from_row(row, true)).collect())
    }

    fn view_from_row(row: &sqlx::sqlite::SqliteRow, is_admin: bool) -> CombinedNotification {
        let metadata: String = row.get("metadata");
        CombinedNotification {
            id: row.get("id"),
            title: Bilingual {
                primary: row.get("title_primary"),
                secondary: row.get("title_secondary"),
            },
            message: Bilingual {
                primary: row.get("message_primary"),
                secondary: row.get("message_secondary"),
            },
            module: row.get("module"),
            notification_type: row.get("notification_type"),
            metadata: serde_json::from_str(&metadata)
                .unwrap_or_else(|_| serde_json::json!({})),
            read: row.get("read"),
            is_admin_notification: is_admin,
            created_at: row.get("created_at"),
        }
    }
}

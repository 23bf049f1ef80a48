use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{CreateTemplate, NotificationTemplate, UpdateTemplateContent};
use crate::error::{AppError, AppResult};

// ============================================================================
// Template Repository
// ============================================================================

pub struct TemplateRepository;

impl TemplateRepository {
    pub async fn create(
        pool: &SqlitePool,
        template: CreateTemplate,
    ) -> AppResult<NotificationTemplate> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, NotificationTemplate>(
            r#"
            INSERT INTO notification_templates (
                id, notification_type, module,
                title_primary, title_secondary, message_primary, message_secondary,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&template.notification_type)
        .bind(&template.module)
        .bind(&template.title_primary)
        .bind(&template.title_secondary)
        .bind(&template.message_primary)
        .bind(&template.message_secondary)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_type(
        pool: &SqlitePool,
        notification_type: &str,
    ) -> AppResult<Option<NotificationTemplate>> {
        sqlx::query_as::<_, NotificationTemplate>(
            "SELECT * FROM notification_templates WHERE notification_type = ?",
        )
        .bind(notification_type)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Update the editable content of a template. The notification type is
    /// identity and cannot be changed here.
    pub async fn update_content(
        pool: &SqlitePool,
        notification_type: &str,
        content: UpdateTemplateContent,
    ) -> AppResult<Option<NotificationTemplate>> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, NotificationTemplate>(
            r#"
            UPDATE notification_templates
            SET title_primary = ?, title_secondary = ?,
                message_primary = ?, message_secondary = ?, updated_at = ?
            WHERE notification_type = ?
            RETURNING *
            "#,
        )
        .bind(&content.title_primary)
        .bind(&content.title_secondary)
        .bind(&content.message_primary)
        .bind(&content.message_secondary)
        .bind(now)
        .bind(notification_type)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn list(pool: &SqlitePool) -> AppResult<Vec<NotificationTemplate>> {
        sqlx::query_as::<_, NotificationTemplate>(
            "SELECT * FROM notification_templates ORDER BY notification_type",
        )
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}

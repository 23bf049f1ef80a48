use sqlx::SqlitePool;

use crate::catalog;
use crate::db::models::NotificationTemplate;
use crate::db::repository::TemplateRepository;
use crate::error::{AppError, AppResult};

// ============================================================================
// Template Resolver
// ============================================================================

pub struct TemplateResolver;

impl TemplateResolver {
    /// Resolve a notification type to its stored template.
    ///
    /// Both failure modes are deployment drift, not runtime conditions: a
    /// type nobody registered, or a registered type whose row was never
    /// seeded. Either aborts the delivery pipeline.
    pub async fn resolve(
        pool: &SqlitePool,
        notification_type: &str,
    ) -> AppResult<NotificationTemplate> {
        if !catalog::is_registered(notification_type) {
            return Err(AppError::Config(format!(
                "notification type '{}' is not registered",
                notification_type
            )));
        }

        TemplateRepository::find_by_type(pool, notification_type)
            .await?
            .ok_or_else(|| {
                AppError::Config(format!(
                    "no stored template for notification type '{}'",
                    notification_type
                ))
            })
    }
}

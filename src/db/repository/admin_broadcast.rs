use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{AdminBroadcast, BroadcastForUser, CreateAdminBroadcast};
use crate::error::{AppError, AppResult};

// ============================================================================
// Admin Broadcast Repository
// ============================================================================
//
// One broadcast row addresses every user; read state is a separate
// (user_id, broadcast_id) row whose existence means "read". The composite
// primary key makes the read insert idempotent.

pub struct AdminBroadcastRepository;

impl AdminBroadcastRepository {
    pub async fn create(
        pool: &SqlitePool,
        broadcast: CreateAdminBroadcast,
    ) -> AppResult<AdminBroadcast> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();
        let metadata = serde_json::to_string(&broadcast.metadata)
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

        sqlx::query_as::<_, AdminBroadcast>(
            r#"
            INSERT INTO admin_broadcasts (id, template_id, metadata, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&broadcast.template_id)
        .bind(&metadata)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Broadcasts newest first, each tagged with whether the given user has
    /// read it.
    pub async fn list_for_user(
        pool: &SqlitePool,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<BroadcastForUser>> {
        sqlx::query_as::<_, BroadcastForUser>(
            r#"
            SELECT b.id, b.template_id, b.metadata,
                   (r.user_id IS NOT NULL) AS read,
                   b.created_at, b.updated_at
            FROM admin_broadcasts b
            LEFT JOIN broadcast_reads r
                   ON r.broadcast_id = b.id AND r.user_id = ?
            ORDER BY b.created_at DESC, b.id DESC
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

    /// Broadcasts the user has not read yet, via anti-join against
    /// broadcast_reads.
    pub async fn unread_count(pool: &SqlitePool, user_id: &str) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM admin_broadcasts b
            WHERE NOT EXISTS (
                SELECT 1 FROM broadcast_reads r
                WHERE r.broadcast_id = b.id AND r.user_id = ?
            )
            "#,
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(count)
    }

    pub async fn count(pool: &SqlitePool) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM admin_broadcasts")
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(count)
    }

    /// Record that the user has read the broadcast. A duplicate call is a
    /// no-op, not an error; returns whether a new row was inserted.
    pub async fn mark_read(
        pool: &SqlitePool,
        broadcast_id: &str,
        user_id: &str,
    ) -> AppResult<bool> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            "INSERT OR IGNORE INTO broadcast_reads (user_id, broadcast_id, read_at) \
             VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(broadcast_id)
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark every currently-unread broadcast as read for the user.
    ///
    /// Snapshots the unread set first, then inserts read rows for exactly
    /// that snapshot. A broadcast created between snapshot and insert stays
    /// unread; that window is carried over from the source behavior.
    pub async fn mark_all_read(pool: &SqlitePool, user_id: &str) -> AppResult<u64> {
        let unread_ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT b.id
            FROM admin_broadcasts b
            WHERE NOT EXISTS (
                SELECT 1 FROM broadcast_reads r
                WHERE r.broadcast_id = b.id AND r.user_id = ?
            )
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        if unread_ids.is_empty() {
            return Ok(0);
        }

        let now = Utc::now().naive_utc();
        let mut tx = pool.begin().await.map_err(AppError::Database)?;
        let mut inserted = 0u64;
        for broadcast_id in &unread_ids {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO broadcast_reads (user_id, broadcast_id, read_at) \
                 VALUES (?, ?, ?)",
            )
            .bind(user_id)
            .bind(broadcast_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;
            inserted += result.rows_affected();
        }
        tx.commit().await.map_err(AppError::Database)?;

        Ok(inserted)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<AdminBroadcast>> {
        sqlx::query_as::<_, AdminBroadcast>("SELECT * FROM admin_broadcasts WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Terminal removal; broadcast_reads rows cascade with the broadcast.
    pub async fn hard_delete(pool: &SqlitePool, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM admin_broadcasts WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_support::{seed_template, test_pool};

    async fn create_broadcast(pool: &SqlitePool, template_id: &str) -> AdminBroadcast {
        AdminBroadcastRepository::create(
            pool,
            CreateAdminBroadcast {
                template_id: template_id.to_string(),
                metadata: serde_json::json!({"body": "Maintenance tonight"}),
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn broadcast_unread_until_marked() {
        let pool = test_pool().await;
        let template_id = seed_template(&pool, "admin_announcement").await;
        let b = create_broadcast(&pool, &template_id).await;

        assert_eq!(
            AdminBroadcastRepository::unread_count(&pool, "user-a")
                .await
                .unwrap(),
            1
        );

        let inserted = AdminBroadcastRepository::mark_read(&pool, &b.id, "user-a")
            .await
            .unwrap();
        assert!(inserted);
        assert_eq!(
            AdminBroadcastRepository::unread_count(&pool, "user-a")
                .await
                .unwrap(),
            0
        );

        // Second call inserts nothing and the count stays at zero.
        let inserted = AdminBroadcastRepository::mark_read(&pool, &b.id, "user-a")
            .await
            .unwrap();
        assert!(!inserted);
        assert_eq!(
            AdminBroadcastRepository::unread_count(&pool, "user-a")
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn read_state_is_per_user() {
        let pool = test_pool().await;
        let template_id = seed_template(&pool, "admin_announcement").await;
        let b = create_broadcast(&pool, &template_id).await;

        AdminBroadcastRepository::mark_read(&pool, &b.id, "user-a")
            .await
            .unwrap();

        let for_a = AdminBroadcastRepository::list_for_user(&pool, "user-a", 10, 0)
            .await
            .unwrap();
        let for_b = AdminBroadcastRepository::list_for_user(&pool, "user-b", 10, 0)
            .await
            .unwrap();
        assert!(for_a[0].read);
        assert!(!for_b[0].read);
    }

    #[tokio::test]
    async fn mark_all_read_is_idempotent() {
        let pool = test_pool().await;
        let template_id = seed_template(&pool, "admin_announcement").await;
        create_broadcast(&pool, &template_id).await;
        create_broadcast(&pool, &template_id).await;
        create_broadcast(&pool, &template_id).await;

        let first = AdminBroadcastRepository::mark_all_read(&pool, "user-a")
            .await
            .unwrap();
        let second = AdminBroadcastRepository::mark_all_read(&pool, "user-a")
            .await
            .unwrap();
        assert_eq!(first, 3);
        assert_eq!(second, 0);
    }

    #[tokio::test]
    async fn hard_delete_cascades_read_rows() {
        let pool = test_pool().await;
        let template_id = seed_template(&pool, "admin_announcement").await;
        let b = create_broadcast(&pool, &template_id).await;
        AdminBroadcastRepository::mark_read(&pool, &b.id, "user-a")
            .await
            .unwrap();

        assert!(AdminBroadcastRepository::hard_delete(&pool, &b.id)
            .await
            .unwrap());

        let remaining: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM broadcast_reads WHERE broadcast_id = ?")
                .bind(&b.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(remaining, 0);
    }
}

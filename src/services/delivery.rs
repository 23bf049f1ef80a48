use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use sqlx::SqlitePool;
use tokio::sync::mpsc;

use crate::db::models::{AdminBroadcast, CreateAdminBroadcast, CreateUserNotification};
use crate::db::repository::{AdminBroadcastRepository, UserNotificationRepository};
use crate::error::AppResult;
use crate::services::channels::{Channel, DeliveryReport, NotificationPayload};
use crate::services::realtime::ConnectionManager;
use crate::services::templates::TemplateResolver;

// ============================================================================
// Delivery Orchestrator
// ============================================================================
//
// notify() is fire-and-forget from the caller's perspective: template
// resolution and the durable write happen inline (and abort the call), the
// channel fan-out runs detached. Persistence always happens-before fan-out.

pub struct NotificationDispatcher {
    pool: SqlitePool,
    channels: Vec<Arc<dyn Channel>>,
    realtime: ConnectionManager,
    outcomes: mpsc::UnboundedSender<DeliveryReport>,
    channel_timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(
        pool: SqlitePool,
        channels: Vec<Arc<dyn Channel>>,
        realtime: ConnectionManager,
        outcomes: mpsc::UnboundedSender<DeliveryReport>,
        channel_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            channels,
            realtime,
            outcomes,
            channel_timeout,
        }
    }

    /// Deliver a notification to one user.
    ///
    /// Resolves the template (unknown type aborts before anything is
    /// written), persists the notification row, then dispatches the payload
    /// concurrently to every registered channel without waiting for any of
    /// them. Channel failures surface only through the outcome sink.
    pub async fn notify(
        &self,
        user_id: &str,
        notification_type: &str,
        metadata: serde_json::Value,
    ) -> AppResult<()> {
        let template = TemplateResolver::resolve(&self.pool, notification_type).await?;

        let notification = UserNotificationRepository::create(
            &self.pool,
            CreateUserNotification {
                user_id: user_id.to_string(),
                template_id: template.id.clone(),
                metadata: metadata.clone(),
            },
        )
        .await?;

        let payload = NotificationPayload {
            id: notification.id,
            user_id: Some(user_id.to_string()),
            notification_type: template.notification_type.clone(),
            module: template.module.clone(),
            title: template.title(),
            message: template.message(),
            metadata,
            is_admin_notification: false,
            created_at: notification.created_at,
        };

        self.spawn_fan_out(payload);
        Ok(())
    }

    /// Publish an admin broadcast: exactly one row for the whole user
    /// population, then a push to users online right now. No per-user rows,
    /// no per-user delivery guarantee; offline users catch up through the
    /// combined feed.
    pub async fn send_admin_broadcast(
        &self,
        admin_id: &str,
        notification_type: &str,
        metadata: serde_json::Value,
    ) -> AppResult<AdminBroadcast> {
        let template = TemplateResolver::resolve(&self.pool, notification_type).await?;

        let broadcast = AdminBroadcastRepository::create(
            &self.pool,
            CreateAdminBroadcast {
                template_id: template.id.clone(),
                metadata: metadata.clone(),
            },
        )
        .await?;

        tracing::info!(
            broadcast_id = %broadcast.id,
            admin_id,
            notification_type,
            "Admin broadcast created"
        );

        let payload = NotificationPayload {
            id: broadcast.id.clone(),
            user_id: None,
            notification_type: template.notification_type.clone(),
            module: template.module.clone(),
            title: template.title(),
            message: template.message(),
            metadata,
            is_admin_notification: true,
            created_at: broadcast.created_at,
        };

        let realtime = self.realtime.clone();
        let outcomes = self.outcomes.clone();
        tokio::spawn(async move {
            let result = realtime.broadcast(&payload).await;
            let _ = outcomes.send(DeliveryReport {
                channel: "realtime",
                notification_id: payload.id.clone(),
                user_id: None,
                success: result.is_ok(),
                error: result.err().map(|e| e.to_string()),
            });
        });

        Ok(broadcast)
    }

    /// Scatter to every channel, gather on a settled basis: each send is
    /// bounded by the per-channel timeout, and no failing or hanging channel
    /// aborts the others. The caller is never blocked on this.
    fn spawn_fan_out(&self, payload: NotificationPayload) {
        let channels = self.channels.clone();
        let outcomes = self.outcomes.clone();
        let timeout = self.channel_timeout;

        tokio::spawn(async move {
            let sends = channels.iter().map(|channel| {
                let payload = &payload;
                async move {
                    let result = tokio::time::timeout(timeout, channel.send(payload)).await;
                    let error = match result {
                        Ok(Ok(())) => None,
                        Ok(Err(e)) => Some(e.to_string()),
                        Err(_) => Some(format!(
                            "send timed out after {}s",
                            timeout.as_secs_f64()
                        )),
                    };
                    DeliveryReport {
                        channel: channel.name(),
                        notification_id: payload.id.clone(),
                        user_id: payload.user_id.clone(),
                        success: error.is_none(),
                        error,
                    }
                }
            });

            for report in join_all(sends).await {
                let _ = outcomes.send(report);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use crate::db::repository::test_support::{seed_template, test_pool};
    use crate::error::AppError;
    use crate::services::realtime::StreamEvent;

    /// Records, at send time, whether the payload's row was already durable.
    struct RecordingChannel {
        pool: SqlitePool,
        seen: Arc<Mutex<Vec<(String, bool)>>>,
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, payload: &NotificationPayload) -> AppResult<()> {
            let persisted: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM user_notifications WHERE id = ?")
                    .bind(&payload.id)
                    .fetch_one(&self.pool)
                    .await
                    .unwrap_or(0);
            self.seen
                .lock()
                .await
                .push((payload.id.clone(), persisted > 0));
            Ok(())
        }
    }

    struct FailingChannel;

    #[async_trait]
    impl Channel for FailingChannel {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn send(&self, _payload: &NotificationPayload) -> AppResult<()> {
            Err(AppError::Channel("synthetic failure".to_string()))
        }
    }

    struct HangingChannel;

    #[async_trait]
    impl Channel for HangingChannel {
        fn name(&self) -> &'static str {
            "hanging"
        }

        async fn send(&self, _payload: &NotificationPayload) -> AppResult<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    struct Harness {
        pool: SqlitePool,
        dispatcher: NotificationDispatcher,
        manager: ConnectionManager,
        outcome_rx: mpsc::UnboundedReceiver<DeliveryReport>,
        seen: Arc<Mutex<Vec<(String, bool)>>>,
    }

    async fn harness(extra: Vec<Arc<dyn Channel>>) -> Harness {
        let pool = test_pool().await;
        seed_template(&pool, "ad_approved").await;
        seed_template(&pool, "admin_announcement").await;

        let manager = ConnectionManager::new(pool.clone(), Duration::from_secs(30), 50);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut channels: Vec<Arc<dyn Channel>> = vec![Arc::new(RecordingChannel {
            pool: pool.clone(),
            seen: seen.clone(),
        })];
        channels.extend(extra);

        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let dispatcher = NotificationDispatcher::new(
            pool.clone(),
            channels,
            manager.clone(),
            outcome_tx,
            Duration::from_millis(200),
        );

        Harness {
            pool,
            dispatcher,
            manager,
            outcome_rx,
            seen,
        }
    }

    async fn next_outcome(rx: &mut mpsc::UnboundedReceiver<DeliveryReport>) -> DeliveryReport {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for delivery report")
            .expect("outcome channel closed")
    }

    #[tokio::test]
    async fn persistence_happens_before_fan_out() {
        let mut h = harness(vec![]).await;
        h.dispatcher
            .notify("user-1", "ad_approved", serde_json::json!({}))
            .await
            .unwrap();

        let report = next_outcome(&mut h.outcome_rx).await;
        assert!(report.success);

        let seen = h.seen.lock().await;
        assert_eq!(seen.len(), 1);
        assert!(seen[0].1, "row must be durable before the channel sees it");
    }

    #[tokio::test]
    async fn unknown_type_aborts_before_persistence() {
        let h = harness(vec![]).await;
        let err = h
            .dispatcher
            .notify("user-1", "no_such_type", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_notifications")
            .fetch_one(&h.pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn failing_channel_neither_blocks_others_nor_rolls_back() {
        let mut h = harness(vec![Arc::new(FailingChannel)]).await;
        h.dispatcher
            .notify("user-1", "ad_approved", serde_json::json!({}))
            .await
            .unwrap();

        let first = next_outcome(&mut h.outcome_rx).await;
        let second = next_outcome(&mut h.outcome_rx).await;
        let mut by_channel = [first, second];
        by_channel.sort_by_key(|r| r.channel);

        assert_eq!(by_channel[0].channel, "failing");
        assert!(!by_channel[0].success);
        assert_eq!(by_channel[1].channel, "recording");
        assert!(by_channel[1].success);

        // The persisted row is still the source of truth.
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_notifications")
            .fetch_one(&h.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn hanging_channel_is_bounded_by_the_timeout() {
        let mut h = harness(vec![Arc::new(HangingChannel)]).await;
        h.dispatcher
            .notify("user-1", "ad_approved", serde_json::json!({}))
            .await
            .unwrap();

        let first = next_outcome(&mut h.outcome_rx).await;
        let second = next_outcome(&mut h.outcome_rx).await;
        let hanging = [&first, &second]
            .into_iter()
            .find(|r| r.channel == "hanging")
            .unwrap();
        assert!(!hanging.success);
        assert!(hanging.error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn broadcast_creates_one_row_and_pushes_to_online_users() {
        let mut h = harness(vec![]).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        h.manager.add_client("user-1", tx).await.unwrap();

        let broadcast = h
            .dispatcher
            .send_admin_broadcast("admin-1", "admin_announcement", serde_json::json!({}))
            .await
            .unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM admin_broadcasts")
            .fetch_one(&h.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);

        // No per-user rows are ever fanned out for a broadcast.
        let user_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_notifications")
            .fetch_one(&h.pool)
            .await
            .unwrap();
        assert_eq!(user_rows, 0);

        assert!(matches!(rx.recv().await.unwrap(), StreamEvent::Connected { .. }));
        match tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap()
        {
            StreamEvent::Broadcast { payload } => {
                assert_eq!(payload.id, broadcast.id);
                assert!(payload.is_admin_notification);
            }
            other => panic!("expected broadcast event, got {:?}", other),
        }

        let report = next_outcome(&mut h.outcome_rx).await;
        assert_eq!(report.channel, "realtime");
        assert!(report.success);
    }
}

pub mod auth;
pub mod broadcasts;
pub mod health;
pub mod notifications;
pub mod stream;

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use axum::Router;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::db::repository::test_support::test_pool;
    use crate::routes;
    use crate::routes::auth::make_token;
    use crate::services::channels::Channel;
    use crate::services::delivery::NotificationDispatcher;
    use crate::services::init::seed_templates;
    use crate::services::realtime::{ConnectionManager, RealtimeChannel};
    use crate::AppState;

    const TEST_SECRET: &str = "test-secret";

    async fn test_app() -> (Router, Arc<AppState>) {
        let pool = test_pool().await;
        seed_templates(&pool).await.unwrap();

        let mut config = Config::default();
        config.auth.jwt_secret = TEST_SECRET.to_string();

        let realtime = ConnectionManager::new(
            pool.clone(),
            Duration::from_secs(config.realtime.heartbeat_interval_seconds),
            config.realtime.replay_limit,
        );
        let channels: Vec<Arc<dyn Channel>> =
            vec![Arc::new(RealtimeChannel::new(realtime.clone()))];
        // Outcomes are dropped on the floor in handler tests.
        let (outcome_tx, _outcome_rx) = mpsc::unbounded_channel();
        let dispatcher = Arc::new(NotificationDispatcher::new(
            pool.clone(),
            channels,
            realtime.clone(),
            outcome_tx,
            Duration::from_secs(config.delivery.channel_timeout_seconds),
        ));

        let state = Arc::new(AppState {
            db: pool,
            config,
            realtime,
            dispatcher,
        });

        let router = Router::new()
            .nest("/api/notifications", routes::notifications::router())
            .nest("/api/admin", routes::broadcasts::router())
            .with_state(state.clone());

        (router, state)
    }

    async fn request(
        router: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn requests_without_token_are_rejected() {
        let (router, _) = test_app().await;
        let (status, _) = request(&router, Method::GET, "/api/notifications", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_endpoints_reject_plain_users() {
        let (router, _) = test_app().await;
        let token = make_token(TEST_SECRET, "user-1", None);
        let (status, _) = request(
            &router,
            Method::POST,
            "/api/admin/broadcasts",
            Some(&token),
            Some(serde_json::json!({"notification_type": "admin_announcement"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn notify_then_feed_then_mark_read() {
        let (router, _) = test_app().await;
        let admin = make_token(TEST_SECRET, "admin-1", Some("admin"));
        let user = make_token(TEST_SECRET, "user-1", None);

        let (status, _) = request(
            &router,
            Method::POST,
            "/api/admin/notifications",
            Some(&admin),
            Some(serde_json::json!({
                "user_id": "user-1",
                "notification_type": "ad_approved",
                "metadata": {"ad_title": "Roof apartment"}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = request(
            &router,
            Method::GET,
            "/api/notifications/unread-count",
            Some(&user),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["unread"], 1);

        let (status, body) =
            request(&router, Method::GET, "/api/notifications", Some(&user), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"].as_array().unwrap().len(), 1);
        let id = body["items"][0]["id"].as_str().unwrap().to_string();
        assert_eq!(body["items"][0]["metadata"]["ad_title"], "Roof apartment");
        assert_eq!(body["items"][0]["is_admin_notification"], false);

        let (status, _) = request(
            &router,
            Method::POST,
            &format!("/api/notifications/{}/read", id),
            Some(&user),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = request(
            &router,
            Method::GET,
            "/api/notifications/unread-count",
            Some(&user),
            None,
        )
        .await;
        assert_eq!(body["unread"], 0);
    }

    #[tokio::test]
    async fn marking_someone_elses_notification_is_not_found() {
        let (router, _) = test_app().await;
        let admin = make_token(TEST_SECRET, "admin-1", Some("admin"));
        let owner = make_token(TEST_SECRET, "user-d", None);
        let intruder = make_token(TEST_SECRET, "user-c", None);

        request(
            &router,
            Method::POST,
            "/api/admin/notifications",
            Some(&admin),
            Some(serde_json::json!({
                "user_id": "user-d",
                "notification_type": "ad_approved"
            })),
        )
        .await;

        let (_, body) =
            request(&router, Method::GET, "/api/notifications", Some(&owner), None).await;
        let id = body["items"][0]["id"].as_str().unwrap().to_string();

        let (status, body) = request(
            &router,
            Method::POST,
            &format!("/api/notifications/{}/read", id),
            Some(&intruder),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");

        // The owner's row is untouched.
        let (_, body) = request(
            &router,
            Method::GET,
            "/api/notifications/unread-count",
            Some(&owner),
            None,
        )
        .await;
        assert_eq!(body["unread"], 1);
    }

    #[tokio::test]
    async fn broadcast_read_flow_is_idempotent() {
        let (router, _) = test_app().await;
        let admin = make_token(TEST_SECRET, "admin-1", Some("admin"));
        let user = make_token(TEST_SECRET, "user-a", None);

        let (status, body) = request(
            &router,
            Method::POST,
            "/api/admin/broadcasts",
            Some(&admin),
            Some(serde_json::json!({
                "notification_type": "admin_announcement",
                "metadata": {"body": "Scheduled maintenance"}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let broadcast_id = body["id"].as_str().unwrap().to_string();

        let (_, body) = request(
            &router,
            Method::GET,
            "/api/notifications/unread-count",
            Some(&user),
            None,
        )
        .await;
        assert_eq!(body["unread"], 1);

        let (status, body) = request(
            &router,
            Method::POST,
            &format!("/api/notifications/broadcasts/{}/read", broadcast_id),
            Some(&user),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["updated"], 1);

        let (_, body) = request(
            &router,
            Method::GET,
            "/api/notifications/unread-count",
            Some(&user),
            None,
        )
        .await;
        assert_eq!(body["unread"], 0);

        // Second read inserts nothing and the count stays at zero.
        let (status, body) = request(
            &router,
            Method::POST,
            &format!("/api/notifications/broadcasts/{}/read", broadcast_id),
            Some(&user),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["updated"], 0);
    }

    #[tokio::test]
    async fn admin_hard_delete_removes_broadcast_for_everyone() {
        let (router, _) = test_app().await;
        let admin = make_token(TEST_SECRET, "admin-1", Some("admin"));
        let user = make_token(TEST_SECRET, "user-a", None);

        let (_, body) = request(
            &router,
            Method::POST,
            "/api/admin/broadcasts",
            Some(&admin),
            Some(serde_json::json!({"notification_type": "admin_announcement"})),
        )
        .await;
        let broadcast_id = body["id"].as_str().unwrap().to_string();

        let (_, body) = request(
            &router,
            Method::GET,
            "/api/notifications/unread-count",
            Some(&user),
            None,
        )
        .await;
        assert_eq!(body["unread"], 1);

        let (status, _) = request(
            &router,
            Method::DELETE,
            &format!("/api/admin/broadcasts/{}", broadcast_id),
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = request(
            &router,
            Method::GET,
            "/api/notifications/unread-count",
            Some(&user),
            None,
        )
        .await;
        assert_eq!(body["unread"], 0);

        let (status, _) = request(
            &router,
            Method::DELETE,
            &format!("/api/admin/broadcasts/{}", broadcast_id),
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn soft_delete_hides_from_feed_until_restore() {
        let (router, _) = test_app().await;
        let admin = make_token(TEST_SECRET, "admin-1", Some("admin"));
        let user = make_token(TEST_SECRET, "user-1", None);

        request(
            &router,
            Method::POST,
            "/api/admin/notifications",
            Some(&admin),
            Some(serde_json::json!({
                "user_id": "user-1",
                "notification_type": "payment_received",
                "metadata": {"amount": "120", "currency": "USD"}
            })),
        )
        .await;

        let (_, body) =
            request(&router, Method::GET, "/api/notifications", Some(&user), None).await;
        let id = body["items"][0]["id"].as_str().unwrap().to_string();

        let (status, _) = request(
            &router,
            Method::DELETE,
            &format!("/api/notifications/{}", id),
            Some(&user),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) =
            request(&router, Method::GET, "/api/notifications", Some(&user), None).await;
        assert!(body["items"].as_array().unwrap().is_empty());

        let (status, _) = request(
            &router,
            Method::POST,
            &format!("/api/notifications/{}/restore", id),
            Some(&user),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) =
            request(&router, Method::GET, "/api/notifications", Some(&user), None).await;
        assert_eq!(body["items"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_notification_type_is_a_server_error() {
        let (router, _) = test_app().await;
        let admin = make_token(TEST_SECRET, "admin-1", Some("admin"));

        let (status, body) = request(
            &router,
            Method::POST,
            "/api/admin/notifications",
            Some(&admin),
            Some(serde_json::json!({
                "user_id": "user-1",
                "notification_type": "definitely_not_registered"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "CONFIG_ERROR");
    }
}

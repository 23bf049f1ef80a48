use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use axum::body::Body;
use http::{HeaderValue, StatusCode};
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tower_governor::{GovernorError, GovernorLayer};

mod catalog;
mod config;
mod db;
mod error;
mod middleware;
mod routes;
mod services;

use config::Config;
use services::channels::Channel;
use services::delivery::NotificationDispatcher;
use services::email::EmailChannel;
use services::init;
use services::realtime::{ConnectionManager, RealtimeChannel};

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
    pub realtime: ConnectionManager,
    pub dispatcher: Arc<NotificationDispatcher>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ad_notifications=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Ad Platform Notification Service");

    // Initialize database and seed templates for every registered type
    let pool = init::init_db(&config).await?;
    let seeded = init::seed_templates(&pool).await?;
    if seeded > 0 {
        tracing::info!("Seeded {} notification template(s)", seeded);
    }

    // Realtime connection registry: constructed once, shared by reference.
    let realtime = ConnectionManager::new(
        pool.clone(),
        Duration::from_secs(config.realtime.heartbeat_interval_seconds),
        config.realtime.replay_limit,
    );

    // Delivery channels. The durable store is not a channel: the dispatcher
    // persists before any fan-out.
    let mut channels: Vec<Arc<dyn Channel>> =
        vec![Arc::new(RealtimeChannel::new(realtime.clone()))];
    if config.email.enabled {
        channels.push(Arc::new(EmailChannel::new(config.email.from_address.clone())));
        tracing::info!("Email channel registered");
    }

    // Delivery outcomes flow to a single logging sink; callers of notify()
    // never see channel failures.
    let (shutdown_tx, _shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);
    let (outcome_tx, outcome_rx) = tokio::sync::mpsc::unbounded_channel();
    let sink_handle = init::spawn_outcome_sink(outcome_rx, shutdown_tx.clone());

    let dispatcher = Arc::new(NotificationDispatcher::new(
        pool.clone(),
        channels,
        realtime.clone(),
        outcome_tx,
        Duration::from_secs(config.delivery.channel_timeout_seconds),
    ));

    let app_state = Arc::new(AppState {
        db: pool,
        config: config.clone(),
        realtime,
        dispatcher,
    });

    // Rate limiter for the public stream connect endpoint.
    // The error handler returns a proper 429 status and Retry-After header when limits are exceeded.
    let mut stream_builder = GovernorConfigBuilder::default();
    stream_builder.per_second(config.rate_limit.stream_per_second.into());
    stream_builder.burst_size(config.rate_limit.stream_burst);
    stream_builder.key_extractor(SmartIpKeyExtractor);
    stream_builder.error_handler(|error: GovernorError| -> http::Response<Body> {
        match error {
            GovernorError::TooManyRequests { wait_time, headers } => {
                let retry_after = wait_time;

                // Same error shape as `AppError -> IntoResponse`
                let body = serde_json::json!({
                    "error": {
                        "code": "RATE_LIMITED",
                        "message": "Rate limit exceeded",
                        "details": { "retry_after_seconds": retry_after }
                    }
                })
                .to_string();

                let mut resp = http::Response::new(Body::from(body));
                *resp.status_mut() = StatusCode::TOO_MANY_REQUESTS;
                resp.headers_mut().insert(
                    http::header::CONTENT_TYPE,
                    http::HeaderValue::from_static("application/json"),
                );

                if let Some(hmap) = headers {
                    for (name, value) in hmap.iter() {
                        resp.headers_mut().append(name.clone(), value.clone());
                    }
                }

                resp.headers_mut().insert(
                    http::header::RETRY_AFTER,
                    http::HeaderValue::from_str(&retry_after.to_string()).unwrap(),
                );

                resp
            }
            GovernorError::UnableToExtractKey => {
                let body = serde_json::json!({
                    "error": {
                        "code": "INVALID_REQUEST",
                        "message": "Unable to determine client IP for rate limiting"
                    }
                })
                .to_string();

                let mut resp = http::Response::new(Body::from(body));
                *resp.status_mut() = StatusCode::BAD_REQUEST;
                resp.headers_mut().insert(
                    http::header::CONTENT_TYPE,
                    http::HeaderValue::from_static("application/json"),
                );
                resp
            }
            GovernorError::Other { code, msg, headers } => {
                let body = msg.unwrap_or_else(|| "Rate limiting error".to_string());
                let mut resp = http::Response::new(Body::from(body));
                let status = StatusCode::from_u16(code.as_u16())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                *resp.status_mut() = status;
                if let Some(hmap) = headers {
                    for (name, value) in hmap.iter() {
                        resp.headers_mut().append(name.clone(), value.clone());
                    }
                }
                resp
            }
        }
    });

    let stream_gov_conf = Arc::new(
        stream_builder
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Failed to build stream governor config"))?,
    );

    let stream_rate_layer = GovernorLayer {
        config: stream_gov_conf.clone(),
    };

    // Build router
    let app = Router::new()
        // Health check
        .route("/health", get(routes::health::health_check))
        // Notification feed, read-state and realtime stream routes
        // (the stream connect endpoint is rate limited per IP)
        .nest(
            "/api/notifications",
            routes::notifications::router()
                .merge(routes::stream::router().layer(stream_rate_layer)),
        )
        // Admin triggers (broadcasts, direct notifies)
        .nest("/api/admin", routes::broadcasts::router())
        // Add shared state
        .with_state(app_state.clone())
        // Security headers
        .layer(axum::middleware::from_fn(
            middleware::security_headers::security_headers_middleware,
        ))
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(
                    config
                        .server
                        .frontend_url
                        .parse::<HeaderValue>()
                        .expect("Invalid FRONTEND_URL for CORS"),
                )
                .allow_methods([
                    http::Method::GET,
                    http::Method::POST,
                    http::Method::DELETE,
                    http::Method::OPTIONS,
                ])
                .allow_headers([
                    http::header::CONTENT_TYPE,
                    http::header::AUTHORIZATION,
                    http::header::ACCEPT,
                ])
                .allow_credentials(true),
        );

    // Start server
    let host = config.server.host.clone();
    let port = config.server.port;
    let addr = format!("{}:{}", host, port);

    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server_fut = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );

    let shutdown_tx_clone = shutdown_tx.clone();
    let signal_fut = async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut term =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("Failed to bind SIGTERM");
            tokio::select! {
                _ = ctrl_c => {},
                _ = term.recv() => {},
            }
        }

        #[cfg(not(unix))]
        {
            ctrl_c.await.expect("Failed to bind Ctrl+C");
        }

        tracing::info!("Shutdown signal received, notifying background workers");
        let _ = shutdown_tx_clone.send(());
    };

    tokio::select! {
        res = server_fut => {
            if let Err(e) = res {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = signal_fut => {
            tracing::info!("Signal handler completed; server future dropped to stop accepting new connections");
        }
    }

    // Give the outcome sink a moment to drain.
    let shutdown_wait = Duration::from_secs(5);
    let _ = tokio::time::timeout(shutdown_wait, sink_handle).await;

    tracing::info!("Shutdown complete");
    Ok(())
}

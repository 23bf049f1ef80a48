use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::db::repository::FeedRepository;
use crate::error::AppResult;
use crate::services::channels::{Channel, NotificationPayload};

/// Events written to a live client connection. The transport layer frames
/// them (SSE, socket, ...); the manager only decides what to write and when.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Connected { connection_id: String },
    Notification { payload: NotificationPayload },
    Broadcast { payload: NotificationPayload },
    Ping,
}

impl StreamEvent {
    /// Wire-level event name.
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Connected { .. } => "connected",
            StreamEvent::Notification { .. } => "notification",
            StreamEvent::Broadcast { .. } => "broadcast",
            StreamEvent::Ping => "ping",
        }
    }
}

pub type StreamSender = mpsc::UnboundedSender<StreamEvent>;

struct ClientConnection {
    id: String,
    sender: StreamSender,
    heartbeat: tokio::task::JoinHandle<()>,
}

/// Tracks live push connections per user. A user may hold several
/// concurrent connections (tabs, devices); each gets its own heartbeat
/// task, which doubles as the close detector: the first write that fails
/// deregisters the connection and cancels its timer.
///
/// Constructed once per process and shared by reference; never a
/// module-level singleton.
#[derive(Clone)]
pub struct ConnectionManager {
    connections: Arc<RwLock<HashMap<String, Vec<ClientConnection>>>>,
    pool: SqlitePool,
    heartbeat_interval: Duration,
    replay_limit: i64,
}

impl ConnectionManager {
    pub fn new(pool: SqlitePool, heartbeat_interval: Duration, replay_limit: i64) -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            pool,
            heartbeat_interval,
            replay_limit,
        }
    }

    /// Register a live connection for a user.
    ///
    /// Writes the `connected` event, replays the user's currently-unread
    /// stored notifications to this one connection (reconnect catch-up),
    /// then starts the fixed-interval heartbeat. Returns the connection id.
    pub async fn add_client(&self, user_id: &str, sender: StreamSender) -> AppResult<String> {
        let connection_id = Uuid::new_v4().to_string();

        let heartbeat = self.spawn_heartbeat(user_id, &connection_id, sender.clone());
        {
            let mut connections = self.connections.write().await;
            connections
                .entry(user_id.to_string())
                .or_default()
                .push(ClientConnection {
                    id: connection_id.clone(),
                    sender: sender.clone(),
                    heartbeat,
                });
        }

        let _ = sender.send(StreamEvent::Connected {
            connection_id: connection_id.clone(),
        });

        // Catch-up replay, oldest first so the client appends naturally.
        let unread =
            FeedRepository::list_unread_views(&self.pool, user_id, self.replay_limit).await?;
        for view in unread.into_iter().rev() {
            let payload = NotificationPayload::from_view(view, Some(user_id.to_string()));
            if sender.send(StreamEvent::Notification { payload }).is_err() {
                // Client went away during replay; the heartbeat will reap it.
                break;
            }
        }

        tracing::debug!(user_id, connection_id = %connection_id, "Realtime client connected");
        Ok(connection_id)
    }

    /// Explicitly deregister a connection (transport closed cleanly).
    pub async fn remove_client(&self, user_id: &str, connection_id: &str) -> bool {
        self.drop_connection(user_id, connection_id, true).await
    }

    /// Push a payload to every live connection of its target user.
    ///
    /// A user with zero connections is a silent no-op: offline users are
    /// not queued here, the durable store is their fallback. Per-connection
    /// write failures are caught and the broken connection pruned, so one
    /// dead socket never blocks delivery to the user's other connections.
    pub async fn send(&self, payload: &NotificationPayload) -> AppResult<()> {
        let Some(user_id) = payload.user_id.clone() else {
            return Ok(());
        };

        let event = StreamEvent::Notification {
            payload: payload.clone(),
        };

        let mut connections = self.connections.write().await;
        if let Some(list) = connections.get_mut(&user_id) {
            Self::write_to_all(&user_id, list, &event);
            if list.is_empty() {
                connections.remove(&user_id);
            }
        }
        Ok(())
    }

    /// Push to every user currently online. Reaches only users connected at
    /// the moment of the call; offline users rely on the combined feed and
    /// unread counts instead.
    pub async fn broadcast(&self, payload: &NotificationPayload) -> AppResult<()> {
        let event = StreamEvent::Broadcast {
            payload: payload.clone(),
        };

        let mut connections = self.connections.write().await;
        for (user_id, list) in connections.iter_mut() {
            Self::write_to_all(user_id, list, &event);
        }
        connections.retain(|_, list| !list.is_empty());
        Ok(())
    }

    /// Diagnostics only.
    pub async fn is_online(&self, user_id: &str) -> bool {
        self.connections.read().await.contains_key(user_id)
    }

    /// Number of users with at least one live connection. Diagnostics only.
    pub async fn online_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn connection_count(&self, user_id: &str) -> usize {
        self.connections
            .read()
            .await
            .get(user_id)
            .map(|list| list.len())
            .unwrap_or(0)
    }

    fn write_to_all(user_id: &str, list: &mut Vec<ClientConnection>, event: &StreamEvent) {
        list.retain(|conn| {
            if conn.sender.send(event.clone()).is_ok() {
                true
            } else {
                tracing::debug!(
                    user_id,
                    connection_id = %conn.id,
                    "Pruning closed realtime connection"
                );
                conn.heartbeat.abort();
                false
            }
        });
    }

    fn spawn_heartbeat(
        &self,
        user_id: &str,
        connection_id: &str,
        sender: StreamSender,
    ) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        let user_id = user_id.to_string();
        let connection_id = connection_id.to_string();
        let interval = self.heartbeat_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // Consume the immediate first tick; the connected event and the
            // replay are already on the wire.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if sender.send(StreamEvent::Ping).is_err() {
                    manager
                        .drop_connection(&user_id, &connection_id, false)
                        .await;
                    tracing::debug!(
                        user_id = %user_id,
                        connection_id = %connection_id,
                        "Realtime client disconnected (heartbeat write failed)"
                    );
                    break;
                }
            }
        })
    }

    async fn drop_connection(&self, user_id: &str, connection_id: &str, abort: bool) -> bool {
        let mut connections = self.connections.write().await;
        let Some(list) = connections.get_mut(user_id) else {
            return false;
        };
        let Some(pos) = list.iter().position(|c| c.id == connection_id) else {
            return false;
        };
        let conn = list.remove(pos);
        if abort {
            conn.heartbeat.abort();
        }
        // No leaked empty entries.
        if list.is_empty() {
            connections.remove(user_id);
        }
        true
    }
}

/// Channel adapter for the delivery fan-out.
pub struct RealtimeChannel {
    manager: ConnectionManager,
}

impl RealtimeChannel {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Channel for RealtimeChannel {
    fn name(&self) -> &'static str {
        "realtime"
    }

    async fn send(&self, payload: &NotificationPayload) -> AppResult<()> {
        if payload.is_admin_notification {
            self.manager.broadcast(payload).await
        } else {
            self.manager.send(payload).await
        }
    }
}

use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::models::event::{CommentEvent, EventEnvelope};

/// 单个已认证的实时连接
///
/// Delivery goes through a bounded channel; the socket task drains it into
/// the peer. A full or closed channel marks the connection droppable.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub connected_at: DateTime<Utc>,
    sender: mpsc::Sender<Message>,
}

impl ConnectionHandle {
    pub fn new(id: String, user_id: String, username: String, sender: mpsc::Sender<Message>) -> Self {
        Self {
            id,
            user_id,
            username,
            connected_at: Utc::now(),
            sender,
        }
    }

    /// Group name of the private per-user channel this connection joins.
    pub fn user_group(&self) -> String {
        format!("user:{}", self.user_id)
    }
}

/// 连接注册表
///
/// Connections are added and removed from arbitrary tasks while broadcasts
/// iterate membership concurrently. Broadcast snapshots the membership first
/// and never holds a map guard across a send.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, ConnectionHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, handle: ConnectionHandle) {
        info!(
            "Connection registered: {} for user: {} ({})",
            handle.id, handle.username, handle.user_id
        );
        self.connections.insert(handle.id.clone(), handle);
    }

    /// Safe to call while a broadcast is in flight; the broadcast either
    /// already snapshotted this connection's sender (the receiving task is
    /// gone, the send fails silently) or never sees it.
    pub fn remove(&self, connection_id: &str) -> Option<ConnectionHandle> {
        let removed = self.connections.remove(connection_id).map(|(_, h)| h);
        if let Some(handle) = &removed {
            info!(
                "Connection removed: {} for user: {}",
                handle.id, handle.user_id
            );
        }
        removed
    }

    /// Membership snapshot of the implicit "all" group.
    pub fn snapshot(&self) -> Vec<(String, mpsc::Sender<Message>)> {
        self.connections
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().sender.clone()))
            .collect()
    }

    /// Snapshot of the private group for one user.
    pub fn snapshot_user(&self, user_id: &str) -> Vec<(String, mpsc::Sender<Message>)> {
        self.connections
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .map(|entry| (entry.key().clone(), entry.value().sender.clone()))
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_user_online(&self, user_id: &str) -> bool {
        self.connections
            .iter()
            .any(|entry| entry.value().user_id == user_id)
    }
}

/// 事件广播服务
///
/// Constructed once in `main` and handed to the comment service by handle.
/// Broadcasting is fire-and-forget relative to the request that caused the
/// mutation: failures are logged, never returned.
pub struct EventBroadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl EventBroadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Serialize the event once and fan it out to every live connection.
    pub fn emit(&self, event: CommentEvent) {
        let name = event.name();
        let envelope = event.into_envelope();
        debug!("Broadcasting {} to {} connections", name, self.registry.connection_count());
        self.fan_out(self.registry.snapshot(), envelope);
    }

    /// Deliver to the private group of a single user. Unused by the current
    /// event taxonomy but part of the connection contract.
    pub fn send_to_user(&self, user_id: &str, envelope: EventEnvelope) {
        self.fan_out(self.registry.snapshot_user(user_id), envelope);
    }

    fn fan_out(&self, targets: Vec<(String, mpsc::Sender<Message>)>, envelope: EventEnvelope) {
        let text = match serde_json::to_string(&envelope) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to serialize event {}: {}", envelope.event, e);
                return;
            }
        };

        for (connection_id, sender) in targets {
            match sender.try_send(Message::Text(text.clone())) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    // A peer that cannot keep up is dropped rather than
                    // allowed to stall the broadcaster.
                    warn!("Send buffer full, dropping connection: {}", connection_id);
                    self.registry.remove(&connection_id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("Connection closed during broadcast: {}", connection_id);
                    self.registry.remove(&connection_id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::comment::{CommentAuthor, CommentView};

    fn sample_view(id: &str) -> CommentView {
        CommentView {
            id: id.to_string(),
            content: "hello".to_string(),
            author: CommentAuthor {
                id: "user_1".to_string(),
                username: "alice".to_string(),
            },
            parent_id: None,
            like_count: 0,
            dislike_count: 0,
            reply_count: 0,
            has_liked: false,
            has_disliked: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn register(registry: &ConnectionRegistry, id: &str, user: &str, buffer: usize) -> mpsc::Receiver<Message> {
        let (tx, rx) = mpsc::channel(buffer);
        registry.add(ConnectionHandle::new(
            id.to_string(),
            user.to_string(),
            user.to_string(),
            tx,
        ));
        rx
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_connections() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut rx_a = register(&registry, "conn_a", "user_a", 8);
        let mut rx_b = register(&registry, "conn_b", "user_b", 8);

        let broadcaster = EventBroadcaster::new(registry);
        broadcaster.emit(CommentEvent::Created(sample_view("c1")));

        for rx in [&mut rx_a, &mut rx_b] {
            let msg = rx.try_recv().expect("connection should receive event");
            let Message::Text(text) = msg else {
                panic!("expected text frame");
            };
            let envelope: EventEnvelope = serde_json::from_str(&text).unwrap();
            assert_eq!(envelope.event, "comment:created");
            assert_eq!(envelope.data["id"], "c1");
        }
    }

    #[tokio::test]
    async fn test_removed_connection_receives_nothing() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut rx_removed = register(&registry, "conn_a", "user_a", 8);
        let mut rx_kept = register(&registry, "conn_b", "user_b", 8);

        registry.remove("conn_a");

        let broadcaster = EventBroadcaster::new(registry);
        broadcaster.emit(CommentEvent::Created(sample_view("c1")));

        assert!(rx_removed.try_recv().is_err());
        assert!(rx_kept.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_slow_connection_dropped_without_aborting_others() {
        let registry = Arc::new(ConnectionRegistry::new());
        // Capacity 1: the second event overflows the slow peer's buffer.
        let _rx_slow = register(&registry, "conn_slow", "user_a", 1);
        let mut rx_fast = register(&registry, "conn_fast", "user_b", 8);

        let broadcaster = EventBroadcaster::new(registry.clone());
        broadcaster.emit(CommentEvent::Created(sample_view("c1")));
        broadcaster.emit(CommentEvent::Created(sample_view("c2")));

        assert_eq!(registry.connection_count(), 1);
        assert!(!registry.is_user_online("user_a"));
        assert!(rx_fast.try_recv().is_ok());
        assert!(rx_fast.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_closed_peer_does_not_error_broadcast() {
        let registry = Arc::new(ConnectionRegistry::new());
        let rx_dropped = register(&registry, "conn_a", "user_a", 8);
        drop(rx_dropped);
        let mut rx_live = register(&registry, "conn_b", "user_b", 8);

        let broadcaster = EventBroadcaster::new(registry.clone());
        broadcaster.emit(CommentEvent::Created(sample_view("c1")));

        assert!(rx_live.try_recv().is_ok());
        assert_eq!(registry.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_send_to_user_targets_private_group() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut rx_a = register(&registry, "conn_a", "user_a", 8);
        let mut rx_b = register(&registry, "conn_b", "user_b", 8);

        let broadcaster = EventBroadcaster::new(registry);
        let envelope = CommentEvent::Created(sample_view("c1")).into_envelope();
        broadcaster.send_to_user("user_a", envelope);

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_user_group_name() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = ConnectionHandle::new(
            "conn_1".to_string(),
            "user_1".to_string(),
            "alice".to_string(),
            tx,
        );
        assert_eq!(handle.user_group(), "user:user_1");
    }
}

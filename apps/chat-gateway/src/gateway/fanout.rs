//! Fan-out: pick the connections that should see a chat event and deliver it.
//!
//! The frame is encoded once and written to every recipient concurrently, so
//! one slow reader delays a broadcast by at most the per-send timeout.

use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;

use super::connection::Connection;
use super::error::ConnectionError;
use super::events::{self, EventType};
use super::registry::ConnectionRegistry;

/// Live connections eligible for `chat_id`, minus `exclude` (a connection id).
pub fn recipients(
    registry: &ConnectionRegistry,
    chat_id: u64,
    exclude: Option<&str>,
) -> Vec<Arc<Connection>> {
    registry
        .snapshot()
        .into_iter()
        .filter(|conn| !conn.is_closed())
        .filter(|conn| exclude != Some(conn.id()))
        .filter(|conn| conn.is_eligible_for(chat_id))
        .collect()
}

/// Deliver one event to every eligible connection.
///
/// Per-recipient failures are logged and skipped. Returns the number of
/// successful deliveries.
pub async fn broadcast<T: Serialize>(
    registry: &ConnectionRegistry,
    chat_id: u64,
    exclude: Option<&str>,
    event_type: EventType,
    data: &T,
) -> Result<usize, ConnectionError> {
    let frame = events::encode(event_type, data)?;
    let targets = recipients(registry, chat_id, exclude);

    let sends = targets.iter().map(|conn| {
        let frame = frame.clone();
        async move { (conn, conn.send_frame(frame).await) }
    });

    let mut delivered = 0usize;
    for (conn, result) in join_all(sends).await {
        match result {
            Ok(()) => delivered += 1,
            Err(err) => {
                tracing::warn!(conn_id = %conn.id(), chat_id, %err, "broadcast send failed");
            }
        }
    }

    tracing::debug!(
        event_type = event_type.code(),
        chat_id,
        recipients = targets.len(),
        delivered,
        "broadcast event"
    );

    Ok(delivered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::user::{Session, User, USER_ROLE};
    use crate::gateway::transport::memory::{self, MemoryPeer};
    use std::time::Duration;

    fn connection(user_id: u64) -> (Arc<Connection>, MemoryPeer) {
        let now = chrono::Utc::now();
        let session = Session {
            id: format!("ses_{user_id}"),
            user: User {
                id: user_id,
                email: String::new(),
                username: format!("u{user_id}"),
                role: USER_ROLE,
                first_name: String::new(),
                last_name: String::new(),
                about_me: String::new(),
                created_at: now,
                updated_at: now,
            },
        };
        let (reader, writer, peer) = memory::pair();
        let conn = Connection::new(session, Box::new(reader), Box::new(writer), Duration::from_secs(1));
        (conn, peer)
    }

    #[tokio::test]
    async fn only_eligible_connections_receive() {
        let registry = ConnectionRegistry::new();
        let (viewing, mut viewing_peer) = connection(1);
        let (subscribed, mut subscribed_peer) = connection(2);
        let (other, mut other_peer) = connection(3);
        viewing.set_current_chat(10);
        subscribed.set_subscribed_chats([10]);
        other.set_current_chat(11);
        for conn in [&viewing, &subscribed, &other] {
            registry.insert(Arc::clone(conn));
        }

        let delivered = broadcast(&registry, 10, None, EventType::CreateMessage, &"hi")
            .await
            .unwrap();

        assert_eq!(delivered, 2);
        assert!(viewing_peer.try_recv().is_some());
        assert!(subscribed_peer.try_recv().is_some());
        assert!(other_peer.try_recv().is_none());
    }

    #[tokio::test]
    async fn excluded_connection_is_skipped() {
        let registry = ConnectionRegistry::new();
        let (sender, mut sender_peer) = connection(1);
        let (peer_conn, mut peer_peer) = connection(2);
        sender.set_current_chat(10);
        peer_conn.set_current_chat(10);
        registry.insert(sender.clone());
        registry.insert(peer_conn.clone());

        let delivered = broadcast(&registry, 10, Some(sender.id()), EventType::CreateMessage, &1u64)
            .await
            .unwrap();

        assert_eq!(delivered, 1);
        assert!(sender_peer.try_recv().is_none());
        assert!(peer_peer.try_recv().is_some());
    }

    #[tokio::test]
    async fn failed_recipient_does_not_abort_fan_out() {
        let registry = ConnectionRegistry::new();
        let (broken, broken_peer) = connection(1);
        let (healthy, mut healthy_peer) = connection(2);
        broken.set_current_chat(10);
        healthy.set_current_chat(10);
        registry.insert(broken.clone());
        registry.insert(healthy.clone());

        // Dropping the client end makes writes to `broken` fail.
        drop(broken_peer);

        let delivered = broadcast(&registry, 10, None, EventType::CreateMessage, &"x")
            .await
            .unwrap();

        assert_eq!(delivered, 1);
        assert!(healthy_peer.try_recv().is_some());
        assert!(broken.is_closed());
    }

    #[tokio::test]
    async fn closed_connections_are_not_targeted() {
        let registry = ConnectionRegistry::new();
        let (conn, _peer) = connection(1);
        conn.set_current_chat(10);
        registry.insert(conn.clone());
        conn.close().await;

        assert!(recipients(&registry, 10, None).is_empty());
    }
}

use crate::{
    message::{Message, PushEvent},
    presence::PresenceRegistry,
};
use std::sync::Arc;
use tracing::debug;

/// Routes a freshly persisted message to the recipient's live connection.
///
/// Delivery is best-effort: exactly one push attempt, no queue, no retry.
/// A recipient without a live connection catches up from the store on the
/// next fetch.
#[derive(Clone)]
pub struct DeliveryRouter {
    presence: Arc<PresenceRegistry>,
}

impl DeliveryRouter {
    pub fn new(presence: Arc<PresenceRegistry>) -> Self {
        Self { presence }
    }

    /// Push `message` to its receiver, if they are connected. Must only be
    /// called after the message has been durably appended. Never blocks and
    /// never fails the caller.
    pub fn deliver(&self, message: &Message) {
        let Some(conn) = self.presence.lookup(&message.receiver_id) else {
            debug!(
                "Recipient {} offline, dropping push for message {}",
                message.receiver_id, message.id
            );
            return;
        };

        match conn.push(PushEvent::NewMessage(message.clone())) {
            Ok(()) => debug!(
                "Pushed message {} to connection {}",
                message.id,
                conn.id()
            ),
            // The connection died but its disconnect hasn't been processed
            // yet; the registry entry will be reaped by unregister.
            Err(_) => debug!(
                "Connection {} for {} already closed, dropping push",
                conn.id(),
                message.receiver_id
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::{Connection, ConnectionId};
    use chrono::Utc;
    use tokio::sync::mpsc;

    fn message(sender: &str, receiver: &str) -> Message {
        Message {
            id: "m1".into(),
            sender_id: sender.into(),
            receiver_id: receiver.into(),
            text: Some("hello".into()),
            image_url: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn delivers_exactly_once_to_connected_recipient() {
        let presence = Arc::new(PresenceRegistry::new());
        let router = DeliveryRouter::new(presence.clone());

        let (tx, mut rx) = mpsc::unbounded_channel();
        presence.register("bob", Connection::new(ConnectionId::new(), tx));

        router.deliver(&message("alice", "bob"));

        let PushEvent::NewMessage(received) = rx.recv().await.unwrap();
        assert_eq!(received.id, "m1");
        // One append, one push.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn offline_recipient_is_a_silent_miss() {
        let presence = Arc::new(PresenceRegistry::new());
        let router = DeliveryRouter::new(presence);

        // No connection for bob; nothing to observe, nothing panics.
        router.deliver(&message("alice", "bob"));
    }

    #[tokio::test]
    async fn closed_channel_does_not_fail_the_send_path() {
        let presence = Arc::new(PresenceRegistry::new());
        let router = DeliveryRouter::new(presence.clone());

        let (tx, rx) = mpsc::unbounded_channel();
        presence.register("bob", Connection::new(ConnectionId::new(), tx));
        drop(rx);

        router.deliver(&message("alice", "bob"));
    }

    #[tokio::test]
    async fn push_goes_to_the_latest_connection() {
        let presence = Arc::new(PresenceRegistry::new());
        let router = DeliveryRouter::new(presence.clone());

        let (old_tx, mut old_rx) = mpsc::unbounded_channel();
        let (new_tx, mut new_rx) = mpsc::unbounded_channel();
        presence.register("bob", Connection::new(ConnectionId::new(), old_tx));
        presence.register("bob", Connection::new(ConnectionId::new(), new_tx));

        router.deliver(&message("alice", "bob"));

        assert!(old_rx.try_recv().is_err());
        let PushEvent::NewMessage(received) = new_rx.recv().await.unwrap();
        assert_eq!(received.receiver_id, "bob");
    }
}

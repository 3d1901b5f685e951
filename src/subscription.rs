//! Client-side view of the real-time channel.
//!
//! The transport task that reads the server's event stream decodes each
//! event and publishes it into a [`PushFeed`]. A [`ConversationView`] owns
//! at most one listener over that feed, filtered to the currently open
//! conversation; everything else is discarded, because switching
//! conversations re-fetches history from the server instead of replaying a
//! backlog.

use crate::message::{Message, PushEvent};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// Fan-out point for push events decoded from the live connection.
pub struct PushFeed {
    tx: broadcast::Sender<PushEvent>,
}

impl PushFeed {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(100);
        Self { tx }
    }

    /// Publish a decoded event. Ignores the error when nobody listens.
    pub fn publish(&self, event: PushEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.tx.subscribe()
    }
}

impl Default for PushFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// A live listener for one conversation. Accepts pushes whose sender is the
/// selected peer and appends them to the transcript channel; drops
/// everything else. Aborting on drop guarantees the listener dies on every
/// exit path.
pub struct ConversationSubscription {
    peer_id: String,
    listener: JoinHandle<()>,
}

impl ConversationSubscription {
    fn open(feed: &PushFeed, peer_id: String, transcript: mpsc::UnboundedSender<Message>) -> Self {
        let mut rx = feed.subscribe();
        let selected = peer_id.clone();

        let listener = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(PushEvent::NewMessage(msg)) => {
                        if msg.sender_id != selected {
                            continue;
                        }
                        // Unbounded send keeps acceptance O(1); the UI side
                        // drains the transcript at its own pace.
                        if transcript.send(msg).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        // Missed events are recovered by the next re-fetch.
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Self { peer_id, listener }
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }
}

impl Drop for ConversationSubscription {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// Selected-conversation state machine: `Unsubscribed` until a conversation
/// is opened, then `Subscribed(peer)` with exactly one live listener.
pub struct ConversationView {
    feed: Arc<PushFeed>,
    active: Option<ConversationSubscription>,
}

impl ConversationView {
    pub fn new(feed: Arc<PushFeed>) -> Self {
        Self { feed, active: None }
    }

    /// Open a conversation. The previous listener, if any, is torn down
    /// before the new one is installed, so two listeners never overlap and
    /// messages are never rendered twice.
    pub fn select(
        &mut self,
        peer_id: impl Into<String>,
        transcript: mpsc::UnboundedSender<Message>,
    ) {
        self.active = None;
        self.active = Some(ConversationSubscription::open(
            &self.feed,
            peer_id.into(),
            transcript,
        ));
    }

    /// Close the open conversation, tearing down its listener.
    pub fn close(&mut self) {
        self.active = None;
    }

    pub fn selected_peer(&self) -> Option<&str> {
        self.active.as_ref().map(|sub| sub.peer_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn push_from(sender: &str, text: &str) -> PushEvent {
        PushEvent::NewMessage(Message {
            id: format!("{sender}-{text}"),
            sender_id: sender.into(),
            receiver_id: "me".into(),
            text: Some(text.into()),
            image_url: None,
            created_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn accepts_only_the_selected_peer() {
        let feed = Arc::new(PushFeed::new());
        let mut view = ConversationView::new(feed.clone());
        let (tx, mut transcript) = mpsc::unbounded_channel();

        view.select("x", tx);
        feed.publish(push_from("y", "not for this view"));
        feed.publish(push_from("x", "hello"));

        let msg = transcript.recv().await.unwrap();
        assert_eq!(msg.sender_id, "x");
        assert!(transcript.try_recv().is_err());
    }

    #[tokio::test]
    async fn switching_peers_replaces_the_listener() {
        let feed = Arc::new(PushFeed::new());
        let mut view = ConversationView::new(feed.clone());

        let (tx_x, _transcript_x) = mpsc::unbounded_channel();
        view.select("x", tx_x);

        let (tx_y, mut transcript_y) = mpsc::unbounded_channel();
        view.select("y", tx_y);
        assert_eq!(view.selected_peer(), Some("y"));

        // A push from x after the switch is discarded, not queued.
        feed.publish(push_from("x", "late"));
        feed.publish(push_from("y", "current"));

        let msg = transcript_y.recv().await.unwrap();
        assert_eq!(msg.sender_id, "y");
        assert!(transcript_y.try_recv().is_err());
    }

    #[tokio::test]
    async fn reselecting_does_not_duplicate_messages() {
        let feed = Arc::new(PushFeed::new());
        let mut view = ConversationView::new(feed.clone());
        let (tx, mut transcript) = mpsc::unbounded_channel();

        view.select("x", tx.clone());
        view.select("x", tx);
        feed.publish(push_from("x", "once"));

        let msg = transcript.recv().await.unwrap();
        assert_eq!(msg.text.as_deref(), Some("once"));
        assert!(transcript.try_recv().is_err());
    }

    #[tokio::test]
    async fn close_and_drop_tear_down_the_listener() {
        let feed = Arc::new(PushFeed::new());
        let mut view = ConversationView::new(feed.clone());
        let (tx, mut transcript) = mpsc::unbounded_channel();

        view.select("x", tx);
        view.close();
        assert_eq!(view.selected_peer(), None);

        feed.publish(push_from("x", "into the void"));
        // The listener held the only transcript sender; teardown closes it.
        assert!(transcript.recv().await.is_none());
    }
}

use crate::message::PushEvent;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque identifier for a single live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// A handle to one live connection: its identity plus the channel the
/// transport drains into the wire.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<PushEvent>,
}

impl Connection {
    pub fn new(id: ConnectionId, tx: mpsc::UnboundedSender<PushEvent>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue an event for the connection. Non-blocking; fails only if the
    /// transport side has already dropped the receiver.
    pub fn push(&self, event: PushEvent) -> Result<(), PushEvent> {
        self.tx.send(event).map_err(|e| e.0)
    }
}

/// Process-wide map from user id to their single live connection.
///
/// Presence is transient: the registry starts empty and is rebuilt from
/// connection lifecycle events only, nothing is persisted. A multi-instance
/// deployment would need an external presence layer instead of this map.
pub struct PresenceRegistry {
    entries: Mutex<HashMap<String, Connection>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Associate a user with a connection, replacing any prior association.
    /// A replaced connection is not closed here; it just stops receiving
    /// routed pushes (known limitation of single-connection presence).
    pub fn register(&self, user_id: impl Into<String>, conn: Connection) {
        let user_id = user_id.into();
        let mut entries = self.entries.lock().unwrap();
        if let Some(prev) = entries.insert(user_id.clone(), conn) {
            tracing::debug!(
                "Replaced connection {} for user {} (last writer wins)",
                prev.id(),
                user_id
            );
        }
    }

    /// Remove the mapping that still points at `conn_id`.
    ///
    /// If the user reconnected before this disconnect event arrived, the
    /// stored connection id no longer matches and the call is a no-op, so a
    /// late disconnect never tears down a newer connection. Idempotent.
    pub fn unregister(&self, conn_id: ConnectionId) {
        let mut entries = self.entries.lock().unwrap();
        let user = entries
            .iter()
            .find(|(_, conn)| conn.id() == conn_id)
            .map(|(user, _)| user.clone());
        if let Some(user) = user {
            entries.remove(&user);
            tracing::debug!("Unregistered connection {} for user {}", conn_id, user);
        }
    }

    /// Resolve a user's live connection, if any. Pure read.
    pub fn lookup(&self, user_id: &str) -> Option<Connection> {
        self.entries.lock().unwrap().get(user_id).cloned()
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

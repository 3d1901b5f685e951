use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::request::Parts,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{debug, error, info};

use crate::{
    assets::AssetStore,
    delivery::DeliveryRouter,
    error::ApiError,
    message::{Message, PushEvent, SendMessage},
    presence::{Connection, ConnectionId, PresenceRegistry},
    sidebar::{self, SidebarEntry},
    store::Store,
};

// -----------------------------------------------------------------------------
// Server state
// -----------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub presence: Arc<PresenceRegistry>,
    pub delivery: DeliveryRouter,
    pub assets: Arc<dyn AssetStore>,
}

/// Identity of the acting user, supplied by the external auth layer in the
/// `x-user-id` header and trusted unconditionally.
pub struct AuthUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| AuthUser(value.to_string()))
            .ok_or(ApiError::Unauthorized)
    }
}

// -----------------------------------------------------------------------------
// Implementation
// -----------------------------------------------------------------------------

pub struct ChatServer {
    state: AppState,
    assets_dir: PathBuf,
}

impl ChatServer {
    pub fn new(
        store: Store,
        presence: Arc<PresenceRegistry>,
        assets: Arc<dyn AssetStore>,
        assets_dir: impl Into<PathBuf>,
    ) -> Self {
        let delivery = DeliveryRouter::new(presence.clone());
        Self {
            state: AppState {
                store,
                presence,
                delivery,
                assets,
            },
            assets_dir: assets_dir.into(),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/messages/users", get(sidebar_handler))
            .route("/messages/send/:peer_id", post(send_handler))
            .route("/messages/:peer_id", get(conversation_handler))
            .route("/events", get(events_handler))
            .nest_service("/assets", ServeDir::new(&self.assets_dir))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }
}

// -----------------------------------------------------------------------------
// Handlers
// -----------------------------------------------------------------------------

async fn sidebar_handler(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
) -> Result<Json<Vec<SidebarEntry>>, ApiError> {
    Ok(Json(sidebar::sidebar(&state.store, &viewer).await?))
}

/// Conversation history with a peer, oldest first. An unknown peer is just
/// an empty conversation, never a 404.
async fn conversation_handler(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(peer_id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    Ok(Json(state.store.list_conversation(&viewer, &peer_id).await?))
}

async fn send_handler(
    State(state): State<AppState>,
    AuthUser(sender): AuthUser,
    Path(peer_id): Path<String>,
    Json(body): Json<SendMessage>,
) -> Result<Json<Message>, ApiError> {
    // Inline images go through the upload collaborator first; an upload
    // failure aborts the send before anything is persisted.
    let image_url = match &body.image {
        Some(data) => Some(state.assets.upload(data).await.map_err(ApiError::Upload)?),
        None => None,
    };

    let message = state
        .store
        .append_message(&sender, &peer_id, body.text.as_deref(), image_url)
        .await?;

    // Best-effort push; the sender's response never waits on it.
    state.delivery.deliver(&message);

    Ok(Json(message))
}

/// Unregisters the connection when its event stream is dropped, whatever
/// the exit path (client disconnect, transport failure, shutdown).
struct PresenceGuard {
    presence: Arc<PresenceRegistry>,
    conn_id: ConnectionId,
}

impl Drop for PresenceGuard {
    fn drop(&mut self) {
        self.presence.unregister(self.conn_id);
        debug!("Connection {} closed", self.conn_id);
    }
}

/// Connection-scoped event stream. Registering here is what makes the user
/// reachable for real-time pushes.
async fn events_handler(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Sse<impl Stream<Item = Result<Event, axum::BoxError>>> {
    let conn_id = ConnectionId::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    state
        .presence
        .register(user_id.as_str(), Connection::new(conn_id, tx));
    info!("User {} connected on {}", user_id, conn_id);

    let guard = PresenceGuard {
        presence: state.presence.clone(),
        conn_id,
    };

    let stream = async_stream::stream! {
        let _guard = guard;

        while let Some(event) = rx.recv().await {
            let encoded = match &event {
                PushEvent::NewMessage(message) => {
                    Event::default().event(event.name()).json_data(message)
                }
            };
            match encoded {
                Ok(sse_event) => yield Ok(sse_event),
                Err(e) => {
                    error!("Failed to encode push event: {}", e);
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

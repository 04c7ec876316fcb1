//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//!
//! Each connection is one client instance: it owns at most one offline
//! countdown and forwards change notifications for the collections it
//! subscribed to. The caller's offline sessions are always watched so that a
//! start or end on another device restarts or stops this countdown.

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use ewaste_core::{
    domain::AuthContext,
    feed::{Collection, Invalidated, Subscription},
    offline::{format_remaining, Countdown, CountdownRunner, Tick},
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, auth.user_id))
}

/// Per-connection state.
struct Connection {
    app_state: Arc<AppState>,
    user_id: Uuid,
    /// Collections the client asked for; a subset of what the subscription watches.
    requested: HashSet<Collection>,
    countdown: CountdownRunner,
    ticks: mpsc::UnboundedSender<Tick>,
}

impl Connection {
    /// Restarts the countdown from the active session, or stops it when there is none.
    /// Returns the frame announcing the new state, if it changed.
    async fn sync_countdown(&mut self) -> Option<ServerMessage> {
        let was_running = self.countdown.is_running();
        match self.app_state.offline.check_active(self.user_id).await {
            Some(session) => {
                let countdown = Countdown::for_session(&session, self.app_state.offline.now());
                let remaining = countdown.remaining();
                self.countdown.restart(
                    self.app_state.offline.clone(),
                    self.user_id,
                    countdown,
                    self.ticks.clone(),
                );
                Some(ServerMessage::OfflineTick {
                    remaining_seconds: remaining,
                    display: format_remaining(remaining),
                })
            }
            None => {
                self.countdown.stop();
                was_running.then_some(ServerMessage::OfflineEnded)
            }
        }
    }
}

async fn send<S>(sender: &mut S, message: &ServerMessage) -> Result<(), axum::Error>
where
    S: Sink<Message> + Unpin,
    S::Error: Into<axum::BoxError>,
{
    let json = serde_json::to_string(message).map_err(axum::Error::new)?;
    sender
        .send(Message::Text(json.into()))
        .await
        .map_err(axum::Error::new)
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user_id: Uuid) {
    let (sender, receiver) = socket.split();
    run_connection(sender, receiver, app_state, user_id).await;
}

/// Drives one client connection until it closes. The socket halves are taken
/// as a plain sink and stream so any transport can carry the protocol.
pub async fn run_connection<S, R>(
    mut sender: S,
    mut receiver: R,
    app_state: Arc<AppState>,
    user_id: Uuid,
) where
    S: Sink<Message> + Unpin,
    S::Error: Into<axum::BoxError>,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    info!("New WebSocket connection established for user: {}", user_id);

    let mut subscription = app_state
        .feed
        .subscribe_to(Collection::OfflineSessions, user_id);
    let (ticks, mut tick_rx) = mpsc::unbounded_channel();
    let mut conn = Connection {
        app_state,
        user_id,
        requested: HashSet::new(),
        countdown: CountdownRunner::new(),
        ticks,
    };

    // Pick up a window that is already running.
    if let Some(frame) = conn.sync_countdown().await {
        if send(&mut sender, &frame).await.is_err() {
            return;
        }
    }

    loop {
        let outgoing: Vec<ServerMessage> = tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ClientMessage>(text.as_str()) {
                        Ok(message) => handle_client_message(message, &mut conn, &mut subscription).await,
                        Err(e) => {
                            warn!("Failed to deserialize client message: {}", e);
                            vec![ServerMessage::Error { message: format!("Unrecognised message: {}", e) }]
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("Client disconnected.");
                    break;
                }
                Some(Ok(_)) => Vec::new(),
                Some(Err(e)) => {
                    warn!("WebSocket receive error for {}: {}", user_id, e);
                    break;
                }
            },
            invalidated = subscription.next_invalidation() => match invalidated {
                Some(Invalidated::One(collection)) => {
                    let mut frames = Vec::new();
                    if collection == Collection::OfflineSessions {
                        frames.extend(conn.sync_countdown().await);
                    }
                    if conn.requested.contains(&collection) {
                        frames.push(ServerMessage::Invalidate { collection });
                    }
                    frames
                }
                Some(Invalidated::All) => {
                    let mut frames: Vec<ServerMessage> = conn.sync_countdown().await.into_iter().collect();
                    frames.push(ServerMessage::InvalidateAll);
                    frames
                }
                None => {
                    warn!("Change feed closed; dropping connection for {}", user_id);
                    break;
                }
            },
            Some(tick) = tick_rx.recv() => match tick {
                Tick::Running(remaining) => vec![ServerMessage::OfflineTick {
                    remaining_seconds: remaining,
                    display: format_remaining(remaining),
                }],
                Tick::Expired | Tick::Stopped => vec![ServerMessage::OfflineEnded],
            },
        };

        for frame in &outgoing {
            if let Err(e) = send(&mut sender, frame).await {
                debug!("Failed to send to {}: {}", user_id, e);
                conn.countdown.stop();
                return;
            }
        }
    }

    conn.countdown.stop();
    info!("WebSocket connection closed.");
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_client_message(
    message: ClientMessage,
    conn: &mut Connection,
    subscription: &mut Subscription,
) -> Vec<ServerMessage> {
    match message {
        ClientMessage::Subscribe { collection } => {
            conn.requested.insert(collection);
            subscription.watch(collection);
            vec![ServerMessage::Subscribed { collection }]
        }
        ClientMessage::Unsubscribe { collection } => {
            conn.requested.remove(&collection);
            if collection != Collection::OfflineSessions {
                subscription.unwatch(collection);
            }
            vec![ServerMessage::Unsubscribed { collection }]
        }
        ClientMessage::StartCountdown => match conn.sync_countdown().await {
            Some(tick @ ServerMessage::OfflineTick { .. }) => vec![tick],
            ended => ended
                .into_iter()
                .chain(std::iter::once(ServerMessage::Error {
                    message: "Offline mode is not active".to_string(),
                }))
                .collect(),
        },
        ClientMessage::StopCountdown => {
            conn.countdown.stop();
            Vec::new()
        }
    }
}

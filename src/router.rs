//! Thin dispatch from decoded wire messages to registry and session
//! operations. No game logic lives here.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::board::Mark;
use crate::net::ClientConnection;
use crate::registry::GameRegistry;
use crate::session::Opponent;
use crate::wire::{ClientMessage, GameMode, ServerMessage};

/// Name used when a client omits one, matching the original protocol.
const DEFAULT_NAME: &str = "Anonymous";

/// Routes one raw inbound frame.
///
/// Malformed or unknown frames are logged and dropped; the connection
/// stays alive. Frames naming an unknown session are answered with an
/// `error` where the client needs to know (join) and dropped silently
/// where its session id may simply be stale (reconnect, move, restart).
pub async fn handle_message(
    registry: &Arc<GameRegistry>,
    conn: &Arc<ClientConnection>,
    raw: &str,
) {
    if raw.trim().is_empty() {
        return;
    }
    let message: ClientMessage = match serde_json::from_str(raw) {
        Ok(message) => message,
        Err(err) => {
            warn!(peer = %conn.remote_addr(), error = %err, frame = %raw, "undecodable message dropped");
            return;
        }
    };

    match message {
        ClientMessage::CreateGame { name, game_mode } => {
            create(registry, conn, game_mode.unwrap_or_default(), Opponent::Human, name).await;
        }
        ClientMessage::CreateAiGame { name, game_mode } => {
            create(registry, conn, game_mode.unwrap_or_default(), Opponent::Computer, name).await;
        }
        ClientMessage::JoinGame { name, game_id } => {
            join(registry, conn, &game_id, name).await;
        }
        ClientMessage::Reconnect {
            game_id,
            player_symbol,
            name,
        } => {
            reconnect(registry, conn, &game_id, player_symbol, name).await;
        }
        ClientMessage::Move { game_id, row, col } => {
            if let Some(session) = registry.get(&game_id) {
                session.lock().await.handle_move(conn, row, col).await;
            } else {
                debug!(game_id = %game_id, "move for unknown game dropped");
            }
        }
        ClientMessage::Restart { game_id } => {
            if let Some(session) = registry.get(&game_id) {
                session.lock().await.restart().await;
            } else {
                debug!(game_id = %game_id, "restart for unknown game dropped");
            }
        }
    }
}

async fn create(
    registry: &Arc<GameRegistry>,
    conn: &Arc<ClientConnection>,
    mode: GameMode,
    opponent: Opponent,
    name: Option<String>,
) {
    let (game_id, session) = registry.create_game(mode, opponent);
    let mut session = session.lock().await;
    // A freshly created session always has room for its creator.
    let Ok(symbol) = session.join(conn, name.unwrap_or_else(|| DEFAULT_NAME.to_string())) else {
        return;
    };
    send_or_log(
        conn,
        &ServerMessage::GameCreated {
            game_id,
            player_symbol: symbol,
        },
    )
    .await;
    if opponent == Opponent::Computer {
        // AI sessions are playable immediately; show the empty board.
        session.broadcast().await;
    }
}

async fn join(
    registry: &Arc<GameRegistry>,
    conn: &Arc<ClientConnection>,
    game_id: &str,
    name: Option<String>,
) {
    let Some(session) = registry.get(game_id) else {
        send_or_log(
            conn,
            &ServerMessage::Error {
                message: "Game not found.".to_string(),
            },
        )
        .await;
        return;
    };
    let mut session = session.lock().await;
    match session.join(conn, name.unwrap_or_else(|| DEFAULT_NAME.to_string())) {
        Ok(symbol) => {
            send_or_log(
                conn,
                &ServerMessage::GameJoined {
                    game_id: game_id.to_string(),
                    player_symbol: symbol,
                },
            )
            .await;
            if session.connection_count() == 2 {
                session.broadcast().await;
            }
        }
        Err(full) => {
            send_or_log(
                conn,
                &ServerMessage::Error {
                    message: full.to_string(),
                },
            )
            .await;
        }
    }
}

async fn reconnect(
    registry: &Arc<GameRegistry>,
    conn: &Arc<ClientConnection>,
    game_id: &str,
    symbol: Mark,
    name: Option<String>,
) {
    // The client's cached session id may be stale; that is not an error.
    let Some(session) = registry.get(game_id) else {
        debug!(game_id, "reconnect to unknown game ignored");
        return;
    };
    let mut session = session.lock().await;
    if session.reconnect(conn, symbol, name.unwrap_or_else(|| DEFAULT_NAME.to_string())) {
        // Restore the reconnecting client's view of the board.
        session.broadcast().await;
    }
}

/// Routes a departed connection through its session's disconnect path
/// and starts the grace timer when the session empties.
pub async fn handle_disconnect(registry: &Arc<GameRegistry>, conn: &Arc<ClientConnection>) {
    let Some(game_id) = conn.game_id() else {
        return;
    };
    let Some(session) = registry.get(&game_id) else {
        return;
    };
    let mut session = session.lock().await;
    if session.remove_client(conn) {
        let grace = Duration::from_secs(registry.config().grace_secs);
        let task = tokio::spawn(expire_session(
            Arc::clone(registry),
            game_id.clone(),
            grace,
        ));
        session.set_grace_timer(task.abort_handle());
        info!(game_id = %game_id, grace_secs = grace.as_secs(), "session empty, grace period started");
    }
}

/// Removes the session once the grace period elapses, unless someone
/// reconnected in the meantime.
async fn expire_session(registry: Arc<GameRegistry>, game_id: String, grace: Duration) {
    tokio::time::sleep(grace).await;
    let Some(session) = registry.get(&game_id) else {
        return;
    };
    if session.lock().await.is_empty() {
        registry.remove(&game_id);
        info!(game_id = %game_id, "grace period expired, session removed");
    }
}

/// A reply that fails because the peer vanished is treated as peer
/// departure; the peer's own read loop tears the connection down.
async fn send_or_log(conn: &Arc<ClientConnection>, message: &ServerMessage) {
    if let Err(err) = conn.send(message).await {
        debug!(peer = %conn.remote_addr(), error = %err, "reply delivery failed");
    }
}

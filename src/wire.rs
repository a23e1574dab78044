//! JSON wire protocol shared by both transports.
//!
//! Every frame is one JSON object with a `type` discriminator. The TCP
//! transport carries one object per newline-terminated line, the
//! WebSocket transport one object per text message; the payloads are
//! identical.

use serde::{Deserialize, Serialize};

use crate::board::{MacroCell, Mark};

/// Board variant selector carried on `create_game` / `create_ai_game`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    /// Flat 3x3 board.
    #[default]
    Standard,
    /// Nine micro-grids plus a macro-grid.
    Ultimate,
}

impl GameMode {
    /// The string persisted in the `game_mode` results column.
    pub fn as_str(self) -> &'static str {
        match self {
            GameMode::Standard => "standard",
            GameMode::Ultimate => "ultimate",
        }
    }
}

/// Messages a client may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Open a new two-player session and join it.
    #[serde(rename = "create_game")]
    CreateGame {
        /// Display name of the creating player.
        name: Option<String>,
        /// Board variant; omitted means standard.
        game_mode: Option<GameMode>,
    },
    /// Open a new session against the computer and join it.
    #[serde(rename = "create_ai_game")]
    CreateAiGame {
        /// Display name of the human player.
        name: Option<String>,
        /// Board variant; omitted means standard.
        game_mode: Option<GameMode>,
    },
    /// Join an existing session by its code.
    #[serde(rename = "join_game")]
    JoinGame {
        /// Display name of the joining player.
        name: Option<String>,
        /// Session code as returned in `game_created`.
        game_id: String,
    },
    /// Re-bind a symbol in an existing session to this connection.
    #[serde(rename = "reconnect")]
    Reconnect {
        /// Session code.
        game_id: String,
        /// The symbol being re-claimed.
        player_symbol: Mark,
        /// Display name to restore.
        name: Option<String>,
    },
    /// Claim a cell. Ultimate boards use absolute 0..=8 coordinates.
    #[serde(rename = "move")]
    Move {
        /// Session code.
        game_id: String,
        /// Row of the target cell.
        row: usize,
        /// Column of the target cell.
        col: usize,
    },
    /// Reset the session's board, clocks, and turn in place.
    #[serde(rename = "restart")]
    Restart {
        /// Session code.
        game_id: String,
    },
}

/// Messages the server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// A session was created for the sender.
    #[serde(rename = "game_created")]
    GameCreated {
        /// Code other players use to join.
        game_id: String,
        /// Symbol assigned to the sender.
        player_symbol: Mark,
    },
    /// The sender joined an existing session.
    #[serde(rename = "game_joined")]
    GameJoined {
        /// Session code.
        game_id: String,
        /// Symbol assigned to the sender.
        player_symbol: Mark,
    },
    /// Full game state, broadcast to every member after any change.
    #[serde(rename = "gameState")]
    GameState {
        /// The state snapshot.
        state: GameStatePayload,
    },
    /// An explicit, non-fatal error for the sender.
    #[serde(rename = "error")]
    Error {
        /// Human-readable reason.
        message: String,
    },
}

/// Display names by symbol, as serialized in the state payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerNames {
    /// Name of player X, if the slot is taken.
    #[serde(rename = "X")]
    pub x: Option<String>,
    /// Name of player O, if the slot is taken.
    #[serde(rename = "O")]
    pub o: Option<String>,
}

/// Whole seconds left in each player's time bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRemaining {
    /// Seconds left for X.
    #[serde(rename = "X")]
    pub x: u64,
    /// Seconds left for O.
    #[serde(rename = "O")]
    pub o: u64,
}

/// Snapshot of one session's authoritative state.
///
/// Standard games carry `board`; ultimate games carry `micro_boards`,
/// `macro_board`, and `active_micro_board_coords` (whose inner `None`
/// means the next move is unconstrained).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStatePayload {
    /// Flat board, standard games only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board: Option<[[Option<Mark>; 3]; 3]>,
    /// The nine micro-grids, row-major, ultimate games only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub micro_boards: Option<Vec<[[Option<Mark>; 3]; 3]>>,
    /// Macro-grid of decided micro outcomes, ultimate games only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macro_board: Option<[[Option<MacroCell>; 3]; 3]>,
    /// Constrained micro-grid as `[row, col]`, `null` when unconstrained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_micro_board_coords: Option<Option<[usize; 2]>>,
    /// Symbol whose turn it is.
    pub current_player: Mark,
    /// True once the game has a final outcome.
    pub game_over: bool,
    /// Winning symbol; absent while running and on a draw.
    pub winner: Option<Mark>,
    /// Display names by symbol.
    pub player_names: PlayerNames,
    /// Remaining time banks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<TimeRemaining>,
}

//! Trigrid - real-time multiplayer tic-tac-toe backend.
//!
//! Serves two board variants (flat 3x3 and "ultimate", a 3x3 grid of
//! 3x3 sub-boards) over two transports at once: newline-framed JSON on
//! a TCP byte stream and the same JSON over WebSocket text messages.
//! Sessions support two humans or one human against the built-in search
//! engine, per-player time banks, and a disconnect grace period with
//! reconnection.
//!
//! # Architecture
//!
//! - **net**: one [`ClientConnection`] per peer, hiding the framing
//!   difference between the two transports; two accept loops.
//! - **board**: pure move application and win/draw detection.
//! - **ai**: exhaustive minimax (flat) and depth-limited alpha-beta
//!   (ultimate), run on the blocking pool so searches never stall other
//!   sessions.
//! - **session**: the per-game state machine: validation, clocks,
//!   broadcast, the computer opponent.
//! - **registry**: the owned map of live sessions.
//! - **router**: wire-message dispatch, thin glue only.
//! - **store**: the result-persistence collaborator boundary.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod ai;
mod board;
mod config;
mod net;
mod registry;
mod router;
mod session;
mod store;
mod wire;

// Crate-level exports - board engine
pub use board::{Grid, MacroCell, Mark, Outcome, UltimateBoard};

// Crate-level exports - AI search engine
pub use ai::{find_best_move, find_best_ultimate_move};

// Crate-level exports - configuration
pub use config::{Cli, ServerConfig};

// Crate-level exports - transport layer
pub use net::{BoxedIo, ClientConnection, ConnectionError, Transport, serve};

// Crate-level exports - sessions and registry
pub use registry::{GameRegistry, SharedSession};
pub use session::{GameSession, Opponent, SessionFull};

// Crate-level exports - message routing
pub use router::{handle_disconnect, handle_message};

// Crate-level exports - persistence boundary
pub use store::{GameRecord, RecordedOutcome, ResultStore, SqliteStore, StoreError};

// Crate-level exports - wire protocol
pub use wire::{
    ClientMessage, GameMode, GameStatePayload, PlayerNames, ServerMessage, TimeRemaining,
};

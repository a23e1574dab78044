//! The per-game session: authoritative state, move validation, clocks,
//! the computer opponent, and state broadcast.
//!
//! One session type covers all four variants (standard/ultimate crossed
//! with human/computer), parameterized at construction rather than
//! through a type hierarchy. All mutation goes through the session's own
//! operations; the registry holds each session behind an async mutex, so
//! operations on one session are totally ordered by lock acquisition
//! while other sessions keep scheduling.

use std::sync::Arc;

use derive_more::{Display, Error};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::ai;
use crate::board::{Grid, Mark, Outcome, UltimateBoard};
use crate::config::ServerConfig;
use crate::net::ClientConnection;
use crate::store::{GameRecord, RecordedOutcome, ResultStore};
use crate::wire::{GameMode, GameStatePayload, PlayerNames, ServerMessage, TimeRemaining};

/// Who sits in the O seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opponent {
    /// Two humans; both slots join over the network.
    Human,
    /// The AI search engine plays O; only one human may join.
    Computer,
}

/// The variant-specific board state.
#[derive(Debug, Clone, PartialEq)]
enum BoardState {
    Standard(Grid),
    Ultimate(UltimateBoard),
}

impl BoardState {
    fn fresh(mode: GameMode) -> Self {
        match mode {
            GameMode::Standard => BoardState::Standard(Grid::new()),
            GameMode::Ultimate => BoardState::Ultimate(UltimateBoard::new()),
        }
    }
}

/// Rejection when joining a session that cannot take another player.
#[derive(Debug, Clone, Copy, Display, Error)]
#[display("Game is full.")]
pub struct SessionFull;

/// One in-progress or finished game and everything it owns.
pub struct GameSession {
    id: String,
    mode: GameMode,
    opponent: Opponent,
    board: BoardState,
    current: Mark,
    game_over: bool,
    winner: Option<Mark>,
    name_x: Option<String>,
    name_o: Option<String>,
    connections: Vec<Arc<ClientConnection>>,
    bank_x: f64,
    bank_o: f64,
    initial_bank: f64,
    turn_started: Instant,
    grace_timer: Option<AbortHandle>,
    store: Arc<dyn ResultStore>,
}

impl GameSession {
    /// Creates a fresh session. AI sessions pre-assign O to the computer
    /// and are playable as soon as the one human joins.
    pub fn new(
        id: String,
        mode: GameMode,
        opponent: Opponent,
        config: &ServerConfig,
        store: Arc<dyn ResultStore>,
    ) -> Self {
        info!(game_id = %id, ?mode, ?opponent, "creating session");
        Self {
            id,
            mode,
            opponent,
            board: BoardState::fresh(mode),
            current: Mark::X,
            game_over: false,
            winner: None,
            name_x: None,
            name_o: match opponent {
                Opponent::Computer => Some("Computer".to_string()),
                Opponent::Human => None,
            },
            connections: Vec::new(),
            bank_x: config.time_bank_secs,
            bank_o: config.time_bank_secs,
            initial_bank: config.time_bank_secs,
            turn_started: Instant::now(),
            grace_timer: None,
            store,
        }
    }

    /// Session code.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Board variant.
    pub fn mode(&self) -> GameMode {
        self.mode
    }

    /// True once the game has a final outcome.
    pub fn is_over(&self) -> bool {
        self.game_over
    }

    /// Winning symbol, if the game finished with a winner.
    pub fn winner(&self) -> Option<Mark> {
        self.winner
    }

    /// Symbol whose turn it is.
    pub fn current_player(&self) -> Mark {
        self.current
    }

    /// Seconds left in `symbol`'s time bank.
    pub fn bank_secs(&self, symbol: Mark) -> f64 {
        match symbol {
            Mark::X => self.bank_x,
            Mark::O => self.bank_o,
        }
    }

    /// Number of live member connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// True when no connection is attached (grace-period territory).
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Assigns the first free symbol to `conn` (X before O).
    ///
    /// AI sessions reject any second human outright. Joining cancels a
    /// pending grace timer.
    #[instrument(skip(self, conn), fields(game_id = %self.id, peer = %conn.remote_addr()))]
    pub fn join(
        &mut self,
        conn: &Arc<ClientConnection>,
        name: String,
    ) -> Result<Mark, SessionFull> {
        let symbol = match self.opponent {
            Opponent::Computer => {
                if !self.connections.is_empty() {
                    warn!("AI session already has its human");
                    return Err(SessionFull);
                }
                Mark::X
            }
            Opponent::Human => {
                let taken = |m: Mark| self.connections.iter().any(|c| c.symbol() == Some(m));
                if !taken(Mark::X) {
                    Mark::X
                } else if !taken(Mark::O) {
                    Mark::O
                } else {
                    warn!("session already has 2 players");
                    return Err(SessionFull);
                }
            }
        };

        conn.register(self.id.clone(), symbol, name.clone());
        self.connections.push(Arc::clone(conn));
        self.set_name(symbol, name);
        self.cancel_grace_timer();
        if self.is_playable() {
            // The clock starts when the table is complete.
            self.turn_started = Instant::now();
        }
        info!(symbol = %symbol, "player joined");
        Ok(symbol)
    }

    /// Re-binds `symbol` to a new connection, replacing whatever
    /// connection currently holds it; last writer for a symbol wins.
    /// Cancels a pending grace timer.
    ///
    /// The computer's seat in an AI session is not reclaimable; such a
    /// reconnect is refused and the session left untouched. Returns true
    /// when the connection was bound.
    #[instrument(skip(self, conn), fields(game_id = %self.id, peer = %conn.remote_addr()))]
    pub fn reconnect(&mut self, conn: &Arc<ClientConnection>, symbol: Mark, name: String) -> bool {
        if self.opponent == Opponent::Computer && symbol == Mark::O {
            warn!("reconnect for the computer's seat refused");
            return false;
        }
        self.connections.retain(|c| c.symbol() != Some(symbol));
        conn.register(self.id.clone(), symbol, name.clone());
        self.connections.push(Arc::clone(conn));
        self.set_name(symbol, name);
        self.cancel_grace_timer();
        info!(symbol = %symbol, "player reconnected");
        true
    }

    /// Detaches a departed connection. Returns true when the session is
    /// now empty and the caller should start the grace timer.
    #[instrument(skip(self, conn), fields(game_id = %self.id, peer = %conn.remote_addr()))]
    pub fn remove_client(&mut self, conn: &Arc<ClientConnection>) -> bool {
        self.connections.retain(|c| !Arc::ptr_eq(c, conn));
        info!(remaining = self.connections.len(), "connection left session");
        self.connections.is_empty()
    }

    /// Stores the handle of the pending removal timer.
    ///
    /// Any previous timer is cancelled first, so rapid disconnect cycles
    /// never leave two timers racing.
    pub fn set_grace_timer(&mut self, handle: AbortHandle) {
        self.cancel_grace_timer();
        self.grace_timer = Some(handle);
    }

    /// Cancels the pending removal timer, if any. Aborting a timer that
    /// already fired or was already cancelled is a no-op.
    pub fn cancel_grace_timer(&mut self) {
        if let Some(timer) = self.grace_timer.take() {
            timer.abort();
            debug!(game_id = %self.id, "grace timer cancelled");
        }
    }

    /// Validates and applies a move from `conn`, then advances the turn,
    /// broadcasts, and (in AI sessions) plays the computer's reply.
    ///
    /// Illegal moves (game over, not the sender's turn, out of range,
    /// occupied cell, wrong micro-grid) are dropped silently: no state
    /// change, no broadcast, nothing surfaced to a stale or misbehaving
    /// client.
    #[instrument(skip(self, conn), fields(game_id = %self.id, peer = %conn.remote_addr()))]
    pub async fn handle_move(&mut self, conn: &Arc<ClientConnection>, row: usize, col: usize) {
        let Some(symbol) = conn.symbol() else {
            debug!("move from unregistered connection dropped");
            return;
        };
        if self.game_over || symbol != self.current {
            debug!(%symbol, current = %self.current, over = self.game_over, "move dropped");
            return;
        }

        let elapsed = self.turn_started.elapsed().as_secs_f64().max(0.0);
        if self.bank_secs(symbol) - elapsed <= 0.0 {
            info!(%symbol, elapsed, "time bank exhausted, move rejected");
            self.set_bank(symbol, 0.0);
            self.finish(Some(symbol.opponent()));
            self.broadcast().await;
            return;
        }

        let legal = match &self.board {
            BoardState::Standard(grid) => grid.is_open(row, col),
            BoardState::Ultimate(board) => board.is_legal(row, col),
        };
        if !legal {
            debug!(row, col, "illegal move dropped");
            return;
        }

        self.set_bank(symbol, self.bank_secs(symbol) - elapsed);
        let outcome = self.apply(row, col, symbol);
        match outcome {
            Outcome::Won(winner) => {
                self.finish(Some(winner));
                self.broadcast().await;
                return;
            }
            Outcome::Draw => {
                self.finish(None);
                self.broadcast().await;
                return;
            }
            Outcome::Ongoing => {
                self.current = self.current.opponent();
                self.turn_started = Instant::now();
                self.broadcast().await;
            }
        }

        if self.opponent == Opponent::Computer && !self.game_over {
            self.play_computer_turn().await;
        }
    }

    /// Runs the search engine for the computer's turn on a board
    /// snapshot, off the scheduling threads, then merges the move back.
    ///
    /// The session lock is held by the driving operation for the whole
    /// exchange, so the live board cannot change under the search; other
    /// sessions keep running because the search occupies only a blocking
    /// worker.
    async fn play_computer_turn(&mut self) {
        debug_assert_eq!(self.current, Mark::O, "computer always plays O");
        debug!(game_id = %self.id, "computer is thinking");
        let thinking_started = Instant::now();

        let searched = match &self.board {
            BoardState::Standard(grid) => {
                let snapshot = *grid;
                tokio::task::spawn_blocking(move || ai::find_best_move(snapshot, Mark::O)).await
            }
            BoardState::Ultimate(board) => {
                let snapshot = board.clone();
                tokio::task::spawn_blocking(move || {
                    ai::find_best_ultimate_move(snapshot, Mark::O)
                })
                .await
            }
        };
        let chosen = match searched {
            Ok(chosen) => chosen,
            Err(err) => {
                warn!(game_id = %self.id, error = %err, "search worker failed");
                None
            }
        };

        let thinking = thinking_started.elapsed().as_secs_f64().max(0.0);
        if self.bank_o - thinking <= 0.0 {
            info!(game_id = %self.id, thinking, "computer ran out of time");
            self.bank_o = 0.0;
            self.finish(Some(Mark::X));
            self.broadcast().await;
            return;
        }
        self.bank_o -= thinking;

        let Some((row, col)) = chosen else {
            // No legal move left: a drawn position, not an error.
            debug!(game_id = %self.id, "search yielded no move");
            self.finish(None);
            self.broadcast().await;
            return;
        };
        info!(game_id = %self.id, row, col, thinking, "computer chose a move");

        match self.apply(row, col, Mark::O) {
            Outcome::Won(winner) => self.finish(Some(winner)),
            Outcome::Draw => self.finish(None),
            Outcome::Ongoing => {
                self.current = Mark::X;
                self.turn_started = Instant::now();
            }
        }
        self.broadcast().await;
    }

    fn apply(&mut self, row: usize, col: usize, symbol: Mark) -> Outcome {
        match &mut self.board {
            BoardState::Standard(grid) => {
                grid.set(row, col, symbol);
                grid.outcome()
            }
            BoardState::Ultimate(board) => board.apply(row, col, symbol),
        }
    }

    /// Resets boards, clocks, and turn in place, keeping player
    /// identities and connections, then re-broadcasts.
    #[instrument(skip(self), fields(game_id = %self.id))]
    pub async fn restart(&mut self) {
        self.board = BoardState::fresh(self.mode);
        self.current = Mark::X;
        self.game_over = false;
        self.winner = None;
        self.bank_x = self.initial_bank;
        self.bank_o = self.initial_bank;
        self.turn_started = Instant::now();
        info!("session restarted");
        self.broadcast().await;
    }

    /// Sends the full current state to every member. A delivery failure
    /// for one member never blocks the others; the failing peer's own
    /// read loop observes the disconnect and tears it down.
    pub async fn broadcast(&self) {
        let message = ServerMessage::GameState {
            state: self.state_payload(),
        };
        for conn in &self.connections {
            if let Err(err) = conn.send(&message).await {
                debug!(peer = %conn.remote_addr(), error = %err, "broadcast delivery failed");
            }
        }
    }

    /// Snapshot of the session state as sent on the wire.
    pub fn state_payload(&self) -> GameStatePayload {
        let (board, micro_boards, macro_board, active) = match &self.board {
            BoardState::Standard(grid) => (Some(*grid.cells()), None, None, None),
            BoardState::Ultimate(ultimate) => (
                None,
                Some(ultimate.micro_boards().iter().map(|g| *g.cells()).collect()),
                Some(*ultimate.macro_cells()),
                Some(ultimate.active_micro().map(|(r, c)| [r, c])),
            ),
        };
        GameStatePayload {
            board,
            micro_boards,
            macro_board,
            active_micro_board_coords: active,
            current_player: self.current,
            game_over: self.game_over,
            winner: self.winner,
            player_names: PlayerNames {
                x: self.name_x.clone(),
                o: self.name_o.clone(),
            },
            time_remaining: Some(TimeRemaining {
                x: self.bank_x.max(0.0) as u64,
                o: self.bank_o.max(0.0) as u64,
            }),
        }
    }

    /// Marks the game finished and persists exactly one result record.
    fn finish(&mut self, winner: Option<Mark>) {
        self.game_over = true;
        self.winner = winner;
        info!(game_id = %self.id, winner = ?winner, "game over");

        let record = match winner {
            Some(w) => GameRecord {
                winner_name: self.name(w),
                loser_name: self.name(w.opponent()),
                outcome: RecordedOutcome::Win,
                game_mode: self.mode,
            },
            None => GameRecord {
                winner_name: self.name_x.clone(),
                loser_name: self.name_o.clone(),
                outcome: RecordedOutcome::Draw,
                game_mode: self.mode,
            },
        };
        // Fire-and-forget: persistence must never hold up the broadcast.
        let store = Arc::clone(&self.store);
        let game_id = self.id.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(err) = store.record_result(&record) {
                warn!(%game_id, error = %err, "failed to persist game result");
            }
        });
    }

    fn is_playable(&self) -> bool {
        match self.opponent {
            Opponent::Computer => !self.connections.is_empty(),
            Opponent::Human => self.connections.len() == 2,
        }
    }

    fn name(&self, symbol: Mark) -> Option<String> {
        match symbol {
            Mark::X => self.name_x.clone(),
            Mark::O => self.name_o.clone(),
        }
    }

    fn set_name(&mut self, symbol: Mark, name: String) {
        match symbol {
            Mark::X => self.name_x = Some(name),
            Mark::O => self.name_o = Some(name),
        }
    }

    fn set_bank(&mut self, symbol: Mark, secs: f64) {
        match symbol {
            Mark::X => self.bank_x = secs,
            Mark::O => self.bank_o = secs,
        }
    }
}

impl Drop for GameSession {
    fn drop(&mut self) {
        // A session removed while a grace timer is pending must not leave
        // the timer firing against the registry.
        if let Some(timer) = self.grace_timer.take() {
            timer.abort();
        }
    }
}

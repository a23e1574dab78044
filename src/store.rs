//! Result persistence at the collaborator boundary.
//!
//! The game core only ever calls [`ResultStore::record_result`],
//! fire-and-forget; the leaderboard and statistics read side lives in a
//! separate service and is not part of this crate.

use std::path::{Path, PathBuf};

use derive_more::{Display, Error};
use rusqlite::{Connection, params};
use tracing::{debug, info, instrument};

use crate::wire::GameMode;

/// Persistence error with the failing message preserved.
#[derive(Debug, Clone, Display, Error)]
#[display("store error: {message}")]
pub struct StoreError {
    /// What went wrong.
    pub message: String,
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

/// Final outcome of a game, as persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedOutcome {
    /// One player completed a winning line or the opponent timed out.
    Win,
    /// The board filled (or the macro-grid decided) with no winner.
    Draw,
}

impl RecordedOutcome {
    /// The string stored in the `outcome` column.
    pub fn as_str(self) -> &'static str {
        match self {
            RecordedOutcome::Win => "win",
            RecordedOutcome::Draw => "draw",
        }
    }
}

/// One finished game, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRecord {
    /// Winner's display name; on a draw, player X's name.
    pub winner_name: Option<String>,
    /// Loser's display name; on a draw, player O's name.
    pub loser_name: Option<String>,
    /// Win or draw.
    pub outcome: RecordedOutcome,
    /// Board variant the game was played on.
    pub game_mode: GameMode,
}

/// Write-side interface the session core depends on.
///
/// Implementations must be callable from the blocking pool; sessions
/// never await a store call on the async path.
pub trait ResultStore: Send + Sync + 'static {
    /// Persists exactly one record for a finished game.
    fn record_result(&self, record: &GameRecord) -> Result<(), StoreError>;
}

/// SQLite-backed store writing the `game_results` table.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and ensures the
    /// `game_results` schema exists.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store = Self {
            db_path: path.as_ref().to_path_buf(),
        };
        let conn = store.connect()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS game_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                winner_name TEXT,
                loser_name TEXT,
                outcome TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                game_mode TEXT DEFAULT 'standard'
            )",
        )?;
        info!("results database ready");
        Ok(store)
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        Ok(Connection::open(&self.db_path)?)
    }

    /// Number of persisted records, for tests and diagnostics.
    pub fn record_count(&self) -> Result<u64, StoreError> {
        let conn = self.connect()?;
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM game_results", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl ResultStore for SqliteStore {
    #[instrument(skip(self, record), fields(outcome = record.outcome.as_str(), mode = record.game_mode.as_str()))]
    fn record_result(&self, record: &GameRecord) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO game_results (winner_name, loser_name, outcome, timestamp, game_mode)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.winner_name,
                record.loser_name,
                record.outcome.as_str(),
                chrono::Utc::now().to_rfc3339(),
                record.game_mode.as_str(),
            ],
        )?;
        debug!(winner = ?record.winner_name, loser = ?record.loser_name, "result recorded");
        Ok(())
    }
}

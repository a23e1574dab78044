//! The explicitly owned mapping of live sessions.
//!
//! Constructed once at process start and threaded through the listeners;
//! never ambient global state, so tests can run against per-test
//! instances.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::session::{GameSession, Opponent};
use crate::store::ResultStore;
use crate::wire::GameMode;

/// A live session as shared between connection tasks.
pub type SharedSession = Arc<AsyncMutex<GameSession>>;

/// Maps session codes to live sessions; creates and destroys them.
pub struct GameRegistry {
    games: Mutex<HashMap<String, SharedSession>>,
    config: ServerConfig,
    store: Arc<dyn ResultStore>,
}

impl GameRegistry {
    /// Creates an empty registry using `config` and `store` for every
    /// session it constructs.
    pub fn new(config: ServerConfig, store: Arc<dyn ResultStore>) -> Self {
        Self {
            games: Mutex::new(HashMap::new()),
            config,
            store,
        }
    }

    /// Server configuration sessions are built from.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Creates a session with a fresh code, unique among live sessions.
    #[instrument(skip(self))]
    pub fn create_game(&self, mode: GameMode, opponent: Opponent) -> (String, SharedSession) {
        let mut games = self.games.lock().expect("registry poisoned");
        let game_id = loop {
            let candidate = Self::new_code();
            if !games.contains_key(&candidate) {
                break candidate;
            }
        };
        let session = Arc::new(AsyncMutex::new(GameSession::new(
            game_id.clone(),
            mode,
            opponent,
            &self.config,
            Arc::clone(&self.store),
        )));
        games.insert(game_id.clone(), Arc::clone(&session));
        info!(game_id = %game_id, live = games.len(), "game created");
        (game_id, session)
    }

    /// Looks up a live session by its code.
    pub fn get(&self, game_id: &str) -> Option<SharedSession> {
        let games = self.games.lock().expect("registry poisoned");
        let found = games.get(game_id).cloned();
        if found.is_none() {
            debug!(game_id, "game not found");
        }
        found
    }

    /// Removes a session, dropping the registry's reference to it.
    pub fn remove(&self, game_id: &str) -> Option<SharedSession> {
        let mut games = self.games.lock().expect("registry poisoned");
        let removed = games.remove(game_id);
        if removed.is_some() {
            info!(game_id, live = games.len(), "game removed");
        }
        removed
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.games.lock().expect("registry poisoned").len()
    }

    /// True when no session is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short, human-typeable session code: 4 uppercase hex chars.
    fn new_code() -> String {
        Uuid::new_v4().simple().to_string()[..4].to_uppercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{GameRecord, StoreError};

    struct NoopStore;

    impl ResultStore for NoopStore {
        fn record_result(&self, _record: &GameRecord) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn registry() -> GameRegistry {
        GameRegistry::new(ServerConfig::default(), Arc::new(NoopStore))
    }

    #[tokio::test]
    async fn create_then_get_returns_the_same_session() {
        let registry = registry();
        let (id, session) = registry.create_game(GameMode::Standard, Opponent::Human);
        assert_eq!(id.len(), 4);
        assert!(id.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        let found = registry.get(&id).expect("session exists");
        assert!(Arc::ptr_eq(&session, &found));
        assert_eq!(found.lock().await.id(), id);
    }

    #[tokio::test]
    async fn remove_forgets_the_session() {
        let registry = registry();
        let (id, _session) = registry.create_game(GameMode::Ultimate, Opponent::Computer);
        assert_eq!(registry.len(), 1);
        assert!(registry.remove(&id).is_some());
        assert!(registry.get(&id).is_none());
        assert!(registry.is_empty());
        assert!(registry.remove(&id).is_none());
    }

    #[tokio::test]
    async fn codes_are_unique_among_live_sessions() {
        let registry = registry();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..64 {
            let (id, _) = registry.create_game(GameMode::Standard, Opponent::Human);
            assert!(seen.insert(id));
        }
    }
}

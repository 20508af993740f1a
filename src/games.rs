//! games - live Game instances keyed by session code
//!
//! a `Game` is instantiated the moment a Game session reaches two peers
//! (see `peer::game_handlers`'s `SessionJoinEvent` handler) and dropped
//! when its code is forgotten here, which the peer adapter does as part
//! of the disconnect cascade. Each entry is behind its own mutex so a
//! `place` call is a single critical section per game, independent of
//! every other in-flight game.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::reversi::Game;

#[derive(Default)]
pub struct GameTable {
    games: RwLock<HashMap<String, Arc<Mutex<Game>>>>,
}

impl GameTable {
    pub fn new() -> GameTable {
        GameTable::default()
    }

    /// instantiates a fresh game under `code`, replacing any prior entry
    /// (the caller guarantees this only happens once per code, when the
    /// Game session reaches its second peer).
    pub async fn start(&self, code: &str, player_1: u32, player_2: u32) -> Arc<Mutex<Game>> {
        let game = Arc::new(Mutex::new(Game::new(player_1, player_2)));
        self.games.write().await.insert(code.to_string(), game.clone());
        game
    }

    pub async fn get(&self, code: &str) -> Option<Arc<Mutex<Game>>> {
        self.games.read().await.get(code).cloned()
    }

    /// drops the Game instance bound to `code`, if any.
    pub async fn remove(&self, code: &str) {
        self.games.write().await.remove(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_then_get_returns_the_same_game() {
        let table = GameTable::new();
        table.start("ABCD", 1000, 1001).await;
        let game = table.get("ABCD").await.unwrap();
        let guard = game.lock().await;
        assert_eq!(guard.player_1(), 1000);
        assert_eq!(guard.player_2(), 1001);
    }

    #[tokio::test]
    async fn remove_drops_the_entry() {
        let table = GameTable::new();
        table.start("ABCD", 1000, 1001).await;
        table.remove("ABCD").await;
        assert!(table.get("ABCD").await.is_none());
    }
}

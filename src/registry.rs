//! registry - keyed collections of connected peers, grouped by session code
//!
//! `Registry` is the same shape for both the Lobby and the Game namespace;
//! [`Registries`] is the single orchestrator value that owns one of each and
//! knows how a lobby-to-game transfer and a disconnect cascade touch both
//! (see design notes: no process-wide singletons, the Python prototype's
//! `SessionManager` classmethod tables are replaced by an explicit value
//! passed to the peer adapters at construction).

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use serde_json::Value;
use tokio::sync::{mpsc, RwLock};

pub type PeerId = u32;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("session {0} already exists")]
    SessionExists(String),
    #[error("session {0} does not exist")]
    SessionNotFound(String),
}

/// a connected peer's outbound channel; the websocket write loop owns the
/// receiving half and drains it in order so that a handler's response
/// batch is never interleaved with another handler's batch for the same
/// recipient.
#[derive(Clone)]
pub struct PeerHandle {
    pub id: PeerId,
    tx: mpsc::UnboundedSender<Value>,
}

impl PeerHandle {
    /// best-effort send; a closed channel means the peer's writer task has
    /// already exited, which is cleaned up by the peer adapter's own
    /// disconnect path, not here.
    pub fn send(&self, message: Value) {
        let _ = self.tx.send(message);
    }
}

struct Inner {
    peers: HashMap<PeerId, PeerHandle>,
    sessions: HashMap<String, Vec<PeerId>>,
}

/// a keyed registry of sessions, each an ordered list of connected peers.
/// Used identically for the Lobby and Game namespaces; which one a given
/// instance represents is just a matter of which field of [`Registries`]
/// holds it.
pub struct Registry {
    inner: RwLock<Inner>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry { inner: RwLock::new(Inner { peers: HashMap::new(), sessions: HashMap::new() }) }
    }

    /// allocates a fresh peer id (1000..9999, reject-and-retry on collision)
    /// and registers its outbound channel. The peer is not yet a member of
    /// any session.
    pub async fn register_peer(&self, tx: mpsc::UnboundedSender<Value>) -> PeerId {
        let mut inner = self.inner.write().await;
        loop {
            let id = rand::thread_rng().gen_range(1000..10000);
            if !inner.peers.contains_key(&id) {
                inner.peers.insert(id, PeerHandle { id, tx });
                return id;
            }
        }
    }

    /// fully forgets a peer: removes its handle and drops it from whatever
    /// session it might still be listed in, deleting any session that
    /// becomes empty as a result (same default as `remove_peer`'s
    /// `keep_empty = false`). Returns the codes of any sessions it was
    /// removed from, paired with whether that removal emptied (and
    /// therefore deleted) the session.
    pub async fn forget_peer(&self, peer_id: PeerId) -> Vec<(String, bool)> {
        let mut inner = self.inner.write().await;
        inner.peers.remove(&peer_id);
        let mut emptied = Vec::new();
        let mut to_delete = Vec::new();
        for (code, members) in inner.sessions.iter_mut() {
            if let Some(pos) = members.iter().position(|&id| id == peer_id) {
                members.remove(pos);
                let is_empty = members.is_empty();
                emptied.push((code.clone(), is_empty));
                if is_empty {
                    to_delete.push(code.clone());
                }
            }
        }
        for code in to_delete {
            inner.sessions.remove(&code);
        }
        emptied
    }

    /// generates a fresh 4-letter uppercase code, or adopts `code` if given
    /// and unused in this registry. Reject-and-retry on a generated
    /// collision; an explicitly requested code that's already in use is a
    /// distinct, surfaced error.
    pub async fn create_session(&self, code: Option<String>) -> Result<String, RegistryError> {
        let mut inner = self.inner.write().await;
        let code = match code {
            Some(explicit) => {
                if inner.sessions.contains_key(&explicit) {
                    return Err(RegistryError::SessionExists(explicit));
                }
                explicit
            }
            None => loop {
                let candidate = Self::random_code();
                if !inner.sessions.contains_key(&candidate) {
                    break candidate;
                }
            },
        };
        inner.sessions.insert(code.clone(), Vec::new());
        Ok(code)
    }

    fn random_code() -> String {
        let mut rng = rand::thread_rng();
        (0..4).map(|_| (b'A' + rng.gen_range(0..26)) as char).collect()
    }

    /// appends `peer_id` to the session's membership, if the session exists
    pub async fn add_peer(&self, code: &str, peer_id: PeerId) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().await;
        match inner.sessions.get_mut(code) {
            Some(members) => {
                members.push(peer_id);
                Ok(())
            }
            None => Err(RegistryError::SessionNotFound(code.to_string())),
        }
    }

    /// removes `peer_id` from the session; deletes the session if it
    /// becomes empty unless `keep_empty` is set. Returns whether the
    /// session was deleted.
    pub async fn remove_peer(&self, code: &str, peer_id: PeerId, keep_empty: bool) -> bool {
        let mut inner = self.inner.write().await;
        if let Some(members) = inner.sessions.get_mut(code) {
            members.retain(|&id| id != peer_id);
            if members.is_empty() && !keep_empty {
                inner.sessions.remove(code);
                return true;
            }
        }
        false
    }

    /// deletes a session outright, regardless of membership
    pub async fn remove_session(&self, code: &str) -> bool {
        let mut inner = self.inner.write().await;
        inner.sessions.remove(code).is_some()
    }

    pub async fn get_peers(&self, code: &str) -> Vec<PeerId> {
        let inner = self.inner.read().await;
        inner.sessions.get(code).cloned().unwrap_or_default()
    }

    pub async fn validate(&self, code: &str) -> bool {
        let inner = self.inner.read().await;
        inner.sessions.contains_key(code)
    }

    /// sends `message` to one peer, if it's still registered
    pub async fn send_to(&self, peer_id: PeerId, message: Value) {
        let inner = self.inner.read().await;
        if let Some(handle) = inner.peers.get(&peer_id) {
            handle.send(message);
        }
    }

    /// sends `message` to every peer currently in `code`
    pub async fn broadcast(&self, code: &str, message: Value) {
        let inner = self.inner.read().await;
        if let Some(members) = inner.sessions.get(code) {
            for peer_id in members {
                if let Some(handle) = inner.peers.get(peer_id) {
                    handle.send(message.clone());
                }
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// owns the Lobby and Game registries and the cross-registry operations
/// that touch both: transfer-to-game and the disconnect cascades. A
/// single value, passed to the peer adapters at construction - no
/// process-wide singletons.
pub struct Registries {
    pub lobby: Arc<Registry>,
    pub game: Arc<Registry>,
}

impl Registries {
    pub fn new() -> Arc<Registries> {
        Arc::new(Registries { lobby: Arc::new(Registry::new()), game: Arc::new(Registry::new()) })
    }

    pub fn lobby_arc(&self) -> Arc<Registry> {
        self.lobby.clone()
    }

    pub fn game_arc(&self) -> Arc<Registry> {
        self.game.clone()
    }

    /// creates a Game session under the same code as an existing Lobby
    /// session. The lobby is not dropped here; it is dropped when its last
    /// peer leaves, or by [`Registries::game_peer_disconnected`]'s cascade.
    pub async fn transfer_to_game(&self, code: &str) -> Result<(), RegistryError> {
        self.game.create_session(Some(code.to_string())).await?;
        Ok(())
    }

    /// cascade for a Game-side disconnect: forgets the peer (removing its
    /// handle and deleting its Game session if that empties it), and for
    /// every Game session it was a member of, also deletes the same-code
    /// Lobby session (a game having started means the lobby's job is
    /// done). Returns the codes the peer was removed from, so the caller
    /// can drop the matching live `Game` instances too.
    pub async fn game_peer_disconnected(&self, peer_id: PeerId) -> Vec<String> {
        let removed = self.game.forget_peer(peer_id).await;
        let mut codes = Vec::with_capacity(removed.len());
        for (code, _emptied) in removed {
            self.lobby.remove_session(&code).await;
            codes.push(code);
        }
        codes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> mpsc::UnboundedSender<Value> {
        let (tx, _rx) = mpsc::unbounded_channel();
        tx
    }

    #[tokio::test]
    async fn generated_codes_match_four_uppercase_letters() {
        let registry = Registry::new();
        for _ in 0..20 {
            let code = registry.create_session(None).await.unwrap();
            assert_eq!(code.len(), 4);
            assert!(code.chars().all(|c| c.is_ascii_uppercase()));
        }
    }

    #[tokio::test]
    async fn generated_peer_ids_are_in_range() {
        let registry = Registry::new();
        for _ in 0..20 {
            let id = registry.register_peer(channel()).await;
            assert!((1000..10000).contains(&id));
        }
    }

    #[tokio::test]
    async fn explicit_duplicate_session_code_is_an_error() {
        let registry = Registry::new();
        registry.create_session(Some("ABCD".to_string())).await.unwrap();
        let err = registry.create_session(Some("ABCD".to_string())).await.unwrap_err();
        assert_eq!(err, RegistryError::SessionExists("ABCD".to_string()));
    }

    #[tokio::test]
    async fn last_peer_leaving_invalidates_the_session() {
        let registry = Registry::new();
        let code = registry.create_session(None).await.unwrap();
        let peer = registry.register_peer(channel()).await;
        registry.add_peer(&code, peer).await.unwrap();
        assert!(registry.validate(&code).await);
        registry.remove_peer(&code, peer, false).await;
        assert!(!registry.validate(&code).await);
    }

    #[tokio::test]
    async fn game_disconnect_cascades_into_lobby_removal() {
        let registries = Registries::new();
        let code = registries.lobby.create_session(None).await.unwrap();
        registries.transfer_to_game(&code).await.unwrap();
        let peer = registries.game.register_peer(channel()).await;
        registries.game.add_peer(&code, peer).await.unwrap();
        assert!(registries.lobby.validate(&code).await);

        let codes = registries.game_peer_disconnected(peer).await;
        assert_eq!(codes, vec![code.clone()]);
        assert!(!registries.lobby.validate(&code).await);
        assert!(!registries.game.validate(&code).await);
    }
}

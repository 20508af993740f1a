//! dispatch - per-peer handler tables and scoped delivery
//!
//! mirrors the prototype's `EventManager`/`@event` decorator pair, but as an
//! explicit `(name -> handlers)` map built once at construction - no
//! reflection, no decorators (see design notes).

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::registry::{PeerId, Registry};

/// fan-out width of a handler's response
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// every peer currently in the message's `session`
    Session,
    /// the peer that sent the triggering message only
    Peer,
}

/// a parsed client->server message; `data` defaults to `null` when absent
#[derive(Clone, Debug, Deserialize)]
pub struct InboundMessage {
    pub event: String,
    #[serde(default)]
    pub session: Option<String>,
    #[serde(default)]
    pub user_id: Option<PeerId>,
    #[serde(default)]
    pub data: Value,
}

/// one handler invocation may need to emit more than one message, in a
/// fixed order (e.g. `ChipPlacedEvent` followed by `NextPlayerEvent`) -
/// the whole batch shares the invocation's single scope resolution per
/// entry, but each entry picks its own scope.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Vec<(Value, Scope)>> + Send>>;
pub type Handler = Arc<dyn Fn(InboundMessage, PeerId) -> HandlerFuture + Send + Sync>;

/// an explicit event-name -> ordered-handlers map, built once per
/// dispatcher at construction time
#[derive(Default, Clone)]
pub struct HandlerTable {
    handlers: HashMap<String, Vec<Handler>>,
}

impl HandlerTable {
    pub fn new() -> HandlerTable {
        HandlerTable::default()
    }

    /// registers `handler` for `event`; multiple handlers for the same
    /// event name run in registration order.
    pub fn on(mut self, event: &str, handler: Handler) -> HandlerTable {
        self.handlers.entry(event.to_string()).or_default().push(handler);
        self
    }

    /// the first registered handler for `event`, if any - used by tests
    /// that exercise a single handler directly without going through the
    /// dispatcher's parse/scope-routing machinery.
    #[cfg(test)]
    pub fn get(&self, event: &str) -> Option<Handler> {
        self.handlers.get(event).and_then(|handlers| handlers.first()).cloned()
    }
}

/// bridges a peer's inbound messages to its handler table and routes each
/// handler's response to the scope it asked for.
pub struct Dispatcher {
    table: HandlerTable,
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new(table: HandlerTable, registry: Arc<Registry>) -> Dispatcher {
        Dispatcher { table, registry }
    }

    /// parses `raw`, looks up handlers by its `event` field, and delivers
    /// each response according to its scope. A malformed payload is
    /// rewritten into an `ErrorEvent` before handler lookup, matching the
    /// prototype's `json.JSONDecodeError` fallback.
    pub async fn dispatch(&self, raw: &str, peer_id: PeerId) {
        let message = match serde_json::from_str::<InboundMessage>(raw) {
            Ok(message) => message,
            Err(_) => InboundMessage {
                event: "ErrorEvent".to_string(),
                session: None,
                user_id: Some(peer_id),
                data: json!({
                    "status": 400,
                    "message": "Invalid JSON Syntax",
                    "data": raw,
                }),
            },
        };

        debug!(peer_id, event = %message.event, "event received");

        let Some(handlers) = self.table.handlers.get(&message.event).cloned() else {
            let payload = json!({
                "event": "ErrorEvent",
                "status": 404,
                "message": format!("Unknown event type {}", message.event),
            });
            self.registry.send_to(peer_id, payload).await;
            return;
        };

        for handler in handlers {
            let batch = handler(message.clone(), peer_id).await;
            for (payload, scope) in batch {
                match scope {
                    Scope::Session => match &message.session {
                        Some(code) => self.registry.broadcast(code, payload).await,
                        None => {
                            let err = json!({
                                "event": "ErrorEvent",
                                "status": 404,
                                "message": "Missing session",
                            });
                            self.registry.send_to(peer_id, err).await;
                        }
                    },
                    Scope::Peer => self.registry.send_to(peer_id, payload).await,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    async fn peer_channel() -> (Arc<Registry>, PeerId, mpsc::UnboundedReceiver<Value>) {
        let registry = Arc::new(Registry::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let peer_id = registry.register_peer(tx).await;
        (registry, peer_id, rx)
    }

    #[tokio::test]
    async fn malformed_json_is_rewritten_to_error_event() {
        let (registry, peer_id, mut rx) = peer_channel().await;
        let table = HandlerTable::new().on(
            "ErrorEvent",
            Arc::new(|message, _peer_id| Box::pin(async move { vec![(message.data, Scope::Peer)] })),
        );
        let dispatcher = Dispatcher::new(table, registry);
        dispatcher.dispatch("not json", peer_id).await;
        let response = rx.recv().await.unwrap();
        assert_eq!(response["status"], 400);
        assert_eq!(response["message"], "Invalid JSON Syntax");
    }

    #[tokio::test]
    async fn unknown_event_gets_a_404() {
        let (registry, peer_id, mut rx) = peer_channel().await;
        let dispatcher = Dispatcher::new(HandlerTable::new(), registry);
        dispatcher.dispatch(r#"{"event":"NoSuchEvent"}"#, peer_id).await;
        let response = rx.recv().await.unwrap();
        assert_eq!(response["status"], 404);
    }
}

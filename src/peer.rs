//! peer - handler tables and the per-connection websocket actor
//!
//! builds the Lobby and Game handler tables described in the spec, and
//! bridges an axum websocket to the dispatcher for the lifetime of one
//! connection: assign a peer id on open, read messages in order, forward
//! each to the dispatcher, and on close run the disconnect cascade
//! (registry removal plus, for a lobby peer, a synthesized
//! `SessionLeaveEvent` to the remaining roster).

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, Instrument};

use crate::dispatch::{Dispatcher, Handler, HandlerTable, Scope};
use crate::games::GameTable;
use crate::registry::Registries;
use crate::reversi::Continuation;

fn field_of(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(str::to_string)
}

fn field_i8(data: &Value, key: &str) -> Option<i8> {
    data.get(key).and_then(Value::as_i64).map(|n| n as i8)
}

/// the Lobby dispatcher's handler table: `SessionCreateEvent`,
/// `SessionJoinEvent`, `SessionLeaveEvent`, `GameStartEvent`.
pub fn lobby_handlers(registries: Arc<Registries>) -> HandlerTable {
    let create = {
        let registries = registries.clone();
        let handler: Handler = Arc::new(move |_message, peer_id| {
            let registries = registries.clone();
            Box::pin(async move {
                let code = registries.lobby.create_session(None).await.expect("fresh code never collides with itself");
                registries.lobby.add_peer(&code, peer_id).await.ok();
                let payload = json!({"event": "SessionCreateEvent", "status": 200, "data": {"code": code}});
                vec![(payload, Scope::Peer)]
            })
        });
        handler
    };

    let join = {
        let registries = registries.clone();
        let handler: Handler = Arc::new(move |message, peer_id| {
            let registries = registries.clone();
            Box::pin(async move {
                let Some(code) = message.session.clone() else {
                    return vec![(json!({"event": "SessionJoinEvent", "status": 404, "message": "Missing session"}), Scope::Peer)];
                };
                if !registries.lobby.validate(&code).await {
                    return vec![(json!({"event": "SessionJoinEvent", "status": 404, "message": format!("No such lobby {code}")}), Scope::Peer)];
                }
                registries.lobby.add_peer(&code, peer_id).await.ok();
                let all_users = registries.lobby.get_peers(&code).await;
                let custom_id = field_of(&message.data, "custom_id");
                let payload = json!({
                    "event": "SessionJoinEvent",
                    "status": 200,
                    "session": code,
                    "data": {"user_id": peer_id, "all_users": all_users, "custom_id": custom_id},
                });
                vec![(payload, Scope::Session)]
            })
        });
        handler
    };

    let leave = {
        let registries = registries.clone();
        let handler: Handler = Arc::new(move |message, peer_id| {
            let registries = registries.clone();
            Box::pin(async move {
                let Some(code) = message.session.clone() else {
                    return vec![(json!({"event": "SessionLeaveEvent", "status": 404, "message": "Missing session"}), Scope::Peer)];
                };
                registries.lobby.remove_peer(&code, peer_id, false).await;
                let all_users = registries.lobby.get_peers(&code).await;
                let payload = json!({
                    "event": "SessionLeaveEvent",
                    "status": 200,
                    "session": code,
                    "data": {"all_users": all_users},
                });
                vec![(payload, Scope::Session)]
            })
        });
        handler
    };

    let start = {
        let registries = registries.clone();
        let handler: Handler = Arc::new(move |message, peer_id| {
            let registries = registries.clone();
            Box::pin(async move {
                let Some(code) = message.session.clone() else {
                    return vec![(json!({"event": "GameStartEvent", "status": 404, "message": "Missing session"}), Scope::Peer)];
                };
                match registries.transfer_to_game(&code).await {
                    Ok(()) => {
                        debug!(peer_id, session = %code, "lobby transferred to game");
                        vec![(json!({"event": "GameStartEvent", "status": 200, "session": code}), Scope::Session)]
                    }
                    Err(err) => vec![(json!({"event": "GameStartEvent", "status": 404, "message": err.to_string()}), Scope::Peer)],
                }
            })
        });
        handler
    };

    HandlerTable::new()
        .on("SessionCreateEvent", create)
        .on("SessionJoinEvent", join)
        .on("SessionLeaveEvent", leave)
        .on("GameStartEvent", start)
}

/// the Game dispatcher's handler table: `SessionJoinEvent` (join, and on
/// reaching 2 peers, `GameReadyEvent` + instantiate the `Game`),
/// `ChipPlacedEvent`, `ErrorEvent` (diagnostic echo).
pub fn game_handlers(registries: Arc<Registries>, games: Arc<GameTable>) -> HandlerTable {
    let join = {
        let registries = registries.clone();
        let games = games.clone();
        let handler: Handler = Arc::new(move |message, peer_id| {
            let registries = registries.clone();
            let games = games.clone();
            Box::pin(async move {
                let Some(code) = message.session.clone() else {
                    return vec![(json!({"event": "SessionJoinEvent", "status": 404, "message": "Missing session"}), Scope::Peer)];
                };
                if !registries.game.validate(&code).await {
                    return vec![(json!({"event": "SessionJoinEvent", "status": 404, "message": format!("No such game {code}")}), Scope::Peer)];
                }
                let mut all_users = registries.game.get_peers(&code).await;
                if !all_users.contains(&peer_id) {
                    registries.game.add_peer(&code, peer_id).await.ok();
                    all_users.push(peer_id);
                }

                let mut batch = Vec::new();
                if all_users.len() == 2 {
                    games.start(&code, all_users[0], all_users[1]).await;
                    let ready = json!({
                        "event": "GameReadyEvent",
                        "status": 200,
                        "session": code,
                        "data": {"player_id_1": all_users[0], "player_id_2": all_users[1]},
                    });
                    batch.push((ready, Scope::Session));
                    info!(session = %code, player_1 = all_users[0], player_2 = all_users[1], "game ready");
                }

                let custom_id = field_of(&message.data, "custom_id");
                let payload = json!({
                    "event": "SessionJoinEvent",
                    "status": 200,
                    "session": code,
                    "data": {"user_id": peer_id, "all_users": all_users, "custom_id": custom_id},
                });
                batch.push((payload, Scope::Session));
                batch
            })
        });
        handler
    };

    let chip_placed = {
        let games = games.clone();
        let handler: Handler = Arc::new(move |message, peer_id| {
            let games = games.clone();
            Box::pin(async move {
                let Some(code) = message.session.clone() else {
                    return vec![(json!({"event": "ChipPlacedEvent", "status": 404, "message": "Missing session"}), Scope::Peer)];
                };
                let Some(game) = games.get(&code).await else {
                    return vec![(json!({"event": "ChipPlacedEvent", "status": 404, "message": format!("No such game {code}")}), Scope::Peer)];
                };
                let Some(row) = field_i8(&message.data, "row") else {
                    return vec![(json!({"event": "ChipPlacedEvent", "status": 400, "message": "Missing row"}), Scope::Peer)];
                };
                let Some(column) = field_i8(&message.data, "column") else {
                    return vec![(json!({"event": "ChipPlacedEvent", "status": 400, "message": "Missing column"}), Scope::Peer)];
                };

                let result = {
                    let mut game = game.lock().await;
                    game.place(row, column, peer_id)
                };

                match result {
                    Ok(batch) => {
                        let chip_placed = json!({
                            "event": "ChipPlacedEvent",
                            "status": 200,
                            "session": code,
                            "data": batch.chip_placed,
                        });
                        let continuation = match &batch.continuation {
                            Continuation::NextPlayer(next) => {
                                json!({"event": "NextPlayerEvent", "status": 200, "session": code, "data": next})
                            }
                            Continuation::GameOver(over) => {
                                json!({"event": "GameOverEvent", "status": 200, "session": code, "data": over})
                            }
                        };
                        if matches!(&batch.continuation, Continuation::GameOver(_)) {
                            games.remove(&code).await;
                        }
                        vec![(chip_placed, Scope::Session), (continuation, Scope::Session)]
                    }
                    Err(rule_error) => {
                        vec![(json!({"event": "RuleErrorEvent", "status": 400, "message": rule_error.to_string(), "user_id": peer_id}), Scope::Peer)]
                    }
                }
            })
        });
        handler
    };

    let error_echo: Handler = Arc::new(move |message, _peer_id| {
        Box::pin(async move { vec![(json!({"event": "ErrorEvent", "status": 400, "data": message.data}), Scope::Peer)] })
    });

    HandlerTable::new()
        .on("SessionJoinEvent", join)
        .on("ChipPlacedEvent", chip_placed)
        .on("ErrorEvent", error_echo)
}

/// drives one lobby connection end to end: register, dispatch inbound
/// messages, and on close run the lobby disconnect cascade.
pub async fn handle_lobby_socket(socket: WebSocket, registries: Arc<Registries>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
    let peer_id = registries.lobby.register_peer(tx).await;
    let span = info_span!("lobby_peer", peer_id);

    let writer = tokio::spawn(
        async move {
            while let Some(payload) = rx.recv().await {
                if sink.send(WsMessage::Text(payload.to_string().into())).await.is_err() {
                    break;
                }
            }
        }
        .instrument(span.clone()),
    );

    let dispatcher = Dispatcher::new(lobby_handlers(registries.clone()), registries.lobby_arc());
    async {
        info!("lobby peer connected");
        while let Some(Ok(WsMessage::Text(text))) = stream.next().await {
            dispatcher.dispatch(&text, peer_id).await;
        }
        info!("lobby peer disconnected");
    }
    .instrument(span)
    .await;

    writer.abort();
    let removed = registries.lobby.forget_peer(peer_id).await;
    for (code, emptied) in removed {
        if !emptied {
            let all_users = registries.lobby.get_peers(&code).await;
            let payload = json!({
                "event": "SessionLeaveEvent",
                "status": 200,
                "session": code,
                "data": {"all_users": all_users},
            });
            registries.lobby.broadcast(&code, payload).await;
        }
    }
}

/// drives one game connection end to end; on close, the game disconnect
/// cascade also deletes the same-code lobby session and the live `Game`.
pub async fn handle_game_socket(socket: WebSocket, registries: Arc<Registries>, games: Arc<GameTable>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
    let peer_id = registries.game.register_peer(tx).await;
    let span = info_span!("game_peer", peer_id);

    let writer = tokio::spawn(
        async move {
            while let Some(payload) = rx.recv().await {
                if sink.send(WsMessage::Text(payload.to_string().into())).await.is_err() {
                    break;
                }
            }
        }
        .instrument(span.clone()),
    );

    let dispatcher = Dispatcher::new(game_handlers(registries.clone(), games.clone()), registries.game_arc());
    async {
        info!("game peer connected");
        while let Some(Ok(WsMessage::Text(text))) = stream.next().await {
            dispatcher.dispatch(&text, peer_id).await;
        }
        info!("game peer disconnected");
    }
    .instrument(span)
    .await;

    writer.abort();
    let codes = registries.game_peer_disconnected(peer_id).await;
    for code in codes {
        info!(session = %code, "game disconnect cascade");
        games.remove(&code).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::InboundMessage;
    use serde_json::json as j;

    fn msg(event: &str, session: Option<&str>, data: Value) -> InboundMessage {
        InboundMessage { event: event.to_string(), session: session.map(str::to_string), user_id: None, data }
    }

    #[tokio::test]
    async fn session_create_then_join_reports_both_peers() {
        let registries = Registries::new();
        let lobby = lobby_handlers(registries.clone());
        let create = lobby.get("SessionCreateEvent").unwrap();
        let (_tx1, _rx1) = mpsc::unbounded_channel();
        let peer_1 = registries.lobby.register_peer(_tx1).await;
        let response = create(msg("SessionCreateEvent", None, Value::Null), peer_1).await;
        let code = response[0].0["data"]["code"].as_str().unwrap().to_string();

        let join = lobby.get("SessionJoinEvent").unwrap();
        let (_tx2, _rx2) = mpsc::unbounded_channel();
        let peer_2 = registries.lobby.register_peer(_tx2).await;
        let response = join(msg("SessionJoinEvent", Some(&code), j!({"custom_id": "alice"})), peer_2).await;
        let all_users = response[0].0["data"]["all_users"].as_array().unwrap();
        assert_eq!(all_users.len(), 2);
    }

    #[tokio::test]
    async fn game_ready_fires_on_second_join() {
        let registries = Registries::new();
        let games = Arc::new(GameTable::new());
        let code = registries.lobby.create_session(None).await.unwrap();
        registries.transfer_to_game(&code).await.unwrap();
        let table = game_handlers(registries.clone(), games.clone());
        let join = table.get("SessionJoinEvent").unwrap();

        let (_tx1, _rx1) = mpsc::unbounded_channel();
        let peer_1 = registries.game.register_peer(_tx1).await;
        let batch = join(msg("SessionJoinEvent", Some(&code), Value::Null), peer_1).await;
        assert_eq!(batch.len(), 1);

        let (_tx2, _rx2) = mpsc::unbounded_channel();
        let peer_2 = registries.game.register_peer(_tx2).await;
        let batch = join(msg("SessionJoinEvent", Some(&code), Value::Null), peer_2).await;
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].0["event"], "GameReadyEvent");
        assert!(games.get(&code).await.is_some());
    }

    #[tokio::test]
    async fn repeated_join_from_the_same_peer_does_not_duplicate_membership() {
        let registries = Registries::new();
        let games = Arc::new(GameTable::new());
        let code = registries.lobby.create_session(None).await.unwrap();
        registries.transfer_to_game(&code).await.unwrap();
        let table = game_handlers(registries.clone(), games.clone());
        let join = table.get("SessionJoinEvent").unwrap();

        let (_tx1, _rx1) = mpsc::unbounded_channel();
        let peer_1 = registries.game.register_peer(_tx1).await;
        join(msg("SessionJoinEvent", Some(&code), Value::Null), peer_1).await;
        // the same peer sends SessionJoinEvent again before a second peer arrives
        let batch = join(msg("SessionJoinEvent", Some(&code), Value::Null), peer_1).await;
        assert_eq!(batch.len(), 1);
        let all_users = batch[0].0["data"]["all_users"].as_array().unwrap();
        assert_eq!(all_users.len(), 1);
        assert!(games.get(&code).await.is_none());
    }
}

//! reversi_server - realtime multiplayer Reversi lobby/game server
//!
//! the core (pure, no I/O) lives in [`reversi`], [`registry`], [`dispatch`],
//! and [`games`]; [`peer`] and [`transport`] are thin adapters binding that
//! core to axum websockets and a handful of HTTP endpoints; [`auth`] and
//! [`db`] are the credential/persistence adapters neither of the above
//! depends on.

pub mod auth;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod games;
pub mod peer;
pub mod registry;
pub mod reversi;
pub mod transport;

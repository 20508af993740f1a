//! reversi - pure board representation and game/turn semantics
//!
//! nothing here touches sessions, peers, or the network; see [`crate::registry`]
//! and [`crate::dispatch`] for the parts that do.

pub mod board;
pub mod game;

pub use board::{Board, Cell, Owner, StartPattern, BOARD_SIZE};
pub use game::{ChipPlacedEvent, Continuation, Game, GameOverEvent, GameSnapshot, MoveBatch, NextPlayerEvent, PlayerId, RuleError, Turn};

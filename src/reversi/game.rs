//! game - a Board bound to two player identities, turn history, events
//!
//! `place` is the only mutating entry point; it either returns an ordered
//! batch of domain events or a `RuleError` that leaves the board untouched.

use serde::Serialize;

use super::board::{Board, Owner, StartPattern};

pub type PlayerId = u32;

/// one accepted placement
#[derive(Clone, Debug)]
pub struct Turn {
    pub player: PlayerId,
    pub turn_number: u32,
    pub row: i8,
    pub column: i8,
}

/// rule violations returned by `Game::place`; never fatal, always routed to
/// the offending peer only
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("Field {field_name} is already occupied.")]
    Occupied { field_name: String },
    #[error("There is no chip around {field_name}.")]
    NoAdjacentChip { field_name: String },
    #[error("You need to swap at least one chip.")]
    NoFlips,
    #[error("It's not your turn.")]
    NotYourTurn,
    #[error("The game is already over.")]
    GameOver,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct SwappedChip {
    pub row: i8,
    pub column: i8,
    pub field_name: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChipPlacedEvent {
    pub row: i8,
    pub column: i8,
    pub field_name: String,
    pub swapped_chips: Vec<SwappedChip>,
    pub user_id: PlayerId,
}

#[derive(Clone, Debug, Serialize)]
pub struct NextPlayerEvent {
    pub user_id: PlayerId,
    pub turn: u32,
    pub reason: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GameOverEvent {
    pub winner: Option<PlayerId>,
    pub title: String,
    pub reason: String,
}

/// the second half of a successful move's event batch
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum Continuation {
    NextPlayer(NextPlayerEvent),
    GameOver(GameOverEvent),
}

/// a full, ordered event batch produced by one accepted `place`
#[derive(Clone, Debug)]
pub struct MoveBatch {
    pub chip_placed: ChipPlacedEvent,
    pub continuation: Continuation,
}

pub struct Game {
    player_1: PlayerId,
    player_2: PlayerId,
    current_player: PlayerId,
    board: Board,
    history: Vec<Turn>,
    game_over: bool,
}

impl Game {
    /// builds a fresh game on a randomly chosen start pattern, with a
    /// randomly chosen first mover.
    pub fn new(player_1: PlayerId, player_2: PlayerId) -> Game {
        assert_ne!(player_1, player_2, "a game needs two distinct players");
        let board = Board::new(StartPattern::random());
        let current_player = if rand::random::<bool>() { player_1 } else { player_2 };
        Game { player_1, player_2, current_player, board, history: Vec::new(), game_over: false }
    }

    pub fn player_1(&self) -> PlayerId {
        self.player_1
    }

    pub fn player_2(&self) -> PlayerId {
        self.player_2
    }

    pub fn current_player(&self) -> PlayerId {
        self.current_player
    }

    pub fn is_over(&self) -> bool {
        self.game_over
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    fn owner_of(&self, player: PlayerId) -> Owner {
        if player == self.player_1 {
            Owner::P1
        } else {
            Owner::P2
        }
    }

    fn opponent_of(&self, player: PlayerId) -> PlayerId {
        if player == self.player_1 {
            self.player_2
        } else {
            self.player_1
        }
    }

    /// legal moves available to `player`, as board coordinates
    pub fn legal_moves(&self, player: PlayerId) -> Vec<(i8, i8)> {
        self.board.legal_moves(self.owner_of(player))
    }

    /// validates and applies a placement, advancing turn state.
    ///
    /// Preconditions checked, in order: game not already over, it is
    /// `player`'s turn, the cell is unoccupied, placing there has an
    /// adjacent occupied cell, and the placement flips at least one disc.
    pub fn place(&mut self, row: i8, column: i8, player: PlayerId) -> Result<MoveBatch, RuleError> {
        if self.game_over {
            return Err(RuleError::GameOver);
        }
        if player != self.current_player {
            return Err(RuleError::NotYourTurn);
        }

        let owner = self.owner_of(player);
        let field_name = |r: i8, c: i8| -> String {
            let col = (b'A' + c as u8) as char;
            format!("{col}{}", 8 - r)
        };

        if let Some(cell) = self.board.cell(row, column) {
            if cell.owner != Owner::None {
                return Err(RuleError::Occupied { field_name: cell.field_name() });
            }
        }

        let has_neighbor = Self::neighbors(row, column)
            .into_iter()
            .any(|(r, c)| matches!(self.board.cell(r, c), Some(cell) if cell.owner != Owner::None));
        // a move on an otherwise-empty board (the very first placement
        // possible only in pathological start patterns) is exempt, matching
        // the prototype's "no surrounding chip and not first chip" check
        let any_chip_on_board = self.board.count(Owner::P1) + self.board.count(Owner::P2) > 0;
        if !has_neighbor && any_chip_on_board {
            return Err(RuleError::NoAdjacentChip { field_name: field_name(row, column) });
        }

        let flips = match self.board.apply(row, column, owner) {
            Some(flips) => flips,
            None => return Err(RuleError::NoFlips),
        };

        self.history.push(Turn { player, turn_number: self.board.turn(), row, column });

        let swapped_chips = flips
            .iter()
            .map(|&(r, c)| SwappedChip { row: r, column: c, field_name: field_name(r, c) })
            .collect();
        let chip_placed = ChipPlacedEvent {
            row,
            column,
            field_name: field_name(row, column),
            swapped_chips,
            user_id: player,
        };

        let opponent = self.opponent_of(player);
        let opponent_owner = owner.opponent();
        let continuation = if !self.board.legal_moves(opponent_owner).is_empty() {
            self.current_player = opponent;
            Continuation::NextPlayer(NextPlayerEvent { user_id: opponent, turn: self.board.turn(), reason: None })
        } else if !self.board.is_full() && !self.board.legal_moves(owner).is_empty() {
            // opponent has no move but mover does: turn stays, pass notice for opponent
            Continuation::NextPlayer(NextPlayerEvent {
                user_id: player,
                turn: self.board.turn(),
                reason: Some(format!("Player {opponent} is not able to move")),
            })
        } else {
            self.game_over = true;
            Continuation::GameOver(self.terminal_event())
        };

        Ok(MoveBatch { chip_placed, continuation })
    }

    fn terminal_event(&self) -> GameOverEvent {
        let p1_count = self.board.count(Owner::P1);
        let p2_count = self.board.count(Owner::P2);
        let (winner, title, reason) = match p1_count.cmp(&p2_count) {
            std::cmp::Ordering::Greater => {
                (Some(self.player_1), "Game over".to_string(), format!("Player {} wins", self.player_1))
            }
            std::cmp::Ordering::Less => {
                (Some(self.player_2), "Game over".to_string(), format!("Player {} wins", self.player_2))
            }
            std::cmp::Ordering::Equal => (None, "Game over".to_string(), "Draw".to_string()),
        };
        GameOverEvent { winner, title, reason }
    }

    fn neighbors(row: i8, column: i8) -> [(i8, i8); 8] {
        [
            (row - 1, column - 1),
            (row - 1, column),
            (row - 1, column + 1),
            (row, column - 1),
            (row, column + 1),
            (row + 1, column - 1),
            (row + 1, column),
            (row + 1, column + 1),
        ]
    }

    /// JSON-shaped snapshot: occupied cells, current player, turn, game-over
    pub fn snapshot(&self) -> GameSnapshot {
        let occupied = self
            .board
            .cells()
            .filter(|c| c.owner != Owner::None)
            .map(|c| OccupiedCell { row: c.row, column: c.column, owner: c.owner })
            .collect();
        GameSnapshot {
            player_1: self.player_1,
            player_2: self.player_2,
            current_player: self.current_player,
            turn: self.board.turn(),
            game_over: self.game_over,
            occupied,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct OccupiedCell {
    pub row: i8,
    pub column: i8,
    pub owner: Owner,
}

#[derive(Clone, Debug, Serialize)]
pub struct GameSnapshot {
    pub player_1: PlayerId,
    pub player_2: PlayerId,
    pub current_player: PlayerId,
    pub turn: u32,
    pub game_over: bool,
    pub occupied: Vec<OccupiedCell>,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// builds a game with a fixed start pattern and first mover, bypassing
    /// the randomness in `Game::new` so tests are deterministic
    fn fixed_game(player_1: PlayerId, player_2: PlayerId, current: PlayerId) -> Game {
        let board = Board::new(StartPattern::Diagonal);
        Game { player_1, player_2, current_player: current, board, history: Vec::new(), game_over: false }
    }

    #[test]
    fn place_by_non_current_player_is_rejected_and_state_unchanged() {
        let mut game = fixed_game(1, 2, 1);
        let p1_before = game.board().count(Owner::P1);
        let err = game.place(2, 4, 2).unwrap_err();
        assert_eq!(err, RuleError::NotYourTurn);
        assert_eq!(game.board().count(Owner::P1), p1_before);
        assert_eq!(game.current_player(), 1);
    }

    #[test]
    fn place_on_occupied_cell_is_rejected() {
        let mut game = fixed_game(1, 2, 1);
        let err = game.place(3, 3, 1).unwrap_err();
        assert_eq!(err, RuleError::Occupied { field_name: "D5".to_string() });
    }

    #[test]
    fn legal_placement_advances_turn_and_emits_events() {
        let mut game = fixed_game(1, 2, 1);
        let batch = game.place(2, 4, 1).unwrap();
        assert_eq!(batch.chip_placed.field_name, "E6");
        assert_eq!(batch.chip_placed.swapped_chips.len(), 1);
        assert_eq!(batch.chip_placed.swapped_chips[0].field_name, "E5");
        match batch.continuation {
            Continuation::NextPlayer(e) => {
                assert_eq!(e.user_id, 2);
                assert!(e.reason.is_none());
            }
            Continuation::GameOver(_) => panic!("game should not be over after first move"),
        }
        assert_eq!(game.current_player(), 2);
    }

    #[test]
    fn disc_count_increases_by_one_plus_flips() {
        let mut game = fixed_game(1, 2, 1);
        let total_before = game.board().count(Owner::P1) + game.board().count(Owner::P2);
        let batch = game.place(2, 4, 1).unwrap();
        let total_after = game.board().count(Owner::P1) + game.board().count(Owner::P2);
        assert_eq!(total_after, total_before + 1 + batch.chip_placed.swapped_chips.len());
    }

    #[test]
    fn game_over_is_sticky() {
        let mut game = fixed_game(1, 2, 1);
        game.game_over = true;
        let err = game.place(2, 4, 1).unwrap_err();
        assert_eq!(err, RuleError::GameOver);
    }
}

//! board - pure Reversi board representation and move legality
//!
//! no I/O, no async, no back-references: flip logic is a free function over
//! `(&Board, mover, opponent)` rather than cells holding a pointer back to
//! their owning game.

use rand::Rng;
use serde::{Deserialize, Serialize};

pub const BOARD_SIZE: usize = 8;

/// which seat owns a cell, if any
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Owner {
    None,
    P1,
    P2,
}

impl Owner {
    /// the other player's owner tag; panics on `Owner::None`, which is never
    /// a valid "current player" value
    pub fn opponent(&self) -> Owner {
        match self {
            Owner::P1 => Owner::P2,
            Owner::P2 => Owner::P1,
            Owner::None => panic!("Owner::None has no opponent"),
        }
    }
}

/// a single board position; coordinates are immutable, owner is not
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    pub row: i8,
    pub column: i8,
    pub owner: Owner,
}

impl Cell {
    /// chess-like field name: column -> A..H, row 0 -> rank 8
    pub fn field_name(&self) -> String {
        let col = (b'A' + self.column as u8) as char;
        let rank = 8 - self.row;
        format!("{col}{rank}")
    }
}

/// the three canonical initial disc layouts
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartPattern {
    Diagonal,
    Horizontal,
    Vertical,
}

impl StartPattern {
    /// uniformly random start pattern
    pub fn random() -> StartPattern {
        match rand::thread_rng().gen_range(0..3) {
            0 => StartPattern::Diagonal,
            1 => StartPattern::Horizontal,
            _ => StartPattern::Vertical,
        }
    }

    /// the four center cells as (row, column, owner), per the §4.1 table
    fn layout(&self) -> [(i8, i8, Owner); 4] {
        match self {
            // player_1: (3,3),(4,4) / player_2: (3,4),(4,3)
            StartPattern::Diagonal => [
                (3, 3, Owner::P1),
                (4, 4, Owner::P1),
                (3, 4, Owner::P2),
                (4, 3, Owner::P2),
            ],
            // player_1: (3,3),(3,4) / player_2: (4,3),(4,4)
            StartPattern::Horizontal => [
                (3, 3, Owner::P1),
                (3, 4, Owner::P1),
                (4, 3, Owner::P2),
                (4, 4, Owner::P2),
            ],
            // player_1: (3,3),(4,3) / player_2: (3,4),(4,4)
            StartPattern::Vertical => [
                (3, 3, Owner::P1),
                (4, 3, Owner::P1),
                (3, 4, Owner::P2),
                (4, 4, Owner::P2),
            ],
        }
    }
}

/// all 8 compass direction vectors (column-delta, row-delta)
pub const DIRECTIONS: [(i8, i8); 8] = [
    (0, -1),  // N
    (1, -1),  // NE
    (1, 0),   // E
    (1, 1),   // SE
    (0, 1),   // S
    (-1, 1),  // SW
    (-1, 0),  // W
    (-1, -1), // NW
];

/// an 8x8 grid of cells plus the accepted-move counter
#[derive(Clone, Debug)]
pub struct Board {
    cells: [[Cell; BOARD_SIZE]; BOARD_SIZE],
    turn: u32,
}

impl Board {
    /// builds an empty board, then applies `pattern`'s starting discs.
    /// `turn` is set to 1, per the "turn 1 is the first real move"
    /// convention (see design notes).
    pub fn new(pattern: StartPattern) -> Board {
        let mut cells = [[Cell { row: 0, column: 0, owner: Owner::None }; BOARD_SIZE]; BOARD_SIZE];
        for (row, line) in cells.iter_mut().enumerate() {
            for (column, cell) in line.iter_mut().enumerate() {
                cell.row = row as i8;
                cell.column = column as i8;
            }
        }
        let mut board = Board { cells, turn: 1 };
        for (row, column, owner) in pattern.layout() {
            board.cells[row as usize][column as usize].owner = owner;
        }
        board
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn cell(&self, row: i8, column: i8) -> Option<&Cell> {
        if (0..BOARD_SIZE as i8).contains(&row) && (0..BOARD_SIZE as i8).contains(&column) {
            Some(&self.cells[row as usize][column as usize])
        } else {
            None
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().flatten()
    }

    pub fn count(&self, player: Owner) -> usize {
        self.cells().filter(|c| c.owner == player).count()
    }

    fn in_bounds(row: i8, column: i8) -> bool {
        (0..BOARD_SIZE as i8).contains(&row) && (0..BOARD_SIZE as i8).contains(&column)
    }

    /// cells that would flip to `player` if they placed at (row, column).
    /// Empty when the move is illegal for any reason other than "occupied".
    pub fn flips(&self, row: i8, column: i8, player: Owner) -> Vec<(i8, i8)> {
        if !Self::in_bounds(row, column) || self.cells[row as usize][column as usize].owner != Owner::None {
            return Vec::new();
        }
        let opponent = player.opponent();
        let mut flips = Vec::new();
        for &(dc, dr) in DIRECTIONS.iter() {
            let mut run = Vec::new();
            let (mut r, mut c) = (row + dr, column + dc);
            while Self::in_bounds(r, c) {
                match self.cells[r as usize][c as usize].owner {
                    o if o == opponent => run.push((r, c)),
                    o if o == player => {
                        if !run.is_empty() {
                            flips.extend(run);
                        }
                        break;
                    }
                    _ => break, // empty cell terminates the walk with no flip
                }
                r += dr;
                c += dc;
            }
        }
        flips
    }

    pub fn is_legal(&self, row: i8, column: i8, player: Owner) -> bool {
        Self::in_bounds(row, column)
            && self.cells[row as usize][column as usize].owner == Owner::None
            && !self.flips(row, column, player).is_empty()
    }

    /// every empty cell for which `player` has a non-empty flip set
    pub fn legal_moves(&self, player: Owner) -> Vec<(i8, i8)> {
        let mut moves = Vec::new();
        for row in 0..BOARD_SIZE as i8 {
            for column in 0..BOARD_SIZE as i8 {
                if self.is_legal(row, column, player) {
                    moves.push((row, column));
                }
            }
        }
        moves
    }

    /// places `player`'s disc at (row, column) and flips all affected
    /// cells, atomically. Returns the flipped cells, or `None` if the move
    /// is illegal (no state is changed in that case).
    pub fn apply(&mut self, row: i8, column: i8, player: Owner) -> Option<Vec<(i8, i8)>> {
        if !Self::in_bounds(row, column) || self.cells[row as usize][column as usize].owner != Owner::None {
            return None;
        }
        let flips = self.flips(row, column, player);
        if flips.is_empty() {
            return None;
        }
        self.cells[row as usize][column as usize].owner = player;
        for &(r, c) in &flips {
            self.cells[r as usize][c as usize].owner = player;
        }
        self.turn += 1;
        Some(flips)
    }

    pub fn is_full(&self) -> bool {
        self.cells().all(|c| c.owner != Owner::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_owned(board: &Board) -> usize {
        board.count(Owner::P1) + board.count(Owner::P2)
    }

    #[test]
    fn diagonal_setup_has_four_discs_two_each() {
        let board = Board::new(StartPattern::Diagonal);
        assert_eq!(board.count(Owner::P1), 2);
        assert_eq!(board.count(Owner::P2), 2);
        assert_eq!(count_owned(&board), 4);
        assert_eq!(board.turn(), 1);
    }

    #[test]
    fn horizontal_setup_matches_pattern() {
        let board = Board::new(StartPattern::Horizontal);
        assert_eq!(board.cell(3, 3).unwrap().owner, Owner::P1);
        assert_eq!(board.cell(3, 4).unwrap().owner, Owner::P1);
        assert_eq!(board.cell(4, 3).unwrap().owner, Owner::P2);
        assert_eq!(board.cell(4, 4).unwrap().owner, Owner::P2);
    }

    #[test]
    fn vertical_setup_matches_pattern() {
        let board = Board::new(StartPattern::Vertical);
        assert_eq!(board.cell(3, 3).unwrap().owner, Owner::P1);
        assert_eq!(board.cell(4, 3).unwrap().owner, Owner::P1);
        assert_eq!(board.cell(3, 4).unwrap().owner, Owner::P2);
        assert_eq!(board.cell(4, 4).unwrap().owner, Owner::P2);
    }

    #[test]
    fn field_name_maps_row0_to_rank8() {
        let board = Board::new(StartPattern::Diagonal);
        assert_eq!(board.cell(0, 0).unwrap().field_name(), "A8");
        assert_eq!(board.cell(7, 0).unwrap().field_name(), "A1");
        assert_eq!(board.cell(0, 7).unwrap().field_name(), "H8");
    }

    #[test]
    fn legal_move_on_diagonal_start_flips_one_disc() {
        // diagonal: p1 at (3,3)/(4,4), p2 at (3,4)/(4,3)
        let board = Board::new(StartPattern::Diagonal);
        // placing p1 at (2,4) should flip (3,4) (south walk hits p2 then p1)
        assert!(board.is_legal(2, 4, Owner::P1));
        let flips = board.flips(2, 4, Owner::P1);
        assert_eq!(flips, vec![(3, 4)]);
    }

    #[test]
    fn occupied_cell_is_never_legal() {
        let board = Board::new(StartPattern::Diagonal);
        assert!(!board.is_legal(3, 3, Owner::P1));
        assert!(!board.is_legal(3, 3, Owner::P2));
    }

    #[test]
    fn apply_move_is_atomic_on_success() {
        let mut board = Board::new(StartPattern::Diagonal);
        let before_turn = board.turn();
        let flips = board.apply(2, 4, Owner::P1).unwrap();
        assert_eq!(flips, vec![(3, 4)]);
        assert_eq!(board.cell(2, 4).unwrap().owner, Owner::P1);
        assert_eq!(board.cell(3, 4).unwrap().owner, Owner::P1);
        assert_eq!(board.turn(), before_turn + 1);
        assert_eq!(count_owned(&board), 6);
    }

    #[test]
    fn apply_rejects_illegal_move_without_mutating_board() {
        let mut board = Board::new(StartPattern::Diagonal);
        let snapshot = board.clone();
        assert!(board.apply(3, 3, Owner::P1).is_none());
        assert_eq!(board.count(Owner::P1), snapshot.count(Owner::P1));
        assert_eq!(board.count(Owner::P2), snapshot.count(Owner::P2));
        assert_eq!(board.turn(), snapshot.turn());
    }

    #[test]
    fn legal_moves_enumerates_every_empty_flipping_cell() {
        let board = Board::new(StartPattern::Diagonal);
        let moves = board.legal_moves(Owner::P1);
        // classic Reversi opening: each side has exactly 4 legal moves
        assert_eq!(moves.len(), 4);
        for (r, c) in moves {
            assert!(board.is_legal(r, c, Owner::P1));
        }
    }
}

//! Board representation and outcome evaluation for tic-tac-toe.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Number of cells on the board.
pub const BOARD_CELLS: usize = 9;

/// A player's mark on the board.
///
/// `X` belongs to the challenger (player one) and always moves first;
/// `O` belongs to the invited opponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mark {
    /// Player X (goes first).
    X,
    /// Player O (goes second).
    O,
}

impl Mark {
    /// Returns the opposing mark.
    pub fn opponent(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

impl std::fmt::Display for Mark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mark::X => write!(f, "X"),
            Mark::O => write!(f, "O"),
        }
    }
}

/// A single cell on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cell {
    /// No mark placed yet.
    #[default]
    Empty,
    /// Cell claimed by a mark. Cells never revert to empty within a match.
    Taken(Mark),
}

/// Result of evaluating a board for an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// No winning line and at least one empty cell remains.
    InProgress,
    /// A line of three matching marks exists.
    Won(Mark),
    /// Board is full with no winning line.
    Draw,
}

/// The eight winning lines, scanned rows first, then columns, then
/// diagonals. A legal board has at most one winning mark, so the scan
/// order only determines which line is found, not who wins.
const LINES: [[usize; 3]; 8] = [
    // Rows
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    // Columns
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    // Diagonals
    [0, 4, 8],
    [2, 4, 6],
];

/// 3x3 tic-tac-toe board, cells in row-major order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    cells: [Cell; BOARD_CELLS],
}

impl Board {
    /// Creates a new empty board.
    pub fn new() -> Self {
        Self {
            cells: [Cell::Empty; BOARD_CELLS],
        }
    }

    /// Gets the cell at the given index (0-8).
    pub fn get(&self, index: usize) -> Option<Cell> {
        self.cells.get(index).copied()
    }

    /// Checks whether the cell at the given index is empty.
    pub fn is_vacant(&self, index: usize) -> bool {
        matches!(self.get(index), Some(Cell::Empty))
    }

    /// Checks whether every cell holds a mark.
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|c| *c != Cell::Empty)
    }

    /// Returns all cells as a slice.
    pub fn cells(&self) -> &[Cell; BOARD_CELLS] {
        &self.cells
    }

    /// Places a mark in an empty cell.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidCell`] if the index is out of range
    /// or the cell is already taken.
    #[instrument(skip(self))]
    pub fn place(&mut self, index: usize, mark: Mark) -> Result<(), EngineError> {
        if !self.is_vacant(index) {
            return Err(EngineError::InvalidCell { cell: index });
        }
        self.cells[index] = Cell::Taken(mark);
        Ok(())
    }

    /// Evaluates the board for a winner or draw.
    ///
    /// Scans the eight lines in the fixed order of [`LINES`] and returns
    /// the mark of the first fully-matching line, `Draw` if the board is
    /// full without one, or `InProgress` otherwise.
    #[instrument(skip(self))]
    pub fn verdict(&self) -> Verdict {
        for [a, b, c] in LINES {
            if let Cell::Taken(mark) = self.cells[a] {
                if self.cells[b] == Cell::Taken(mark) && self.cells[c] == Cell::Taken(mark) {
                    return Verdict::Won(mark);
                }
            }
        }

        if self.is_full() {
            Verdict::Draw
        } else {
            Verdict::InProgress
        }
    }

    /// Formats the board as a human-readable grid.
    pub fn display(&self) -> String {
        let mut out = String::new();
        for row in 0..3 {
            for col in 0..3 {
                let symbol = match self.cells[row * 3 + col] {
                    Cell::Empty => ".".to_string(),
                    Cell::Taken(mark) => mark.to_string(),
                };
                out.push_str(&symbol);
                if col < 2 {
                    out.push('|');
                }
            }
            if row < 2 {
                out.push_str("\n-+-+-\n");
            }
        }
        out
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_from(marks: [u8; 9]) -> Board {
        let mut board = Board::new();
        for (i, m) in marks.iter().enumerate() {
            match m {
                1 => board.place(i, Mark::X).unwrap(),
                2 => board.place(i, Mark::O).unwrap(),
                _ => {}
            }
        }
        board
    }

    #[test]
    fn empty_board_in_progress() {
        assert_eq!(Board::new().verdict(), Verdict::InProgress);
    }

    #[test]
    fn top_row_wins_for_x() {
        let board = board_from([1, 1, 1, 0, 0, 0, 0, 0, 0]);
        assert_eq!(board.verdict(), Verdict::Won(Mark::X));
    }

    #[test]
    fn column_wins_for_o() {
        let board = board_from([2, 1, 1, 2, 0, 0, 2, 0, 1]);
        assert_eq!(board.verdict(), Verdict::Won(Mark::O));
    }

    #[test]
    fn anti_diagonal_wins() {
        let board = board_from([1, 1, 2, 0, 2, 0, 2, 0, 1]);
        assert_eq!(board.verdict(), Verdict::Won(Mark::O));
    }

    #[test]
    fn full_board_without_line_is_draw() {
        let board = board_from([1, 2, 1, 2, 1, 2, 2, 1, 2]);
        assert_eq!(board.verdict(), Verdict::Draw);
    }

    #[test]
    fn incomplete_line_is_in_progress() {
        let board = board_from([1, 1, 0, 2, 2, 0, 0, 0, 0]);
        assert_eq!(board.verdict(), Verdict::InProgress);
    }

    #[test]
    fn place_rejects_occupied_cell() {
        let mut board = Board::new();
        board.place(4, Mark::X).unwrap();
        let err = board.place(4, Mark::O).unwrap_err();
        assert_eq!(err, EngineError::InvalidCell { cell: 4 });
        assert_eq!(board.get(4), Some(Cell::Taken(Mark::X)));
    }

    #[test]
    fn place_rejects_out_of_range() {
        let mut board = Board::new();
        assert!(board.place(9, Mark::X).is_err());
        assert_eq!(board.cells().len(), 9);
    }
}

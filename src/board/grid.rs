//! The flat 3x3 grid and its win/draw detection.

use serde::{Deserialize, Serialize};

/// Player symbol. X always moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    /// Player X (goes first).
    X,
    /// Player O (goes second; the computer in AI games).
    O,
}

impl Mark {
    /// Returns the opposing symbol.
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

/// Result of evaluating a board position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The game continues.
    Ongoing,
    /// A full line of one symbol exists.
    Won(Mark),
    /// Every cell is taken and no line is complete.
    Draw,
}

/// The eight winning lines of a 3x3 grid, as (row, col) triples.
pub(crate) const LINES: [[(usize, usize); 3]; 8] = [
    [(0, 0), (0, 1), (0, 2)],
    [(1, 0), (1, 1), (1, 2)],
    [(2, 0), (2, 1), (2, 2)],
    [(0, 0), (1, 0), (2, 0)],
    [(0, 1), (1, 1), (2, 1)],
    [(0, 2), (1, 2), (2, 2)],
    [(0, 0), (1, 1), (2, 2)],
    [(0, 2), (1, 1), (2, 0)],
];

/// A 3x3 grid of optionally-claimed cells.
///
/// Used directly as the standard board and nine times over as the
/// micro-grids of the ultimate board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Grid {
    cells: [[Option<Mark>; 3]; 3],
}

impl Grid {
    /// Creates an empty grid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cell at (row, col).
    pub fn get(&self, row: usize, col: usize) -> Option<Mark> {
        self.cells[row][col]
    }

    /// Claims an empty cell for `mark`.
    ///
    /// The caller must have validated the move already; writing to an
    /// occupied or out-of-range cell is a caller bug, not a runtime
    /// condition surfaced to the peer.
    pub fn set(&mut self, row: usize, col: usize, mark: Mark) {
        debug_assert!(row < 3 && col < 3, "cell out of range");
        debug_assert!(self.cells[row][col].is_none(), "cell already taken");
        self.cells[row][col] = Some(mark);
    }

    /// Clears a cell. Only the AI search uses this, to undo trial moves.
    pub(crate) fn clear(&mut self, row: usize, col: usize) {
        self.cells[row][col] = None;
    }

    /// True if the cell is in range and unclaimed.
    pub fn is_open(&self, row: usize, col: usize) -> bool {
        row < 3 && col < 3 && self.cells[row][col].is_none()
    }

    /// True if no cell is unclaimed.
    pub fn is_full(&self) -> bool {
        self.cells.iter().flatten().all(|c| c.is_some())
    }

    /// Evaluates the grid for a win or draw.
    pub fn outcome(&self) -> Outcome {
        for line in &LINES {
            let [a, b, c] = line.map(|(r, k)| self.cells[r][k]);
            if let Some(mark) = a {
                if b == Some(mark) && c == Some(mark) {
                    return Outcome::Won(mark);
                }
            }
        }
        if self.is_full() {
            Outcome::Draw
        } else {
            Outcome::Ongoing
        }
    }

    /// Row-major view of the cells, as serialized on the wire.
    pub fn cells(&self) -> &[[Option<Mark>; 3]; 3] {
        &self.cells
    }
}

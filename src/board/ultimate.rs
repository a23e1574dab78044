//! The nested "ultimate" board: nine micro-grids plus a macro-grid.

use serde::{Deserialize, Serialize};

use super::grid::{Grid, LINES, Mark, Outcome};

/// Recorded outcome of one micro-grid inside the macro-grid.
///
/// Unlike an ordinary cell, a macro cell can be claimed by a draw, which
/// blocks both players from scoring that cell in a macro line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MacroCell {
    /// Micro-grid won by X.
    X,
    /// Micro-grid won by O.
    O,
    /// Micro-grid filled with no winner.
    #[serde(rename = "draw")]
    Draw,
}

impl MacroCell {
    /// The winning symbol, if this cell was won rather than drawn.
    pub fn mark(self) -> Option<Mark> {
        match self {
            MacroCell::X => Some(Mark::X),
            MacroCell::O => Some(Mark::O),
            MacroCell::Draw => None,
        }
    }
}

impl From<Mark> for MacroCell {
    fn from(mark: Mark) -> Self {
        match mark {
            Mark::X => MacroCell::X,
            Mark::O => MacroCell::O,
        }
    }
}

/// Full state of an ultimate tic-tac-toe board.
///
/// Cells are addressed by absolute coordinates 0..=8; a cell at
/// `(row, col)` lives in the micro-grid at macro coordinates
/// `(row / 3, col / 3)`, local cell `(row % 3, col % 3)`. Micro-grids are
/// stored row-major, index `macro_row * 3 + macro_col`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UltimateBoard {
    micro: [Grid; 9],
    macro_cells: [[Option<MacroCell>; 3]; 3],
    /// Macro coordinates of the micro-grid the next move is confined to.
    /// `None` means any undecided micro-grid is playable.
    active: Option<(usize, usize)>,
}

impl UltimateBoard {
    /// Creates an empty board with no move constraint.
    pub fn new() -> Self {
        Self::default()
    }

    /// The nine micro-grids, row-major.
    pub fn micro_boards(&self) -> &[Grid; 9] {
        &self.micro
    }

    /// The macro-grid of decided micro-grid outcomes.
    pub fn macro_cells(&self) -> &[[Option<MacroCell>; 3]; 3] {
        &self.macro_cells
    }

    /// Macro coordinates of the currently constrained micro-grid, if any.
    pub fn active_micro(&self) -> Option<(usize, usize)> {
        self.active
    }

    /// True if every cell of the board is empty.
    pub fn is_untouched(&self) -> bool {
        self.micro.iter().all(|g| *g == Grid::new())
    }

    /// Whether a move at absolute `(row, col)` is legal under the current
    /// constraint: inside the active micro-grid (when one is set and still
    /// undecided), targeting an undecided micro-grid, on an open cell.
    pub fn is_legal(&self, row: usize, col: usize) -> bool {
        if row >= 9 || col >= 9 {
            return false;
        }
        let (mr, mc) = (row / 3, col / 3);
        if let Some(active) = self.active {
            // A constraint pointing at a decided micro-grid has lapsed.
            if self.macro_cells[active.0][active.1].is_none() && (mr, mc) != active {
                return false;
            }
        }
        if self.macro_cells[mr][mc].is_some() {
            return false;
        }
        self.micro[mr * 3 + mc].is_open(row % 3, col % 3)
    }

    /// Applies a legal move and returns the macro-level outcome.
    ///
    /// Promotes a finished micro-grid into its macro cell and re-derives
    /// the next constraint: the micro-grid addressed by the local cell
    /// just played, lifted to "unconstrained" if that target is decided.
    /// The caller must have checked [`UltimateBoard::is_legal`] first.
    pub fn apply(&mut self, row: usize, col: usize, mark: Mark) -> Outcome {
        debug_assert!(self.is_legal(row, col), "illegal move reached apply");
        let (mr, mc) = (row / 3, col / 3);
        let (lr, lc) = (row % 3, col % 3);
        self.micro[mr * 3 + mc].set(lr, lc, mark);

        match self.micro[mr * 3 + mc].outcome() {
            Outcome::Won(winner) => self.macro_cells[mr][mc] = Some(winner.into()),
            Outcome::Draw => self.macro_cells[mr][mc] = Some(MacroCell::Draw),
            Outcome::Ongoing => {}
        }

        let outcome = self.macro_outcome();
        if outcome == Outcome::Ongoing {
            self.active = if self.macro_cells[lr][lc].is_some() {
                None
            } else {
                Some((lr, lc))
            };
        }
        outcome
    }

    /// Evaluates the macro-grid. Drawn macro cells count for neither side.
    pub fn macro_outcome(&self) -> Outcome {
        for line in &LINES {
            let [a, b, c] = line.map(|(r, k)| self.macro_cells[r][k]);
            if let Some(mark) = a.and_then(MacroCell::mark) {
                if b.and_then(MacroCell::mark) == Some(mark)
                    && c.and_then(MacroCell::mark) == Some(mark)
                {
                    return Outcome::Won(mark);
                }
            }
        }
        if self
            .macro_cells
            .iter()
            .flatten()
            .all(|cell| cell.is_some())
        {
            Outcome::Draw
        } else {
            Outcome::Ongoing
        }
    }

    /// All absolute coordinates legal for the next move, row-major within
    /// the constrained micro-grid, or across every undecided micro-grid
    /// when unconstrained.
    pub fn legal_moves(&self) -> Vec<(usize, usize)> {
        let mut moves = Vec::new();
        if let Some((mr, mc)) = self.active {
            if self.macro_cells[mr][mc].is_none() {
                self.collect_micro_moves(mr, mc, &mut moves);
                return moves;
            }
        }
        for mr in 0..3 {
            for mc in 0..3 {
                if self.macro_cells[mr][mc].is_none() {
                    self.collect_micro_moves(mr, mc, &mut moves);
                }
            }
        }
        moves
    }

    /// Test-only backdoor for fabricating macro positions directly.
    #[cfg(test)]
    pub(crate) fn force_macro_cell(&mut self, mr: usize, mc: usize, cell: Option<MacroCell>) {
        self.macro_cells[mr][mc] = cell;
    }

    fn collect_micro_moves(&self, mr: usize, mc: usize, moves: &mut Vec<(usize, usize)>) {
        let grid = &self.micro[mr * 3 + mc];
        for lr in 0..3 {
            for lc in 0..3 {
                if grid.is_open(lr, lc) {
                    moves.push((mr * 3 + lr, mc * 3 + lc));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fills micro-grid (mr, mc) with a win for `mark` on its top row.
    fn win_micro(board: &mut UltimateBoard, mr: usize, mc: usize, mark: Mark) {
        let loser = mark.opponent();
        board.micro[mr * 3 + mc].set(0, 0, mark);
        board.micro[mr * 3 + mc].set(0, 1, mark);
        board.micro[mr * 3 + mc].set(1, 0, loser);
        board.active = Some((mr, mc));
        assert_eq!(board.apply(mr * 3, mc * 3 + 2, mark), Outcome::Ongoing);
        assert_eq!(board.macro_cells[mr][mc], Some(mark.into()));
    }

    #[test]
    fn fresh_board_is_unconstrained() {
        let board = UltimateBoard::new();
        assert_eq!(board.active_micro(), None);
        assert_eq!(board.legal_moves().len(), 81);
        assert!(board.is_untouched());
    }

    #[test]
    fn move_constrains_the_matching_micro_grid() {
        let mut board = UltimateBoard::new();
        // Cell (2, 2) of micro (1, 1) sends the opponent to micro (2, 2).
        assert_eq!(board.apply(5, 5, Mark::X), Outcome::Ongoing);
        assert_eq!(board.active_micro(), Some((2, 2)));
        assert!(board.is_legal(8, 8));
        assert!(!board.is_legal(0, 0));
    }

    #[test]
    fn decided_target_lifts_the_constraint() {
        let mut board = UltimateBoard::new();
        win_micro(&mut board, 2, 2, Mark::X);
        // A move whose local cell points at the decided micro (2, 2)
        // leaves the next player unconstrained.
        board.active = None;
        assert_eq!(board.apply(2, 2, Mark::O), Outcome::Ongoing);
        assert_eq!(board.active_micro(), None);
        assert!(board.is_legal(0, 0));
        // But cells inside the decided micro-grid stay illegal.
        assert!(!board.is_legal(7, 7));
    }

    #[test]
    fn occupied_cell_is_illegal() {
        let mut board = UltimateBoard::new();
        board.apply(4, 4, Mark::X);
        assert!(!board.is_legal(4, 4));
    }

    #[test]
    fn out_of_range_is_illegal() {
        let board = UltimateBoard::new();
        assert!(!board.is_legal(9, 0));
        assert!(!board.is_legal(0, 9));
    }

    #[test]
    fn three_macro_cells_win_the_game() {
        let mut board = UltimateBoard::new();
        win_micro(&mut board, 0, 0, Mark::X);
        win_micro(&mut board, 0, 1, Mark::X);
        let mark = Mark::X;
        board.micro[2].set(0, 0, mark);
        board.micro[2].set(0, 1, mark);
        board.active = Some((0, 2));
        assert_eq!(board.apply(0, 8, mark), Outcome::Won(Mark::X));
        assert!(board.macro_outcome() == Outcome::Won(Mark::X));
    }

    #[test]
    fn drawn_macro_cell_counts_for_neither_side() {
        let mut board = UltimateBoard::new();
        board.macro_cells[0][0] = Some(MacroCell::X);
        board.macro_cells[0][1] = Some(MacroCell::Draw);
        board.macro_cells[0][2] = Some(MacroCell::X);
        assert_eq!(board.macro_outcome(), Outcome::Ongoing);
    }

    #[test]
    fn legal_moves_respect_constraint() {
        let mut board = UltimateBoard::new();
        board.apply(5, 5, Mark::X);
        let moves = board.legal_moves();
        assert_eq!(moves.len(), 9);
        assert!(moves.iter().all(|&(r, c)| r / 3 == 2 && c / 3 == 2));
    }
}

//! Exhaustive minimax for the flat 3x3 board.

use tracing::instrument;

use crate::board::{Grid, Mark, Outcome};

/// Score of a decided position before depth adjustment.
const WIN_SCORE: i32 = 10;

/// Finds the strongest move for `ai` on a flat board.
///
/// Tries every open cell in row-major order and keeps the first cell
/// achieving the strict maximum score, so ties resolve to the
/// earliest-scanned cell. Depth adjustment prefers faster wins and
/// slower losses. Returns `None` only when the board has no open cell.
#[instrument(skip(board))]
pub fn find_best_move(mut board: Grid, ai: Mark) -> Option<(usize, usize)> {
    let mut best_val = i32::MIN;
    let mut best_move = None;

    for row in 0..3 {
        for col in 0..3 {
            if !board.is_open(row, col) {
                continue;
            }
            board.set(row, col, ai);
            let val = minimax(&mut board, ai, 0, false);
            board.clear(row, col);
            if val > best_val {
                best_val = val;
                best_move = Some((row, col));
            }
        }
    }
    best_move
}

/// Recursive game-tree value from the perspective of `ai`.
///
/// `maximizing` is true when `ai` is to move. Wins score `10 - depth`,
/// losses `-10 + depth`, a full board scores 0. With at most nine plies
/// there is no need for pruning.
fn minimax(board: &mut Grid, ai: Mark, depth: i32, maximizing: bool) -> i32 {
    match board.outcome() {
        Outcome::Won(winner) if winner == ai => return WIN_SCORE - depth,
        Outcome::Won(_) => return -WIN_SCORE + depth,
        Outcome::Draw => return 0,
        Outcome::Ongoing => {}
    }

    let mover = if maximizing { ai } else { ai.opponent() };
    let mut best = if maximizing { i32::MIN } else { i32::MAX };
    for row in 0..3 {
        for col in 0..3 {
            if !board.is_open(row, col) {
                continue;
            }
            board.set(row, col, mover);
            let val = minimax(board, ai, depth + 1, !maximizing);
            board.clear(row, col);
            best = if maximizing {
                best.max(val)
            } else {
                best.min(val)
            };
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn grid_from(marks: &[(usize, usize, Mark)]) -> Grid {
        let mut g = Grid::new();
        for &(r, c, m) in marks {
            g.set(r, c, m);
        }
        g
    }

    #[test]
    fn takes_an_immediate_win() {
        // O can complete the middle column.
        let board = grid_from(&[
            (0, 1, Mark::O),
            (1, 1, Mark::O),
            (0, 0, Mark::X),
            (1, 0, Mark::X),
        ]);
        assert_eq!(find_best_move(board, Mark::O), Some((2, 1)));
    }

    #[test]
    fn blocks_an_immediate_loss() {
        // X threatens the top row; O must play (0, 2).
        let board = grid_from(&[(0, 0, Mark::X), (0, 1, Mark::X), (1, 1, Mark::O)]);
        assert_eq!(find_best_move(board, Mark::O), Some((0, 2)));
    }

    #[test]
    fn prefers_the_faster_win() {
        // Each side has exactly one immediate win: X completes column 2
        // at (2, 2), O completes column 0 at (2, 0). Depth adjustment
        // makes the immediate win outscore any delayed one, even though
        // (2, 0) scans earlier for X and would also win eventually.
        let board = grid_from(&[
            (0, 0, Mark::O),
            (1, 0, Mark::O),
            (0, 2, Mark::X),
            (1, 2, Mark::X),
        ]);
        assert_eq!(find_best_move(board, Mark::X), Some((2, 2)));
        assert_eq!(find_best_move(board, Mark::O), Some((2, 0)));
    }

    #[test]
    fn full_board_yields_no_move() {
        let board = grid_from(&[
            (0, 0, Mark::X),
            (0, 1, Mark::O),
            (0, 2, Mark::X),
            (1, 0, Mark::O),
            (1, 1, Mark::X),
            (1, 2, Mark::O),
            (2, 0, Mark::O),
            (2, 1, Mark::X),
            (2, 2, Mark::O),
        ]);
        assert_eq!(find_best_move(board, Mark::X), None);
    }

    /// Game-theoretic value for the side to move: 1 win, 0 draw, -1 loss.
    /// Independent of the engine's depth-adjusted scoring.
    fn solve(board: &mut Grid, to_move: Mark) -> i8 {
        match board.outcome() {
            // The mover never finds the position already won for them;
            // a decided board was decided by the previous mover.
            Outcome::Won(_) => return -1,
            Outcome::Draw => return 0,
            Outcome::Ongoing => {}
        }
        let mut best = -1;
        for row in 0..3 {
            for col in 0..3 {
                if board.is_open(row, col) {
                    board.set(row, col, to_move);
                    best = best.max(-solve(board, to_move.opponent()));
                    board.clear(row, col);
                }
            }
        }
        best
    }

    /// Walks every reachable position and checks that the engine's chosen
    /// move preserves the game-theoretic value for the side to move. In
    /// particular the engine never turns a non-losing position into a
    /// losing one.
    #[test]
    fn optimal_on_every_reachable_position() {
        fn walk(board: &mut Grid, to_move: Mark, seen: &mut HashSet<(Grid, Mark)>) {
            if board.outcome() != Outcome::Ongoing || !seen.insert((*board, to_move)) {
                return;
            }
            let optimal = solve(board, to_move);
            let (row, col) =
                find_best_move(*board, to_move).expect("ongoing position has a move");
            board.set(row, col, to_move);
            let achieved = match board.outcome() {
                Outcome::Won(_) => 1,
                Outcome::Draw => 0,
                Outcome::Ongoing => -solve(board, to_move.opponent()),
            };
            assert_eq!(achieved, optimal, "engine move loses value at {board:?}");
            board.clear(row, col);

            for row in 0..3 {
                for col in 0..3 {
                    if board.is_open(row, col) {
                        board.set(row, col, to_move);
                        walk(board, to_move.opponent(), seen);
                        board.clear(row, col);
                    }
                }
            }
        }

        let mut seen = HashSet::new();
        walk(&mut Grid::new(), Mark::X, &mut seen);
        assert!(seen.len() > 4000, "search space unexpectedly small");
    }
}

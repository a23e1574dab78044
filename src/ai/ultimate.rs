//! Depth-limited alpha-beta search for the ultimate board.
//!
//! Exhaustive search is infeasible here (branching factor up to 81), so
//! the engine looks a fixed number of plies ahead and scores leaves with
//! a weighted line-control heuristic.

use tracing::instrument;

use crate::board::{Grid, MacroCell, Mark, Outcome, UltimateBoard};

/// Plies searched below the root. Higher is stronger but slower.
const SEARCH_DEPTH: u32 = 3;

/// Score of a decided macro-grid at any depth.
const MACRO_WIN: i32 = 10_000;

/// Weight of macro-grid line control relative to a single micro-grid's.
const MACRO_WEIGHT: i32 = 200;

/// Finds the strongest move for `ai` on an ultimate board.
///
/// On a completely empty board the search is skipped and the center cell
/// returned outright. Returns `None` when no legal move exists, which the
/// caller treats as a drawn position rather than an error.
#[instrument(skip(board))]
pub fn find_best_ultimate_move(board: UltimateBoard, ai: Mark) -> Option<(usize, usize)> {
    let moves = board.legal_moves();
    if moves.len() == 81 {
        return Some((4, 4));
    }

    let mut best_val = i32::MIN;
    let mut best_move = None;
    for (row, col) in moves {
        let mut child = board.clone();
        child.apply(row, col, ai);
        let val = minimax(&child, ai, SEARCH_DEPTH, i32::MIN, i32::MAX, false);
        if val > best_val {
            best_val = val;
            best_move = Some((row, col));
        }
    }
    best_move
}

/// Alpha-beta minimax over ultimate positions, scored for `ai`.
///
/// Cutoffs fire whenever `beta <= alpha`; a cut branch can never change
/// the parent's chosen value, so no score correction is needed.
fn minimax(
    board: &UltimateBoard,
    ai: Mark,
    depth: u32,
    mut alpha: i32,
    mut beta: i32,
    maximizing: bool,
) -> i32 {
    match board.macro_outcome() {
        Outcome::Won(winner) if winner == ai => return MACRO_WIN,
        Outcome::Won(_) => return -MACRO_WIN,
        Outcome::Draw => return 0,
        Outcome::Ongoing => {}
    }
    if depth == 0 {
        return evaluate(board, ai);
    }

    let moves = board.legal_moves();
    if moves.is_empty() {
        return 0;
    }

    let mover = if maximizing { ai } else { ai.opponent() };
    let mut best = if maximizing { i32::MIN } else { i32::MAX };
    for (row, col) in moves {
        let mut child = board.clone();
        child.apply(row, col, mover);
        let val = minimax(&child, ai, depth - 1, alpha, beta, !maximizing);
        if maximizing {
            best = best.max(val);
            alpha = alpha.max(val);
        } else {
            best = best.min(val);
            beta = beta.min(val);
        }
        if beta <= alpha {
            break;
        }
    }
    best
}

/// Leaf heuristic: own weighted line control minus the opponent's.
fn evaluate(board: &UltimateBoard, ai: Mark) -> i32 {
    line_control(board, ai) - line_control(board, ai.opponent())
}

/// Line-control score for one player: the macro-grid weighted by
/// [`MACRO_WEIGHT`], plus each still-undecided micro-grid at weight one.
fn line_control(board: &UltimateBoard, player: Mark) -> i32 {
    let macro_cells = board.macro_cells();
    let mut score = MACRO_WEIGHT
        * score_grid(player, |r, c| macro_cells[r][c].and_then(MacroCell::mark));

    for mr in 0..3 {
        for mc in 0..3 {
            if macro_cells[mr][mc].is_none() {
                let grid: &Grid = &board.micro_boards()[mr * 3 + mc];
                score += score_grid(player, |r, c| grid.get(r, c));
            }
        }
    }
    score
}

/// Scores one 3x3 grid for `player`: 100 per fully-owned line, 10 per
/// line with two own marks and no opposing mark, 1 per lone mark on an
/// otherwise uncontested line.
fn score_grid(player: Mark, cell: impl Fn(usize, usize) -> Option<Mark>) -> i32 {
    let mut score = 0;
    for line in &crate::board::LINES {
        let mut own = 0;
        let mut theirs = 0;
        for &(r, c) in line {
            match cell(r, c) {
                Some(m) if m == player => own += 1,
                Some(_) => theirs += 1,
                None => {}
            }
        }
        score += match (own, theirs) {
            (3, _) => 100,
            (2, 0) => 10,
            (1, 0) => 1,
            _ => 0,
        };
    }
    score
}

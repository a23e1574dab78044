//! Search engines for the computer opponent.
//!
//! Both engines are pure functions over an owned board snapshot: the
//! session copies its board before handing it to a blocking worker, so
//! no live game state is ever aliased into a search.

mod minimax;
mod ultimate;

pub use minimax::find_best_move;
pub use ultimate::find_best_ultimate_move;

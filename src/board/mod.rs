//! Pure board logic for both game variants.
//!
//! Nothing in this module touches sessions, connections, or the clock;
//! everything operates on plain values so the AI search can run against
//! independent copies of the live boards.

mod grid;
mod ultimate;

pub use grid::{Grid, Mark, Outcome};
pub use ultimate::{MacroCell, UltimateBoard};

pub(crate) use grid::LINES;

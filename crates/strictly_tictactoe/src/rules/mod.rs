//! Game rules for tic-tac-toe.
//!
//! Pure functions evaluating a board snapshot. Rules are kept apart from
//! board storage so callers can evaluate any board, including ones received
//! from a server that the local client did not build itself.

mod draw;
mod win;

pub use draw::{is_draw, is_full};
pub use win::{LINES, Line, check_winner, winning_line};

use crate::{Board, Outcome};
use tracing::instrument;

/// Computes the terminal outcome of a board, if any.
///
/// A completed line wins even on a full board; a full board without one is
/// a draw.
#[instrument(level = "trace")]
pub fn outcome(board: &Board) -> Option<Outcome> {
    if let Some(line) = winning_line(board) {
        return Some(Outcome::Won(line.player));
    }
    is_full(board).then_some(Outcome::Draw)
}

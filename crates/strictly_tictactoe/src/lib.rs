//! Pure tic-tac-toe game logic.
//!
//! Board model plus the stateless win/draw evaluator used by the online
//! session client. Nothing here performs I/O, so every function can be
//! called on an arbitrary board snapshot, including ones a correct game
//! would never produce.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod position;
mod rules;
mod types;

pub use position::Position;
pub use rules::{LINES, Line, check_winner, is_draw, is_full, outcome, winning_line};
pub use types::{Board, Outcome, OutcomeParseError, Player, Square};

/// Alias used by session code, where a player's symbol is called a mark.
pub type Mark = Player;

//! The current game as seen by this client.

use derive_getters::Getters;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use strictly_tictactoe::{Board, Line, Mark, Outcome, Position, Square, outcome, winning_line};
use tracing::{debug, warn};

use super::{RoomId, UserId};

/// Authoritative game state, replaced wholesale by each server snapshot.
///
/// `result` is the single source of truth for termination: a session is
/// terminal exactly when it has a result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters, Serialize, Deserialize)]
#[serde(from = "SessionSnapshot", into = "SessionSnapshot")]
pub struct Session {
    /// The nine cells.
    board: Board,
    /// Mark whose move it is.
    turn: Mark,
    /// Win or draw, once decided.
    result: Option<Outcome>,
    /// User seated as X.
    player_x: Option<UserId>,
    /// User seated as O.
    player_o: Option<UserId>,
    /// Room the game is played in.
    room_id: Option<RoomId>,
}

/// Wire form of a game-state snapshot.
///
/// Every field is optional on input; omitted fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// The nine cells, `null` for empty.
    pub board: Board,
    /// Mark whose move it is.
    pub current_player: Mark,
    /// `"X"`, `"O"`, `"draw"` or `null`.
    pub winner: Option<Outcome>,
    /// Whether the game has ended.
    pub is_game_over: bool,
    /// User seated as X.
    pub player_x: Option<UserId>,
    /// User seated as O.
    pub player_o: Option<UserId>,
    /// Room the game is played in.
    pub room_id: Option<RoomId>,
}

impl From<SessionSnapshot> for Session {
    fn from(snapshot: SessionSnapshot) -> Self {
        let result = match snapshot.winner {
            Some(declared) => Some(declared),
            None => {
                let derived = outcome(&snapshot.board);
                match derived {
                    Some(found) => debug!(outcome = %found, "Derived missing outcome from board"),
                    None if snapshot.is_game_over => {
                        warn!("Snapshot marked over without a decided board, treating as live")
                    }
                    None => {}
                }
                derived
            }
        };
        Self {
            board: snapshot.board,
            turn: snapshot.current_player,
            result,
            player_x: snapshot.player_x,
            player_o: snapshot.player_o,
            room_id: snapshot.room_id,
        }
    }
}

impl From<Session> for SessionSnapshot {
    fn from(session: Session) -> Self {
        Self {
            board: session.board,
            current_player: session.turn,
            winner: session.result,
            is_game_over: session.result.is_some(),
            player_x: session.player_x,
            player_o: session.player_o,
            room_id: session.room_id,
        }
    }
}

/// Where a user sits relative to the current game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Seat {
    /// Plays X.
    X,
    /// Plays O.
    O,
    /// Watches.
    Spectator,
}

impl Seat {
    /// The mark this seat plays, if any.
    pub fn mark(self) -> Option<Mark> {
        match self {
            Seat::X => Some(Mark::X),
            Seat::O => Some(Mark::O),
            Seat::Spectator => None,
        }
    }
}

/// Reason a move is not worth sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum MoveRejection {
    /// Index outside 0-8.
    #[display("cell {_0} is off the board")]
    OutOfRange(usize),
    /// Cell already holds a mark.
    #[display("cell {_0} is occupied")]
    Occupied(usize),
    /// The game has a result.
    #[display("game is over")]
    Terminal,
    /// The mark to move belongs to someone else.
    #[display("not your turn")]
    NotYourTurn,
}

impl Session {
    /// Creates a session from its parts, normalising the result like a snapshot would.
    pub fn from_parts(
        board: Board,
        turn: Mark,
        player_x: Option<UserId>,
        player_o: Option<UserId>,
        room_id: Option<RoomId>,
    ) -> Self {
        SessionSnapshot {
            board,
            current_player: turn,
            winner: None,
            is_game_over: false,
            player_x,
            player_o,
            room_id,
        }
        .into()
    }

    /// Whether the game has a result.
    pub fn is_terminal(&self) -> bool {
        self.result.is_some()
    }

    /// The completed line, when the game was won on the board.
    pub fn winning_line(&self) -> Option<Line> {
        match self.result {
            Some(Outcome::Won(_)) => winning_line(&self.board),
            _ => None,
        }
    }

    /// User holding the given mark.
    pub fn player(&self, mark: Mark) -> Option<&UserId> {
        match mark {
            Mark::X => self.player_x.as_ref(),
            Mark::O => self.player_o.as_ref(),
        }
    }

    /// The other seated player, from `user_id`'s side of the board.
    pub fn opponent_of(&self, user_id: &str) -> Option<&UserId> {
        self.seat(user_id)
            .mark()
            .and_then(|mark| self.player(mark.opponent()))
    }

    /// Seat of `user_id` in this game.
    pub fn seat(&self, user_id: &str) -> Seat {
        if self.player_x.as_deref() == Some(user_id) {
            Seat::X
        } else if self.player_o.as_deref() == Some(user_id) {
            Seat::O
        } else {
            Seat::Spectator
        }
    }

    /// One-line status from the point of view of `user_id`.
    pub fn status_line(&self, user_id: &str) -> String {
        match self.result {
            Some(Outcome::Draw) => "It's a draw!".to_string(),
            Some(Outcome::Won(mark)) => format!("Player {} wins!", mark),
            None => match self.seat(user_id).mark() {
                Some(mark) if mark == self.turn => "Your turn".to_string(),
                Some(_) => "Opponent's turn".to_string(),
                None => format!("Player {}'s turn", self.turn),
            },
        }
    }

    /// Checks whether `user_id` may play `index` right now.
    ///
    /// Advisory only: the server stays authoritative.
    pub fn check_move(&self, index: usize, user_id: &str) -> Result<Position, MoveRejection> {
        let position = Position::from_index(index).ok_or(MoveRejection::OutOfRange(index))?;
        if self.board.get(position) != Square::Empty {
            return Err(MoveRejection::Occupied(index));
        }
        if self.is_terminal() {
            return Err(MoveRejection::Terminal);
        }
        if self.player(self.turn).map(String::as_str) != Some(user_id) {
            return Err(MoveRejection::NotYourTurn);
        }
        Ok(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strictly_tictactoe::Player;

    fn live_game() -> Session {
        serde_json::from_value(json!({
            "board": ["X", null, null, null, "O", null, null, null, null],
            "currentPlayer": "X",
            "winner": null,
            "isGameOver": false,
            "playerX": "alice",
            "playerO": "bob",
            "roomId": "r1"
        }))
        .unwrap()
    }

    #[test]
    fn test_default_session_is_empty() {
        let session = Session::default();
        assert_eq!(*session.board(), Board::new());
        assert_eq!(*session.turn(), Mark::X);
        assert!(!session.is_terminal());
        assert!(session.room_id().is_none());
    }

    #[test]
    fn test_snapshot_fields_map() {
        let session = live_game();
        assert_eq!(session.board().cell(0), Some(Square::Occupied(Player::X)));
        assert_eq!(session.board().cell(4), Some(Square::Occupied(Player::O)));
        assert_eq!(session.player_x().as_deref(), Some("alice"));
        assert_eq!(session.player_o().as_deref(), Some("bob"));
        assert_eq!(session.room_id().as_deref(), Some("r1"));
    }

    #[test]
    fn test_partial_snapshot_defaults_missing_fields() {
        let session: Session = serde_json::from_value(json!({"roomId": "r2"})).unwrap();
        assert_eq!(*session.board(), Board::new());
        assert!(session.player_x().is_none());
        assert_eq!(session.room_id().as_deref(), Some("r2"));
    }

    #[test]
    fn test_winner_draw_is_terminal() {
        let session: Session = serde_json::from_value(json!({
            "board": ["X","O","X","X","O","O","O","X","X"],
            "winner": "draw",
            "isGameOver": true
        }))
        .unwrap();
        assert_eq!(*session.result(), Some(Outcome::Draw));
        assert!(session.is_terminal());
        assert!(session.winning_line().is_none());
        assert_eq!(session.status_line("anyone"), "It's a draw!");
    }

    #[test]
    fn test_missing_winner_is_derived_from_board() {
        let session: Session = serde_json::from_value(json!({
            "board": ["O","O","O","X","X",null,"X",null,null],
            "currentPlayer": "X",
            "isGameOver": true
        }))
        .unwrap();
        assert_eq!(*session.result(), Some(Outcome::Won(Player::O)));
        assert_eq!(session.winning_line().unwrap().indices(), [0, 1, 2]);
    }

    #[test]
    fn test_game_over_flag_without_result_is_ignored() {
        let session: Session = serde_json::from_value(json!({
            "board": ["X", null, null, null, null, null, null, null, null],
            "isGameOver": true
        }))
        .unwrap();
        assert!(!session.is_terminal());
    }

    #[test]
    fn test_serializes_back_to_wire_shape() {
        let value = serde_json::to_value(live_game()).unwrap();
        assert_eq!(value["currentPlayer"], "X");
        assert_eq!(value["isGameOver"], false);
        assert_eq!(value["winner"], serde_json::Value::Null);
        assert_eq!(value["board"][0], "X");
        assert_eq!(value["board"][1], serde_json::Value::Null);
    }

    #[test]
    fn test_seats_and_status() {
        let session = live_game();
        assert_eq!(session.seat("alice"), Seat::X);
        assert_eq!(session.seat("bob"), Seat::O);
        assert_eq!(session.seat("carol"), Seat::Spectator);
        assert_eq!(session.status_line("alice"), "Your turn");
        assert_eq!(session.status_line("bob"), "Opponent's turn");
        assert_eq!(session.status_line("carol"), "Player X's turn");
    }

    #[test]
    fn test_opponent_of_seated_players() {
        let session = live_game();
        assert_eq!(session.opponent_of("alice").map(String::as_str), Some("bob"));
        assert_eq!(session.opponent_of("bob").map(String::as_str), Some("alice"));
        assert_eq!(session.opponent_of("carol"), None);
    }

    #[test]
    fn test_check_move_gates() {
        let session = live_game();
        assert_eq!(session.check_move(8, "alice"), Ok(Position::BottomRight));
        assert_eq!(session.check_move(4, "alice"), Err(MoveRejection::Occupied(4)));
        assert_eq!(session.check_move(9, "alice"), Err(MoveRejection::OutOfRange(9)));
        assert_eq!(session.check_move(8, "bob"), Err(MoveRejection::NotYourTurn));
        assert_eq!(session.check_move(8, "carol"), Err(MoveRejection::NotYourTurn));
    }

    #[test]
    fn test_check_move_rejects_terminal() {
        let mut board = Board::new();
        for pos in [Position::TopLeft, Position::TopCenter, Position::TopRight] {
            board.set(pos, Square::Occupied(Player::X));
        }
        let session = Session::from_parts(
            board,
            Mark::O,
            Some("alice".into()),
            Some("bob".into()),
            None,
        );
        assert!(session.is_terminal());
        assert_eq!(session.check_move(5, "bob"), Err(MoveRejection::Terminal));
        assert_eq!(session.status_line("bob"), "Player X wins!");
    }

    #[test]
    fn test_unseated_turn_rejects_everyone() {
        let session = Session::default();
        assert_eq!(session.check_move(0, ""), Err(MoveRejection::NotYourTurn));
    }
}

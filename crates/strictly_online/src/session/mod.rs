//! Session state and the controller that drives it.

mod controller;
mod game;
mod rooms;
mod state;

pub use controller::{Identity, SessionController};
pub use game::{MoveRejection, Seat, Session, SessionSnapshot};
pub use rooms::{ROOM_CAPACITY, RoomStatus, RoomSummary, screen_listing};
pub use state::{ClientState, Inbound};

/// Opaque user identifier issued by the server.
pub type UserId = String;

/// Opaque room identifier issued by the server.
pub type RoomId = String;

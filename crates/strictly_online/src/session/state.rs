//! Client-side state and its inbound transitions.

use derive_getters::Getters;
use tracing::{debug, instrument, warn};

use super::game::Session;
use super::rooms::{RoomSummary, screen_listing};

/// An inbound event, already decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Full game-state snapshot.
    Snapshot(Session),
    /// Full room listing.
    Rooms(Vec<RoomSummary>),
    /// Server-reported error text.
    ServerError(String),
}

/// Everything the controller exposes to readers.
#[derive(Debug, Clone, Default, PartialEq, Getters)]
pub struct ClientState {
    /// Current game.
    session: Session,
    /// Cached lobby listing.
    rooms: Vec<RoomSummary>,
    /// A request/response call is in flight.
    loading: bool,
    /// Most recent error, verbatim.
    error: Option<String>,
}

impl ClientState {
    /// Applies one inbound event. Every transition replaces its slot wholesale.
    #[instrument(skip_all)]
    pub fn apply(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Snapshot(next) => self.apply_snapshot(next),
            Inbound::Rooms(listing) => self.replace_rooms(listing),
            Inbound::ServerError(message) => {
                warn!(%message, "Server reported error");
                self.error = Some(message);
            }
        }
    }

    fn apply_snapshot(&mut self, next: Session) {
        let current = &self.session;
        let same_game = current.room_id().is_some() && current.room_id() == next.room_id();
        if same_game && !current.is_terminal() && !next.board().extends(current.board()) {
            warn!(
                room_id = ?next.room_id(),
                "Snapshot cleared marks from a live game"
            );
        }
        debug!(room_id = ?next.room_id(), turn = %next.turn(), "Applying game snapshot");
        self.session = next;
    }

    /// Replaces the room cache.
    pub fn replace_rooms(&mut self, listing: Vec<RoomSummary>) {
        self.rooms = screen_listing(&self.rooms, listing);
        debug!(rooms = self.rooms.len(), "Room listing replaced");
    }

    /// Returns the session to its default.
    pub fn reset_session(&mut self) {
        self.session = Session::default();
    }

    /// Sets the in-flight flag.
    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    /// Sets or clears the error slot.
    pub fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }
}

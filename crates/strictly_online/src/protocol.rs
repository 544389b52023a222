//! Wire protocol: the `{type, payload}` envelope and the message vocabulary.
//!
//! Every frame in either direction is a single JSON object with a string
//! `type` discriminator and an arbitrary `payload`. Inbound event types are
//! tied to their payload shapes through [`ServerEvent`], so subscribers get
//! typed values instead of raw JSON.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::{RoomId, RoomSummary, Session};

/// One frame on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub kind: String,
    /// Message body; absent payloads read as `null`.
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    /// Creates an envelope.
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

/// Outbound requests understood by the session server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Intent {
    /// Join a room, authenticating with the session token.
    JoinRoom {
        /// Room to join.
        room_id: RoomId,
        /// Bearer token of the joining user.
        token: String,
    },
    /// Create a room with a display name.
    CreateRoom {
        /// Display name of the new room.
        name: String,
    },
    /// Place the caller's mark on a cell.
    MakeMove {
        /// Board index, 0-8.
        index: usize,
    },
    /// Leave the current room.
    LeaveRoom {},
}

impl Intent {
    /// Wire name of the intent.
    pub fn kind(&self) -> &'static str {
        match self {
            Intent::JoinRoom { .. } => "JOIN_ROOM",
            Intent::CreateRoom { .. } => "CREATE_ROOM",
            Intent::MakeMove { .. } => "MAKE_MOVE",
            Intent::LeaveRoom {} => "LEAVE_ROOM",
        }
    }
}

/// An inbound event type with a fixed payload shape.
pub trait ServerEvent {
    /// Wire name of the event.
    const TYPE: &'static str;
    /// Payload carried by the event.
    type Payload: DeserializeOwned + Send + 'static;
}

/// Full session-state snapshot.
#[derive(Debug, Clone, Copy)]
pub struct GameStateUpdate;

impl ServerEvent for GameStateUpdate {
    const TYPE: &'static str = "GAME_STATE_UPDATE";
    type Payload = Session;
}

/// Full room-listing snapshot.
#[derive(Debug, Clone, Copy)]
pub struct RoomsUpdate;

impl ServerEvent for RoomsUpdate {
    const TYPE: &'static str = "ROOMS_UPDATE";
    type Payload = Vec<RoomSummary>;
}

/// Error notification from the server.
#[derive(Debug, Clone, Copy)]
pub struct ServerError;

impl ServerEvent for ServerError {
    const TYPE: &'static str = "ERROR";
    type Payload = ErrorMessage;
}

/// Server error text, sent either bare or as `{ "message": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorMessage {
    /// Bare string payload.
    Text(String),
    /// Object payload with a message field.
    Detail {
        /// The message.
        message: String,
    },
}

impl ErrorMessage {
    /// The message text, verbatim.
    pub fn into_text(self) -> String {
        match self {
            ErrorMessage::Text(text) | ErrorMessage::Detail { message: text } => text,
        }
    }
}

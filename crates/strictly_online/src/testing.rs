//! In-memory doubles for exercising the client without a server.
//!
//! [`MemoryConnector`] hands out socket pairs: the client half goes to the
//! transport, the [`ServerEnd`] half comes out of the receiver returned by
//! [`MemoryConnector::new`]. Handshakes can be scripted to fail, and every
//! dial is timestamped with tokio's clock so paused-time tests can check the
//! backoff schedule. [`StaticRoomApi`] answers REST calls from memory.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use crate::api::RoomApi;
use crate::error::{ApiError, TransportError};
use crate::protocol::Envelope;
use crate::session::{RoomId, RoomStatus, RoomSummary};
use crate::transport::{Connector, Socket};

/// Scripted result of one dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    /// Complete the handshake.
    Accept,
    /// Fail the handshake.
    Refuse,
}

#[derive(Debug, Default)]
struct Dials {
    plan: VecDeque<Handshake>,
    attempts: Vec<Instant>,
    tokens: Vec<String>,
}

/// Connector producing in-memory socket pairs.
#[derive(Debug)]
pub struct MemoryConnector {
    dials: Mutex<Dials>,
    accepted: mpsc::UnboundedSender<ServerEnd>,
}

impl MemoryConnector {
    /// Creates a connector that accepts every dial until scripted otherwise.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
        let (accepted, rx) = mpsc::unbounded_channel();
        let connector = Self {
            dials: Mutex::new(Dials::default()),
            accepted,
        };
        (Arc::new(connector), rx)
    }

    /// Queues handshake outcomes for the next dials; unscripted dials accept.
    pub fn script(&self, handshakes: impl IntoIterator<Item = Handshake>) {
        self.lock().plan.extend(handshakes);
    }

    /// Number of dials so far.
    pub fn connect_count(&self) -> usize {
        self.lock().attempts.len()
    }

    /// When each dial happened.
    pub fn attempt_times(&self) -> Vec<Instant> {
        self.lock().attempts.clone()
    }

    /// Token presented on each dial.
    pub fn tokens(&self) -> Vec<String> {
        self.lock().tokens.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Dials> {
        self.dials.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, _url: &str, token: &str) -> Result<Box<dyn Socket>, TransportError> {
        let handshake = {
            let mut dials = self.lock();
            dials.attempts.push(Instant::now());
            dials.tokens.push(token.to_string());
            dials.plan.pop_front().unwrap_or(Handshake::Accept)
        };
        if handshake == Handshake::Refuse {
            debug!("Refusing scripted handshake");
            return Err(TransportError::new("connection refused"));
        }

        let (to_client, from_server) = mpsc::unbounded_channel();
        let (to_server, from_client) = mpsc::unbounded_channel();
        let server = ServerEnd {
            to_client: Some(to_client),
            from_client,
            token: token.to_string(),
        };
        // Nobody listening is fine; the socket then just never receives.
        let _ = self.accepted.send(server);
        Ok(Box::new(MemorySocket {
            inbound: from_server,
            outbound: Some(to_server),
        }))
    }
}

/// Client half of an in-memory connection.
#[derive(Debug)]
pub struct MemorySocket {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: Option<mpsc::UnboundedSender<String>>,
}

#[async_trait]
impl Socket for MemorySocket {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        let tx = self
            .outbound
            .as_ref()
            .ok_or_else(|| TransportError::new("socket closed"))?;
        tx.send(frame)
            .map_err(|_| TransportError::new("server end dropped"))
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.outbound = None;
        Ok(())
    }
}

/// Server half of an in-memory connection.
#[derive(Debug)]
pub struct ServerEnd {
    to_client: Option<mpsc::UnboundedSender<String>>,
    from_client: mpsc::UnboundedReceiver<String>,
    token: String,
}

impl ServerEnd {
    /// Token the client dialed with.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Sends an envelope to the client. Returns `false` once closed.
    pub fn push(&self, kind: &str, payload: Value) -> bool {
        match serde_json::to_string(&Envelope::new(kind, payload)) {
            Ok(frame) => self.push_raw(frame),
            Err(_) => false,
        }
    }

    /// Sends an arbitrary text frame to the client.
    pub fn push_raw(&self, frame: impl Into<String>) -> bool {
        self.to_client
            .as_ref()
            .is_some_and(|tx| tx.send(frame.into()).is_ok())
    }

    /// Drops the connection from the server side.
    pub fn close(&mut self) {
        self.to_client = None;
    }

    /// Waits for the next envelope from the client; `None` once the client hung up.
    ///
    /// Frames that are not envelopes are skipped.
    pub async fn next_sent(&mut self) -> Option<Envelope> {
        while let Some(frame) = self.from_client.recv().await {
            if let Ok(envelope) = serde_json::from_str(&frame) {
                return Some(envelope);
            }
        }
        None
    }

    /// Envelopes already sent by the client, without waiting.
    pub fn drain_sent(&mut self) -> Vec<Envelope> {
        let mut sent = Vec::new();
        while let Ok(frame) = self.from_client.try_recv() {
            if let Ok(envelope) = serde_json::from_str(&frame) {
                sent.push(envelope);
            }
        }
        sent
    }
}

#[derive(Debug, Default)]
struct Lobby {
    rooms: Vec<RoomSummary>,
    random_room: Option<RoomId>,
    failing: bool,
    created: Vec<String>,
}

/// [`RoomApi`] answering from an in-memory lobby.
#[derive(Debug, Default)]
pub struct StaticRoomApi {
    lobby: Mutex<Lobby>,
}

impl StaticRoomApi {
    /// Creates an empty lobby.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the listed rooms.
    pub fn with_rooms(self, rooms: Vec<RoomSummary>) -> Self {
        self.lock().rooms = rooms;
        self
    }

    /// Sets the room returned by `join_random_room`.
    pub fn with_random_room(self, room_id: impl Into<RoomId>) -> Self {
        self.lock().random_room = Some(room_id.into());
        self
    }

    /// Makes every call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Names passed to `create_room`, in order.
    pub fn created(&self) -> Vec<String> {
        self.lock().created.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Lobby> {
        self.lobby.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, Lobby>, ApiError> {
        let lobby = self.lock();
        if lobby.failing {
            return Err(ApiError::new("Something went wrong").with_status(500));
        }
        Ok(lobby)
    }
}

#[async_trait]
impl RoomApi for StaticRoomApi {
    async fn get_rooms(&self, _token: &str) -> Result<Vec<RoomSummary>, ApiError> {
        Ok(self.guard()?.rooms.clone())
    }

    async fn create_room(&self, name: &str, token: &str) -> Result<(), ApiError> {
        let mut lobby = self.guard()?;
        let id = format!("room-{}", lobby.rooms.len() + 1);
        lobby.rooms.push(RoomSummary::new(
            id,
            name.to_string(),
            token.to_string(),
            Vec::new(),
            RoomStatus::Waiting,
            Some(Utc::now()),
        ));
        lobby.created.push(name.to_string());
        Ok(())
    }

    async fn join_random_room(&self, _token: &str) -> Result<RoomId, ApiError> {
        self.guard()?
            .random_room
            .clone()
            .ok_or_else(|| ApiError::new("No rooms available").with_status(404))
    }
}

//! Translates user intents into outbound messages and inbound events into state.
//!
//! The controller owns the [`Transport`] and subscribes to the three server
//! events for as long as it lives. Readers never see a half-applied update:
//! every change goes through one `watch` channel holding a [`ClientState`].

use std::sync::Arc;

use derive_getters::Getters;
use derive_new::new;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use super::game::Session;
use super::rooms::RoomSummary;
use super::state::{ClientState, Inbound};
use super::{RoomId, UserId};
use crate::api::RoomApi;
use crate::error::TransportError;
use crate::protocol::{ErrorMessage, GameStateUpdate, Intent, RoomsUpdate, ServerError, ServerEvent};
use crate::registry::Handler;
use crate::transport::{ConnectionState, Transport};

const CONNECT_FAILED: &str = "Failed to connect to game server";
const FETCH_FAILED: &str = "Failed to fetch rooms";
const CREATE_FAILED: &str = "Failed to create room";
const JOIN_FAILED: &str = "Failed to join room";
const JOIN_RANDOM_FAILED: &str = "Failed to join random room";

/// Who this client acts as.
#[derive(Debug, Clone, PartialEq, Eq, Getters, new)]
pub struct Identity {
    /// Server-issued user id.
    user_id: UserId,
    /// Bearer token for the REST API and the WebSocket handshake.
    token: String,
}

/// Client-side owner of one player's view of the game.
pub struct SessionController {
    transport: Transport,
    api: Arc<dyn RoomApi>,
    identity: Identity,
    state: Arc<watch::Sender<ClientState>>,
    subscriptions: Vec<(&'static str, Handler)>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("transport", &self.transport)
            .field("user_id", &self.identity.user_id)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl SessionController {
    /// Wires a controller to its transport and REST collaborator.
    #[instrument(skip_all, fields(user_id = %identity.user_id))]
    pub fn new(transport: Transport, api: Arc<dyn RoomApi>, identity: Identity) -> Self {
        let state = Arc::new(watch::Sender::new(ClientState::default()));
        let registry = transport.registry();

        let sink = Arc::clone(&state);
        let on_snapshot = registry.on::<GameStateUpdate, _>(move |session: Session| {
            sink.send_modify(|s| s.apply(Inbound::Snapshot(session)));
        });
        let sink = Arc::clone(&state);
        let on_rooms = registry.on::<RoomsUpdate, _>(move |rooms: Vec<RoomSummary>| {
            sink.send_modify(|s| s.apply(Inbound::Rooms(rooms)));
        });
        let sink = Arc::clone(&state);
        let on_error = registry.on::<ServerError, _>(move |message: ErrorMessage| {
            sink.send_modify(|s| s.apply(Inbound::ServerError(message.into_text())));
        });
        debug!("Subscribed to server events");

        Self {
            transport,
            api,
            identity,
            state,
            subscriptions: vec![
                (GameStateUpdate::TYPE, on_snapshot),
                (RoomsUpdate::TYPE, on_rooms),
                (ServerError::TYPE, on_error),
            ],
        }
    }

    /// Opens the connection, then loads the room listing.
    ///
    /// A failed handshake is recorded in the error slot and returned; the
    /// transport keeps retrying in the background.
    #[instrument(skip(self), fields(user_id = %self.identity.user_id))]
    pub async fn connect(&mut self) -> Result<(), TransportError> {
        let connected = self.transport.connect(self.identity.token.clone()).await;
        self.refresh_rooms().await;
        // After the refresh, which clears the slot on success.
        if let Err(e) = &connected {
            error!(error = %e, "Could not reach game server");
            self.set_error(Some(CONNECT_FAILED));
        }
        connected
    }

    /// Closes the connection and clears the current game.
    #[instrument(skip(self), fields(user_id = %self.identity.user_id))]
    pub async fn disconnect(&mut self) {
        self.transport.disconnect().await;
        self.state.send_modify(ClientState::reset_session);
    }

    /// Reloads the room listing. On failure the cached listing is kept.
    #[instrument(skip(self))]
    pub async fn refresh_rooms(&self) {
        self.set_loading(true);
        match self.api.get_rooms(&self.identity.token).await {
            Ok(rooms) => self.state.send_modify(|s| {
                s.replace_rooms(rooms);
                s.set_error(None);
            }),
            Err(e) => {
                error!(error = %e, "Room listing failed");
                self.set_error(Some(FETCH_FAILED));
            }
        }
        self.set_loading(false);
    }

    /// Creates a room, then reloads the listing.
    #[instrument(skip(self))]
    pub async fn create_room(&self, name: &str) {
        self.set_loading(true);
        match self.api.create_room(name, &self.identity.token).await {
            Ok(()) => {
                self.set_error(None);
                self.refresh_rooms().await;
            }
            Err(e) => {
                error!(error = %e, "Room creation failed");
                self.set_error(Some(CREATE_FAILED));
            }
        }
        self.set_loading(false);
    }

    /// Asks to join `room_id`. Returns whether the request went out.
    #[instrument(skip(self))]
    pub fn join_room(&self, room_id: &str) -> bool {
        let sent = self.transport.send_intent(&Intent::JoinRoom {
            room_id: room_id.to_string(),
            token: self.identity.token.clone(),
        });
        if sent {
            info!("Joining room");
            self.set_error(None);
        } else {
            self.set_error(Some(JOIN_FAILED));
        }
        sent
    }

    /// Lets the server pick a room, then joins it.
    #[instrument(skip(self))]
    pub async fn join_random_room(&self) -> bool {
        self.set_loading(true);
        let joined = match self.api.join_random_room(&self.identity.token).await {
            Ok(room_id) => self.join_room(&room_id),
            Err(e) => {
                error!(error = %e, "Random room lookup failed");
                false
            }
        };
        if !joined {
            self.set_error(Some(JOIN_RANDOM_FAILED));
        }
        self.set_loading(false);
        joined
    }

    /// Plays `index` if the move is plausible. Returns whether a move was sent.
    ///
    /// Implausible moves are dropped here without touching the error slot.
    #[instrument(skip(self))]
    pub fn make_move(&self, index: usize) -> bool {
        let verdict = self
            .state
            .borrow()
            .session()
            .check_move(index, &self.identity.user_id);
        match verdict {
            Ok(position) => {
                debug!(%position, "Sending move");
                self.transport.send_intent(&Intent::MakeMove { index })
            }
            Err(reason) => {
                debug!(%reason, "Move rejected locally");
                false
            }
        }
    }

    /// Leaves the current room and clears the game immediately.
    #[instrument(skip(self))]
    pub fn leave_room(&self) {
        if !self.transport.send_intent(&Intent::LeaveRoom {}) {
            warn!("Leave request not delivered");
        }
        self.state.send_modify(ClientState::reset_session);
    }

    /// Current game.
    pub fn session(&self) -> Session {
        self.state.borrow().session().clone()
    }

    /// Cached room listing.
    pub fn rooms(&self) -> Vec<RoomSummary> {
        self.state.borrow().rooms().clone()
    }

    /// Whether a REST call is in flight.
    pub fn is_loading(&self) -> bool {
        *self.state.borrow().loading()
    }

    /// Most recent error, verbatim.
    pub fn error(&self) -> Option<String> {
        self.state.borrow().error().clone()
    }

    /// Copy of the whole client state.
    pub fn snapshot(&self) -> ClientState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn watch(&self) -> watch::Receiver<ClientState> {
        self.state.subscribe()
    }

    /// Transport connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.transport.state()
    }

    /// Acting user.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Underlying transport.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Room of the current game, if seated or watching.
    pub fn current_room(&self) -> Option<RoomId> {
        self.state.borrow().session().room_id().clone()
    }

    fn set_loading(&self, loading: bool) {
        self.state.send_modify(|s| s.set_loading(loading));
    }

    fn set_error(&self, error: Option<&str>) {
        self.state
            .send_modify(|s| s.set_error(error.map(str::to_string)));
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        let registry = self.transport.registry();
        for (event_type, handler) in &self.subscriptions {
            registry.unsubscribe(event_type, handler);
        }
    }
}

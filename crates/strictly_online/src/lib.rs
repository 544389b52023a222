//! Real-time tic-tac-toe session client.
//!
//! A [`SessionController`] owns a reconnecting [`Transport`] to the game
//! server, turns user intents into outbound messages, and folds the server's
//! snapshots into a [`ClientState`] that readers observe through a `watch`
//! channel. Room bookkeeping goes through a [`RoomApi`] collaborator.
//!
//! ```no_run
//! use std::sync::Arc;
//! use strictly_online::{Identity, ReconnectPolicy, RestApi, SessionController, Transport};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let api = Arc::new(RestApi::new("http://127.0.0.1:3000"));
//! let auth = api.login("ada@example.com", "hunter2").await?;
//! let transport = Transport::websocket("ws://127.0.0.1:3000", ReconnectPolicy::default());
//! let identity = Identity::new(auth.user().id().clone(), auth.token().clone());
//! let mut controller = SessionController::new(transport, api, identity);
//! controller.connect().await?;
//! controller.join_random_room().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod api;
pub mod config;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod testing;
pub mod transport;

pub use api::{AuthSession, RestApi, RoomApi, User};
pub use config::{ClientConfig, ConfigError, ReconnectConfig, ServerConfig};
pub use error::{ApiError, HandlerError, TransportError};
pub use protocol::{
    Envelope, ErrorMessage, GameStateUpdate, Intent, RoomsUpdate, ServerError, ServerEvent,
};
pub use registry::{EventRegistry, Handler};
pub use session::{
    ClientState, Identity, Inbound, MoveRejection, RoomId, RoomStatus, RoomSummary, Seat, Session,
    SessionController, SessionSnapshot, UserId,
};
pub use transport::{ConnectionState, Connector, ReconnectPolicy, Socket, Transport, WsConnector};

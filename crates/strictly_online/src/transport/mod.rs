//! Persistent connection to the session server.
//!
//! [`Transport`] owns one logical connection per session token. A background
//! supervisor task pumps frames, feeds inbound envelopes into the
//! [`EventRegistry`], and redials with exponential backoff when the link drops
//! involuntarily. Outbound frames are never queued across outages: sending
//! while disconnected logs a warning and drops the frame.

mod connector;
mod policy;
mod supervisor;
mod websocket;

pub use connector::{Connector, Socket};
pub use policy::ReconnectPolicy;
pub use websocket::{WsConnector, WsSocket};

use std::sync::Arc;

use serde_json::Value;
use strum::Display;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::error::TransportError;
use crate::protocol::{Envelope, Intent};
use crate::registry::EventRegistry;
use supervisor::{Link, LiveSocket, Supervisor, SupervisorContext};

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ConnectionState {
    /// No socket and no dial in flight.
    Disconnected,
    /// A dial is in flight.
    Connecting,
    /// A socket is open; sends are delivered.
    Connected,
}

/// Client end of the session server connection.
pub struct Transport {
    url: String,
    policy: ReconnectPolicy,
    connector: Arc<dyn Connector>,
    registry: EventRegistry,
    link: Arc<Link>,
    token: Option<String>,
    supervisor: Option<Supervisor>,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("url", &self.url)
            .field("policy", &self.policy)
            .field("state", &self.link.state())
            .field("attempts", &self.link.attempts())
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Creates a disconnected transport that dials through `connector`.
    pub fn new(
        url: impl Into<String>,
        connector: Arc<dyn Connector>,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            url: url.into(),
            policy,
            connector,
            registry: EventRegistry::new(),
            link: Arc::new(Link::new()),
            token: None,
            supervisor: None,
        }
    }

    /// Creates a disconnected transport over real WebSockets.
    pub fn websocket(url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self::new(url, Arc::new(WsConnector), policy)
    }

    /// Server endpoint.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Subscription table fed by this transport.
    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.link.state()
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.link.subscribe()
    }

    /// Reconnect attempts made since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.link.attempts()
    }

    /// Whether a session token is held, i.e. `connect` was called without a later `disconnect`.
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Opens the connection, replacing any existing one.
    ///
    /// A failed dial is returned to the caller and also starts the automatic
    /// reconnect schedule, exactly as a dropped connection would.
    #[instrument(skip(self, token), fields(url = %self.url))]
    pub async fn connect(&mut self, token: impl Into<String>) -> Result<(), TransportError> {
        let token = token.into();
        if let Some(previous) = self.supervisor.take() {
            debug!("Replacing existing connection");
            previous.shutdown().await;
        }
        self.link.reset();
        self.token = Some(token.clone());

        self.link.set_state(ConnectionState::Connecting);
        let dialed = self.connector.connect(&self.url, &token).await;

        let context = SupervisorContext {
            url: self.url.clone(),
            token,
            policy: self.policy,
            connector: Arc::clone(&self.connector),
            registry: self.registry.clone(),
            link: Arc::clone(&self.link),
        };
        match dialed {
            Ok(socket) => {
                let outbound = self.link.open();
                self.supervisor = Some(Supervisor::spawn(
                    context,
                    Some(LiveSocket { socket, outbound }),
                ));
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "WebSocket connection error");
                self.link.set_state(ConnectionState::Disconnected);
                self.supervisor = Some(Supervisor::spawn(context, None));
                Err(e)
            }
        }
    }

    /// Closes the connection and cancels any pending reconnect. Idempotent.
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn disconnect(&mut self) {
        if let Some(supervisor) = self.supervisor.take() {
            supervisor.shutdown().await;
            info!("Disconnected");
        }
        self.token = None;
        self.link.reset();
    }

    /// Sends a `{type, payload}` frame. Returns `false` when the frame was dropped.
    pub fn send(&self, kind: &str, payload: Value) -> bool {
        match serde_json::to_string(&Envelope::new(kind, payload)) {
            Ok(frame) => self.transmit(kind, frame),
            Err(e) => {
                error!(kind, error = %e, "Failed to encode message");
                false
            }
        }
    }

    /// Sends a typed request. Returns `false` when the frame was dropped.
    pub fn send_intent(&self, intent: &Intent) -> bool {
        match serde_json::to_string(intent) {
            Ok(frame) => self.transmit(intent.kind(), frame),
            Err(e) => {
                error!(kind = intent.kind(), error = %e, "Failed to encode message");
                false
            }
        }
    }

    fn transmit(&self, kind: &str, frame: String) -> bool {
        if self.link.transmit(frame) {
            debug!(kind, "Queued message");
            true
        } else {
            warn!(kind, "WebSocket is not connected, message dropped");
            false
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Some(supervisor) = self.supervisor.take() {
            supervisor.cancel();
        }
    }
}

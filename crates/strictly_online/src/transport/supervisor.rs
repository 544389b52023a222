//! Background task owning the live socket and the reconnect schedule.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::{ConnectionState, Connector, ReconnectPolicy, Socket};
use crate::protocol::Envelope;
use crate::registry::EventRegistry;

/// Grace period for the close handshake on explicit disconnect.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// State shared between the [`Transport`](super::Transport) handle and its task.
#[derive(Debug)]
pub(super) struct Link {
    state: watch::Sender<ConnectionState>,
    outbound: watch::Sender<Option<mpsc::UnboundedSender<String>>>,
    attempts: AtomicU32,
}

impl Link {
    pub(super) fn new() -> Self {
        Self {
            state: watch::Sender::new(ConnectionState::Disconnected),
            outbound: watch::Sender::new(None),
            attempts: AtomicU32::new(0),
        }
    }

    pub(super) fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub(super) fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub(super) fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Connection state changed");
        }
    }

    pub(super) fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn set_attempts(&self, attempts: u32) {
        self.attempts.store(attempts, Ordering::SeqCst);
    }

    /// Marks the link open and returns the receiving end of a fresh outbound queue.
    pub(super) fn open(&self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.outbound.send_replace(Some(tx));
        self.set_attempts(0);
        self.set_state(ConnectionState::Connected);
        rx
    }

    /// Detaches the outbound queue so later sends are dropped.
    fn close_outbound(&self) {
        self.outbound.send_replace(None);
    }

    /// Returns to the pristine disconnected state.
    pub(super) fn reset(&self) {
        self.close_outbound();
        self.set_attempts(0);
        self.set_state(ConnectionState::Disconnected);
    }

    /// Queues a frame for the open socket. `false` when no socket is open.
    pub(super) fn transmit(&self, frame: String) -> bool {
        if self.state() != ConnectionState::Connected {
            return false;
        }
        match self.outbound.borrow().as_ref() {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }
}

/// An open socket together with its outbound queue.
pub(super) struct LiveSocket {
    pub(super) socket: Box<dyn Socket>,
    pub(super) outbound: mpsc::UnboundedReceiver<String>,
}

/// Everything the task needs to keep a session connected.
pub(super) struct SupervisorContext {
    pub(super) url: String,
    pub(super) token: String,
    pub(super) policy: ReconnectPolicy,
    pub(super) connector: Arc<dyn Connector>,
    pub(super) registry: EventRegistry,
    pub(super) link: Arc<Link>,
}

/// Handle to a running supervisor task.
#[derive(Debug)]
pub(super) struct Supervisor {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Supervisor {
    /// Spawns the task. With no socket it starts by scheduling a retry.
    pub(super) fn spawn(context: SupervisorContext, live: Option<LiveSocket>) -> Self {
        let cancel = CancellationToken::new();
        let task = SupervisorTask {
            context,
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(task.run(live));
        Self { cancel, handle }
    }

    /// Stops the task and waits for it to finish.
    pub(super) async fn shutdown(self) {
        self.cancel.cancel();
        match self.handle.await {
            Err(e) if e.is_panic() => error!(error = %e, "Connection supervisor panicked"),
            _ => debug!("Connection supervisor stopped"),
        }
    }

    /// Signals the task to stop without waiting.
    pub(super) fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Why a pump loop ended.
enum Closure {
    /// `disconnect` was requested.
    Explicit,
    /// The peer closed or the socket failed.
    Lost,
}

struct SupervisorTask {
    context: SupervisorContext,
    cancel: CancellationToken,
}

impl SupervisorTask {
    #[instrument(skip_all, fields(url = %self.context.url))]
    async fn run(self, mut live: Option<LiveSocket>) {
        let link = Arc::clone(&self.context.link);
        loop {
            if let Some(open) = live.take() {
                info!("WebSocket connected");
                if let Closure::Explicit = self.pump(open).await {
                    return;
                }
            }

            let Some((attempt, delay)) = self.context.policy.next_delay(link.attempts()) else {
                warn!(
                    max_attempts = self.context.policy.max_attempts(),
                    "Max reconnect attempts reached"
                );
                link.set_state(ConnectionState::Disconnected);
                return;
            };
            link.set_attempts(attempt);
            info!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Attempting to reconnect"
            );

            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            // disconnect() may race the timer.
            if self.cancel.is_cancelled() {
                return;
            }

            link.set_state(ConnectionState::Connecting);
            let context = &self.context;
            let dialed = tokio::select! {
                _ = self.cancel.cancelled() => return,
                result = context.connector.connect(&context.url, &context.token) => result,
            };
            match dialed {
                Ok(socket) => {
                    let outbound = link.open();
                    live = Some(LiveSocket { socket, outbound });
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Reconnect attempt failed");
                    link.set_state(ConnectionState::Disconnected);
                }
            }
        }
    }

    /// Moves frames in both directions until the socket closes or a stop is requested.
    async fn pump(&self, open: LiveSocket) -> Closure {
        let LiveSocket {
            mut socket,
            mut outbound,
        } = open;
        let link = &self.context.link;

        let closure = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    match tokio::time::timeout(CLOSE_TIMEOUT, socket.close()).await {
                        Ok(Ok(())) => debug!("WebSocket closed"),
                        Ok(Err(e)) => debug!(error = %e, "Close handshake failed"),
                        Err(_) => debug!("Close handshake timed out"),
                    }
                    break Closure::Explicit;
                }
                Some(frame) = outbound.recv() => {
                    if let Err(e) = socket.send(frame).await {
                        error!(error = %e, "WebSocket send failed");
                        break Closure::Lost;
                    }
                }
                inbound = socket.recv() => match inbound {
                    Some(Ok(text)) => self.deliver(&text),
                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket error");
                        break Closure::Lost;
                    }
                    None => {
                        info!("WebSocket disconnected");
                        break Closure::Lost;
                    }
                },
            }
        };

        link.close_outbound();
        outbound.close();
        let mut dropped = 0usize;
        while outbound.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            warn!(dropped, "Discarded frames queued on a closing connection");
        }
        if let Closure::Lost = closure {
            link.set_state(ConnectionState::Disconnected);
        }
        closure
    }

    /// Parses one inbound frame and routes it to subscribers.
    fn deliver(&self, text: &str) {
        match serde_json::from_str::<Envelope>(text) {
            Ok(envelope) => {
                debug!(event_type = %envelope.kind, "Received message");
                self.context
                    .registry
                    .dispatch(&envelope.kind, &envelope.payload);
            }
            Err(e) => error!(error = %e, "Error parsing WebSocket message"),
        }
    }
}

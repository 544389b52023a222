//! Error types for the session client.
//!
//! Each error records the source location that raised it, which keeps log
//! lines actionable without a backtrace.

use derive_more::{Display, Error};
use tracing::instrument;

/// Connection-level failure: refused handshake, broken socket, bad frame.
#[derive(Debug, Clone, Display, Error)]
#[display("Transport error: {} at {}:{}", message, file, line)]
pub struct TransportError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl TransportError {
    /// Creates a new transport error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    #[track_caller]
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::new(format!("WebSocket error: {}", err))
    }
}

/// Failure of a request/response call to the game server's REST API.
#[derive(Debug, Clone, Display, Error)]
#[display("API error: {} at {}:{}", message, file, line)]
pub struct ApiError {
    /// Error message, taken from the server's `message` field when present.
    pub message: String,
    /// HTTP status, when the server answered at all.
    pub status: Option<u16>,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ApiError {
    /// Creates a new API error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            status: None,
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Attaches the HTTP status the server answered with.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

impl From<reqwest::Error> for ApiError {
    #[track_caller]
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        let mut api = Self::new(format!("HTTP request failed: {}", err));
        api.status = status;
        api
    }
}

/// A subscriber failed to handle a dispatched event.
#[derive(Debug, Clone, Display, Error)]
#[display("Handler error for {}: {}", event_type, message)]
pub struct HandlerError {
    /// Event type being dispatched.
    pub event_type: String,
    /// Error message.
    pub message: String,
}

impl HandlerError {
    /// Creates a new handler error.
    pub fn new(event_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            message: message.into(),
        }
    }
}

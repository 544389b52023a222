//! Publish/subscribe table routing inbound events to subscribers.
//!
//! The transport feeds every inbound envelope through
//! [`EventRegistry::dispatch`]; higher layers subscribe by event name without
//! touching the transport. Handlers are compared by `Arc` identity, so the
//! value returned from [`EventRegistry::on`] (or the `Arc` passed to
//! [`EventRegistry::subscribe`]) is what unsubscribes it later.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Deserialize as _;
use serde_json::Value;
use tracing::{debug, error, instrument, warn};

use crate::error::HandlerError;
use crate::protocol::ServerEvent;

/// A subscriber callback.
pub type Handler = Arc<dyn Fn(&Value) -> Result<(), HandlerError> + Send + Sync>;

/// Shared subscription table. Clones refer to the same table.
#[derive(Clone, Default)]
pub struct EventRegistry {
    inner: Arc<RwLock<HashMap<String, Vec<Handler>>>>,
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let counts: HashMap<&str, usize> = table
            .iter()
            .map(|(kind, handlers)| (kind.as_str(), handlers.len()))
            .collect();
        f.debug_struct("EventRegistry")
            .field("handlers", &counts)
            .finish()
    }
}

impl EventRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `handler` to the list for `event_type`. Duplicates are kept.
    #[instrument(skip(self, handler), fields(event_type = %event_type.as_ref()))]
    pub fn subscribe(&self, event_type: impl AsRef<str>, handler: Handler) {
        let mut table = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let handlers = table.entry(event_type.as_ref().to_string()).or_default();
        handlers.push(handler);
        debug!(count = handlers.len(), "Subscribed handler");
    }

    /// Removes every entry for `event_type` that is the same `Arc` as `handler`.
    #[instrument(skip(self, handler))]
    pub fn unsubscribe(&self, event_type: &str, handler: &Handler) {
        let mut table = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let Some(handlers) = table.get_mut(event_type) else {
            return;
        };
        let before = handlers.len();
        handlers.retain(|h| !Arc::ptr_eq(h, handler));
        debug!(removed = before - handlers.len(), "Unsubscribed handler");
        if handlers.is_empty() {
            table.remove(event_type);
        }
    }

    /// Subscribes a typed handler for `E` and returns it for later unsubscription.
    ///
    /// Payloads that do not deserialize into `E::Payload` are reported as
    /// handler errors and never reach `f`.
    pub fn on<E, F>(&self, f: F) -> Handler
    where
        E: ServerEvent + 'static,
        F: Fn(E::Payload) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(move |payload: &Value| -> Result<(), HandlerError> {
            let typed = E::Payload::deserialize(payload)
                .map_err(|e| HandlerError::new(E::TYPE, format!("malformed payload: {}", e)))?;
            f(typed);
            Ok(())
        });
        self.subscribe(E::TYPE, Arc::clone(&handler));
        handler
    }

    /// Current handlers for `event_type`, in delivery order.
    pub fn handlers(&self, event_type: &str) -> Vec<Handler> {
        let table = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        table.get(event_type).cloned().unwrap_or_default()
    }

    /// Invokes every handler registered for `event_type`, in order.
    ///
    /// Handler errors and panics are logged and isolated; later handlers still
    /// run. Returns how many handlers completed successfully.
    #[instrument(skip(self, payload))]
    pub fn dispatch(&self, event_type: &str, payload: &Value) -> usize {
        // Snapshot so handlers may (un)subscribe without deadlocking.
        let handlers = self.handlers(event_type);
        if handlers.is_empty() {
            debug!("No handlers registered");
            return 0;
        }

        let mut delivered = 0;
        for (position, handler) in handlers.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| handler(payload))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => warn!(position, error = %e, "Event handler failed"),
                Err(_) => error!(position, "Event handler panicked"),
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ErrorMessage, ServerError};
    use serde_json::json;
    use std::sync::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Handler {
        let log = Arc::clone(log);
        Arc::new(move |_payload: &Value| -> Result<(), HandlerError> {
            log.lock().unwrap().push(tag.to_string());
            Ok(())
        })
    }

    #[test]
    fn test_dispatch_in_subscription_order() {
        let registry = EventRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.subscribe("PING", recorder(&log, "first"));
        registry.subscribe("PING", recorder(&log, "second"));

        assert_eq!(registry.dispatch("PING", &Value::Null), 2);
        assert_eq!(*log.lock().unwrap(), ["first", "second"]);
    }

    #[test]
    fn test_duplicate_subscription_runs_twice_and_unsubscribes_all() {
        let registry = EventRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler = recorder(&log, "dup");
        let other = recorder(&log, "other");
        registry.subscribe("PING", Arc::clone(&handler));
        registry.subscribe("PING", Arc::clone(&other));
        registry.subscribe("PING", Arc::clone(&handler));

        registry.dispatch("PING", &Value::Null);
        assert_eq!(*log.lock().unwrap(), ["dup", "other", "dup"]);

        registry.unsubscribe("PING", &handler);
        log.lock().unwrap().clear();
        registry.dispatch("PING", &Value::Null);
        assert_eq!(*log.lock().unwrap(), ["other"]);
    }

    #[test]
    fn test_unsubscribe_requires_same_arc() {
        let registry = EventRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.subscribe("PING", recorder(&log, "kept"));

        // A structurally identical closure is a different handler.
        registry.unsubscribe("PING", &recorder(&log, "kept"));
        registry.unsubscribe("UNKNOWN", &recorder(&log, "kept"));
        assert_eq!(registry.handlers("PING").len(), 1);
    }

    #[test]
    fn test_unknown_event_type_is_empty() {
        let registry = EventRegistry::new();
        assert!(registry.handlers("NOPE").is_empty());
        assert_eq!(registry.dispatch("NOPE", &json!({"x": 1})), 0);
    }

    #[test]
    fn test_failing_handlers_do_not_block_later_ones() {
        let registry = EventRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.subscribe(
            "PING",
            Arc::new(|_: &Value| -> Result<(), HandlerError> {
                Err(HandlerError::new("PING", "boom"))
            }),
        );
        registry.subscribe(
            "PING",
            Arc::new(|_: &Value| -> Result<(), HandlerError> { panic!("handler panic") }),
        );
        registry.subscribe("PING", recorder(&log, "survivor"));

        assert_eq!(registry.dispatch("PING", &Value::Null), 1);
        assert_eq!(*log.lock().unwrap(), ["survivor"]);
    }

    #[test]
    fn test_typed_handler_receives_payload() {
        let registry = EventRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler = registry.on::<ServerError, _>(move |msg: ErrorMessage| {
            sink.lock().unwrap().push(msg.into_text());
        });

        assert_eq!(registry.dispatch("ERROR", &json!("Room is full")), 1);
        // Wrong shape is rejected before reaching the closure.
        assert_eq!(registry.dispatch("ERROR", &json!(42)), 0);
        assert_eq!(*seen.lock().unwrap(), ["Room is full"]);

        registry.unsubscribe("ERROR", &handler);
        assert!(registry.handlers("ERROR").is_empty());
    }
}

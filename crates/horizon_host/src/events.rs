//! Explicit event subscription table.
//!
//! Session components do not auto-register as listeners. Each one hands the
//! session a list of [`EventRegistration`]s; the session subscribes them when
//! the component is linked and unsubscribes them when it is unlinked.
//!
//! Event types are plain string keys in the `"<namespace>:<event>"` form used
//! throughout Horizon (`"core:client_connected"`, `"chat:message"`, ...).

use crate::types::ClientKey;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// Published by the connection hub after a client's session exists.
pub const CLIENT_CONNECTED: &str = "core:client_connected";
/// Published by the connection hub before a client's session is torn down.
pub const CLIENT_DISCONNECTED: &str = "core:client_disconnected";

/// An event delivered through the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostEvent {
    /// Namespaced event key
    pub event_type: String,
    /// Client the event concerns, if any
    pub client: Option<ClientKey>,
    /// Event-specific data
    pub payload: serde_json::Value,
}

impl HostEvent {
    pub fn new(event_type: impl Into<String>, client: Option<ClientKey>, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            client,
            payload,
        }
    }

    pub fn client_connected(client: ClientKey) -> Self {
        Self::new(
            CLIENT_CONNECTED,
            Some(client),
            serde_json::json!({ "timestamp": crate::current_timestamp() }),
        )
    }

    pub fn client_disconnected(client: ClientKey) -> Self {
        Self::new(
            CLIENT_DISCONNECTED,
            Some(client),
            serde_json::json!({ "timestamp": crate::current_timestamp() }),
        )
    }
}

/// Handler invoked for every matching event.
pub type EventHandler = Arc<dyn Fn(&HostEvent) + Send + Sync>;

/// One `(event type, handler)` row of a component's registration table.
#[derive(Clone)]
pub struct EventRegistration {
    pub event_type: String,
    pub handler: EventHandler,
}

impl EventRegistration {
    pub fn new<F>(event_type: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&HostEvent) + Send + Sync + 'static,
    {
        Self {
            event_type: event_type.into(),
            handler: Arc::new(handler),
        }
    }
}

impl std::fmt::Debug for EventRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistration")
            .field("event_type", &self.event_type)
            .field("handler", &"[handler]")
            .finish()
    }
}

/// Identifier returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

/// Host event bus.
pub trait EventBus: Send + Sync {
    /// Subscribes `handler` to `event_type`.
    fn subscribe(&self, event_type: &str, handler: EventHandler) -> SubscriptionId;

    /// Removes a subscription. Returns `false` if it was unknown.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

struct Subscription {
    id: SubscriptionId,
    event_type: String,
    handler: EventHandler,
}

/// In-process [`EventBus`] with synchronous delivery.
#[derive(Default)]
pub struct LocalEventBus {
    subscriptions: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
}

impl LocalEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `event` to every subscriber of its type, in subscription order.
    ///
    /// Handlers run without the subscription table locked, so they may
    /// subscribe or unsubscribe. A panicking handler is logged and skipped.
    /// Returns the number of handlers invoked.
    pub fn publish(&self, event: &HostEvent) -> usize {
        let handlers: Vec<EventHandler> = self
            .subscriptions
            .read()
            .iter()
            .filter(|sub| sub.event_type == event.event_type)
            .map(|sub| sub.handler.clone())
            .collect();

        for handler in &handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                error!("Handler for {} panicked", event.event_type);
            }
        }

        debug!("Published {} to {} handler(s)", event.event_type, handlers.len());
        handlers.len()
    }

    /// Total number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Number of live subscriptions for one event type.
    pub fn subscribers_of(&self, event_type: &str) -> usize {
        self.subscriptions
            .read()
            .iter()
            .filter(|sub| sub.event_type == event_type)
            .count()
    }
}

impl EventBus for LocalEventBus {
    fn subscribe(&self, event_type: &str, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.write().push(Subscription {
            id,
            event_type: event_type.to_string(),
            handler,
        });
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|sub| sub.id != id);
        subscriptions.len() != before
    }
}

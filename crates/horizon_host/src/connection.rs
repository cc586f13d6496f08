//! Connection lifecycle fan-out.
//!
//! The host's network layer reports connects and disconnects to a single
//! [`ConnectionHub`]. The hub keeps the liveness directory current, notifies
//! every [`ConnectionListener`] synchronously and publishes the matching
//! `core:` events on the bus.
//!
//! Ordering matters: on connect, listeners run in registration order (so the
//! session registry registered first has created the session before anything
//! else looks for it); on disconnect they run in reverse order so teardown
//! mirrors setup.

use crate::directory::{ClientDirectory, ConnectedClients};
use crate::events::{HostEvent, LocalEventBus};
use crate::types::ClientKey;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// Receives connection lifecycle callbacks on the tick thread.
pub trait ConnectionListener: Send + Sync {
    /// Called once the client is connected and marked live.
    fn on_connection_established(&self, client: &ClientKey);

    /// Called while the client is still marked live, before it is forgotten.
    fn on_connection_closed(&self, client: &ClientKey);
}

/// Dispatches connection events to listeners and the event bus.
pub struct ConnectionHub {
    clients: Arc<ConnectedClients>,
    event_bus: Arc<LocalEventBus>,
    listeners: RwLock<Vec<Arc<dyn ConnectionListener>>>,
}

impl ConnectionHub {
    pub fn new(clients: Arc<ConnectedClients>, event_bus: Arc<LocalEventBus>) -> Self {
        Self {
            clients,
            event_bus,
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Appends a listener. Listeners are notified of connects in the order added.
    pub fn add_listener(&self, listener: Arc<dyn ConnectionListener>) {
        self.listeners.write().push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn clients(&self) -> &Arc<ConnectedClients> {
        &self.clients
    }

    /// Handles a newly established connection.
    ///
    /// Returns `false` without notifying anyone if the client is already connected.
    pub fn connect(&self, client: ClientKey, name: impl Into<String>) -> bool {
        let name = name.into();
        if !self.clients.insert(client, name.clone()) {
            debug!("Ignoring duplicate connect for {}", client);
            return false;
        }

        info!("🔗 Client {} ({}) connected", name, client);
        for listener in self.snapshot() {
            listener.on_connection_established(&client);
        }
        self.event_bus.publish(&HostEvent::client_connected(client));
        true
    }

    /// Handles a closed connection.
    ///
    /// Returns `false` if the client was not connected.
    pub fn disconnect(&self, client: &ClientKey) -> bool {
        if !self.clients.is_connected(client) {
            debug!("Ignoring disconnect for unknown client {}", client);
            return false;
        }

        self.event_bus.publish(&HostEvent::client_disconnected(*client));
        for listener in self.snapshot().into_iter().rev() {
            listener.on_connection_closed(client);
        }
        self.clients.remove(client);
        info!("🔌 Client {} disconnected", client);
        true
    }

    /// Disconnects every client, returning how many were dropped.
    pub fn disconnect_all(&self) -> usize {
        self.clients
            .keys()
            .into_iter()
            .filter(|client| self.disconnect(client))
            .count()
    }

    fn snapshot(&self) -> Vec<Arc<dyn ConnectionListener>> {
        self.listeners.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventBus, CLIENT_CONNECTED, CLIENT_DISCONNECTED};
    use parking_lot::Mutex;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        clients: Arc<ConnectedClients>,
    }

    impl ConnectionListener for Recorder {
        fn on_connection_established(&self, client: &ClientKey) {
            assert!(self.clients.is_connected(client));
            self.log.lock().push(format!("{}:up", self.name));
        }

        fn on_connection_closed(&self, client: &ClientKey) {
            assert!(self.clients.is_connected(client));
            self.log.lock().push(format!("{}:down", self.name));
        }
    }

    fn hub_with_listeners() -> (ConnectionHub, Arc<Mutex<Vec<String>>>, Arc<LocalEventBus>) {
        let clients = Arc::new(ConnectedClients::new());
        let bus = Arc::new(LocalEventBus::new());
        let hub = ConnectionHub::new(clients.clone(), bus.clone());
        let log = Arc::new(Mutex::new(Vec::new()));
        for name in ["sessions", "overlays"] {
            hub.add_listener(Arc::new(Recorder {
                name,
                log: log.clone(),
                clients: clients.clone(),
            }));
        }
        (hub, log, bus)
    }

    #[test]
    fn test_listener_order_is_mirrored_on_disconnect() {
        let (hub, log, _) = hub_with_listeners();
        let client = ClientKey::new();

        assert!(hub.connect(client, "Alice"));
        assert!(hub.disconnect(&client));

        assert_eq!(
            *log.lock(),
            vec!["sessions:up", "overlays:up", "overlays:down", "sessions:down"]
        );
        assert!(!hub.clients().is_connected(&client));
    }

    #[test]
    fn test_duplicate_connect_and_unknown_disconnect() {
        let (hub, log, _) = hub_with_listeners();
        let client = ClientKey::new();

        assert!(hub.connect(client, "Alice"));
        assert!(!hub.connect(client, "Alice"));
        assert!(!hub.disconnect(&ClientKey::new()));
        assert_eq!(log.lock().len(), 2);
    }

    #[test]
    fn test_core_events_are_published() {
        let (hub, _, bus) = hub_with_listeners();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for event_type in [CLIENT_CONNECTED, CLIENT_DISCONNECTED] {
            let seen = seen.clone();
            bus.subscribe(
                event_type,
                Arc::new(move |event: &HostEvent| seen.lock().push(event.event_type.clone())),
            );
        }

        let client = ClientKey::new();
        hub.connect(client, "Bob");
        hub.disconnect(&client);
        assert_eq!(*seen.lock(), vec![CLIENT_CONNECTED, CLIENT_DISCONNECTED]);
    }

    #[test]
    fn test_disconnect_all() {
        let (hub, _, _) = hub_with_listeners();
        hub.connect(ClientKey::new(), "a");
        hub.connect(ClientKey::new(), "b");

        assert_eq!(hub.disconnect_all(), 2);
        assert_eq!(hub.clients().online_count(), 0);
    }
}

//! Client liveness and lookup.

use crate::types::ClientKey;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Read-only view of who is currently connected.
pub trait ClientDirectory: Send + Sync {
    /// Whether the client's connection is still open.
    fn is_connected(&self, client: &ClientKey) -> bool;

    /// Human-readable name for the client, if the host knows one.
    fn display_name(&self, client: &ClientKey) -> Option<String>;

    /// Number of currently connected clients.
    fn online_count(&self) -> usize;
}

/// What the directory remembers about a connected client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    /// Unix timestamp (seconds) of when the connection was established
    pub connected_at: u64,
}

/// [`ClientDirectory`] backed by a concurrent map.
#[derive(Debug, Default)]
pub struct ConnectedClients {
    clients: DashMap<ClientKey, ClientInfo>,
}

impl ConnectedClients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a client connected. Returns `false` if it already was.
    pub fn insert(&self, client: ClientKey, name: impl Into<String>) -> bool {
        match self.clients.entry(client) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(ClientInfo {
                    name: name.into(),
                    connected_at: crate::current_timestamp(),
                });
                true
            }
        }
    }

    /// Marks a client disconnected. Returns `false` if it was not connected.
    pub fn remove(&self, client: &ClientKey) -> bool {
        self.clients.remove(client).is_some()
    }

    pub fn info(&self, client: &ClientKey) -> Option<ClientInfo> {
        self.clients.get(client).map(|entry| entry.value().clone())
    }

    /// Snapshot of every connected client key.
    pub fn keys(&self) -> Vec<ClientKey> {
        self.clients.iter().map(|entry| *entry.key()).collect()
    }
}

impl ClientDirectory for ConnectedClients {
    fn is_connected(&self, client: &ClientKey) -> bool {
        self.clients.contains_key(client)
    }

    fn display_name(&self, client: &ClientKey) -> Option<String> {
        self.clients.get(client).map(|entry| entry.name.clone())
    }

    fn online_count(&self) -> usize {
        self.clients.len()
    }
}

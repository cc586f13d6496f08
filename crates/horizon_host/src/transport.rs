//! Wire-level display operations and the transport that carries them.
//!
//! The host owns the actual network session. Everything above this module
//! speaks in [`WireOperation`]s, which map one-to-one onto the objective and
//! score packets of a sidebar-style display protocol.

use crate::types::ClientKey;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Order in which the client stacks score entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Lower scores are drawn lower on the surface.
    Ascending,
    /// Lower scores are drawn higher on the surface.
    Descending,
}

/// Where on the client's screen a display surface is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplaySlot {
    Sidebar,
    List,
    BelowName,
}

/// One row on a display surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    /// 1-based row identifier, unique within one `ReplaceEntries` batch
    pub slot_id: u32,
    /// Text shown for the row
    pub text: String,
    /// Score used by the client to order rows
    pub score: i32,
}

/// An operation understood by the client-side display layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WireOperation {
    /// Creates (or recreates) a named display surface.
    CreateDisplaySurface {
        name: String,
        title: String,
        slot: DisplaySlot,
        sort_order: SortOrder,
    },
    /// Destroys a named display surface and every entry on it.
    DestroyDisplaySurface { name: String },
    /// Sets or replaces a batch of entries on a surface.
    ReplaceEntries {
        name: String,
        entries: Vec<ScoreEntry>,
    },
}

impl WireOperation {
    /// Short operation name, useful for logging and assertions.
    pub fn kind(&self) -> &'static str {
        match self {
            WireOperation::CreateDisplaySurface { .. } => "create_display_surface",
            WireOperation::DestroyDisplaySurface { .. } => "destroy_display_surface",
            WireOperation::ReplaceEntries { .. } => "replace_entries",
        }
    }
}

/// Sends operations to a single client.
///
/// Delivery is fire-and-forget: callers never wait for an acknowledgment and
/// implementations are responsible for logging their own delivery failures.
pub trait WireTransport: Send + Sync {
    fn send_to_client(&self, client: &ClientKey, operation: WireOperation);
}

/// Transport that logs every operation as JSON through `tracing`.
///
/// Used by the host harness where there is no real network session.
#[derive(Debug, Default)]
pub struct TracingTransport;

impl WireTransport for TracingTransport {
    fn send_to_client(&self, client: &ClientKey, operation: WireOperation) {
        match serde_json::to_string(&operation) {
            Ok(json) => debug!(client = %client, "wire -> {}", json),
            Err(e) => warn!("Failed to serialize {} for {}: {}", operation.kind(), client, e),
        }
    }
}

/// Transport that records every operation in send order.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(ClientKey, WireOperation)>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation sent so far, across all clients.
    pub fn operations(&self) -> Vec<(ClientKey, WireOperation)> {
        self.sent.lock().clone()
    }

    /// Operations sent to one client, in order.
    pub fn operations_for(&self, client: &ClientKey) -> Vec<WireOperation> {
        self.sent
            .lock()
            .iter()
            .filter(|(key, _)| key == client)
            .map(|(_, op)| op.clone())
            .collect()
    }

    /// Number of operations recorded.
    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }

    /// Drains and returns everything recorded so far.
    pub fn take(&self) -> Vec<(ClientKey, WireOperation)> {
        std::mem::take(&mut *self.sent.lock())
    }
}

impl WireTransport for RecordingTransport {
    fn send_to_client(&self, client: &ClientKey, operation: WireOperation) {
        self.sent.lock().push((*client, operation));
    }
}

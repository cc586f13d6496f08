//! Translates rendered lines into display-surface wire operations.
//!
//! Every client gets the same surface name; a client has at most one active
//! surface. Updates tear the surface down and rebuild it rather than diffing
//! entries, which also guarantees title changes reach the client.

use crate::overlay::RenderedLine;
use dashmap::DashSet;
use horizon_host::{ClientKey, DisplaySlot, ScoreEntry, SortOrder, WireOperation, WireTransport};
use std::sync::Arc;
use tracing::trace;

/// Surface name used for every overlay.
pub const SURFACE_NAME: &str = "horizon_overlay";

/// Rows a display surface can hold.
pub const MAX_ENTRIES: usize = 15;

/// Tracks which clients currently have a surface and emits the operations
/// to create, refresh and remove it.
pub struct DisplayRenderer {
    transport: Arc<dyn WireTransport>,
    active: DashSet<ClientKey>,
}

impl DisplayRenderer {
    pub fn new(transport: Arc<dyn WireTransport>) -> Self {
        Self {
            transport,
            active: DashSet::new(),
        }
    }

    /// Shows a fresh surface, replacing whatever the client had.
    pub fn display(&self, client: &ClientKey, title: &str, lines: &[RenderedLine]) {
        if self.has_active(client) {
            self.remove(client);
        }

        self.send(client, create_surface(title));
        self.active.insert(*client);
        self.send_entries(client, lines);
        trace!("Displayed '{}' to {}", title, client);
    }

    /// Rebuilds the client's surface with new content.
    ///
    /// Does nothing if the client has no active surface.
    pub fn update(&self, client: &ClientKey, title: &str, lines: &[RenderedLine]) {
        if !self.has_active(client) {
            return;
        }

        self.send(
            client,
            WireOperation::DestroyDisplaySurface {
                name: SURFACE_NAME.to_string(),
            },
        );
        self.send(client, create_surface(title));
        self.send_entries(client, lines);
    }

    /// Removes the client's surface. Does nothing if there is none.
    pub fn remove(&self, client: &ClientKey) {
        if self.active.remove(client).is_none() {
            return;
        }

        self.send(
            client,
            WireOperation::DestroyDisplaySurface {
                name: SURFACE_NAME.to_string(),
            },
        );
    }

    pub fn has_active(&self, client: &ClientKey) -> bool {
        self.active.contains(client)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Forgets every active surface without sending anything.
    pub fn clear(&self) {
        self.active.clear();
    }

    // Last line on top: reverse, cap, then number from 1.
    fn send_entries(&self, client: &ClientKey, lines: &[RenderedLine]) {
        let entries: Vec<ScoreEntry> = lines
            .iter()
            .rev()
            .take(MAX_ENTRIES)
            .zip(1u32..)
            .map(|(line, slot_id)| ScoreEntry {
                slot_id,
                text: line.text.clone(),
                score: line.score,
            })
            .collect();

        if entries.is_empty() {
            return;
        }

        self.send(
            client,
            WireOperation::ReplaceEntries {
                name: SURFACE_NAME.to_string(),
                entries,
            },
        );
    }

    fn send(&self, client: &ClientKey, operation: WireOperation) {
        self.transport.send_to_client(client, operation);
    }
}

fn create_surface(title: &str) -> WireOperation {
    WireOperation::CreateDisplaySurface {
        name: SURFACE_NAME.to_string(),
        title: title.to_string(),
        slot: DisplaySlot::Sidebar,
        sort_order: SortOrder::Ascending,
    }
}

//! # Horizon Host Interfaces
//!
//! The collaborators a host game server provides to the session and overlay
//! crates. Everything in here is an interface plus a small reference
//! implementation that is good enough to drive a real tick loop and to make
//! tests deterministic.
//!
//! ## Key Types
//!
//! - [`ClientKey`] - Opaque, stable per-connection identifier
//! - [`Scheduler`] / [`TimerHandle`] - Tick-based repeating and delayed tasks
//! - [`TickScheduler`] - Cooperative scheduler advanced once per server tick
//! - [`WireTransport`] / [`WireOperation`] - Fire-and-forget display operations
//! - [`ClientDirectory`] / [`ConnectedClients`] - Liveness and display names
//! - [`EventBus`] / [`LocalEventBus`] - Explicit event subscription table
//! - [`ConnectionHub`] - Fans connect/disconnect out to [`ConnectionListener`]s
//!
//! ## Threading Model
//!
//! All callbacks are expected to run on the single logical tick thread. The
//! types are still `Send + Sync` so a host can own them from a tokio task,
//! but none of them rely on concurrent access for correctness.

pub mod connection;
pub mod directory;
pub mod events;
pub mod scheduler;
pub mod transport;
pub mod types;

pub use connection::{ConnectionHub, ConnectionListener};
pub use directory::{ClientDirectory, ClientInfo, ConnectedClients};
pub use events::{
    EventBus, EventHandler, EventRegistration, HostEvent, LocalEventBus, SubscriptionId,
    CLIENT_CONNECTED, CLIENT_DISCONNECTED,
};
pub use scheduler::{OnceTask, RepeatingTask, Scheduler, TickScheduler, TimerHandle};
pub use transport::{
    DisplaySlot, RecordingTransport, ScoreEntry, SortOrder, TracingTransport, WireOperation,
    WireTransport,
};
pub use types::ClientKey;

/// Returns the current Unix timestamp in seconds.
pub fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

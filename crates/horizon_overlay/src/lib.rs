//! # Horizon Overlays
//!
//! Sidebar overlays rendered per client. An [`Overlay`] is a shared
//! definition: a title, a list of [`Line`] templates and a set of [`Tag`]s
//! whose values are computed for the viewing client at render time. Each
//! client's session carries one [`OverlayComponent`] that shows at most one
//! overlay at a time and re-renders it on a timer.
//!
//! ## Flow
//!
//! 1. Feature code registers overlays with the [`OverlayRegistry`].
//! 2. A client connects; its session gets a fresh [`OverlayComponent`] and
//!    the registry schedules a deferred auto-display of the highest-priority
//!    auto-display overlay.
//! 3. The component renders the overlay and hands the lines to the
//!    [`DisplayRenderer`], which emits display-surface wire operations.
//! 4. While the overlay auto-refreshes, a repeating timer re-renders it
//!    through the renderer's update path.
//! 5. On disconnect the component hides the overlay and cancels its timer.
//!
//! ## Example
//!
//! ```rust
//! use horizon_host::{ClientKey, ConnectedClients, LocalEventBus, RecordingTransport, TickScheduler};
//! use horizon_overlay::{presets, DisplayRenderer, OverlayRegistry, OverlayRuntime, OverlaySettings};
//! use horizon_session::SessionRegistry;
//! use std::sync::Arc;
//!
//! let clients = Arc::new(ConnectedClients::new());
//! let sessions = Arc::new(SessionRegistry::new(Arc::new(LocalEventBus::new())));
//! let runtime = OverlayRuntime::new(
//!     Arc::new(DisplayRenderer::new(Arc::new(RecordingTransport::new()))),
//!     Arc::new(TickScheduler::new()),
//!     clients.clone(),
//! );
//! let overlays = OverlayRegistry::new(sessions.clone(), runtime, OverlaySettings::default());
//!
//! overlays.register(presets::with_lines("welcome", "Welcome", "docs", ["Hello", "World"]));
//!
//! let client = ClientKey::new();
//! clients.insert(client, "Alice");
//! sessions.create_session(client);
//! assert!(overlays.show_to(&client, "welcome"));
//! ```

pub mod component;
pub mod definition;
pub mod error;
pub mod overlay;
pub mod presets;
pub mod registry;
pub mod renderer;

pub use component::{OverlayComponent, OverlayRuntime, OVERLAY_COMPONENT_ID};
pub use definition::OverlayDefinition;
pub use error::OverlayError;
pub use overlay::{
    Line, Overlay, OverlayBuilder, RenderedLine, Tag, TagProvider, DEFAULT_REFRESH_INTERVAL,
};
pub use presets::{builtin_tag, TagSources, BUILTIN_TAGS};
pub use registry::{OverlayDiagnostics, OverlayRegistry, OverlaySettings, OverlaySummary};
pub use renderer::{DisplayRenderer, MAX_ENTRIES, SURFACE_NAME};

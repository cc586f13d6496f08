//! # Horizon Sessions
//!
//! One [`Session`] per connected client, holding one [`Component`] per
//! registered [`ComponentFactory`]. Feature modules keep all of their
//! per-client state inside their component, so nothing mutable is ever shared
//! between two clients.
//!
//! ## Lifecycle
//!
//! 1. The host reports a connection; [`SessionRegistry::create_session`] runs.
//! 2. Every factory builds a fresh component, in factory registration order.
//! 3. Each component is linked to the session, then `on_create` runs, then its
//!    event registrations are subscribed.
//! 4. On disconnect, [`SessionRegistry::destroy_session`] calls `on_remove` on
//!    every component in the order they were added. A failing or panicking
//!    component is logged and skipped; the others are still torn down.
//!
//! Factories registered after sessions already exist are applied to every
//! existing session immediately, so a feature module that loads late sees
//! the same state as one that loaded at startup.
//!
//! ## Example
//!
//! ```rust
//! use horizon_host::{ClientKey, LocalEventBus};
//! use horizon_session::{Component, FnComponentFactory, SessionRegistry};
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct KillCounter {
//!     kills: AtomicU32,
//! }
//!
//! impl Component for KillCounter {
//!     fn id(&self) -> &str {
//!         "kills"
//!     }
//! }
//!
//! let registry = SessionRegistry::new(Arc::new(LocalEventBus::new()));
//! registry.register_factory(FnComponentFactory::of::<KillCounter>("kills"));
//!
//! let client = ClientKey::new();
//! registry.create_session(client).unwrap();
//!
//! let counter = registry.component_as::<KillCounter>(&client, "kills").unwrap();
//! counter.kills.fetch_add(1, Ordering::Relaxed);
//! ```

pub mod component;
pub mod error;
pub mod registry;
pub mod session;

pub use component::{
    downcast_component, AsAnyArc, Component, ComponentFactory, ComponentLink, FnComponentFactory,
    SessionContext,
};
pub use error::ComponentError;
pub use registry::{SessionDiagnostics, SessionRegistry, SessionSummary};
pub use session::Session;

//! Per-client overlay state machine.
//!
//! ```text
//! Idle ──show──▶ Showing { overlay, refresh timer iff auto-refresh }
//!   ▲                │
//!   └──hide──────────┘   (show while Showing hides first)
//! ```

use crate::overlay::Overlay;
use crate::renderer::DisplayRenderer;
use horizon_host::{
    ClientDirectory, EventRegistration, HostEvent, Scheduler, TimerHandle, CLIENT_DISCONNECTED,
};
use horizon_session::{Component, ComponentError, ComponentLink, FnComponentFactory, SessionContext};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Session slot id of [`OverlayComponent`].
pub const OVERLAY_COMPONENT_ID: &str = "overlay";

/// Shared, stateless services every overlay component uses.
#[derive(Clone)]
pub struct OverlayRuntime {
    pub renderer: Arc<DisplayRenderer>,
    pub scheduler: Arc<dyn Scheduler>,
    pub clients: Arc<dyn ClientDirectory>,
}

impl OverlayRuntime {
    pub fn new(
        renderer: Arc<DisplayRenderer>,
        scheduler: Arc<dyn Scheduler>,
        clients: Arc<dyn ClientDirectory>,
    ) -> Self {
        Self {
            renderer,
            scheduler,
            clients,
        }
    }
}

enum DisplayState {
    Idle,
    Showing {
        overlay: Arc<Overlay>,
        refresh: Option<TimerHandle>,
    },
}

/// Shows at most one overlay to its client and keeps it refreshed.
pub struct OverlayComponent {
    this: Weak<OverlayComponent>,
    link: ComponentLink,
    runtime: OverlayRuntime,
    state: Mutex<DisplayState>,
}

impl OverlayComponent {
    pub fn new(runtime: OverlayRuntime) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            link: ComponentLink::new(OVERLAY_COMPONENT_ID),
            runtime,
            state: Mutex::new(DisplayState::Idle),
        })
    }

    /// Factory that gives every session its own component.
    pub fn factory(runtime: OverlayRuntime) -> FnComponentFactory {
        FnComponentFactory::new(OVERLAY_COMPONENT_ID, move || {
            OverlayComponent::new(runtime.clone())
        })
    }

    /// Replaces whatever is showing with `overlay`.
    pub fn show(&self, overlay: Arc<Overlay>) {
        let client = self.link.client();
        self.hide();

        let lines = overlay.render(&client);
        self.runtime
            .renderer
            .display(&client, &overlay.title(), &lines);

        let refresh = overlay
            .auto_refresh()
            .then(|| self.start_refresh(overlay.refresh_interval()));

        debug!(
            "Showing overlay '{}' to {} (auto-refresh: {})",
            overlay.id(),
            client,
            refresh.is_some()
        );
        *self.state.lock() = DisplayState::Showing { overlay, refresh };
    }

    /// Stops the refresh timer and removes the surface.
    ///
    /// Returns `false` if nothing was showing.
    pub fn hide(&self) -> bool {
        let previous = std::mem::replace(&mut *self.state.lock(), DisplayState::Idle);
        let DisplayState::Showing { overlay, refresh } = previous else {
            return false;
        };

        if let Some(handle) = refresh {
            handle.cancel();
        }
        let client = self.link.client();
        self.runtime.renderer.remove(&client);
        debug!("Hid overlay '{}' from {}", overlay.id(), client);
        true
    }

    /// Re-renders the active overlay through the renderer's update path.
    ///
    /// Returns `false` if nothing was showing.
    pub fn refresh(&self) -> bool {
        let Some(overlay) = self.active_overlay() else {
            return false;
        };

        let client = self.link.client();
        let lines = overlay.render(&client);
        self.runtime
            .renderer
            .update(&client, &overlay.title(), &lines);
        true
    }

    pub fn active_overlay(&self) -> Option<Arc<Overlay>> {
        match &*self.state.lock() {
            DisplayState::Showing { overlay, .. } => Some(overlay.clone()),
            DisplayState::Idle => None,
        }
    }

    pub fn is_showing(&self) -> bool {
        matches!(*self.state.lock(), DisplayState::Showing { .. })
    }

    /// Whether an uncancelled refresh timer is held.
    pub fn has_refresh_timer(&self) -> bool {
        match &*self.state.lock() {
            DisplayState::Showing {
                refresh: Some(handle),
                ..
            } => !handle.is_cancelled(),
            _ => false,
        }
    }

    fn start_refresh(&self, interval: u64) -> TimerHandle {
        let component = self.this.clone();
        self.runtime.scheduler.schedule_repeating(
            interval,
            Box::new(move |handle: &TimerHandle| {
                let keep = component
                    .upgrade()
                    .is_some_and(|component| component.on_refresh_timer(handle));
                if !keep {
                    handle.cancel();
                }
            }),
        )
    }

    // Teardown normally cancels the timer first; this covers ordering bugs.
    fn on_refresh_timer(&self, handle: &TimerHandle) -> bool {
        let client = self.link.try_client();
        if client.is_some_and(|client| self.runtime.clients.is_connected(&client)) {
            self.refresh();
            return true;
        }

        debug!("Refresh timer {} fired for a gone client, cancelling", handle.id());
        let owns_timer = {
            let mut state = self.state.lock();
            let owns = matches!(
                &*state,
                DisplayState::Showing { refresh: Some(current), .. } if current == handle
            );
            if owns {
                *state = DisplayState::Idle;
            }
            owns
        };
        if let (true, Some(client)) = (owns_timer, client) {
            self.runtime.renderer.remove(&client);
        }
        false
    }
}

impl Component for OverlayComponent {
    fn id(&self) -> &str {
        OVERLAY_COMPONENT_ID
    }

    fn on_create(&self, context: SessionContext) -> Result<(), ComponentError> {
        self.link.attach(context);
        Ok(())
    }

    fn on_remove(&self) -> Result<(), ComponentError> {
        self.hide();
        self.link.detach();
        Ok(())
    }

    fn event_handlers(&self) -> Vec<EventRegistration> {
        let owner = self.link.client();
        let component = self.this.clone();
        vec![EventRegistration::new(
            CLIENT_DISCONNECTED,
            move |event: &HostEvent| {
                if event.client != Some(owner) {
                    return;
                }
                if let Some(component) = component.upgrade() {
                    component.hide();
                }
            },
        )]
    }
}

impl std::fmt::Debug for OverlayComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayComponent")
            .field("client", &self.link.try_client())
            .field(
                "active_overlay",
                &self.active_overlay().map(|overlay| overlay.id().to_string()),
            )
            .field("has_refresh_timer", &self.has_refresh_timer())
            .finish()
    }
}

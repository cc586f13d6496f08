//! Process-wide overlay table and the per-client show/hide entry points.

use crate::component::{OverlayComponent, OverlayRuntime, OVERLAY_COMPONENT_ID};
use crate::overlay::{Overlay, DEFAULT_REFRESH_INTERVAL};
use horizon_host::{ClientKey, ConnectionListener};
use horizon_session::SessionRegistry;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// `[overlays]` configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    /// Show the best auto-display overlay to every new client
    pub auto_display: bool,
    /// Ticks to wait after a connect before the auto-display attempt
    pub auto_display_delay_ticks: u64,
    /// Refresh interval for definitions that do not set one
    pub default_refresh_interval: u64,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            auto_display: true,
            auto_display_delay_ticks: 20,
            default_refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

/// One overlay row of [`OverlayDiagnostics`].
#[derive(Debug, Clone, Serialize)]
pub struct OverlaySummary {
    pub id: String,
    pub owner: String,
    pub title: String,
    pub priority: i32,
    pub auto_display: bool,
    pub auto_refresh: bool,
    pub refresh_interval: u64,
    pub viewers: usize,
}

/// Read-only snapshot of the overlay registry.
#[derive(Debug, Clone, Serialize)]
pub struct OverlayDiagnostics {
    pub overlay_count: usize,
    pub active_displays: usize,
    pub overlays: Vec<OverlaySummary>,
}

/// Named overlays, in registration order.
pub struct OverlayRegistry {
    this: Weak<OverlayRegistry>,
    overlays: RwLock<Vec<Arc<Overlay>>>,
    sessions: Arc<SessionRegistry>,
    runtime: OverlayRuntime,
    settings: OverlaySettings,
}

impl OverlayRegistry {
    /// Creates the registry and installs the [`OverlayComponent`] factory
    /// into `sessions`.
    pub fn new(
        sessions: Arc<SessionRegistry>,
        runtime: OverlayRuntime,
        settings: OverlaySettings,
    ) -> Arc<Self> {
        if !sessions.register_factory(OverlayComponent::factory(runtime.clone())) {
            debug!("Overlay component factory was already installed");
        }

        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            overlays: RwLock::new(Vec::new()),
            sessions,
            runtime,
            settings,
        })
    }

    pub fn settings(&self) -> &OverlaySettings {
        &self.settings
    }

    /// Adds an overlay. Returns `false` if the id is taken.
    pub fn register(&self, overlay: impl Into<Arc<Overlay>>) -> bool {
        let overlay = overlay.into();
        let mut overlays = self.overlays.write();
        if overlays.iter().any(|existing| existing.id() == overlay.id()) {
            warn!("Overlay '{}' is already registered", overlay.id());
            return false;
        }

        info!(
            "📋 Registered overlay '{}' (owner: {}, priority: {})",
            overlay.id(),
            overlay.owner(),
            overlay.priority()
        );
        overlays.push(overlay);
        true
    }

    /// Removes an overlay and hides it from everyone currently viewing that
    /// registered instance.
    pub fn unregister(&self, id: &str) -> bool {
        let removed = {
            let mut overlays = self.overlays.write();
            match overlays.iter().position(|overlay| overlay.id() == id) {
                Some(index) => overlays.remove(index),
                None => return false,
            }
        };

        let hidden = self
            .viewer_components(&removed)
            .into_iter()
            .filter(|(_, component)| component.hide())
            .count();
        info!(
            "🗑️ Unregistered overlay '{}' (hidden from {} client(s))",
            id, hidden
        );
        true
    }

    /// Unregisters everything `owner` registered. Returns how many were removed.
    pub fn cleanup_owner(&self, owner: &str) -> usize {
        self.by_owner(owner)
            .iter()
            .filter(|overlay| self.unregister(overlay.id()))
            .count()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Overlay>> {
        self.overlays
            .read()
            .iter()
            .find(|overlay| overlay.id() == id)
            .cloned()
    }

    pub fn by_owner(&self, owner: &str) -> Vec<Arc<Overlay>> {
        self.overlays
            .read()
            .iter()
            .filter(|overlay| overlay.owner() == owner)
            .cloned()
            .collect()
    }

    pub fn overlays(&self) -> Vec<Arc<Overlay>> {
        self.overlays.read().clone()
    }

    pub fn len(&self) -> usize {
        self.overlays.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.read().is_empty()
    }

    /// Highest-priority overlay with auto-display on. Ties go to the one
    /// registered first.
    pub fn highest_priority_auto_display(&self) -> Option<Arc<Overlay>> {
        highest(self.overlays.read().iter().filter(|overlay| overlay.auto_display()))
    }

    /// Highest-priority overlay regardless of auto-display.
    pub fn highest_priority(&self) -> Option<Arc<Overlay>> {
        highest(self.overlays.read().iter())
    }

    /// Shows a registered overlay to `client`.
    pub fn show_to(&self, client: &ClientKey, id: &str) -> bool {
        match self.get(id) {
            Some(overlay) => self.show_direct(client, overlay),
            None => {
                debug!("No overlay '{}' to show to {}", id, client);
                false
            }
        }
    }

    /// Shows any overlay, registered or not, to `client`.
    ///
    /// Returns `false` if the client has no session or no overlay component.
    pub fn show_direct(&self, client: &ClientKey, overlay: Arc<Overlay>) -> bool {
        let Some(component) = self.component_for(client) else {
            return false;
        };
        info!("Showing overlay '{}' to {}", overlay.id(), client);
        component.show(overlay);
        true
    }

    /// Hides whatever `client` is viewing.
    ///
    /// Returns `false` if the client has no session or no overlay component.
    pub fn hide_from(&self, client: &ClientKey) -> bool {
        let Some(component) = self.component_for(client) else {
            return false;
        };
        component.hide();
        true
    }

    /// Shows the best auto-display overlay to `client`.
    pub fn auto_display(&self, client: &ClientKey) -> bool {
        match self.highest_priority_auto_display() {
            Some(overlay) => self.show_direct(client, overlay),
            None => {
                debug!("No auto-display overlay for {}", client);
                false
            }
        }
    }

    /// Re-renders `id` for every client currently viewing it.
    pub fn refresh_viewers(&self, id: &str) -> usize {
        let Some(overlay) = self.get(id) else {
            return 0;
        };
        self.viewer_components(&overlay)
            .into_iter()
            .filter(|(_, component)| component.refresh())
            .count()
    }

    /// Clients currently viewing `id`.
    pub fn viewers_of(&self, id: &str) -> Vec<ClientKey> {
        let Some(overlay) = self.get(id) else {
            return Vec::new();
        };
        let mut viewers: Vec<ClientKey> = self
            .viewer_components(&overlay)
            .into_iter()
            .map(|(client, _)| client)
            .collect();
        viewers.sort();
        viewers
    }

    pub fn diagnostics(&self) -> OverlayDiagnostics {
        let overlays: Vec<OverlaySummary> = self
            .overlays()
            .iter()
            .map(|overlay| OverlaySummary {
                id: overlay.id().to_string(),
                owner: overlay.owner().to_string(),
                title: overlay.title(),
                priority: overlay.priority(),
                auto_display: overlay.auto_display(),
                auto_refresh: overlay.auto_refresh(),
                refresh_interval: overlay.refresh_interval(),
                viewers: self.viewer_components(overlay).len(),
            })
            .collect();

        OverlayDiagnostics {
            overlay_count: overlays.len(),
            active_displays: self.runtime.renderer.active_count(),
            overlays,
        }
    }

    fn component_for(&self, client: &ClientKey) -> Option<Arc<OverlayComponent>> {
        let component = self
            .sessions
            .component_as::<OverlayComponent>(client, OVERLAY_COMPONENT_ID);
        if component.is_none() {
            debug!("No overlay component for {}", client);
        }
        component
    }

    /// Components showing this exact overlay instance.
    fn viewer_components(&self, target: &Arc<Overlay>) -> Vec<(ClientKey, Arc<OverlayComponent>)> {
        self.sessions
            .sessions()
            .into_iter()
            .filter_map(|session| {
                let component = session.component_as::<OverlayComponent>(OVERLAY_COMPONENT_ID)?;
                let showing = component
                    .active_overlay()
                    .is_some_and(|overlay| Arc::ptr_eq(&overlay, target));
                showing.then(|| (session.client(), component))
            })
            .collect()
    }
}

fn highest<'a>(overlays: impl Iterator<Item = &'a Arc<Overlay>>) -> Option<Arc<Overlay>> {
    overlays
        .fold(None, |best: Option<&Arc<Overlay>>, candidate| match best {
            Some(best) if best.priority() >= candidate.priority() => Some(best),
            _ => Some(candidate),
        })
        .cloned()
}

impl ConnectionListener for OverlayRegistry {
    fn on_connection_established(&self, client: &ClientKey) {
        if !self.settings.auto_display {
            return;
        }

        let registry = self.this.clone();
        let clients = self.runtime.clients.clone();
        let client = *client;
        self.runtime.scheduler.schedule_once(
            self.settings.auto_display_delay_ticks,
            Box::new(move || {
                if !clients.is_connected(&client) {
                    return;
                }
                if let Some(registry) = registry.upgrade() {
                    let shown = registry.auto_display(&client);
                    debug!("Auto-display for {}: {}", client, shown);
                }
            }),
        );
        debug!(
            "Scheduled auto-display for {} in {} tick(s)",
            client, self.settings.auto_display_delay_ticks
        );
    }

    fn on_connection_closed(&self, _client: &ClientKey) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::DisplayRenderer;
    use horizon_host::{ConnectedClients, LocalEventBus, RecordingTransport, TickScheduler};

    struct Fixture {
        overlays: Arc<OverlayRegistry>,
        sessions: Arc<SessionRegistry>,
        clients: Arc<ConnectedClients>,
        transport: Arc<RecordingTransport>,
    }

    fn fixture() -> Fixture {
        let transport = Arc::new(RecordingTransport::new());
        let clients = Arc::new(ConnectedClients::new());
        let sessions = Arc::new(SessionRegistry::new(Arc::new(LocalEventBus::new())));
        let runtime = OverlayRuntime::new(
            Arc::new(DisplayRenderer::new(transport.clone())),
            Arc::new(TickScheduler::new()),
            clients.clone(),
        );
        let overlays = OverlayRegistry::new(sessions.clone(), runtime, OverlaySettings::default());
        Fixture {
            overlays,
            sessions,
            clients,
            transport,
        }
    }

    impl Fixture {
        fn join(&self) -> ClientKey {
            let client = ClientKey::new();
            self.clients.insert(client, "player");
            self.sessions.create_session(client);
            client
        }
    }

    fn overlay(id: &str, priority: i32, auto_display: bool) -> Overlay {
        Overlay::builder(id, id, "test")
            .priority(priority)
            .auto_display(auto_display)
            .line(id, 1)
            .build()
    }

    #[test]
    fn test_priority_selection() {
        let f = fixture();
        f.overlays.register(overlay("five", 5, true));
        f.overlays.register(overlay("ten", 10, true));
        f.overlays.register(overlay("three", 3, false));

        assert_eq!(f.overlays.highest_priority_auto_display().unwrap().id(), "ten");
        assert_eq!(f.overlays.highest_priority().unwrap().id(), "ten");
    }

    #[test]
    fn test_auto_display_flag_and_ties() {
        let f = fixture();
        f.overlays.register(overlay("first", 1, true));
        f.overlays.register(overlay("second", 1, true));
        f.overlays.register(overlay("manual", 9, false));

        assert_eq!(f.overlays.highest_priority_auto_display().unwrap().id(), "first");
        assert_eq!(f.overlays.highest_priority().unwrap().id(), "manual");
    }

    #[test]
    fn test_empty_registry_selects_nothing() {
        let f = fixture();
        assert!(f.overlays.highest_priority().is_none());
        assert!(!f.overlays.auto_display(&f.join()));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let f = fixture();
        assert!(f.overlays.register(overlay("a", 0, true)));
        assert!(!f.overlays.register(overlay("a", 5, true)));
        assert_eq!(f.overlays.len(), 1);
        assert_eq!(f.overlays.get("a").unwrap().priority(), 0);
    }

    #[test]
    fn test_show_without_session_is_false() {
        let f = fixture();
        f.overlays.register(overlay("a", 0, true));
        let stranger = ClientKey::new();

        assert!(!f.overlays.show_to(&stranger, "a"));
        assert!(!f.overlays.hide_from(&stranger));
        assert!(!f.overlays.show_to(&f.join(), "missing"));
        assert!(f.transport.is_empty());
    }

    #[test]
    fn test_unregister_hides_viewers() {
        let f = fixture();
        f.overlays.register(overlay("event", 0, true));
        f.overlays.register(overlay("other", 0, true));
        let (watcher, bystander) = (f.join(), f.join());
        f.overlays.show_to(&watcher, "event");
        f.overlays.show_to(&bystander, "other");

        assert_eq!(f.overlays.viewers_of("event"), vec![watcher]);
        assert!(f.overlays.unregister("event"));
        assert!(!f.overlays.unregister("event"));

        assert!(f.overlays.viewers_of("event").is_empty());
        assert_eq!(f.overlays.viewers_of("other"), vec![bystander]);
        assert_eq!(f.overlays.diagnostics().active_displays, 1);
    }

    #[test]
    fn test_viewers_match_the_registered_instance() {
        let f = fixture();
        f.overlays.register(overlay("event", 0, true));
        let (registered, direct) = (f.join(), f.join());
        f.overlays.show_to(&registered, "event");
        f.overlays
            .show_direct(&direct, Arc::new(overlay("event", 0, true)));

        assert_eq!(f.overlays.viewers_of("event"), vec![registered]);
        assert_eq!(f.overlays.refresh_viewers("event"), 1);

        assert!(f.overlays.unregister("event"));
        let still_showing = f
            .sessions
            .component_as::<OverlayComponent>(&direct, OVERLAY_COMPONENT_ID)
            .unwrap();
        assert!(still_showing.is_showing());
        assert_eq!(f.overlays.diagnostics().active_displays, 1);
        assert_eq!(f.overlays.refresh_viewers("event"), 0);
    }

    #[test]
    fn test_cleanup_owner() {
        let f = fixture();
        f.overlays.register(Overlay::new("a", "A", "minigame"));
        f.overlays.register(Overlay::new("b", "B", "minigame"));
        f.overlays.register(Overlay::new("c", "C", "core"));

        assert_eq!(f.overlays.cleanup_owner("minigame"), 2);
        assert_eq!(f.overlays.len(), 1);
        assert!(f.overlays.by_owner("minigame").is_empty());
    }

    #[test]
    fn test_refresh_viewers_counts_only_viewers() {
        let f = fixture();
        f.overlays.register(overlay("a", 0, true));
        let (viewer, _idle) = (f.join(), f.join());
        f.overlays.show_to(&viewer, "a");

        assert_eq!(f.overlays.refresh_viewers("a"), 1);
        assert_eq!(f.overlays.refresh_viewers("missing"), 0);

        let diagnostics = f.overlays.diagnostics();
        assert_eq!(diagnostics.overlays[0].viewers, 1);
    }
}

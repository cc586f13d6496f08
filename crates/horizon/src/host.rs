//! Wires the host collaborators, sessions and overlays together.

use crate::config::AppConfig;
use anyhow::Context;
use horizon_host::{
    ClientKey, ConnectedClients, ConnectionHub, LocalEventBus, TickScheduler, WireTransport,
};
use horizon_overlay::{DisplayRenderer, OverlayRegistry, OverlayRuntime, TagSources};
use horizon_session::SessionRegistry;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything one running host owns.
///
/// All methods are meant to be called from the single tick task.
pub struct OverlayHost {
    pub hub: Arc<ConnectionHub>,
    pub sessions: Arc<SessionRegistry>,
    pub overlays: Arc<OverlayRegistry>,
    pub scheduler: Arc<TickScheduler>,
    pub clients: Arc<ConnectedClients>,
    pub event_bus: Arc<LocalEventBus>,
}

impl OverlayHost {
    /// Builds the host and registers every configured overlay.
    pub fn new(config: &AppConfig, transport: Arc<dyn WireTransport>) -> anyhow::Result<Self> {
        let event_bus = Arc::new(LocalEventBus::new());
        let clients = Arc::new(ConnectedClients::new());
        let scheduler = Arc::new(TickScheduler::new());

        let sessions = Arc::new(SessionRegistry::new(event_bus.clone()));
        let runtime = OverlayRuntime::new(
            Arc::new(DisplayRenderer::new(transport)),
            scheduler.clone(),
            clients.clone(),
        );
        let overlays = OverlayRegistry::new(sessions.clone(), runtime, config.overlays.clone());

        // Sessions first: overlays rely on the session existing on connect.
        let hub = Arc::new(ConnectionHub::new(clients.clone(), event_bus.clone()));
        hub.add_listener(sessions.clone());
        hub.add_listener(overlays.clone());

        let sources = TagSources::new(clients.clone(), config.server.max_players);
        for definition in &config.overlay_definitions {
            let overlay = definition
                .into_overlay(&sources, config.overlays.default_refresh_interval)
                .with_context(|| format!("building overlay '{}'", definition.id))?;
            if !overlays.register(overlay) {
                warn!("Skipping duplicate overlay definition '{}'", definition.id);
            }
        }

        info!(
            "🧩 Host ready: {} overlay(s), factories {:?}",
            overlays.len(),
            sessions.factory_ids()
        );

        Ok(Self {
            hub,
            sessions,
            overlays,
            scheduler,
            clients,
            event_bus,
        })
    }

    /// Advances the scheduler by one tick.
    pub fn tick(&self) -> usize {
        self.scheduler.tick()
    }

    pub fn connect(&self, name: impl Into<String>) -> ClientKey {
        let client = ClientKey::new();
        self.hub.connect(client, name);
        client
    }

    pub fn disconnect(&self, client: &ClientKey) -> bool {
        self.hub.disconnect(client)
    }

    /// Disconnects every client and drops any leftover sessions.
    pub fn shutdown(&self) -> usize {
        let disconnected = self.hub.disconnect_all();
        let leftover = self.sessions.destroy_all();
        if leftover > 0 {
            warn!("Destroyed {} session(s) with no live connection", leftover);
        }
        info!("🛑 Disconnected {} client(s)", disconnected);
        disconnected
    }

    pub fn log_diagnostics(&self) {
        let sessions = self.sessions.diagnostics();
        let overlays = self.overlays.diagnostics();

        info!(
            "📊 Tick {} | {} session(s) | {} overlay(s) | {} active display(s) | {} subscription(s) | {} teardown failure(s)",
            self.scheduler.current_tick(),
            sessions.session_count,
            overlays.overlay_count,
            overlays.active_displays,
            self.event_bus.subscription_count(),
            sessions.teardown_failures
        );

        match serde_json::to_string(&sessions) {
            Ok(json) => debug!("Session diagnostics: {}", json),
            Err(e) => warn!("Failed to serialize session diagnostics: {}", e),
        }
        match serde_json::to_string(&overlays) {
            Ok(json) => debug!("Overlay diagnostics: {}", json),
            Err(e) => warn!("Failed to serialize overlay diagnostics: {}", e),
        }
    }
}

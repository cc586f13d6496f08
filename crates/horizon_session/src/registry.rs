//! Process-wide table of sessions and component factories.

use crate::component::{downcast_component, Component, ComponentFactory};
use crate::session::Session;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use horizon_host::{ClientKey, ConnectionListener, EventBus};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One line of [`SessionDiagnostics`].
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub client: ClientKey,
    pub component_ids: Vec<String>,
    pub age_secs: u64,
}

/// Read-only snapshot of the registry for debugging and admin tooling.
#[derive(Debug, Clone, Serialize)]
pub struct SessionDiagnostics {
    pub session_count: usize,
    pub factory_ids: Vec<String>,
    pub sessions: Vec<SessionSummary>,
    pub sessions_created: u64,
    pub sessions_destroyed: u64,
    pub teardown_failures: u64,
}

/// Owns every live [`Session`] and every registered [`ComponentFactory`].
pub struct SessionRegistry {
    event_bus: Arc<dyn EventBus>,
    factories: RwLock<Vec<Arc<dyn ComponentFactory>>>,
    sessions: DashMap<ClientKey, Arc<Session>>,
    sessions_created: AtomicU64,
    sessions_destroyed: AtomicU64,
    teardown_failures: AtomicU64,
}

impl SessionRegistry {
    pub fn new(event_bus: Arc<dyn EventBus>) -> Self {
        Self {
            event_bus,
            factories: RwLock::new(Vec::new()),
            sessions: DashMap::new(),
            sessions_created: AtomicU64::new(0),
            sessions_destroyed: AtomicU64::new(0),
            teardown_failures: AtomicU64::new(0),
        }
    }

    /// Creates the session for `client` and populates it from every factory,
    /// in factory registration order.
    ///
    /// Returns `None` if a session already exists for this client.
    pub fn create_session(&self, client: ClientKey) -> Option<Arc<Session>> {
        let session = match self.sessions.entry(client) {
            Entry::Occupied(_) => {
                warn!("Session for {} already exists", client);
                return None;
            }
            Entry::Vacant(vacant) => {
                let session = Session::new(client, self.event_bus.clone());
                vacant.insert(session.clone());
                session
            }
        };

        // The map guard is released before any on_create runs, so components
        // may look themselves up through the registry.
        for factory in self.factory_snapshot() {
            Self::attach_from(&session, factory.as_ref());
        }

        self.sessions_created.fetch_add(1, Ordering::Relaxed);
        info!(
            "🧩 Session created for {} with {} component(s)",
            client,
            session.component_count()
        );
        Some(session)
    }

    /// Tears down and forgets the session for `client`.
    ///
    /// Returns `false` if there was no session.
    pub fn destroy_session(&self, client: &ClientKey) -> bool {
        let Some(session) = self.get_session(client) else {
            debug!("No session to destroy for {}", client);
            return false;
        };

        let failures = session.destroy();
        self.sessions.remove(client);

        self.sessions_destroyed.fetch_add(1, Ordering::Relaxed);
        self.teardown_failures
            .fetch_add(failures as u64, Ordering::Relaxed);
        info!("🧹 Session destroyed for {}", client);
        true
    }

    /// Destroys every session. Used at host shutdown.
    pub fn destroy_all(&self) -> usize {
        let clients: Vec<ClientKey> = self.sessions.iter().map(|entry| *entry.key()).collect();
        clients
            .iter()
            .filter(|client| self.destroy_session(client))
            .count()
    }

    /// Registers a factory and applies it to every existing session.
    ///
    /// Returns `false` if a factory with the same id is already registered.
    pub fn register_factory<F>(&self, factory: F) -> bool
    where
        F: ComponentFactory + 'static,
    {
        let factory: Arc<dyn ComponentFactory> = Arc::new(factory);
        {
            let mut factories = self.factories.write();
            if factories.iter().any(|existing| existing.id() == factory.id()) {
                warn!("Component factory '{}' is already registered", factory.id());
                return false;
            }
            factories.push(factory.clone());
        }

        let existing = self.sessions();
        for session in &existing {
            Self::attach_from(session, factory.as_ref());
        }

        info!(
            "📦 Registered component factory '{}' (applied to {} existing session(s))",
            factory.id(),
            existing.len()
        );
        true
    }

    pub fn get_session(&self, client: &ClientKey) -> Option<Arc<Session>> {
        self.sessions.get(client).map(|entry| entry.value().clone())
    }

    pub fn get_component(&self, client: &ClientKey, id: &str) -> Option<Arc<dyn Component>> {
        self.get_session(client)?.component(id)
    }

    /// Typed convenience accessor over [`get_component`](Self::get_component).
    pub fn component_as<T: Component>(&self, client: &ClientKey, id: &str) -> Option<Arc<T>> {
        self.get_component(client, id)
            .and_then(downcast_component::<T>)
    }

    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Ids of registered factories, in registration order.
    pub fn factory_ids(&self) -> Vec<String> {
        self.factories
            .read()
            .iter()
            .map(|factory| factory.id().to_string())
            .collect()
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        let mut sessions: Vec<SessionSummary> = self
            .sessions()
            .iter()
            .map(|session| SessionSummary {
                client: session.client(),
                component_ids: session.component_ids(),
                age_secs: session
                    .created_at()
                    .elapsed()
                    .map(|age| age.as_secs())
                    .unwrap_or_default(),
            })
            .collect();
        sessions.sort_by_key(|summary| summary.client);

        SessionDiagnostics {
            session_count: sessions.len(),
            factory_ids: self.factory_ids(),
            sessions,
            sessions_created: self.sessions_created.load(Ordering::Relaxed),
            sessions_destroyed: self.sessions_destroyed.load(Ordering::Relaxed),
            teardown_failures: self.teardown_failures.load(Ordering::Relaxed),
        }
    }

    fn factory_snapshot(&self) -> Vec<Arc<dyn ComponentFactory>> {
        self.factories.read().clone()
    }

    fn attach_from(session: &Arc<Session>, factory: &dyn ComponentFactory) {
        let component = factory.create();
        if component.id() != factory.id() {
            warn!(
                "Factory '{}' produced a component with id '{}', skipping",
                factory.id(),
                component.id()
            );
            return;
        }
        session.add_component(component);
    }
}

impl ConnectionListener for SessionRegistry {
    fn on_connection_established(&self, client: &ClientKey) {
        self.create_session(*client);
    }

    fn on_connection_closed(&self, client: &ClientKey) {
        self.destroy_session(client);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::FnComponentFactory;
    use horizon_host::LocalEventBus;
    use std::sync::atomic::AtomicU32;

    #[derive(Default)]
    struct Health {
        points: AtomicU32,
    }

    impl Component for Health {
        fn id(&self) -> &str {
            "health"
        }
    }

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Arc::new(LocalEventBus::new()))
    }

    #[test]
    fn test_create_session_is_guarded() {
        let registry = registry();
        let client = ClientKey::new();

        assert!(registry.create_session(client).is_some());
        assert!(registry.create_session(client).is_none());
        assert_eq!(registry.session_count(), 1);
    }

    #[test]
    fn test_sessions_do_not_share_component_state() {
        let registry = registry();
        registry.register_factory(FnComponentFactory::of::<Health>("health"));

        let (alice, bob) = (ClientKey::new(), ClientKey::new());
        registry.create_session(alice);
        registry.create_session(bob);

        let alice_health = registry.component_as::<Health>(&alice, "health").unwrap();
        alice_health.points.store(7, Ordering::SeqCst);

        let bob_health = registry.component_as::<Health>(&bob, "health").unwrap();
        assert_eq!(bob_health.points.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_duplicate_factory_rejected() {
        let registry = registry();
        assert!(registry.register_factory(FnComponentFactory::of::<Health>("health")));
        assert!(!registry.register_factory(FnComponentFactory::of::<Health>("health")));
        assert_eq!(registry.factory_ids(), vec!["health"]);
    }

    #[test]
    fn test_mismatched_factory_id_is_skipped() {
        let registry = registry();
        registry.register_factory(FnComponentFactory::of::<Health>("mana"));
        let client = ClientKey::new();
        let session = registry.create_session(client).unwrap();

        assert_eq!(session.component_count(), 0);
    }

    #[test]
    fn test_destroy_unknown_session() {
        let registry = registry();
        assert!(!registry.destroy_session(&ClientKey::new()));
        assert_eq!(registry.diagnostics().sessions_destroyed, 0);
    }

    #[test]
    fn test_diagnostics_snapshot() {
        let registry = registry();
        registry.register_factory(FnComponentFactory::of::<Health>("health"));
        let client = ClientKey::new();
        registry.create_session(client);

        let diagnostics = registry.diagnostics();
        assert_eq!(diagnostics.session_count, 1);
        assert_eq!(diagnostics.sessions[0].client, client);
        assert_eq!(diagnostics.sessions[0].component_ids, vec!["health"]);
        assert_eq!(diagnostics.sessions_created, 1);

        let json = serde_json::to_value(&diagnostics).unwrap();
        assert_eq!(json["factory_ids"][0], "health");
    }
}

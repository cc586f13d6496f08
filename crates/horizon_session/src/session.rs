use crate::component::{downcast_component, Component, SessionContext};
use horizon_host::{ClientKey, EventBus, SubscriptionId};
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error, warn};

struct LinkedComponent {
    component: Arc<dyn Component>,
    subscriptions: Vec<SubscriptionId>,
    removing: bool,
}

/// Per-client container holding at most one component per id.
///
/// Components are kept in the order they were added; teardown follows the
/// same order.
pub struct Session {
    client: ClientKey,
    created_at: SystemTime,
    event_bus: Arc<dyn EventBus>,
    components: RwLock<Vec<LinkedComponent>>,
}

impl Session {
    pub(crate) fn new(client: ClientKey, event_bus: Arc<dyn EventBus>) -> Arc<Self> {
        Arc::new(Self {
            client,
            created_at: SystemTime::now(),
            event_bus,
            components: RwLock::new(Vec::new()),
        })
    }

    pub fn client(&self) -> ClientKey {
        self.client
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Links `component`, runs its `on_create` and subscribes its handlers.
    ///
    /// Returns `false` if a component with the same id is already present,
    /// or if `on_create` reported an error (the component is unlinked again).
    pub fn add_component(self: &Arc<Self>, component: Arc<dyn Component>) -> bool {
        let id = component.id().to_string();
        {
            let mut components = self.components.write();
            if components.iter().any(|linked| linked.component.id() == id) {
                debug!("Session {} already has component '{}'", self.client, id);
                return false;
            }
            components.push(LinkedComponent {
                component: component.clone(),
                subscriptions: Vec::new(),
                removing: false,
            });
        }

        let context = SessionContext::new(self.client, Arc::downgrade(self));
        if let Err(e) = component.on_create(context) {
            error!("❌ {} (client {})", e, self.client);
            self.components
                .write()
                .retain(|linked| !Arc::ptr_eq(&linked.component, &component));
            return false;
        }

        let subscriptions: Vec<SubscriptionId> = component
            .event_handlers()
            .into_iter()
            .map(|registration| {
                self.event_bus
                    .subscribe(&registration.event_type, registration.handler)
            })
            .collect();

        let mut components = self.components.write();
        match components
            .iter_mut()
            .find(|linked| Arc::ptr_eq(&linked.component, &component))
        {
            Some(linked) => linked.subscriptions = subscriptions,
            None => {
                // Removed from inside its own on_create.
                drop(components);
                self.unsubscribe_all(&subscriptions);
                return false;
            }
        }

        debug!("Component '{}' added to session {}", id, self.client);
        true
    }

    /// Runs `on_remove` for the component with `id` and unlinks it.
    ///
    /// The component stays linked while `on_remove` runs. Returns `false` if
    /// there was no such component or it is already being removed. A failing
    /// `on_remove` is logged; the component is unlinked either way.
    pub fn remove_component(&self, id: &str) -> bool {
        let component = {
            let mut components = self.components.write();
            match components
                .iter_mut()
                .find(|linked| !linked.removing && linked.component.id() == id)
            {
                Some(linked) => {
                    linked.removing = true;
                    linked.component.clone()
                }
                None => return false,
            }
        };
        self.run_on_remove(&component);
        self.unlink(&component);
        true
    }

    pub fn component(&self, id: &str) -> Option<Arc<dyn Component>> {
        self.components
            .read()
            .iter()
            .find(|linked| linked.component.id() == id)
            .map(|linked| linked.component.clone())
    }

    /// Looks up a component and downcasts it to `T`.
    pub fn component_as<T: Component>(&self, id: &str) -> Option<Arc<T>> {
        self.component(id).and_then(downcast_component::<T>)
    }

    pub fn has_component(&self, id: &str) -> bool {
        self.components
            .read()
            .iter()
            .any(|linked| linked.component.id() == id)
    }

    /// Ids of all components, in the order they were added.
    pub fn component_ids(&self) -> Vec<String> {
        self.components
            .read()
            .iter()
            .map(|linked| linked.component.id().to_string())
            .collect()
    }

    pub fn component_count(&self) -> usize {
        self.components.read().len()
    }

    /// Tears down every component in the order they were added.
    ///
    /// Each `on_remove` is isolated: an error or panic in one component is
    /// logged and the rest are still removed. Components stay linked until
    /// every `on_remove` has run. Returns the number of components whose
    /// teardown failed.
    pub fn destroy(&self) -> usize {
        let snapshot: Vec<Arc<dyn Component>> = self
            .components
            .write()
            .iter_mut()
            .filter(|linked| !linked.removing)
            .map(|linked| {
                linked.removing = true;
                linked.component.clone()
            })
            .collect();

        let total = snapshot.len();
        let failures = snapshot
            .iter()
            .map(|component| self.run_on_remove(component))
            .filter(|ok| !ok)
            .count();
        for component in &snapshot {
            self.unlink(component);
        }

        debug!(
            "Session {} destroyed ({} component(s), {} failure(s))",
            self.client, total, failures
        );
        failures
    }

    fn run_on_remove(&self, component: &Arc<dyn Component>) -> bool {
        match catch_unwind(AssertUnwindSafe(|| component.on_remove())) {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!("❌ {} (client {})", e, self.client);
                false
            }
            Err(_) => {
                error!(
                    "💥 Component '{}' panicked during teardown (client {})",
                    component.id(),
                    self.client
                );
                false
            }
        }
    }

    fn unlink(&self, component: &Arc<dyn Component>) {
        let linked = {
            let mut components = self.components.write();
            components
                .iter()
                .position(|linked| Arc::ptr_eq(&linked.component, component))
                .map(|index| components.remove(index))
        };
        if let Some(linked) = linked {
            self.unsubscribe_all(&linked.subscriptions);
        }
    }

    fn unsubscribe_all(&self, subscriptions: &[SubscriptionId]) {
        for subscription in subscriptions {
            if !self.event_bus.unsubscribe(*subscription) {
                warn!("Subscription {:?} was already gone", subscription);
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("client", &self.client)
            .field("components", &self.component_ids())
            .finish()
    }
}

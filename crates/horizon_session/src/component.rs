//! Components, the factories that build them, and the lifecycle guard they share.

use crate::error::ComponentError;
use crate::session::Session;
use horizon_host::{ClientKey, EventRegistration};
use parking_lot::Mutex;
use std::any::Any;
use std::sync::{Arc, Weak};

/// Upcast helper so `Arc<dyn Component>` can be downcast to its concrete type.
///
/// Implemented automatically for every `Send + Sync + 'static` type.
pub trait AsAnyArc: Any + Send + Sync {
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAnyArc for T {
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// One feature module's per-client state.
///
/// Components are shared as `Arc<dyn Component>`, so any state that changes
/// after creation lives behind interior mutability. The id is fixed for the
/// component's lifetime and names its slot in the owning [`Session`].
///
/// `on_create` runs exactly once, after the component has been linked to its
/// session. `on_remove` runs exactly once, before it is unlinked. Embedding a
/// [`ComponentLink`] is the easiest way to enforce that no other method is
/// used outside that window.
pub trait Component: AsAnyArc {
    /// Slot identifier, unique within a session.
    fn id(&self) -> &str;

    /// Called once after the component has been linked to `context`'s session.
    fn on_create(&self, _context: SessionContext) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Called once before the component is unlinked from its session.
    fn on_remove(&self) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Event subscriptions the session wires up after `on_create` and
    /// removes after `on_remove`.
    fn event_handlers(&self) -> Vec<EventRegistration> {
        Vec::new()
    }
}

/// Downcasts a type-erased component to its concrete type.
pub fn downcast_component<T: Component>(component: Arc<dyn Component>) -> Option<Arc<T>> {
    component.into_any_arc().downcast::<T>().ok()
}

/// Stateless blueprint that manufactures one fresh component per session.
///
/// Every call to [`create`](ComponentFactory::create) must return an instance
/// whose mutable state is independent of every other instance.
pub trait ComponentFactory: Send + Sync {
    /// Id of the components this factory produces.
    fn id(&self) -> &str;

    /// Builds a brand new component.
    fn create(&self) -> Arc<dyn Component>;
}

type Constructor = Box<dyn Fn() -> Arc<dyn Component> + Send + Sync>;

/// [`ComponentFactory`] backed by a constructor closure.
pub struct FnComponentFactory {
    id: String,
    constructor: Constructor,
}

impl FnComponentFactory {
    /// Creates a factory that calls `constructor` for each new session.
    ///
    /// The closure must allocate fresh state on every call; capturing shared
    /// immutable services (schedulers, transports) is fine.
    pub fn new<C, F>(id: impl Into<String>, constructor: F) -> Self
    where
        C: Component,
        F: Fn() -> Arc<C> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            constructor: Box::new(move || constructor() as Arc<dyn Component>),
        }
    }

    /// Creates a factory that builds components with `C::default()`.
    pub fn of<C>(id: impl Into<String>) -> Self
    where
        C: Component + Default,
    {
        Self::new(id, || Arc::new(C::default()))
    }
}

impl ComponentFactory for FnComponentFactory {
    fn id(&self) -> &str {
        &self.id
    }

    fn create(&self) -> Arc<dyn Component> {
        (self.constructor)()
    }
}

impl std::fmt::Debug for FnComponentFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnComponentFactory")
            .field("id", &self.id)
            .field("constructor", &"[constructor]")
            .finish()
    }
}

/// What a component learns about its session when it is linked.
#[derive(Debug, Clone)]
pub struct SessionContext {
    client: ClientKey,
    session: Weak<Session>,
}

impl SessionContext {
    pub(crate) fn new(client: ClientKey, session: Weak<Session>) -> Self {
        Self { client, session }
    }

    /// The client that owns the session.
    pub fn client(&self) -> ClientKey {
        self.client
    }

    /// The owning session, if it is still alive.
    pub fn session(&self) -> Option<Arc<Session>> {
        self.session.upgrade()
    }
}

#[derive(Debug)]
enum LinkState {
    Detached,
    Attached(SessionContext),
    Removed,
}

/// Lifecycle guard for a component's create/remove window.
///
/// Call [`attach`](ComponentLink::attach) from `on_create` and
/// [`detach`](ComponentLink::detach) at the end of `on_remove`. Any use of
/// [`client`](ComponentLink::client) outside that window is a lifecycle
/// ordering bug and panics.
#[derive(Debug)]
pub struct ComponentLink {
    component: &'static str,
    state: Mutex<LinkState>,
}

impl ComponentLink {
    pub fn new(component: &'static str) -> Self {
        Self {
            component,
            state: Mutex::new(LinkState::Detached),
        }
    }

    /// Links the component to its session.
    ///
    /// # Panics
    ///
    /// Panics if the component was already attached or has been removed.
    pub fn attach(&self, context: SessionContext) {
        let mut state = self.state.lock();
        match *state {
            LinkState::Detached => *state = LinkState::Attached(context),
            _ => panic!(
                "component '{}' attached twice (on_create must run exactly once)",
                self.component
            ),
        }
    }

    /// Marks the component as removed.
    ///
    /// # Panics
    ///
    /// Panics if the component is not currently attached.
    pub fn detach(&self) {
        let mut state = self.state.lock();
        match *state {
            LinkState::Attached(_) => *state = LinkState::Removed,
            _ => panic!(
                "component '{}' detached while not attached (on_remove must run exactly once, after on_create)",
                self.component
            ),
        }
    }

    /// Whether the component is inside its create/remove window.
    pub fn is_attached(&self) -> bool {
        matches!(*self.state.lock(), LinkState::Attached(_))
    }

    /// The owning client.
    ///
    /// # Panics
    ///
    /// Panics when called before `on_create` or after `on_remove`.
    pub fn client(&self) -> ClientKey {
        self.context().client()
    }

    /// The owning session, if it is still alive.
    ///
    /// # Panics
    ///
    /// Panics when called before `on_create` or after `on_remove`.
    pub fn session(&self) -> Option<Arc<Session>> {
        self.context().session()
    }

    /// The owning client, or `None` outside the create/remove window.
    pub fn try_client(&self) -> Option<ClientKey> {
        match &*self.state.lock() {
            LinkState::Attached(context) => Some(context.client()),
            _ => None,
        }
    }

    fn context(&self) -> SessionContext {
        match &*self.state.lock() {
            LinkState::Attached(context) => context.clone(),
            LinkState::Detached => panic!(
                "component '{}' used before on_create linked it to a session",
                self.component
            ),
            LinkState::Removed => panic!(
                "component '{}' used after on_remove unlinked it from its session",
                self.component
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct Counter {
        value: AtomicU32,
    }

    impl Component for Counter {
        fn id(&self) -> &str {
            "counter"
        }
    }

    #[test]
    fn test_factory_instances_do_not_share_state() {
        let factory = FnComponentFactory::of::<Counter>("counter");
        let first = downcast_component::<Counter>(factory.create()).unwrap();
        let second = downcast_component::<Counter>(factory.create()).unwrap();

        first.value.fetch_add(5, Ordering::SeqCst);

        assert_eq!(first.value.load(Ordering::SeqCst), 5);
        assert_eq!(second.value.load(Ordering::SeqCst), 0);
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_downcast_to_wrong_type_fails() {
        struct Other;
        impl Component for Other {
            fn id(&self) -> &str {
                "other"
            }
        }

        let factory = FnComponentFactory::new("other", || Arc::new(Other));
        assert!(downcast_component::<Counter>(factory.create()).is_none());
        assert_eq!(factory.id(), "other");
    }

    #[test]
    fn test_link_window() {
        let link = ComponentLink::new("test");
        let client = ClientKey::new();
        assert!(!link.is_attached());
        assert_eq!(link.try_client(), None);

        link.attach(SessionContext::new(client, Weak::new()));
        assert!(link.is_attached());
        assert_eq!(link.client(), client);
        assert!(link.session().is_none());

        link.detach();
        assert!(!link.is_attached());
        assert_eq!(link.try_client(), None);
    }

    #[test]
    #[should_panic(expected = "used before on_create")]
    fn test_link_panics_before_attach() {
        ComponentLink::new("early").client();
    }

    #[test]
    #[should_panic(expected = "used after on_remove")]
    fn test_link_panics_after_detach() {
        let link = ComponentLink::new("late");
        link.attach(SessionContext::new(ClientKey::new(), Weak::new()));
        link.detach();
        link.client();
    }

    #[test]
    #[should_panic(expected = "attached twice")]
    fn test_double_attach_panics() {
        let link = ComponentLink::new("twice");
        link.attach(SessionContext::new(ClientKey::new(), Weak::new()));
        link.attach(SessionContext::new(ClientKey::new(), Weak::new()));
    }
}
